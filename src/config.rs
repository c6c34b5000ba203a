//! Engine configuration (§7 strict/non-strict `UndefinedReference`, §4.4
//! deterministic vs. seeded sampling), patterned on the small `Config`
//! structs `chapaty` threads through its backtests.

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// When `true`, a `get STREAM of "sub"` read against a substance/application
    /// that doesn't exist in the current engine state is a fatal
    /// `StreamError::UndefinedReference` instead of a zero-with-warning read.
    pub strict: bool,
    /// RNG seed for scenarios with `trials > 1`; `None` keeps deterministic
    /// mean-sampling regardless of `trials`.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { strict: false, seed: None }
    }
}
