//! The single entry point (§6.3): source text + scenario name → ordered
//! `EngineResult`s or a non-empty `ParseError` list. `run_batch` fans
//! independent scenarios out across `rayon`, matching §5's observation that
//! scenarios share no mutable state.

use rayon::prelude::*;

use crate::config::EngineConfig;
use crate::engine::{Engine, EngineResult};
use crate::error::QubecError;
use crate::program::ParsedProgram;

pub struct Facade {
    config: EngineConfig,
}

impl Default for Facade {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Facade {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Parses and compiles `source`, returning the `ParsedProgram` or the
    /// parse errors / compile errors encountered.
    #[tracing::instrument(skip(self, source))]
    pub fn load(&self, source: &str) -> Result<ParsedProgram, QubecError> {
        let parsed = crate::parser::parse(source);
        if parsed.has_errors() {
            return Err(QubecError::Parse(parsed.errors().to_vec()));
        }
        let cst = parsed.into_program().ok_or(QubecError::Invariant(crate::error::InvariantError::EmptyParseResult))?;
        crate::compiler::compile(&cst).map_err(|errs| errs.into_iter().next().map(QubecError::Compile).unwrap())
    }

    /// Runs a single named scenario against already-compiled `program`.
    #[tracing::instrument(skip(self, program))]
    pub fn run(&self, program: &ParsedProgram, scenario_name: &str) -> Result<Vec<EngineResult>, QubecError> {
        let scenario = program.scenarios.get(scenario_name).ok_or_else(|| {
            QubecError::Compile(crate::error::CompileError::UndefinedPolicy {
                scenario: scenario_name.to_string(),
                policy: "<scenario not found>".to_string(),
            })
        })?;
        Engine::run_scenario(program, scenario, &self.config)
    }

    /// Parses, compiles, and runs `scenario_name` in one call.
    pub fn run_source(&self, source: &str, scenario_name: &str) -> Result<Vec<EngineResult>, QubecError> {
        let program = self.load(source)?;
        self.run(&program, scenario_name)
    }

    /// Runs every scenario named in `scenario_names` concurrently, one fresh
    /// `Engine` per scenario (§5 "trivial outer-loop parallelism").
    pub fn run_batch(&self, program: &ParsedProgram, scenario_names: &[&str]) -> Vec<(String, Result<Vec<EngineResult>, QubecError>)> {
        scenario_names
            .par_iter()
            .map(|name| ((*name).to_string(), self.run(program, name)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_parse_errors_without_panicking() {
        let facade = Facade::default();
        let err = facade.load("invalid code").unwrap_err();
        match err {
            QubecError::Parse(errors) => assert!(!errors.is_empty()),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }
}

