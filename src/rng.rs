//! Sampling RNG injection (§4.4, §9 "RNG injection").
//!
//! The machine never samples directly; it asks an injected `Rng` for a
//! draw. `MeanRng` is the deterministic mode implementation: it always
//! returns the distribution's mean, which is what single-trial
//! (`trials == 1`, no explicit seed) scenarios require (§1, §9 "trials").

use rand::distr::Uniform;
use rand::prelude::Distribution;
use rand::SeedableRng;
use rand_distr::Normal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

pub trait Rng: Send + Sync {
    fn sample_normal(&mut self, mean: Decimal, std: Decimal) -> Decimal;
    fn sample_uniform(&mut self, low: Decimal, high: Decimal) -> Decimal;
}

/// Deterministic mode: every sample collapses to the distribution's mean.
#[derive(Debug, Default, Clone, Copy)]
pub struct MeanRng;

impl Rng for MeanRng {
    fn sample_normal(&mut self, mean: Decimal, _std: Decimal) -> Decimal {
        mean
    }

    fn sample_uniform(&mut self, low: Decimal, high: Decimal) -> Decimal {
        (low + high) / Decimal::TWO
    }
}

/// Seeded RNG used when a scenario explicitly requests `trials > 1`.
pub struct SeededRng {
    inner: rand::rngs::StdRng,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self { inner: rand::rngs::StdRng::seed_from_u64(seed) }
    }
}

impl Rng for SeededRng {
    fn sample_normal(&mut self, mean: Decimal, std: Decimal) -> Decimal {
        let mean_f = mean.to_f64().unwrap_or(0.0);
        let std_f = std.to_f64().unwrap_or(0.0).abs();
        if std_f == 0.0 {
            return mean;
        }
        let dist = Normal::new(mean_f, std_f).expect("std must be finite and non-negative");
        Decimal::from_f64_retain(dist.sample(&mut self.inner)).unwrap_or(mean)
    }

    fn sample_uniform(&mut self, low: Decimal, high: Decimal) -> Decimal {
        let low_f = low.to_f64().unwrap_or(0.0);
        let high_f = high.to_f64().unwrap_or(0.0);
        if (high_f - low_f).abs() < f64::EPSILON {
            return low;
        }
        let dist = Uniform::new(low_f, high_f).expect("low must be < high");
        Decimal::from_f64_retain(dist.sample(&mut self.inner)).unwrap_or(low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_rng_is_deterministic() {
        let mut rng = MeanRng;
        assert_eq!(rng.sample_normal(Decimal::from(5), Decimal::from(2)), Decimal::from(5));
        assert_eq!(
            rng.sample_uniform(Decimal::from(0), Decimal::from(10)),
            Decimal::from(5)
        );
    }
}
