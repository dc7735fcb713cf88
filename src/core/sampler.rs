use std::f64::consts::PI;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Source of Gaussian deviates. The engine only ever asks for `N(mean, stddev)`
/// so tests can substitute scripted draws.
pub trait GaussianSource {
    fn sample(&mut self, mean: f64, stddev: f64) -> f64;

    fn standard_normal(&mut self) -> f64 {
        self.sample(0.0, 1.0)
    }
}

/// Box-Muller over any uniform source. Only the cosine branch is used, so one
/// sample consumes exactly two uniforms and streams stay easy to reason about.
#[derive(Debug, Clone)]
pub struct BoxMuller<R> {
    rng: R,
}

impl BoxMuller<ChaCha8Rng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> BoxMuller<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> GaussianSource for BoxMuller<R> {
    fn sample(&mut self, mean: f64, stddev: f64) -> f64 {
        let u1 = self.rng.r#gen::<f64>().max(1e-12);
        let u2 = self.rng.r#gen::<f64>();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
        mean + z * stddev
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::GaussianSource;

    /// Replays a fixed list of standard-normal deviates, cycling when exhausted.
    pub struct ScriptedNormals {
        values: Vec<f64>,
        index: usize,
    }

    impl ScriptedNormals {
        pub fn new(values: Vec<f64>) -> Self {
            assert!(!values.is_empty());
            Self { values, index: 0 }
        }
    }

    impl GaussianSource for ScriptedNormals {
        fn sample(&mut self, mean: f64, stddev: f64) -> f64 {
            let z = self.values[self.index % self.values.len()];
            self.index += 1;
            mean + z * stddev
        }
    }
}
