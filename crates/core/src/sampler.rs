//! Normal distribution sampling
//!
//! Box–Muller transform over a uniform source. Only the cosine branch is
//! used; each call consumes two uniforms and yields one Gaussian value.

use rand::Rng;
use std::f64::consts::PI;

use crate::config::Distribution;

/// Draw one value from N(mean, stddev²).
///
/// `u1` is redrawn while it is exactly `0.0` so that `ln(u1)` stays finite.
pub fn sample_normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, stddev: f64) -> f64 {
    let mut u1: f64 = rng.gen();
    while u1 == 0.0 {
        u1 = rng.gen();
    }
    let u2: f64 = rng.gen();

    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    z * stddev + mean
}

impl Distribution {
    /// Draw one value from this distribution
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        sample_normal(rng, self.mean, self.stddev)
    }
}
