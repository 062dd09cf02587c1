// Rate sweeps
//
// A sweep is a list of arrival rates executed one after another, each as an
// independent run with its own metrics. Accepted forms:
//   N                 a single rate
//   start:end         start, start+1, ..., end
//   start:end:step    start, start+step, ..., up to and including end

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Tolerance for floating point accumulation when reaching the end rate
const EPSILON: f64 = 1e-9;
/// Upper bound on the number of runs in one sweep
pub const MAX_SWEEP_STEPS: usize = 10_000;

/// Ordered list of rates to run
#[derive(Debug, Clone, PartialEq)]
pub struct RateSweep {
    expr: String,
    rates: Vec<f64>,
}

impl RateSweep {
    /// A sweep of one rate
    pub fn single(rate: f64) -> Result<Self, ConfigError> {
        Self::parse(&rate.to_string())
    }

    pub fn parse(expr: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidSweep(expr.to_string());
        let parts: Vec<&str> = expr.trim().split(':').map(str::trim).collect();

        let numbers = parts
            .iter()
            .map(|p| p.parse::<f64>().map_err(|_| invalid()))
            .collect::<Result<Vec<f64>, _>>()?;
        if numbers.iter().any(|n| !n.is_finite() || *n <= 0.0) {
            return Err(invalid());
        }

        let rates = match numbers.as_slice() {
            [rate] => vec![*rate],
            [start, end] => Self::expand(*start, *end, 1.0).ok_or_else(invalid)?,
            [start, end, step] => Self::expand(*start, *end, *step).ok_or_else(invalid)?,
            _ => return Err(invalid()),
        };

        Ok(Self {
            expr: expr.trim().to_string(),
            rates,
        })
    }

    fn expand(start: f64, end: f64, step: f64) -> Option<Vec<f64>> {
        if end < start {
            return None;
        }
        let steps = ((end - start) / step + EPSILON).floor() as usize;
        if steps >= MAX_SWEEP_STEPS {
            return None;
        }
        Some((0..=steps).map(|i| start + step * i as f64).collect())
    }

    pub fn rates(&self) -> &[f64] {
        &self.rates
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn is_single(&self) -> bool {
        self.rates.len() == 1
    }
}

impl FromStr for RateSweep {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RateSweep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}
