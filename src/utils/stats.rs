//! Plain and weighted averages used to combine model values.
//!
//! Missing-value policy: NaN values are not skipped. They propagate into a
//! mean and are ordered last (via `total_cmp`) when taking a median.

use crate::error::{EnsembleError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Summary statistic used to combine values across models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    #[default]
    Mean,
    Median,
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statistic::Mean => f.write_str("mean"),
            Statistic::Median => f.write_str("median"),
        }
    }
}

/// Calculate the mean of a slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Calculate the median of a slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Unweighted summary of `values`.
pub fn summarize(values: &[f64], statistic: Statistic) -> f64 {
    match statistic {
        Statistic::Mean => mean(values),
        Statistic::Median => median(values),
    }
}

fn check_weights(values: &[f64], weights: &[f64]) -> Result<f64> {
    if values.len() != weights.len() {
        return Err(EnsembleError::Argument(format!(
            "{} values but {} weights",
            values.len(),
            weights.len()
        )));
    }
    if values.is_empty() {
        return Err(EnsembleError::Argument(
            "cannot average an empty set of values".to_string(),
        ));
    }
    if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(EnsembleError::Argument(format!(
            "weights must be finite and non-negative, got {bad}"
        )));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(EnsembleError::Argument("weights sum to zero".to_string()));
    }
    Ok(total)
}

/// Weighted arithmetic mean: `sum(value * weight) / sum(weight)`.
///
/// # Example
/// ```
/// use hub_ensemble::utils::weighted_mean;
///
/// let m = weighted_mean(&[1.0, 2.0], &[0.8, 0.2]).unwrap();
/// assert!((m - 1.2).abs() < 1e-12);
/// ```
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> Result<f64> {
    let total = check_weights(values, weights)?;
    let weighted_sum: f64 = values.iter().zip(weights).map(|(v, w)| v * w).sum();
    Ok(weighted_sum / total)
}

/// Weighted median.
///
/// Values are sorted ascending and the first value whose normalized
/// cumulative weight reaches 0.5 is returned. With uniform weights over an
/// even number of values this is the lower of the two middle values.
///
/// Weights are validated like [`weighted_mean`]'s. All-zero weights are
/// rejected as well, since they have no cumulative distribution to cut at
/// one half.
pub fn weighted_median(values: &[f64], weights: &[f64]) -> Result<f64> {
    let total = check_weights(values, weights)?;

    let mut pairs: Vec<(f64, f64)> = values
        .iter()
        .copied()
        .zip(weights.iter().map(|w| w / total))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut cumulative = 0.0;
    for (value, weight) in &pairs {
        cumulative += weight;
        // Tolerance for weights like [0.1; 5] whose float sum falls just short.
        if cumulative >= 0.5 - 1e-12 {
            return Ok(*value);
        }
    }
    // Unreachable for normalized weights; fall back to the largest value.
    Ok(pairs[pairs.len() - 1].0)
}

/// Weighted summary of `values` using the requested statistic.
pub fn weighted_average(values: &[f64], weights: &[f64], statistic: Statistic) -> Result<f64> {
    match statistic {
        Statistic::Mean => weighted_mean(values, weights),
        Statistic::Median => weighted_median(values, weights),
    }
}
