//! Equal-weight ensemble.

use super::combine::combine_members;
use super::traits::{BuiltEnsemble, EnsembleBuilder};
use crate::core::{ForecastRecord, WeightRecord};
use crate::error::Result;
use crate::utils::{group_by, summarize, Statistic};
use std::collections::BTreeSet;
use tracing::debug;

/// Unweighted mean or median across all contributing models.
///
/// The median is the middle value, or the average of the two middle values
/// for an even number of models.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimpleAverage {
    statistic: Statistic,
}

impl SimpleAverage {
    pub fn new(statistic: Statistic) -> Self {
        Self { statistic }
    }

    pub fn mean() -> Self {
        Self::new(Statistic::Mean)
    }

    pub fn median() -> Self {
        Self::new(Statistic::Median)
    }

    pub fn statistic(&self) -> Statistic {
        self.statistic
    }

    /// Implicit weights: 1 / (distinct models) per (target_variable, location, horizon).
    fn implicit_weights(&self, forecasts: &[ForecastRecord]) -> Vec<WeightRecord> {
        let groups = group_by(forecasts.iter().filter(|r| r.is_quantile()), |r| {
            (r.target_variable.clone(), r.location.clone(), r.horizon)
        });

        let mut weights = Vec::new();
        for ((target_variable, location, horizon), rows) in groups {
            let models: BTreeSet<&str> = rows.iter().map(|r| r.model.as_str()).collect();
            let weight = 1.0 / models.len() as f64;
            weights.extend(models.into_iter().map(|model| WeightRecord {
                model: model.to_string(),
                target_variable: target_variable.clone(),
                location: location.clone(),
                horizon: Some(horizon),
                weight,
            }));
        }
        weights
    }
}

impl EnsembleBuilder for SimpleAverage {
    fn build(&self, forecasts: &[ForecastRecord]) -> Result<BuiltEnsemble> {
        let statistic = self.statistic;
        let rows = combine_members(forecasts.iter().map(|r| (r, 1.0)), |values, _| {
            Ok(summarize(values, statistic))
        })?;
        debug!(rows = rows.len(), %statistic, "built equal-weight ensemble");
        Ok(BuiltEnsemble {
            rows,
            weights: self.implicit_weights(forecasts),
        })
    }

    fn name(&self) -> &str {
        match self.statistic {
            Statistic::Mean => "mean",
            Statistic::Median => "median",
        }
    }
}
