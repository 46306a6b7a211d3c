//! Group-and-reduce step shared by the builders.

use crate::core::{EnsembleRow, ForecastRecord, QuantileLevel};
use crate::error::Result;
use crate::utils::group_by;
use std::collections::BTreeSet;

/// (target_variable, location, horizon, quantile)
type GroupKey = (String, String, u32, QuantileLevel);

/// Reduce weighted members to one row per (quantile, target_variable,
/// location, horizon). `reduce` receives the group's values and weights in
/// input order.
pub(crate) fn combine_members<'a, I, F>(members: I, reduce: F) -> Result<Vec<EnsembleRow>>
where
    I: IntoIterator<Item = (&'a ForecastRecord, f64)>,
    F: Fn(&[f64], &[f64]) -> Result<f64>,
{
    let groups = group_by(
        members
            .into_iter()
            .filter(|(record, _)| record.is_quantile()),
        |(record, _)| -> GroupKey {
            (
                record.target_variable.clone(),
                record.location.clone(),
                record.horizon,
                record.quantile_level().unwrap_or_else(QuantileLevel::median),
            )
        },
    );

    let mut rows = Vec::with_capacity(groups.len());
    for ((target_variable, location, horizon, level), members) in groups {
        let values: Vec<f64> = members.iter().map(|(r, _)| r.value).collect();
        let weights: Vec<f64> = members.iter().map(|(_, w)| *w).collect();
        let n_models = members
            .iter()
            .map(|(r, _)| r.model.as_str())
            .collect::<BTreeSet<_>>()
            .len();
        let temporal_resolution = members[0].0.temporal_resolution.clone();

        rows.push(EnsembleRow {
            location,
            target_variable,
            horizon,
            temporal_resolution,
            quantile: level.value(),
            value: reduce(&values, &weights)?,
            n_models,
            target_end_date: None,
            forecast_type: None,
        });
    }
    Ok(rows)
}
