//! Reshape builder output into the hub submission schema.

use crate::core::{target_end_date, EnsembleRecord, EnsembleRow, ForecastType, QuantileLevel};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::warn;

/// Target label, e.g. `"2 wk ahead inc case"`.
pub fn target_label(horizon: u32, temporal_resolution: &str, target_variable: &str) -> String {
    format!("{horizon} {temporal_resolution} ahead {target_variable}")
}

/// Fill `target_end_date` and `type` where the builder left them empty.
///
/// Values already present are kept. End dates assume weekly targets ending
/// on Saturday.
pub fn fill_defaults(rows: &mut [EnsembleRow], forecast_date: NaiveDate) {
    let mut warned = false;
    for row in rows.iter_mut() {
        if row.target_end_date.is_none() {
            if row.temporal_resolution != "wk" && !warned {
                warn!(
                    temporal_resolution = %row.temporal_resolution,
                    "deriving end dates from weekly calendar for non-weekly target"
                );
                warned = true;
            }
            row.target_end_date = Some(target_end_date(forecast_date, row.horizon));
        }
        if row.forecast_type.is_none() {
            row.forecast_type = Some(ForecastType::Quantile);
        }
    }
}

/// Format an ensemble for submission.
///
/// Values are rounded to the nearest integer (ties to even) and a `point`
/// row copying the 0.5 quantile is appended for every (location, target,
/// target_end_date). Output is sorted by location, target, end date, type
/// and quantile.
pub fn format_ensemble(mut rows: Vec<EnsembleRow>, forecast_date: NaiveDate) -> Vec<EnsembleRecord> {
    fill_defaults(&mut rows, forecast_date);

    let mut records: Vec<EnsembleRecord> = rows
        .into_iter()
        .map(|row| {
            let forecast_type = row.forecast_type.unwrap_or(ForecastType::Quantile);
            EnsembleRecord {
                forecast_date,
                target: target_label(row.horizon, &row.temporal_resolution, &row.target_variable),
                target_end_date: row
                    .target_end_date
                    .unwrap_or_else(|| target_end_date(forecast_date, row.horizon)),
                location: row.location,
                forecast_type,
                quantile: match forecast_type {
                    ForecastType::Quantile => Some(row.quantile),
                    ForecastType::Point => None,
                },
                value: row.value.round_ties_even(),
            }
        })
        .collect();

    let mut seen = BTreeSet::new();
    let points: Vec<EnsembleRecord> = records
        .iter()
        .filter(|r| {
            r.forecast_type == ForecastType::Quantile
                && r.quantile.map(QuantileLevel::new) == Some(QuantileLevel::median())
        })
        .filter(|r| seen.insert((r.location.clone(), r.target.clone(), r.target_end_date)))
        .map(|r| EnsembleRecord {
            forecast_type: ForecastType::Point,
            quantile: None,
            ..r.clone()
        })
        .collect();
    records.extend(points);

    records.sort_by(|a, b| {
        (&a.location, &a.target, a.target_end_date, a.forecast_type)
            .cmp(&(&b.location, &b.target, b.target_end_date, b.forecast_type))
            .then_with(|| {
                a.quantile
                    .unwrap_or(f64::INFINITY)
                    .total_cmp(&b.quantile.unwrap_or(f64::INFINITY))
            })
    });
    records
}
