//! Core record types and calendar helpers.

pub mod dates;
mod record;

pub use dates::{forecast_window, last_saturday, target_end_date};
pub use record::{
    CriteriaRecord, EnsembleRecord, EnsembleRow, EvaluationRecord, ForecastRecord, ForecastType,
    QuantileLevel, WeightRecord,
};

/// The 23 quantile levels collected by the forecast hub.
pub const HUB_QUANTILES: [f64; 23] = [
    0.01, 0.025, 0.05, 0.1, 0.15, 0.2, 0.25, 0.3, 0.35, 0.4, 0.45, 0.5, 0.55, 0.6, 0.65, 0.7, 0.75,
    0.8, 0.85, 0.9, 0.95, 0.975, 0.99,
];
