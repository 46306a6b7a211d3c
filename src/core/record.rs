//! Record types flowing through the ensemble pipeline.

use super::dates::target_end_date;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a forecast row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastType {
    /// A value at a probability level.
    Quantile,
    /// A single point estimate.
    Point,
}

impl ForecastType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastType::Quantile => "quantile",
            ForecastType::Point => "point",
        }
    }
}

impl fmt::Display for ForecastType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probability level stored in millionths so it can be used as a grouping key.
///
/// Two levels that differ by less than 5e-7 compare equal, which absorbs the
/// float noise of levels read from different files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuantileLevel(i64);

impl QuantileLevel {
    const SCALE: f64 = 1_000_000.0;

    pub fn new(level: f64) -> Self {
        Self((level * Self::SCALE).round() as i64)
    }

    pub fn value(&self) -> f64 {
        self.0 as f64 / Self::SCALE
    }

    /// The median level, 0.5.
    pub fn median() -> Self {
        Self::new(0.5)
    }
}

impl From<f64> for QuantileLevel {
    fn from(level: f64) -> Self {
        Self::new(level)
    }
}

/// One row of a model's submitted forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub model: String,
    pub location: String,
    pub target_variable: String,
    pub horizon: u32,
    pub temporal_resolution: String,
    pub forecast_date: NaiveDate,
    pub target_end_date: NaiveDate,
    #[serde(rename = "type")]
    pub forecast_type: ForecastType,
    pub quantile: Option<f64>,
    pub value: f64,
}

impl ForecastRecord {
    /// Create a weekly quantile row with the end date implied by the horizon.
    ///
    /// The value starts at NaN; set it with [`with_quantile`](Self::with_quantile)
    /// or [`as_point`](Self::as_point).
    pub fn new(
        model: impl Into<String>,
        location: impl Into<String>,
        target_variable: impl Into<String>,
        forecast_date: NaiveDate,
        horizon: u32,
    ) -> Self {
        Self {
            model: model.into(),
            location: location.into(),
            target_variable: target_variable.into(),
            horizon,
            temporal_resolution: "wk".to_string(),
            forecast_date,
            target_end_date: target_end_date(forecast_date, horizon),
            forecast_type: ForecastType::Quantile,
            quantile: None,
            value: f64::NAN,
        }
    }

    pub fn with_quantile(mut self, quantile: f64, value: f64) -> Self {
        self.forecast_type = ForecastType::Quantile;
        self.quantile = Some(quantile);
        self.value = value;
        self
    }

    pub fn as_point(mut self, value: f64) -> Self {
        self.forecast_type = ForecastType::Point;
        self.quantile = None;
        self.value = value;
        self
    }

    pub fn with_temporal_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.temporal_resolution = resolution.into();
        self
    }

    pub fn is_quantile(&self) -> bool {
        self.forecast_type == ForecastType::Quantile && self.quantile.is_some()
    }

    pub fn quantile_level(&self) -> Option<QuantileLevel> {
        self.quantile.map(QuantileLevel::new)
    }
}

/// One row of an evaluation snapshot, reduced to the selected skill column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub model: String,
    pub location: String,
    pub target_variable: String,
    pub horizon: u32,
    /// History window label, e.g. "10" or "All".
    pub weeks_included: Option<String>,
    /// Relative-skill family score, lower is better.
    pub skill: Option<f64>,
    /// Number of consecutive evaluated forecasts.
    pub history: Option<u32>,
}

/// Ensemble weight of one model within a (target_variable, location[, horizon]) group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRecord {
    pub model: String,
    pub target_variable: String,
    pub location: String,
    pub horizon: Option<u32>,
    pub weight: f64,
}

/// Intermediate output of an ensemble builder, one row per group and quantile.
///
/// `target_end_date` and `forecast_type` are left empty by the builders and
/// filled in by the formatter.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleRow {
    pub location: String,
    pub target_variable: String,
    pub horizon: u32,
    pub temporal_resolution: String,
    pub quantile: f64,
    pub value: f64,
    /// Distinct models that contributed to this value.
    pub n_models: usize,
    pub target_end_date: Option<NaiveDate>,
    pub forecast_type: Option<ForecastType>,
}

/// A row of a formatted ensemble submission.
///
/// Field order is the column order of the submission file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleRecord {
    pub forecast_date: NaiveDate,
    pub target: String,
    pub target_end_date: NaiveDate,
    pub location: String,
    #[serde(rename = "type")]
    pub forecast_type: ForecastType,
    pub quantile: Option<f64>,
    pub value: f64,
}

impl EnsembleRecord {
    /// Column names of the submission schema, in order.
    pub const COLUMNS: [&'static str; 7] = [
        "forecast_date",
        "target",
        "target_end_date",
        "location",
        "type",
        "quantile",
        "value",
    ];
}

/// Audit trail entry for one candidate (model, location, target_variable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriteriaRecord {
    pub model: String,
    pub location: String,
    pub target_variable: String,
    pub forecast_date: NaiveDate,
    pub all_quantiles: bool,
    pub all_horizons: bool,
    pub not_excluded_manually: bool,
    pub not_designated_other: bool,
    pub within_skill_cutoff: bool,
    pub included_in_ensemble: bool,
}

impl CriteriaRecord {
    /// Names of the criteria this candidate failed.
    pub fn failed_criteria(&self) -> Vec<&'static str> {
        [
            ("all_quantiles", self.all_quantiles),
            ("all_horizons", self.all_horizons),
            ("not_excluded_manually", self.not_excluded_manually),
            ("not_designated_other", self.not_designated_other),
            ("within_skill_cutoff", self.within_skill_cutoff),
        ]
        .into_iter()
        .filter(|(_, passed)| !passed)
        .map(|(name, _)| name)
        .collect()
    }
}
