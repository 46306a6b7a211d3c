//! Access to submitted forecasts and model metadata.

use crate::core::ForecastRecord;
use crate::error::{EnsembleError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Hub metadata tag classifying a model's intended use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Designation {
    Primary,
    Secondary,
    Proposed,
    Other,
}

impl FromStr for Designation {
    type Err = EnsembleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" => Ok(Designation::Primary),
            "secondary" => Ok(Designation::Secondary),
            "proposed" => Ok(Designation::Proposed),
            "other" => Ok(Designation::Other),
            other => Err(EnsembleError::Argument(format!(
                "unknown model designation `{other}`"
            ))),
        }
    }
}

impl fmt::Display for Designation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Designation::Primary => "primary",
            Designation::Secondary => "secondary",
            Designation::Proposed => "proposed",
            Designation::Other => "other",
        };
        f.write_str(name)
    }
}

/// Loader for the hub's submitted forecasts.
///
/// Implementations read however the hub stores its submissions; the
/// ensemble code only sees the unified table.
pub trait ForecastSource {
    /// All rows with `start <= forecast_date <= end`.
    fn load_forecasts(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<ForecastRecord>>;

    /// The model's designation, if its metadata declares one.
    fn designation(&self, model: &str) -> Option<Designation>;
}

/// A hub whose submissions are already in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHub {
    records: Vec<ForecastRecord>,
    designations: HashMap<String, Designation>,
}

impl InMemoryHub {
    pub fn new(records: Vec<ForecastRecord>) -> Self {
        Self {
            records,
            designations: HashMap::new(),
        }
    }

    pub fn with_designation(mut self, model: impl Into<String>, designation: Designation) -> Self {
        self.designations.insert(model.into(), designation);
        self
    }

    pub fn records(&self) -> &[ForecastRecord] {
        &self.records
    }
}

impl ForecastSource for InMemoryHub {
    fn load_forecasts(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<ForecastRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.forecast_date >= start && r.forecast_date <= end)
            .cloned()
            .collect())
    }

    fn designation(&self, model: &str) -> Option<Designation> {
        self.designations.get(model).copied()
    }
}
