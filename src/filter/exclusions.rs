//! Manually excluded models.

use crate::error::{EnsembleError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;

/// A model excluded from the ensemble on one forecast date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRecord {
    pub forecast_date: NaiveDate,
    pub model: String,
}

/// Models to force-exclude, either for every date or per forecast date.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Exclusions {
    #[default]
    None,
    /// Excluded on every forecast date.
    Models(Vec<String>),
    /// Excluded only on the listed dates.
    Dated(Vec<ExclusionRecord>),
}

impl Exclusions {
    pub fn models<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Exclusions::Models(models.into_iter().map(Into::into).collect())
    }

    /// Names excluded for `forecast_date`.
    pub fn resolve(&self, forecast_date: NaiveDate) -> BTreeSet<String> {
        match self {
            Exclusions::None => BTreeSet::new(),
            Exclusions::Models(models) => models.iter().cloned().collect(),
            Exclusions::Dated(records) => records
                .iter()
                .filter(|r| r.forecast_date == forecast_date)
                .map(|r| r.model.clone())
                .collect(),
        }
    }
}

/// Read a dated exclusion table with columns `forecast_date,model`.
pub fn load_exclusions(path: impl AsRef<Path>) -> Result<Vec<ExclusionRecord>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(EnsembleError::NotFound(format!(
            "no exclusion table at {}",
            path.display()
        )));
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(File::open(path)?);
    let records = reader
        .deserialize()
        .collect::<std::result::Result<Vec<ExclusionRecord>, _>>()?;
    Ok(records)
}
