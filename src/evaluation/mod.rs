//! Evaluation snapshots: historical skill scores per model.
//!
//! A snapshot is a delimited table with one row per (model, location,
//! target_variable, horizon[, weeks_included]). The skill column to use is
//! chosen at query time, so the raw table is kept as strings until
//! [`EvaluationTable::select`] parses it.

mod store;

pub use store::{CsvEvaluationStore, InMemoryEvaluations};

use crate::core::EvaluationRecord;
use crate::error::{EnsembleError, Result};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

/// Default skill column.
pub const DEFAULT_SKILL_COLUMN: &str = "relative_skill";

/// Column holding the continuous-evaluation-history count.
pub const HISTORY_COLUMN: &str = "n";

/// Column holding the history window label.
pub const WEEKS_INCLUDED_COLUMN: &str = "weeks_included";

const REQUIRED_COLUMNS: [&str; 4] = ["model", "location", "target_variable", "horizon"];

/// Provider of evaluation snapshots, one per date.
pub trait EvaluationSource {
    /// Load the snapshot for `date`.
    ///
    /// Returns [`EnsembleError::NotFound`] if no snapshot exists for that date.
    fn load(&self, date: NaiveDate) -> Result<EvaluationTable>;
}

/// Which snapshot and which columns to read skill scores from.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationQuery {
    /// Snapshot date; `None` means the latest candidate forecast date.
    pub evaluation_date: Option<NaiveDate>,
    /// Name of the skill column.
    pub skill_column: String,
    /// History window to keep when the snapshot has a `weeks_included` column.
    pub weeks_included: Option<String>,
}

impl Default for EvaluationQuery {
    fn default() -> Self {
        Self {
            evaluation_date: None,
            skill_column: DEFAULT_SKILL_COLUMN.to_string(),
            weeks_included: Some("10".to_string()),
        }
    }
}

impl EvaluationQuery {
    pub fn with_evaluation_date(mut self, date: NaiveDate) -> Self {
        self.evaluation_date = Some(date);
        self
    }

    pub fn with_skill_column(mut self, column: impl Into<String>) -> Self {
        self.skill_column = column.into();
        self
    }

    pub fn with_weeks_included(mut self, weeks: Option<String>) -> Self {
        self.weeks_included = weeks;
        self
    }

    /// Resolve the snapshot date, falling back to `latest_forecast_date`.
    pub fn resolve_date(&self, latest_forecast_date: Option<NaiveDate>) -> Option<NaiveDate> {
        self.evaluation_date.or(latest_forecast_date)
    }

    /// Load, select and window a snapshot in one step.
    pub fn fetch(&self, source: &dyn EvaluationSource, date: NaiveDate) -> Result<EvaluationSnapshot> {
        let snapshot = source.load(date)?.select(&self.skill_column)?;
        Ok(match &self.weeks_included {
            Some(weeks) => snapshot.for_window(weeks),
            None => snapshot,
        })
    }
}

/// Raw evaluation table as read from a snapshot.
#[derive(Debug, Clone)]
pub struct EvaluationTable {
    source_name: String,
    headers: csv::StringRecord,
    rows: Vec<csv::StringRecord>,
}

impl EvaluationTable {
    /// Read a comma-delimited table with a header row.
    pub fn from_reader<R: Read>(reader: R, source_name: impl Into<String>) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers()?.clone();
        let rows = reader
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            source_name: source_name.into(),
            headers,
            rows,
        })
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| EnsembleError::schema(name, self.source_name.clone()))
    }

    /// Parse the table into records carrying `skill_column` as their skill.
    ///
    /// Fails with [`EnsembleError::Schema`] if the skill column or any
    /// identifying column is absent.
    pub fn select(&self, skill_column: &str) -> Result<EvaluationSnapshot> {
        let skill_idx = self.require_column(skill_column)?;
        let [model_idx, location_idx, target_idx, horizon_idx] = {
            let mut idx = [0usize; 4];
            for (slot, name) in idx.iter_mut().zip(REQUIRED_COLUMNS) {
                *slot = self.require_column(name)?;
            }
            idx
        };
        let weeks_idx = self.column_index(WEEKS_INCLUDED_COLUMN);
        let history_idx = self.column_index(HISTORY_COLUMN);

        let mut records = Vec::with_capacity(self.rows.len());
        for (row_idx, row) in self.rows.iter().enumerate() {
            // +2: 1-based lines and the header row
            let line = row_idx + 2;
            let horizon = get_string_field(row, horizon_idx)
                .ok_or_else(|| self.parse_error(line, "horizon", "missing value"))
                .and_then(|s| {
                    s.parse::<u32>()
                        .map_err(|e| self.parse_error(line, "horizon", &e.to_string()))
                })?;
            records.push(EvaluationRecord {
                model: get_string_field(row, model_idx).unwrap_or_default(),
                location: get_string_field(row, location_idx).unwrap_or_default(),
                target_variable: get_string_field(row, target_idx).unwrap_or_default(),
                horizon,
                weeks_included: weeks_idx.and_then(|i| get_string_field(row, i)),
                skill: self.get_f64_field(row, skill_idx, line, skill_column)?,
                history: match history_idx {
                    Some(i) => self
                        .get_f64_field(row, i, line, HISTORY_COLUMN)?
                        .map(|n| n.max(0.0) as u32),
                    None => None,
                },
            });
        }

        Ok(EvaluationSnapshot {
            source_name: self.source_name.clone(),
            has_weeks_included: weeks_idx.is_some(),
            has_history: history_idx.is_some(),
            records,
        })
    }

    fn get_f64_field(
        &self,
        record: &csv::StringRecord,
        index: usize,
        line: usize,
        column: &str,
    ) -> Result<Option<f64>> {
        match get_string_field(record, index) {
            None => Ok(None),
            Some(s) => s
                .parse::<f64>()
                .map(|v| if v.is_nan() { None } else { Some(v) })
                .map_err(|e| self.parse_error(line, column, &e.to_string())),
        }
    }

    fn parse_error(&self, line: usize, column: &str, message: &str) -> EnsembleError {
        EnsembleError::Parse {
            location: format!("{} line {line}, column `{column}`", self.source_name),
            message: message.to_string(),
        }
    }
}

/// Missing cells are empty or `NA`.
fn get_string_field(record: &csv::StringRecord, index: usize) -> Option<String> {
    record
        .get(index)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && *s != "NA")
        .map(|s| s.to_string())
}

/// Key of a candidate forecast: (model, location, target_variable).
pub type CandidateKey = (String, String, String);

/// Evaluation records for one skill column.
#[derive(Debug, Clone)]
pub struct EvaluationSnapshot {
    pub source_name: String,
    /// Whether the snapshot carried a `weeks_included` column.
    pub has_weeks_included: bool,
    /// Whether the snapshot carried a history-count column.
    pub has_history: bool,
    pub records: Vec<EvaluationRecord>,
}

impl EvaluationSnapshot {
    /// Keep only rows for the given history window (exact match).
    ///
    /// No-op when the snapshot has no `weeks_included` column.
    pub fn for_window(mut self, weeks: &str) -> Self {
        if self.has_weeks_included {
            self.records
                .retain(|r| r.weeks_included.as_deref() == Some(weeks));
        }
        self
    }

    /// Mean skill across horizons per (model, location, target_variable).
    ///
    /// Missing skills are skipped; candidates with no skill at all are absent
    /// from the result.
    pub fn mean_skill_by_candidate(&self) -> BTreeMap<CandidateKey, f64> {
        let mut sums: BTreeMap<CandidateKey, (f64, usize)> = BTreeMap::new();
        for record in &self.records {
            if let Some(skill) = record.skill {
                let entry = sums
                    .entry((
                        record.model.clone(),
                        record.location.clone(),
                        record.target_variable.clone(),
                    ))
                    .or_insert((0.0, 0));
                entry.0 += skill;
                entry.1 += 1;
            }
        }
        sums.into_iter()
            .map(|(key, (sum, n))| (key, sum / n as f64))
            .collect()
    }

    /// Distinct models with at least one row.
    pub fn models(&self) -> BTreeSet<&str> {
        self.records.iter().map(|r| r.model.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SNAPSHOT: &str = "\
model,location,target_variable,horizon,weeks_included,n,relative_skill,rel_wis
A,DE,inc case,1,10,8,0.5,0.6
A,DE,inc case,2,10,8,0.7,NA
A,DE,inc case,1,All,20,0.9,0.9
B,DE,inc case,1,10,3,2.0,
";

    fn table() -> EvaluationTable {
        EvaluationTable::from_reader(SNAPSHOT.as_bytes(), "snapshot.csv").unwrap()
    }

    #[test]
    fn select_parses_skill_history_and_window() {
        let snapshot = table().select("relative_skill").unwrap();
        assert_eq!(snapshot.records.len(), 4);
        assert!(snapshot.has_weeks_included);
        assert!(snapshot.has_history);

        let first = &snapshot.records[0];
        assert_eq!(first.model, "A");
        assert_eq!(first.horizon, 1);
        assert_eq!(first.weeks_included.as_deref(), Some("10"));
        assert_eq!(first.history, Some(8));
        assert_eq!(first.skill, Some(0.5));
    }

    #[test]
    fn missing_cells_become_none() {
        let snapshot = table().select("rel_wis").unwrap();
        assert_eq!(snapshot.records[1].skill, None);
        assert_eq!(snapshot.records[3].skill, None);
    }

    #[test]
    fn absent_skill_column_is_a_schema_error() {
        let err = table().select("scaled_rel_skill").unwrap_err();
        assert_eq!(
            err,
            EnsembleError::Schema {
                column: "scaled_rel_skill".to_string(),
                source_name: "snapshot.csv".to_string(),
            }
        );
    }

    #[test]
    fn window_filter_is_exact_match() {
        let snapshot = table().select("relative_skill").unwrap().for_window("10");
        assert_eq!(snapshot.records.len(), 3);
        assert!(snapshot
            .records
            .iter()
            .all(|r| r.weeks_included.as_deref() == Some("10")));
    }

    #[test]
    fn window_filter_ignored_without_column() {
        let csv = "model,location,target_variable,horizon,relative_skill\nA,DE,inc case,1,0.5\n";
        let snapshot = EvaluationTable::from_reader(csv.as_bytes(), "t")
            .unwrap()
            .select("relative_skill")
            .unwrap()
            .for_window("10");
        assert_eq!(snapshot.records.len(), 1);
        assert!(!snapshot.has_history);
    }

    #[test]
    fn mean_skill_averages_across_horizons() {
        let snapshot = table().select("relative_skill").unwrap().for_window("10");
        let skills = snapshot.mean_skill_by_candidate();
        let key = ("A".to_string(), "DE".to_string(), "inc case".to_string());
        assert_relative_eq!(skills[&key], 0.6, epsilon = 1e-12);
        assert_eq!(skills.len(), 2);
    }

    #[test]
    fn bad_horizon_reports_line() {
        let csv = "model,location,target_variable,horizon,relative_skill\nA,DE,inc case,x,0.5\n";
        let err = EvaluationTable::from_reader(csv.as_bytes(), "t")
            .unwrap()
            .select("relative_skill")
            .unwrap_err();
        match err {
            EnsembleError::Parse { location, .. } => assert!(location.contains("line 2")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
