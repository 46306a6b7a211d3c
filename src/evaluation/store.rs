//! Evaluation snapshot stores.

use super::{EvaluationSource, EvaluationTable};
use crate::error::{EnsembleError, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads `{dir}/{prefix}{YYYY-MM-DD}.csv`, one file per evaluation date.
#[derive(Debug, Clone)]
pub struct CsvEvaluationStore {
    dir: PathBuf,
    prefix: String,
}

impl CsvEvaluationStore {
    /// Store rooted at `dir` with the default `evaluation-` file prefix.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: "evaluation-".to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the snapshot for `date`.
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}{}.csv", self.prefix, date.format("%Y-%m-%d")))
    }
}

impl EvaluationSource for CsvEvaluationStore {
    fn load(&self, date: NaiveDate) -> Result<EvaluationTable> {
        let path = self.path_for(date);
        if !path.is_file() {
            return Err(EnsembleError::NotFound(format!(
                "no evaluation snapshot for {date} at {}",
                path.display()
            )));
        }
        let file = File::open(&path)?;
        let table = EvaluationTable::from_reader(file, path.display().to_string())?;
        debug!(path = %path.display(), rows = table.len(), "loaded evaluation snapshot");
        Ok(table)
    }
}

/// Snapshots held in memory, keyed by date.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEvaluations {
    tables: BTreeMap<NaiveDate, EvaluationTable>,
}

impl InMemoryEvaluations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, date: NaiveDate, table: EvaluationTable) -> Self {
        self.tables.insert(date, table);
        self
    }

    /// Parse `csv_text` and register it as the snapshot for `date`.
    pub fn with_csv(self, date: NaiveDate, csv_text: &str) -> Result<Self> {
        let table = EvaluationTable::from_reader(csv_text.as_bytes(), format!("evaluation {date}"))?;
        Ok(self.with_table(date, table))
    }
}

impl EvaluationSource for InMemoryEvaluations {
    fn load(&self, date: NaiveDate) -> Result<EvaluationTable> {
        self.tables
            .get(&date)
            .cloned()
            .ok_or_else(|| EnsembleError::NotFound(format!("no evaluation snapshot for {date}")))
    }
}
