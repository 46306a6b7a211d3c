//! # hub-ensemble
//!
//! Ensemble forecasts for collaborative forecast hubs.
//!
//! Candidate quantile forecasts submitted by many models are filtered
//! against inclusion criteria, combined by an equal-weight mean or median or
//! by inverse relative skill, and formatted as a hub submission.

#![allow(clippy::type_complexity)]

pub mod core;
pub mod error;
pub mod evaluation;
pub mod filter;
pub mod format;
pub mod models;
pub mod runner;
pub mod source;
pub mod utils;

pub use error::{EnsembleError, Result};

pub mod prelude {
    pub use crate::core::{EnsembleRecord, ForecastRecord, WeightRecord};
    pub use crate::error::{EnsembleError, Result};
    pub use crate::evaluation::{CsvEvaluationStore, EvaluationSource};
    pub use crate::filter::{Exclusions, FilterConfig};
    pub use crate::models::{EnsembleBuilder, EnsembleMethod};
    pub use crate::runner::{run_batch, EnsembleRunner, RunConfig};
    pub use crate::source::{Designation, ForecastSource};
}
