//! EnsembleBuilder trait defining the common interface for all strategies.

use crate::core::{EnsembleRow, ForecastRecord, WeightRecord};
use crate::error::Result;

/// Output of an ensemble builder.
#[derive(Debug, Clone, Default)]
pub struct BuiltEnsemble {
    /// One row per (target_variable, location, horizon, quantile).
    pub rows: Vec<EnsembleRow>,
    /// Weight each model received.
    pub weights: Vec<WeightRecord>,
}

/// Common interface for all ensemble strategies.
///
/// This trait is object-safe and can be used with `Box<dyn EnsembleBuilder>`.
pub trait EnsembleBuilder {
    /// Combine candidate quantile forecasts into one forecast per group.
    ///
    /// Rows that are not quantile rows are ignored.
    fn build(&self, forecasts: &[ForecastRecord]) -> Result<BuiltEnsemble>;

    /// Get the strategy name.
    fn name(&self) -> &str;
}

/// Type alias for boxed builder trait objects.
pub type BoxedBuilder<'a> = Box<dyn EnsembleBuilder + 'a>;
