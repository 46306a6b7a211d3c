//! Utility functions shared by the builders and filters.

pub mod group;
pub mod stats;

pub use group::group_by;
pub use stats::{
    mean, median, summarize, weighted_average, weighted_mean, weighted_median, Statistic,
};
