//! Ensemble method identifiers.

use crate::error::{EnsembleError, Result};
use crate::utils::Statistic;
use std::fmt;
use std::str::FromStr;

const RELATIVE_SKILL: &str = "relative_skill";
const BY_HORIZON: &str = "_by_horizon";
const MEDIAN: &str = "_median";

/// How the ensemble combines its members.
///
/// Parses from and displays as the hub's method names: `mean`, `median`,
/// `relative_skill`, `relative_skill_by_horizon`, `relative_skill_median`
/// and `relative_skill_by_horizon_median`.
///
/// # Example
/// ```
/// use hub_ensemble::models::EnsembleMethod;
/// use hub_ensemble::utils::Statistic;
///
/// let method: EnsembleMethod = "relative_skill_by_horizon".parse().unwrap();
/// assert_eq!(
///     method,
///     EnsembleMethod::RelativeSkill { by_horizon: true, statistic: Statistic::Mean }
/// );
/// assert_eq!(method.to_string(), "relative_skill_by_horizon");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnsembleMethod {
    /// Equal weights.
    Average(Statistic),
    /// Weights from inverse relative skill.
    RelativeSkill { by_horizon: bool, statistic: Statistic },
}

impl Default for EnsembleMethod {
    fn default() -> Self {
        EnsembleMethod::Average(Statistic::Mean)
    }
}

impl EnsembleMethod {
    pub fn statistic(&self) -> Statistic {
        match self {
            EnsembleMethod::Average(statistic) => *statistic,
            EnsembleMethod::RelativeSkill { statistic, .. } => *statistic,
        }
    }

    pub fn is_relative_skill(&self) -> bool {
        matches!(self, EnsembleMethod::RelativeSkill { .. })
    }
}

impl FromStr for EnsembleMethod {
    type Err = EnsembleError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        match name {
            "mean" => return Ok(EnsembleMethod::Average(Statistic::Mean)),
            "median" => return Ok(EnsembleMethod::Average(Statistic::Median)),
            _ => {}
        }

        let unknown = || EnsembleError::Configuration(format!("unknown ensemble method `{name}`"));
        let mut rest = name.strip_prefix(RELATIVE_SKILL).ok_or_else(unknown)?;
        let by_horizon = match rest.strip_prefix(BY_HORIZON) {
            Some(tail) => {
                rest = tail;
                true
            }
            None => false,
        };
        let statistic = match rest {
            "" => Statistic::Mean,
            MEDIAN => Statistic::Median,
            _ => return Err(unknown()),
        };
        Ok(EnsembleMethod::RelativeSkill {
            by_horizon,
            statistic,
        })
    }
}

impl fmt::Display for EnsembleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnsembleMethod::Average(statistic) => write!(f, "{statistic}"),
            EnsembleMethod::RelativeSkill {
                by_horizon,
                statistic,
            } => {
                f.write_str(RELATIVE_SKILL)?;
                if *by_horizon {
                    f.write_str(BY_HORIZON)?;
                }
                if *statistic == Statistic::Median {
                    f.write_str(MEDIAN)?;
                }
                Ok(())
            }
        }
    }
}
