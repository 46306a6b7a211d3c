//! Inclusion criteria for candidate models.
//!
//! Every candidate (model, location, target_variable) is checked against the
//! enabled criteria and kept only if it passes all of them. Model-level
//! criteria (manual exclusion, designation) give the same answer for every
//! candidate of a model.

mod exclusions;

pub use exclusions::{load_exclusions, ExclusionRecord, Exclusions};

use crate::core::{CriteriaRecord, ForecastRecord, QuantileLevel};
use crate::evaluation::CandidateKey;
use crate::source::Designation;
use crate::utils::group_by;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

/// Which criteria are enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    /// Drop models whose metadata designates them "other".
    pub exclude_designated_other: bool,
    /// Drop candidates whose horizon-averaged skill exceeds this value.
    pub skill_cutoff: Option<f64>,
    /// Quantile levels every submitted horizon must provide.
    pub required_quantiles: Option<Vec<f64>>,
    /// Horizons every candidate must provide.
    pub required_horizons: Option<Vec<u32>>,
    /// Minimum distinct models per (location, horizon, target, end date) group.
    pub min_models: Option<usize>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            exclude_designated_other: true,
            skill_cutoff: None,
            required_quantiles: None,
            required_horizons: None,
            min_models: None,
        }
    }
}

impl FilterConfig {
    pub fn with_exclude_designated_other(mut self, exclude: bool) -> Self {
        self.exclude_designated_other = exclude;
        self
    }

    pub fn with_skill_cutoff(mut self, cutoff: f64) -> Self {
        self.skill_cutoff = Some(cutoff);
        self
    }

    pub fn with_required_quantiles(mut self, quantiles: &[f64]) -> Self {
        self.required_quantiles = Some(quantiles.to_vec());
        self
    }

    pub fn with_required_horizons(mut self, horizons: &[u32]) -> Self {
        self.required_horizons = Some(horizons.to_vec());
        self
    }

    pub fn with_min_models(mut self, min_models: usize) -> Self {
        self.min_models = Some(min_models);
        self
    }
}

/// Records that passed, plus the per-candidate audit trail.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub records: Vec<ForecastRecord>,
    pub criteria: Vec<CriteriaRecord>,
}

impl FilterOutcome {
    /// Distinct models among the kept records.
    pub fn included_models(&self) -> BTreeSet<&str> {
        self.records.iter().map(|r| r.model.as_str()).collect()
    }
}

/// Applies [`FilterConfig`] to a set of candidate forecasts.
#[derive(Debug, Clone, Default)]
pub struct ModelFilter {
    config: FilterConfig,
    excluded: BTreeSet<String>,
    designations: HashMap<String, Designation>,
    skills: BTreeMap<CandidateKey, f64>,
}

impl ModelFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Models to drop regardless of the other criteria.
    pub fn with_excluded<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(models.into_iter().map(Into::into));
        self
    }

    pub fn with_designations(mut self, designations: HashMap<String, Designation>) -> Self {
        self.designations = designations;
        self
    }

    /// Horizon-averaged skill per candidate, used by the skill cutoff.
    pub fn with_skills(mut self, skills: BTreeMap<CandidateKey, f64>) -> Self {
        self.skills = skills;
        self
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Keep the records of candidates that pass every enabled criterion.
    pub fn apply(&self, records: Vec<ForecastRecord>) -> FilterOutcome {
        let candidates = group_by(records, |r| {
            (
                r.model.clone(),
                r.location.clone(),
                r.target_variable.clone(),
            )
        });

        let mut kept = Vec::new();
        let mut criteria = Vec::with_capacity(candidates.len());
        for (key, rows) in candidates {
            let rows = latest_submission(rows);
            let record = self.evaluate(&key, &rows);
            if record.included_in_ensemble {
                kept.extend(rows);
            } else {
                debug!(
                    model = %record.model,
                    location = %record.location,
                    target_variable = %record.target_variable,
                    failed = ?record.failed_criteria(),
                    "candidate excluded"
                );
            }
            criteria.push(record);
        }

        let included = criteria.iter().filter(|c| c.included_in_ensemble).count();
        info!(
            candidates = criteria.len(),
            included,
            excluded = criteria.len() - included,
            "applied ensemble criteria"
        );

        let records = match self.config.min_models {
            Some(min_models) => drop_sparse_groups(kept, min_models),
            None => kept,
        };
        FilterOutcome { records, criteria }
    }

    fn evaluate(&self, key: &CandidateKey, rows: &[ForecastRecord]) -> CriteriaRecord {
        let (model, location, target_variable) = key;
        let forecast_date = rows
            .iter()
            .map(|r| r.forecast_date)
            .max()
            .unwrap_or(NaiveDate::MIN);

        let all_quantiles = match &self.config.required_quantiles {
            Some(required) => has_all_quantiles(rows, required),
            None => true,
        };
        let all_horizons = match &self.config.required_horizons {
            Some(required) => {
                let present: BTreeSet<u32> = rows.iter().map(|r| r.horizon).collect();
                required.iter().all(|h| present.contains(h))
            }
            None => true,
        };
        let not_excluded_manually = !self.excluded.contains(model);
        let not_designated_other = !(self.config.exclude_designated_other
            && self.designations.get(model) == Some(&Designation::Other));
        // Candidates without an evaluation score are not penalized.
        let within_skill_cutoff = match (self.config.skill_cutoff, self.skills.get(key)) {
            (Some(cutoff), Some(skill)) => *skill <= cutoff,
            _ => true,
        };

        CriteriaRecord {
            model: model.clone(),
            location: location.clone(),
            target_variable: target_variable.clone(),
            forecast_date,
            all_quantiles,
            all_horizons,
            not_excluded_manually,
            not_designated_other,
            within_skill_cutoff,
            included_in_ensemble: all_quantiles
                && all_horizons
                && not_excluded_manually
                && not_designated_other
                && within_skill_cutoff,
        }
    }
}

/// Rows of the candidate's most recent forecast date.
///
/// A model may submit more than once inside the window; only its latest
/// submission competes.
fn latest_submission(rows: Vec<ForecastRecord>) -> Vec<ForecastRecord> {
    let Some(latest) = rows.iter().map(|r| r.forecast_date).max() else {
        return rows;
    };
    let before = rows.len();
    let rows: Vec<ForecastRecord> = rows
        .into_iter()
        .filter(|r| r.forecast_date == latest)
        .collect();
    if rows.len() < before {
        debug!(
            model = %rows[0].model,
            %latest,
            superseded = before - rows.len(),
            "dropped superseded submission rows"
        );
    }
    rows
}

/// Every submitted horizon must carry every required quantile level.
fn has_all_quantiles(rows: &[ForecastRecord], required: &[f64]) -> bool {
    let by_horizon = group_by(rows.iter().filter(|r| r.is_quantile()), |r| r.horizon);
    if by_horizon.is_empty() {
        return required.is_empty();
    }
    by_horizon.values().all(|rows| {
        let present: BTreeSet<QuantileLevel> =
            rows.iter().filter_map(|r| r.quantile_level()).collect();
        required
            .iter()
            .all(|q| present.contains(&QuantileLevel::new(*q)))
    })
}

/// Drop every (location, horizon, target_variable, target_end_date) group
/// with fewer than `min_models` distinct models.
pub fn drop_sparse_groups(records: Vec<ForecastRecord>, min_models: usize) -> Vec<ForecastRecord> {
    let groups = group_by(records, |r| {
        (
            r.location.clone(),
            r.horizon,
            r.target_variable.clone(),
            r.target_end_date,
        )
    });

    let mut kept = Vec::new();
    let mut dropped_groups = 0usize;
    for (_, rows) in groups {
        let models: BTreeSet<&str> = rows.iter().map(|r| r.model.as_str()).collect();
        if models.len() >= min_models {
            kept.extend(rows);
        } else {
            dropped_groups += 1;
        }
    }
    if dropped_groups > 0 {
        info!(dropped_groups, min_models, "dropped groups below model threshold");
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn forecast(model: &str, location: &str, horizon: u32, quantiles: &[f64]) -> Vec<ForecastRecord> {
        quantiles
            .iter()
            .map(|q| {
                ForecastRecord::new(model, location, "inc case", date(2021, 3, 8), horizon)
                    .with_quantile(*q, 10.0 * q)
            })
            .collect()
    }

    fn candidates() -> Vec<ForecastRecord> {
        let qs = [0.1, 0.5, 0.9];
        let mut records = forecast("A", "DE", 1, &qs);
        records.extend(forecast("B", "DE", 1, &qs));
        records.extend(forecast("C", "DE", 1, &qs));
        records.extend(forecast("C", "FR", 1, &qs));
        records
    }

    fn models(outcome: &FilterOutcome) -> Vec<&str> {
        outcome.included_models().into_iter().collect()
    }

    #[test]
    fn default_filter_keeps_everything() {
        let outcome = ModelFilter::new(FilterConfig::default()).apply(candidates());
        assert_eq!(outcome.records.len(), 12);
        assert_eq!(outcome.criteria.len(), 4);
        assert!(outcome.criteria.iter().all(|c| c.included_in_ensemble));
    }

    #[test]
    fn manual_exclusion_wins_over_everything_else() {
        let outcome = ModelFilter::new(FilterConfig::default())
            .with_excluded(["B"])
            .apply(candidates());
        assert_eq!(models(&outcome), vec!["A", "C"]);

        let b = outcome.criteria.iter().find(|c| c.model == "B").unwrap();
        assert!(!b.not_excluded_manually);
        assert!(!b.included_in_ensemble);
        assert_eq!(b.failed_criteria(), vec!["not_excluded_manually"]);
    }

    #[test]
    fn designated_other_is_dropped_only_when_enabled() {
        let designations = HashMap::from([("C".to_string(), Designation::Other)]);

        let outcome = ModelFilter::new(FilterConfig::default())
            .with_designations(designations.clone())
            .apply(candidates());
        assert_eq!(models(&outcome), vec!["A", "B"]);
        let c_rows: Vec<_> = outcome.criteria.iter().filter(|c| c.model == "C").collect();
        assert_eq!(c_rows.len(), 2);
        assert!(c_rows.iter().all(|c| !c.not_designated_other));

        let outcome = ModelFilter::new(FilterConfig::default().with_exclude_designated_other(false))
            .with_designations(designations)
            .apply(candidates());
        assert_eq!(models(&outcome), vec!["A", "B", "C"]);
    }

    #[test]
    fn skill_cutoff_applies_per_candidate() {
        let key = |m: &str, l: &str| (m.to_string(), l.to_string(), "inc case".to_string());
        let skills = BTreeMap::from([(key("A", "DE"), 0.8), (key("C", "DE"), 1.5), (key("C", "FR"), 0.9)]);

        let outcome = ModelFilter::new(FilterConfig::default().with_skill_cutoff(1.0))
            .with_skills(skills)
            .apply(candidates());

        // B has no score and passes; C fails in DE only.
        let included: Vec<(&str, &str)> = outcome
            .criteria
            .iter()
            .filter(|c| c.included_in_ensemble)
            .map(|c| (c.model.as_str(), c.location.as_str()))
            .collect();
        assert_eq!(included, vec![("A", "DE"), ("B", "DE"), ("C", "FR")]);
    }

    #[test]
    fn completeness_checks_quantiles_and_horizons() {
        let mut records = forecast("A", "DE", 1, &[0.1, 0.5, 0.9]);
        records.extend(forecast("A", "DE", 2, &[0.1, 0.5, 0.9]));
        records.extend(forecast("B", "DE", 1, &[0.1, 0.5]));
        records.extend(forecast("B", "DE", 2, &[0.1, 0.5, 0.9]));
        records.extend(forecast("C", "DE", 1, &[0.1, 0.5, 0.9]));

        let config = FilterConfig::default()
            .with_required_quantiles(&[0.1, 0.5, 0.9])
            .with_required_horizons(&[1, 2]);
        let outcome = ModelFilter::new(config).apply(records);

        assert_eq!(models(&outcome), vec!["A"]);
        let b = outcome.criteria.iter().find(|c| c.model == "B").unwrap();
        assert!(!b.all_quantiles && b.all_horizons);
        let c = outcome.criteria.iter().find(|c| c.model == "C").unwrap();
        assert!(c.all_quantiles && !c.all_horizons);
    }

    #[test]
    fn min_models_drops_sparse_groups_without_touching_criteria() {
        let outcome = ModelFilter::new(FilterConfig::default().with_min_models(2)).apply(candidates());

        // FR only has model C.
        assert!(outcome.records.iter().all(|r| r.location == "DE"));
        assert_eq!(outcome.records.len(), 9);
        assert!(outcome.criteria.iter().all(|c| c.included_in_ensemble));
    }

    #[test]
    fn filtering_is_idempotent() {
        let filter = ModelFilter::new(FilterConfig::default().with_min_models(2))
            .with_excluded(["A"]);

        let once = filter.apply(candidates());
        assert_eq!(models(&once), vec!["B", "C"]);
        let twice = filter.apply(once.records.clone());
        assert_eq!(once.records, twice.records);
    }

    #[test]
    fn criteria_carry_latest_forecast_date() {
        let mut records = forecast("A", "DE", 1, &[0.5]);
        records.push(
            ForecastRecord::new("A", "DE", "inc case", date(2021, 3, 6), 2).with_quantile(0.5, 1.0),
        );
        let outcome = ModelFilter::new(FilterConfig::default()).apply(records);
        assert_eq!(outcome.criteria[0].forecast_date, date(2021, 3, 8));
    }

    #[test]
    fn only_latest_submission_in_window_is_kept() {
        let sunday = date(2021, 3, 7);
        let mut records: Vec<ForecastRecord> = [0.1, 0.5, 0.9]
            .iter()
            .map(|q| ForecastRecord::new("A", "DE", "inc case", sunday, 1).with_quantile(*q, 100.0))
            .collect();
        records.extend(forecast("A", "DE", 1, &[0.1, 0.5, 0.9]));
        records.extend(forecast("B", "DE", 1, &[0.1, 0.5, 0.9]));

        let outcome = ModelFilter::new(FilterConfig::default()).apply(records);
        assert_eq!(outcome.records.len(), 6);
        assert!(outcome
            .records
            .iter()
            .all(|r| r.forecast_date == date(2021, 3, 8)));
        assert_eq!(outcome.criteria.len(), 2);
    }
}
