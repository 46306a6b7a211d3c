//! Ensemble weighted by inverse relative skill.
//!
//! Models with a better (lower) historical relative skill receive more
//! weight. Weights are computed per (target_variable, location), or per
//! (target_variable, location, horizon) when `by_horizon` is set.

use super::combine::combine_members;
use super::traits::{BuiltEnsemble, EnsembleBuilder};
use crate::core::{EvaluationRecord, ForecastRecord, WeightRecord};
use crate::error::Result;
use crate::evaluation::{EvaluationQuery, EvaluationSource};
use crate::utils::{group_by, weighted_average, Statistic};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// (model, target_variable, location, horizon)
type WeightKey = (String, String, String, Option<u32>);

/// Configuration for [`RelativeSkill`].
#[derive(Debug, Clone, PartialEq)]
pub struct RelativeSkillConfig {
    /// Compute separate weights for each horizon.
    pub by_horizon: bool,
    /// Weighted mean or weighted median.
    pub statistic: Statistic,
    /// Snapshot date, skill column and history window.
    pub query: EvaluationQuery,
    /// Minimum number of consecutive evaluated forecasts.
    pub min_history: u32,
}

impl Default for RelativeSkillConfig {
    fn default() -> Self {
        Self {
            by_horizon: false,
            statistic: Statistic::Mean,
            query: EvaluationQuery::default(),
            min_history: 4,
        }
    }
}

impl RelativeSkillConfig {
    pub fn with_by_horizon(mut self, by_horizon: bool) -> Self {
        self.by_horizon = by_horizon;
        self
    }

    pub fn with_statistic(mut self, statistic: Statistic) -> Self {
        self.statistic = statistic;
        self
    }

    pub fn with_query(mut self, query: EvaluationQuery) -> Self {
        self.query = query;
        self
    }

    pub fn with_min_history(mut self, min_history: u32) -> Self {
        self.min_history = min_history;
        self
    }
}

/// Inverse-relative-skill weighted ensemble.
pub struct RelativeSkill<'a> {
    evaluations: &'a dyn EvaluationSource,
    config: RelativeSkillConfig,
}

impl<'a> RelativeSkill<'a> {
    pub fn new(evaluations: &'a dyn EvaluationSource, config: RelativeSkillConfig) -> Self {
        Self {
            evaluations,
            config,
        }
    }

    pub fn config(&self) -> &RelativeSkillConfig {
        &self.config
    }

    /// Weight of every eligible model.
    ///
    /// Models with non-positive skill get weight zero. Groups in which every
    /// model has non-positive skill are dropped.
    pub fn weights(&self, forecasts: &[ForecastRecord]) -> Result<Vec<WeightRecord>> {
        let latest = forecasts.iter().map(|r| r.forecast_date).max();
        let Some(evaluation_date) = self.config.query.resolve_date(latest) else {
            warn!("no candidate forecasts and no evaluation date; no weights computed");
            return Ok(Vec::new());
        };

        let snapshot = self.config.query.fetch(self.evaluations, evaluation_date)?;

        let candidates: BTreeSet<&str> = forecasts.iter().map(|r| r.model.as_str()).collect();
        if !snapshot.has_history && self.config.min_history > 0 {
            warn!(
                source = %snapshot.source_name,
                "evaluation snapshot has no history column; continuity check skipped"
            );
        }
        let min_history = self.config.min_history;
        let eligible: Vec<&EvaluationRecord> = snapshot
            .records
            .iter()
            .filter(|r| candidates.contains(r.model.as_str()))
            .filter(|r| !snapshot.has_history || r.history.unwrap_or(0) >= min_history)
            .filter(|r| r.skill.is_some())
            .collect();

        let by_horizon = self.config.by_horizon;
        let skills = group_by(eligible, |r| -> WeightKey {
            (
                r.model.clone(),
                r.target_variable.clone(),
                r.location.clone(),
                by_horizon.then_some(r.horizon),
            )
        });

        // Inverse of the mean skill; missing skills were filtered above.
        let inverses = skills.into_iter().map(|(key, rows)| {
            let skill = rows.iter().filter_map(|r| r.skill).sum::<f64>() / rows.len() as f64;
            let inverse = if skill > 0.0 { 1.0 / skill } else { 0.0 };
            (key, inverse)
        });

        let groups = group_by(inverses, |((_, target_variable, location, horizon), _)| {
            (target_variable.clone(), location.clone(), *horizon)
        });

        let mut weights = Vec::new();
        for ((target_variable, location, horizon), members) in groups {
            let total: f64 = members.iter().map(|(_, inverse)| inverse).sum();
            if total <= 0.0 {
                warn!(
                    %target_variable,
                    %location,
                    ?horizon,
                    "all models have non-positive skill; group dropped"
                );
                continue;
            }
            weights.extend(members.into_iter().map(|((model, ..), inverse)| WeightRecord {
                model,
                target_variable: target_variable.clone(),
                location: location.clone(),
                horizon,
                weight: inverse / total,
            }));
        }

        info!(
            %evaluation_date,
            models = weights.iter().map(|w| w.model.as_str()).collect::<BTreeSet<_>>().len(),
            weights = weights.len(),
            "computed relative skill weights"
        );
        Ok(weights)
    }
}

impl EnsembleBuilder for RelativeSkill<'_> {
    fn build(&self, forecasts: &[ForecastRecord]) -> Result<BuiltEnsemble> {
        let weights = self.weights(forecasts)?;
        let by_horizon = self.config.by_horizon;
        let index: HashMap<WeightKey, f64> = weights
            .iter()
            .map(|w| {
                (
                    (
                        w.model.clone(),
                        w.target_variable.clone(),
                        w.location.clone(),
                        w.horizon,
                    ),
                    w.weight,
                )
            })
            .collect();

        // Inner join; zero-weight members cannot move a weighted mean or median.
        let members = forecasts.iter().filter_map(|r| {
            let key = (
                r.model.clone(),
                r.target_variable.clone(),
                r.location.clone(),
                by_horizon.then_some(r.horizon),
            );
            index
                .get(&key)
                .copied()
                .filter(|w| *w > 0.0)
                .map(|w| (r, w))
        });

        let statistic = self.config.statistic;
        let rows = combine_members(members, |values, weights| {
            weighted_average(values, weights, statistic)
        })?;
        debug!(rows = rows.len(), %statistic, by_horizon, "built relative skill ensemble");
        Ok(BuiltEnsemble { rows, weights })
    }

    fn name(&self) -> &str {
        match (self.config.by_horizon, self.config.statistic) {
            (false, Statistic::Mean) => "relative_skill",
            (true, Statistic::Mean) => "relative_skill_by_horizon",
            (false, Statistic::Median) => "relative_skill_median",
            (true, Statistic::Median) => "relative_skill_by_horizon_median",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EnsembleError;
    use crate::evaluation::InMemoryEvaluations;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, 8).unwrap()
    }

    fn forecast(model: &str, horizon: u32, values: &[f64]) -> Vec<ForecastRecord> {
        [0.1, 0.5, 0.9]
            .iter()
            .zip(values)
            .map(|(q, v)| {
                ForecastRecord::new(model, "DE", "inc case", date(), horizon).with_quantile(*q, *v)
            })
            .collect()
    }

    fn two_models() -> Vec<ForecastRecord> {
        let mut records = forecast("A", 1, &[1.0, 2.0, 3.0]);
        records.extend(forecast("B", 1, &[2.0, 3.0, 4.0]));
        records
    }

    fn store(csv: &str) -> InMemoryEvaluations {
        InMemoryEvaluations::new().with_csv(date(), csv).unwrap()
    }

    const SKILLS: &str = "\
model,location,target_variable,horizon,weeks_included,n,relative_skill
A,DE,inc case,1,10,6,0.5
B,DE,inc case,1,10,6,2.0
A,DE,inc case,1,All,6,5.0
";

    fn weight_of(weights: &[WeightRecord], model: &str) -> f64 {
        weights.iter().find(|w| w.model == model).unwrap().weight
    }

    #[test]
    fn inverse_skill_weights() {
        let evaluations = store(SKILLS);
        let builder = RelativeSkill::new(&evaluations, RelativeSkillConfig::default());
        let weights = builder.weights(&two_models()).unwrap();

        assert_eq!(weights.len(), 2);
        assert_relative_eq!(weight_of(&weights, "A"), 0.8, epsilon = 1e-12);
        assert_relative_eq!(weight_of(&weights, "B"), 0.2, epsilon = 1e-12);
        assert!(weights.iter().all(|w| w.horizon.is_none()));
    }

    #[test]
    fn weighted_mean_ensemble() {
        let evaluations = store(SKILLS);
        let built = RelativeSkill::new(&evaluations, RelativeSkillConfig::default())
            .build(&two_models())
            .unwrap();

        let values: Vec<f64> = built.rows.iter().map(|r| r.value).collect();
        assert_relative_eq!(values[0], 1.2, epsilon = 1e-12);
        assert_relative_eq!(values[1], 2.2, epsilon = 1e-12);
        assert_relative_eq!(values[2], 3.2, epsilon = 1e-12);
        assert!(built.rows.iter().all(|r| r.n_models == 2));
    }

    #[test]
    fn weighted_median_ensemble_follows_heavier_model() {
        let evaluations = store(SKILLS);
        let config = RelativeSkillConfig::default().with_statistic(Statistic::Median);
        let built = RelativeSkill::new(&evaluations, config)
            .build(&two_models())
            .unwrap();
        let values: Vec<f64> = built.rows.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn weights_averaged_across_horizons_unless_by_horizon() {
        let csv = "\
model,location,target_variable,horizon,n,relative_skill
A,DE,inc case,1,6,0.5
A,DE,inc case,2,6,1.5
B,DE,inc case,1,6,1.0
B,DE,inc case,2,6,1.0
";
        let evaluations = store(csv);
        let mut records = two_models();
        records.extend(forecast("A", 2, &[1.0, 2.0, 3.0]));
        records.extend(forecast("B", 2, &[2.0, 3.0, 4.0]));

        // Averaged: both models have skill 1.0.
        let pooled = RelativeSkill::new(&evaluations, RelativeSkillConfig::default())
            .weights(&records)
            .unwrap();
        assert_relative_eq!(weight_of(&pooled, "A"), 0.5, epsilon = 1e-12);

        let per_horizon = RelativeSkill::new(
            &evaluations,
            RelativeSkillConfig::default().with_by_horizon(true),
        )
        .weights(&records)
        .unwrap();
        assert_eq!(per_horizon.len(), 4);
        let a1 = per_horizon
            .iter()
            .find(|w| w.model == "A" && w.horizon == Some(1))
            .unwrap();
        // inverses 2.0 and 1.0
        assert_relative_eq!(a1.weight, 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn eligibility_requires_history_skill_and_candidacy() {
        let csv = "\
model,location,target_variable,horizon,n,relative_skill
A,DE,inc case,1,6,1.0
B,DE,inc case,1,2,1.0
C,DE,inc case,1,6,1.0
D,DE,inc case,1,6,NA
";
        let evaluations = store(csv);
        let mut records = two_models();
        records.extend(forecast("D", 1, &[1.0, 2.0, 3.0]));

        let weights = RelativeSkill::new(&evaluations, RelativeSkillConfig::default())
            .weights(&records)
            .unwrap();
        // B: short history, C: not a candidate, D: missing skill.
        assert_eq!(weights.len(), 1);
        assert_eq!(weights[0].model, "A");
        assert_relative_eq!(weights[0].weight, 1.0);
    }

    #[test]
    fn non_positive_skill_gets_zero_weight() {
        let csv = "\
model,location,target_variable,horizon,n,relative_skill
A,DE,inc case,1,6,1.0
B,DE,inc case,1,6,0.0
";
        let evaluations = store(csv);
        let built = RelativeSkill::new(&evaluations, RelativeSkillConfig::default())
            .build(&two_models())
            .unwrap();

        assert_relative_eq!(weight_of(&built.weights, "B"), 0.0);
        let values: Vec<f64> = built.rows.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert!(built.rows.iter().all(|r| r.n_models == 1));
    }

    #[test]
    fn all_non_positive_group_is_dropped() {
        let csv = "\
model,location,target_variable,horizon,n,relative_skill
A,DE,inc case,1,6,-1.0
B,DE,inc case,1,6,0.0
";
        let evaluations = store(csv);
        let built = RelativeSkill::new(&evaluations, RelativeSkillConfig::default())
            .build(&two_models())
            .unwrap();
        assert!(built.weights.is_empty());
        assert!(built.rows.is_empty());
    }

    #[test]
    fn missing_snapshot_is_not_found() {
        let evaluations = InMemoryEvaluations::new();
        let err = RelativeSkill::new(&evaluations, RelativeSkillConfig::default())
            .build(&two_models())
            .unwrap_err();
        assert!(matches!(err, EnsembleError::NotFound(_)));
    }

    #[test]
    fn missing_skill_column_is_schema_error() {
        let evaluations = store(SKILLS);
        let query = EvaluationQuery::default().with_skill_column("rel_wis");
        let err = RelativeSkill::new(&evaluations, RelativeSkillConfig::default().with_query(query))
            .build(&two_models())
            .unwrap_err();
        assert!(matches!(err, EnsembleError::Schema { ref column, .. } if column == "rel_wis"));
    }

    #[test]
    fn explicit_evaluation_date_is_used() {
        let other = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        let evaluations = InMemoryEvaluations::new().with_csv(other, SKILLS).unwrap();
        let query = EvaluationQuery::default().with_evaluation_date(other);
        let weights = RelativeSkill::new(&evaluations, RelativeSkillConfig::default().with_query(query))
            .weights(&two_models())
            .unwrap();
        assert_eq!(weights.len(), 2);
    }

    #[test]
    fn builder_names_match_method_identifiers() {
        let evaluations = InMemoryEvaluations::new();
        let config = RelativeSkillConfig::default()
            .with_by_horizon(true)
            .with_statistic(Statistic::Median);
        assert_eq!(
            RelativeSkill::new(&evaluations, config).name(),
            "relative_skill_by_horizon_median"
        );
    }
}
