//! End-to-end ensemble runs for one or many forecast dates.
//!
//! A run loads the week's candidate forecasts, applies the inclusion
//! criteria, combines the survivors with the selected method and formats the
//! result for submission.

use crate::core::{forecast_window, CriteriaRecord, EnsembleRecord, WeightRecord};
use crate::error::{EnsembleError, Result};
use crate::evaluation::{EvaluationQuery, EvaluationSource};
use crate::filter::{Exclusions, FilterConfig, ModelFilter};
use crate::format::format_ensemble;
use crate::models::{
    BoxedBuilder, EnsembleMethod, RelativeSkill, RelativeSkillConfig, SimpleAverage,
};
use crate::source::ForecastSource;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use tracing::{info, info_span};

/// Options only understood by relative-skill methods.
///
/// Unset fields fall back to [`RelativeSkillConfig::default`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelativeSkillOptions {
    pub evaluation_date: Option<NaiveDate>,
    pub skill_column: Option<String>,
    pub weeks_included: Option<String>,
    pub min_history: Option<u32>,
}

impl RelativeSkillOptions {
    /// Names of the options that were set.
    pub fn supplied(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.evaluation_date.is_some() {
            names.push("evaluation_date");
        }
        if self.skill_column.is_some() {
            names.push("skill_column");
        }
        if self.weeks_included.is_some() {
            names.push("weeks_included");
        }
        if self.min_history.is_some() {
            names.push("min_history");
        }
        names
    }

    /// Evaluation query with defaults for unset fields.
    pub fn query(&self) -> EvaluationQuery {
        let mut query = EvaluationQuery::default();
        if let Some(date) = self.evaluation_date {
            query = query.with_evaluation_date(date);
        }
        if let Some(column) = &self.skill_column {
            query = query.with_skill_column(column.clone());
        }
        if let Some(weeks) = &self.weeks_included {
            query = query.with_weeks_included(Some(weeks.clone()));
        }
        query
    }

    fn builder_config(&self, method: EnsembleMethod, query: EvaluationQuery) -> RelativeSkillConfig {
        let mut config = RelativeSkillConfig::default()
            .with_query(query)
            .with_statistic(method.statistic());
        if let EnsembleMethod::RelativeSkill { by_horizon, .. } = method {
            config = config.with_by_horizon(by_horizon);
        }
        if let Some(min_history) = self.min_history {
            config = config.with_min_history(min_history);
        }
        config
    }
}

/// Everything that parameterizes one ensemble run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub forecast_date: NaiveDate,
    pub method: EnsembleMethod,
    pub filter: FilterConfig,
    pub exclusions: Exclusions,
    pub relative_skill: RelativeSkillOptions,
    /// Include weight records in the output.
    pub return_weights: bool,
    /// Include criteria records in the output.
    pub return_criteria: bool,
}

impl RunConfig {
    pub fn new(forecast_date: NaiveDate, method: EnsembleMethod) -> Self {
        Self {
            forecast_date,
            method,
            filter: FilterConfig::default(),
            exclusions: Exclusions::None,
            relative_skill: RelativeSkillOptions::default(),
            return_weights: true,
            return_criteria: true,
        }
    }

    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_exclusions(mut self, exclusions: Exclusions) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn with_relative_skill(mut self, options: RelativeSkillOptions) -> Self {
        self.relative_skill = options;
        self
    }

    pub fn with_provenance(mut self, weights: bool, criteria: bool) -> Self {
        self.return_weights = weights;
        self.return_criteria = criteria;
        self
    }
}

/// Result of one run with its provenance.
#[derive(Debug, Clone)]
pub struct EnsembleOutput {
    pub ensemble: Vec<EnsembleRecord>,
    pub weights: Option<Vec<WeightRecord>>,
    pub criteria: Option<Vec<CriteriaRecord>>,
    pub method: EnsembleMethod,
    pub forecast_date: NaiveDate,
}

impl EnsembleOutput {
    /// Method identifier, e.g. `relative_skill_by_horizon`.
    pub fn method_id(&self) -> String {
        self.method.to_string()
    }
}

/// Runs ensembles against a forecast source and, for skill-based methods,
/// an evaluation source.
pub struct EnsembleRunner<'a> {
    forecasts: &'a dyn ForecastSource,
    evaluations: Option<&'a dyn EvaluationSource>,
}

impl<'a> EnsembleRunner<'a> {
    pub fn new(forecasts: &'a dyn ForecastSource) -> Self {
        Self {
            forecasts,
            evaluations: None,
        }
    }

    pub fn with_evaluations(mut self, evaluations: &'a dyn EvaluationSource) -> Self {
        self.evaluations = Some(evaluations);
        self
    }

    fn require_evaluations(&self, purpose: &str) -> Result<&'a dyn EvaluationSource> {
        self.evaluations.ok_or_else(|| {
            EnsembleError::Configuration(format!("{purpose} requires an evaluation source"))
        })
    }

    fn validate(&self, config: &RunConfig) -> Result<()> {
        match config.method {
            EnsembleMethod::Average(_) => {
                let supplied = config.relative_skill.supplied();
                if !supplied.is_empty() {
                    return Err(EnsembleError::Configuration(format!(
                        "method `{}` does not accept options: {}",
                        config.method,
                        supplied.join(", ")
                    )));
                }
            }
            EnsembleMethod::RelativeSkill { .. } => {
                self.require_evaluations(&format!("method `{}`", config.method))?;
            }
        }
        if config.filter.skill_cutoff.is_some() {
            self.require_evaluations("a skill cutoff")?;
        }
        Ok(())
    }

    /// Build the ensemble for `config.forecast_date`.
    pub fn run(&self, config: &RunConfig) -> Result<EnsembleOutput> {
        let span = info_span!(
            "ensemble",
            method = %config.method,
            forecast_date = %config.forecast_date
        );
        let _guard = span.enter();

        self.validate(config)?;

        let (start, end) = forecast_window(config.forecast_date);
        let candidates: Vec<_> = self
            .forecasts
            .load_forecasts(start, end)?
            .into_iter()
            .filter(|r| r.is_quantile())
            .collect();
        let models: BTreeSet<&str> = candidates.iter().map(|r| r.model.as_str()).collect();
        info!(
            %start,
            %end,
            rows = candidates.len(),
            models = models.len(),
            "loaded candidate forecasts"
        );

        let designations: HashMap<String, _> = models
            .iter()
            .filter_map(|m| self.forecasts.designation(m).map(|d| (m.to_string(), d)))
            .collect();
        let mut filter = ModelFilter::new(config.filter.clone())
            .with_excluded(config.exclusions.resolve(config.forecast_date))
            .with_designations(designations);

        // One snapshot date for the cutoff and the weights, taken before any
        // candidate is filtered out.
        let mut query = config.relative_skill.query();
        let latest = candidates.iter().map(|r| r.forecast_date).max();
        if let Some(date) = query.resolve_date(latest) {
            query = query.with_evaluation_date(date);
        }

        if config.filter.skill_cutoff.is_some() && !candidates.is_empty() {
            let evaluations = self.require_evaluations("a skill cutoff")?;
            if let Some(date) = query.evaluation_date {
                let snapshot = query.fetch(evaluations, date)?;
                filter = filter.with_skills(snapshot.mean_skill_by_candidate());
            }
        }

        let outcome = filter.apply(candidates);
        info!(
            rows = outcome.records.len(),
            models = outcome.included_models().len(),
            "candidates after filtering"
        );

        let builder: BoxedBuilder<'_> = match config.method {
            EnsembleMethod::Average(statistic) => Box::new(SimpleAverage::new(statistic)),
            EnsembleMethod::RelativeSkill { .. } => Box::new(RelativeSkill::new(
                self.require_evaluations("relative skill weighting")?,
                config.relative_skill.builder_config(config.method, query),
            )),
        };
        let built = builder.build(&outcome.records)?;
        let ensemble = format_ensemble(built.rows, config.forecast_date);
        info!(rows = ensemble.len(), builder = builder.name(), "ensemble formatted");

        Ok(EnsembleOutput {
            ensemble,
            weights: config.return_weights.then_some(built.weights),
            criteria: config.return_criteria.then_some(outcome.criteria),
            method: config.method,
            forecast_date: config.forecast_date,
        })
    }
}

/// Outputs of a batch, keyed by `"{method}-{date}"` in run order.
#[derive(Debug, Clone, Default)]
pub struct BatchResults {
    entries: Vec<(String, EnsembleOutput)>,
}

impl BatchResults {
    pub fn get(&self, key: &str) -> Option<&EnsembleOutput> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EnsembleOutput)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<(String, EnsembleOutput)> {
        self.entries
    }
}

/// Key under which a batch stores one run.
pub fn batch_key(method: EnsembleMethod, forecast_date: NaiveDate) -> String {
    format!("{method}-{forecast_date}")
}

/// Run every method for every date, dates in the outer loop.
///
/// `base` supplies everything except the date and method. Its
/// relative-skill options are passed only to relative-skill methods. The
/// first failing run aborts the batch.
pub fn run_batch(
    runner: &EnsembleRunner<'_>,
    methods: &[EnsembleMethod],
    dates: &[NaiveDate],
    base: &RunConfig,
) -> Result<BatchResults> {
    let mut results = BatchResults::default();
    for &forecast_date in dates {
        for &method in methods {
            let mut config = base.clone();
            config.forecast_date = forecast_date;
            config.method = method;
            if !method.is_relative_skill() {
                config.relative_skill = RelativeSkillOptions::default();
            }
            let output = runner.run(&config)?;
            results
                .entries
                .push((batch_key(method, forecast_date), output));
        }
    }
    info!(runs = results.len(), "batch complete");
    Ok(results)
}
