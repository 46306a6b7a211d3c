//! Benchmarks for building and formatting ensembles.

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hub_ensemble::core::{ForecastRecord, HUB_QUANTILES};
use hub_ensemble::evaluation::InMemoryEvaluations;
use hub_ensemble::filter::{FilterConfig, ModelFilter};
use hub_ensemble::format::format_ensemble;
use hub_ensemble::models::{EnsembleBuilder, RelativeSkill, RelativeSkillConfig, SimpleAverage};

const LOCATIONS: [&str; 16] = [
    "AT", "BE", "CH", "CZ", "DE", "DK", "EE", "ES", "FI", "FR", "GB", "IT", "NL", "PL", "PT", "SE",
];

fn forecast_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 3, 8).unwrap()
}

fn generate_candidates(n_models: usize) -> Vec<ForecastRecord> {
    let mut records = Vec::new();
    for m in 0..n_models {
        for location in LOCATIONS {
            for horizon in 1..=4 {
                for (i, q) in HUB_QUANTILES.iter().enumerate() {
                    let value = 100.0 * horizon as f64 + 10.0 * i as f64 + m as f64;
                    records.push(
                        ForecastRecord::new(format!("model{m}"), location, "inc case", forecast_date(), horizon)
                            .with_quantile(*q, value),
                    );
                }
            }
        }
    }
    records
}

fn generate_skills(n_models: usize) -> InMemoryEvaluations {
    let mut text = String::from("model,location,target_variable,horizon,weeks_included,n,relative_skill\n");
    for m in 0..n_models {
        for location in LOCATIONS {
            for horizon in 1..=4 {
                let skill = 0.5 + (m % 7) as f64 * 0.1 + horizon as f64 * 0.05;
                text.push_str(&format!("model{m},{location},inc case,{horizon},10,8,{skill}\n"));
            }
        }
    }
    InMemoryEvaluations::new()
        .with_csv(forecast_date(), &text)
        .unwrap()
}

fn bench_builders(c: &mut Criterion) {
    let mut group = c.benchmark_group("builders");

    for n_models in [5, 20, 50].iter() {
        let candidates = generate_candidates(*n_models);
        let evaluations = generate_skills(*n_models);

        group.bench_with_input(BenchmarkId::new("mean", n_models), n_models, |b, _| {
            let builder = SimpleAverage::mean();
            b.iter(|| builder.build(black_box(&candidates)))
        });

        group.bench_with_input(BenchmarkId::new("median", n_models), n_models, |b, _| {
            let builder = SimpleAverage::median();
            b.iter(|| builder.build(black_box(&candidates)))
        });

        group.bench_with_input(
            BenchmarkId::new("relative_skill_by_horizon", n_models),
            n_models,
            |b, _| {
                let builder = RelativeSkill::new(
                    &evaluations,
                    RelativeSkillConfig::default().with_by_horizon(true),
                );
                b.iter(|| builder.build(black_box(&candidates)))
            },
        );
    }

    group.finish();
}

fn bench_filter_and_format(c: &mut Criterion) {
    let candidates = generate_candidates(20);
    let filter = ModelFilter::new(
        FilterConfig::default()
            .with_required_quantiles(&HUB_QUANTILES)
            .with_min_models(3),
    );

    c.bench_function("filter_20_models", |b| {
        b.iter(|| filter.apply(black_box(candidates.clone())))
    });

    let rows = SimpleAverage::mean().build(&candidates).unwrap().rows;
    c.bench_function("format_ensemble", |b| {
        b.iter(|| format_ensemble(black_box(rows.clone()), forecast_date()))
    });
}

criterion_group!(benches, bench_builders, bench_filter_and_format);
criterion_main!(benches);
