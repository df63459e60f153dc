//! Criterion benchmarks for hecon_core evaluators and analyses
//!
//! Run with: cargo bench -p hecon_core

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use hecon_core::analysis::{DsaConfig, PsaConfig, run_dsa, run_psa};
use hecon_core::evaluate::{
    Comparison, CostEffectModel, MarkovModel, PartitionedSurvivalModel, StateValues,
};
use hecon_core::model::{Distribution, Parameter, ParameterSet, Value};
use hecon_core::survival::SurvivalCurve;

fn create_markov(time_horizon: usize, risk_multiplier: Option<f64>) -> MarkovModel {
    let progression = match risk_multiplier {
        Some(times) => Value::Scaled {
            param: "p_progress".into(),
            times,
        },
        None => Value::param("p_progress"),
    };
    MarkovModel::new(
        vec![
            "stable".into(),
            "progressed".into(),
            "palliative".into(),
            "dead".into(),
        ],
        vec![
            vec![Value::Remainder, progression, 0.0.into(), Value::param("p_die")],
            vec![0.0.into(), Value::Remainder, 0.1.into(), 0.08.into()],
            vec![0.0.into(), 0.0.into(), Value::Remainder, 0.3.into()],
            vec![0.0.into(), 0.0.into(), 0.0.into(), 1.0.into()],
        ],
        vec![
            Value::param("c_stable"),
            6000.0.into(),
            9000.0.into(),
            0.0.into(),
        ],
        vec![
            Value::param("u_stable"),
            0.6.into(),
            0.35.into(),
            0.0.into(),
        ],
        time_horizon,
    )
}

fn create_params() -> ParameterSet {
    ParameterSet::new(vec![
        Parameter::probability("p_progress", 0.12)
            .with_distribution(Distribution::Beta {
                alpha: 12.0,
                beta: 88.0,
            })
            .with_range(0.08, 0.16),
        Parameter::probability("p_die", 0.02)
            .with_distribution(Distribution::Beta {
                alpha: 2.0,
                beta: 98.0,
            })
            .with_range(0.01, 0.03),
        Parameter::cost("c_stable", 1500.0).with_distribution(Distribution::Gamma {
            shape: 25.0,
            scale: 60.0,
        }),
        Parameter::utility("u_stable", 0.82).with_distribution(Distribution::Beta {
            alpha: 82.0,
            beta: 18.0,
        }),
    ])
    .expect("benchmark parameters are valid")
}

fn bench_markov_horizons(c: &mut Criterion) {
    let mut group = c.benchmark_group("markov");
    let params = create_params();

    for horizon in [10, 40, 100].iter() {
        let model = create_markov(*horizon, None);
        group.bench_with_input(BenchmarkId::new("cycles", horizon), horizon, |b, _| {
            b.iter(|| model.simulate(black_box(&params)))
        });
    }

    group.finish();
}

fn bench_partitioned_survival(c: &mut Criterion) {
    let model = PartitionedSurvivalModel::new(
        SurvivalCurve::Weibull {
            shape: 1.3.into(),
            scale: 2.5.into(),
        },
        SurvivalCurve::LogNormal {
            mu: 1.6.into(),
            sigma: 0.9.into(),
        },
        StateValues::new(5200.0, 2100.0),
        StateValues::new(0.78, 0.52),
        20.0,
    );
    let params = ParameterSet::default();

    c.bench_function("psm_20yr_monthly", |b| {
        b.iter(|| model.evaluate(black_box(&params)))
    });
}

fn bench_psa(c: &mut Criterion) {
    let mut group = c.benchmark_group("psa");
    let params = create_params();
    let usual = create_markov(40, None);
    let treated = create_markov(40, Some(0.7));
    let comparison = Comparison::new(&treated, &usual);

    for iterations in [100, 500, 1000].iter() {
        let config = PsaConfig::default()
            .with_iterations(*iterations)
            .with_seed(42);
        group.bench_with_input(
            BenchmarkId::new("iterations", iterations),
            iterations,
            |b, _| {
                b.iter(|| {
                    run_psa(
                        black_box(&params),
                        &comparison,
                        black_box(&config),
                        50_000.0,
                        None,
                    )
                })
            },
        );
    }

    group.finish();
}

fn bench_dsa(c: &mut Criterion) {
    let params = create_params();
    let usual = create_markov(40, None);
    let treated = create_markov(40, Some(0.7));
    let comparison = Comparison::new(&treated, &usual);
    let config = DsaConfig::default();

    c.bench_function("dsa_tornado", |b| {
        b.iter(|| run_dsa(black_box(&params), &comparison, black_box(&config), 50_000.0, None))
    });
}

criterion_group!(
    benches,
    bench_markov_horizons,
    bench_partitioned_survival,
    bench_psa,
    bench_dsa,
);
criterion_main!(benches);
