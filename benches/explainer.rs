use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

use kernelshap::prelude::*;

struct SumModel;

impl PredictionProvider for SumModel {
    async fn predict_batch(&self, inputs: &[PredictionInput]) -> Result<Vec<PredictionOutput>> {
        Ok(inputs
            .iter()
            .map(|input| {
                let v: f64 = input
                    .features
                    .iter()
                    .filter_map(|f| f.value().as_number())
                    .sum();
                PredictionOutput::new(vec![Output::number("out", v)])
            })
            .collect())
    }
}

fn random_input(rng: &mut Xoshiro256PlusPlus, n_features: usize) -> PredictionInput {
    PredictionInput::new(
        (0..n_features)
            .map(|i| Feature::number(format!("feature_{i}"), rng.gen::<f64>() * 10.0))
            .collect(),
    )
}

fn bench_explain(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .build()
        .unwrap();
    let mut group = c.benchmark_group("explain");
    group.sample_size(10);

    for n_features in [8, 16, 32].iter() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let background: Vec<PredictionInput> =
            (0..20).map(|_| random_input(&mut rng, *n_features)).collect();
        let instance = random_input(&mut rng, *n_features);

        let config = ShapConfig::new(background)
            .unwrap()
            .with_seed(42)
            .with_n_samples(512);
        let explainer = ShapKernelExplainer::new(config);
        let prediction = runtime.block_on(async {
            let outputs = SumModel
                .predict_batch(std::slice::from_ref(&instance))
                .await
                .unwrap();
            Prediction::new(instance.clone(), outputs.into_iter().next().unwrap())
        });

        group.bench_with_input(
            BenchmarkId::new("features", n_features),
            &prediction,
            |b, prediction| {
                b.iter(|| {
                    runtime
                        .block_on(explainer.explain(black_box(prediction), &SumModel))
                        .unwrap()
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_explain);
criterion_main!(benches);
