use criterion::{Criterion, black_box, criterion_group, criterion_main};

use feap::{Inputs, Sda, SdaConfig};

fn bench_model() -> (Sda, Inputs, Vec<usize>) {
    let sda = Sda::new(SdaConfig {
        input_dim: 128,
        hidden_sizes: vec![256, 128],
        n_classes: 10,
        corruption_levels: vec![0.1, 0.1],
        ..SdaConfig::default()
    })
    .unwrap();
    let rows: Vec<Vec<f32>> = (0..32)
        .map(|i| (0..128).map(|j| ((i * 7 + j) % 3) as f32 * 0.5).collect())
        .collect();
    let labels = (0..32).map(|i| i % 10).collect();
    (sda, Inputs::from_rows(&rows).unwrap(), labels)
}

fn sda_pretrain_bench(c: &mut Criterion) {
    let (mut sda, inputs, _) = bench_model();
    c.bench_function("sda_train_unsupervised_128_256_128_b32", |b| {
        b.iter(|| {
            let cost = sda.train_unsupervised(black_box(&inputs), 1e-3).unwrap();
            black_box(cost);
        })
    });
}

fn sda_finetune_bench(c: &mut Criterion) {
    let (mut sda, inputs, labels) = bench_model();
    c.bench_function("sda_finetune_128_256_128_10_b32", |b| {
        b.iter(|| {
            let cost = sda.finetune_step(black_box(&inputs), &labels, 1e-3).unwrap();
            black_box(cost);
        })
    });
}

fn sda_transform_bench(c: &mut Criterion) {
    let (sda, inputs, _) = bench_model();
    c.bench_function("sda_transform_128_256_128", |b| {
        b.iter(|| {
            let code = sda.transform(black_box(inputs.row(0))).unwrap();
            black_box(code);
        })
    });
}

criterion_group!(benches, sda_pretrain_bench, sda_finetune_bench, sda_transform_bench);
criterion_main!(benches);
