use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use feap::{
    Dataset, ErrorCurve, Inputs, LinearRegression, LogisticRegression, Sda, SdaConfig, Trainer,
    Unsupervised, classification_error, mean_squared_error,
};

fn gaussian(rng: &mut StdRng, len: usize, scale: f32) -> Vec<f32> {
    (0..len)
        .map(|_| scale * rng.sample::<f32, _>(StandardNormal))
        .collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn prototype_data(rng: &mut StdRng, n_in: usize, n_classes: usize, len: usize) -> Dataset<usize> {
    let prototypes: Vec<Vec<f32>> = (0..n_classes)
        .map(|_| (0..n_in).map(|_| if rng.gen_bool(0.5) { 1.0 } else { 0.0 }).collect())
        .collect();

    let mut rows: Vec<Vec<f32>> = Vec::with_capacity(len);
    let mut labels = Vec::with_capacity(len);
    for _ in 0..len {
        let class = rng.gen_range(0..n_classes);
        rows.push(
            prototypes[class]
                .iter()
                .map(|&v| if rng.gen_bool(0.05) { 1.0 - v } else { v })
                .collect(),
        );
        labels.push(class);
    }
    Dataset::new(Inputs::from_rows(&rows).unwrap(), labels).unwrap()
}

#[test]
fn linear_regression_validation_error_falls_to_noise_floor() {
    let (n_in, n_out, nsamps, nvalid) = (5, 3, 3000, 300);
    let mut rng = StdRng::seed_from_u64(12345);
    let w = gaussian(&mut rng, n_out * n_in, 1.0);

    let mut rows = Vec::new();
    let mut targets: Vec<Vec<f32>> = Vec::new();
    for _ in 0..nsamps {
        let x = gaussian(&mut rng, n_in, 1.0);
        let noise = gaussian(&mut rng, n_out, 0.1);
        targets.push(
            (0..n_out)
                .map(|o| dot(&w[o * n_in..(o + 1) * n_in], &x) + noise[o])
                .collect::<Vec<f32>>(),
        );
        rows.push(x);
    }
    let data = Dataset::new(Inputs::from_rows(&rows).unwrap(), targets).unwrap();
    let (train, valid) = data.split_at(nsamps - nvalid).unwrap();

    let mut trainer = Trainer::new(LinearRegression::new(n_in, n_out).unwrap(), 50).unwrap();
    let mut curve = ErrorCurve::new();
    for k in 0..train.len() {
        if let Some(c) = trainer.train(train.input(k), train.target(k).clone()).unwrap() {
            curve.push(c, mean_squared_error(trainer.model(), &valid).unwrap());
        }
    }

    assert_eq!(curve.len(), train.len() / 50);
    let first = curve.valid[0];
    let last = *curve.valid.last().unwrap();
    assert!(last < first * 0.1, "first={first} last={last}");
    assert!(last < 0.1, "last={last}");
}

#[test]
fn logistic_regression_learns_noisy_argmax_labels() {
    let (n_in, n_out, nsamps, nvalid) = (10, 3, 4000, 500);
    let mut rng = StdRng::seed_from_u64(12345);
    let w = gaussian(&mut rng, n_out * n_in, 1.0);

    let mut rows = Vec::new();
    let mut labels = Vec::new();
    for _ in 0..nsamps {
        let x = gaussian(&mut rng, n_in, 1.0);
        let scores: Vec<f32> = (0..n_out)
            .map(|o| dot(&w[o * n_in..(o + 1) * n_in], &x) + rng.sample::<f32, _>(StandardNormal))
            .collect();
        let label = (0..n_out)
            .max_by(|&a, &b| scores[a].total_cmp(&scores[b]))
            .unwrap();
        labels.push(label);
        rows.push(x);
    }
    let data = Dataset::new(Inputs::from_rows(&rows).unwrap(), labels).unwrap();
    let (train, valid) = data.split_at(nsamps - nvalid).unwrap();

    let mut trainer = Trainer::new(LogisticRegression::new(n_in, n_out).unwrap(), 100).unwrap();
    let mut curve = ErrorCurve::new();
    for k in 0..train.len() {
        if let Some(c) = trainer.train(train.input(k), *train.target(k)).unwrap() {
            curve.push(c, classification_error(trainer.model(), &valid).unwrap());
        }
    }

    // Zero-initialized softmax over 3 classes starts at ln 3.
    assert!((curve.train[0] - 3.0_f32.ln()).abs() < 1e-5);
    assert!(*curve.train.last().unwrap() < 0.9);
    assert!(*curve.valid.last().unwrap() < 0.35);
}

#[test]
fn sda_pretrains_then_finetunes_on_binary_prototypes() {
    let mut rng = StdRng::seed_from_u64(7);
    let data = prototype_data(&mut rng, 16, 3, 900);
    let (train, valid) = data.split_at(750).unwrap();

    let mut sda = Sda::new(SdaConfig {
        input_dim: 16,
        hidden_sizes: vec![12, 6],
        n_classes: 3,
        corruption_levels: vec![0.1, 0.1],
        pretrain_epochs: 1,
        seed: 3,
        ..SdaConfig::default()
    })
    .unwrap();

    let history = sda.pretrain(train.inputs(), 25, 5, 0.1).unwrap();
    for costs in &history {
        assert!(costs.last().unwrap() < costs.first().unwrap(), "{costs:?}");
    }

    let mut trainer = Trainer::new(sda, 25).unwrap().with_learning_rate(0.5).unwrap();
    for _ in 0..20 {
        for k in 0..train.len() {
            trainer.train(train.input(k), *train.target(k)).unwrap();
        }
    }
    let err = classification_error(trainer.model(), &valid).unwrap();
    assert!(err < 0.2, "validation error {err}");

    let code = trainer.model().transform(valid.input(0)).unwrap();
    assert_eq!(code.len(), 6);
}

#[test]
fn unsupervised_trainer_batches_feed_sda_pretraining() {
    let mut rng = StdRng::seed_from_u64(11);
    let data = prototype_data(&mut rng, 8, 2, 40);

    let sda = Sda::new(SdaConfig {
        input_dim: 8,
        hidden_sizes: vec![4],
        n_classes: 2,
        corruption_levels: vec![0.2],
        pretrain_epochs: 20,
        pretrain_lr: 0.1,
        ..SdaConfig::default()
    })
    .unwrap();
    let before = sda.reconstruction_cost(0, data.inputs()).unwrap();

    let mut trainer = Trainer::new(sda, 10).unwrap();
    let mut costs = Vec::new();
    for row in data.inputs().iter() {
        if let Some(c) = trainer.train_unlabeled(row).unwrap() {
            costs.push(c);
        }
    }
    assert_eq!(costs.len(), 4);

    let sda = trainer.into_inner();
    let after = sda.reconstruction_cost(0, data.inputs()).unwrap();
    assert!(after < before, "before={before} after={after}");
    assert_eq!(Unsupervised::transform(&sda, data.input(0)).unwrap().len(), 4);
}
