//! `feap` demo: train a model on a synthetic problem one sample at a time and write
//! the per-batch training cost / validation error curve as CSV.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use feap::{
    Dataset, ErrorCurve, Inputs, LinearRegression, LogisticRegression, Model, Sda, SdaConfig,
    Trainer, classification_error, mean_squared_error,
};

#[derive(Parser, Debug)]
#[command(name = "feap", about = "Incremental training demos with validation curves")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Softmax regression on argmax(W x + noise) labels
    Logistic(RunArgs),
    /// Linear regression on W x + noise targets
    Linear(RunArgs),
    /// Stacked denoising autoencoder on noisy binary prototypes
    Sda(SdaArgs),
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Total number of generated samples (the last `valid` are held out)
    #[arg(long, default_value_t = 10_000)]
    samples: usize,

    /// Held-out validation samples
    #[arg(long, default_value_t = 500)]
    valid: usize,

    #[arg(long, default_value_t = 100)]
    batch_size: usize,

    /// Learning rate; defaults to the model's own
    #[arg(long)]
    lr: Option<f32>,

    #[arg(long, default_value_t = 12_345)]
    seed: u64,

    /// CSV output path (stdout if omitted)
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct SdaArgs {
    #[command(flatten)]
    run: RunArgs,

    /// Hidden layer sizes, bottom to top
    #[arg(long, value_delimiter = ',', default_value = "24,12")]
    hidden: Vec<usize>,

    /// Corruption level applied at every layer
    #[arg(long, default_value_t = 0.1)]
    corruption: f32,

    /// Greedy pretraining epochs over the training split before fine-tuning
    #[arg(long, default_value_t = 5)]
    pretrain_epochs: usize,

    /// Learning rate of the greedy pretraining stage (`--lr` only sets fine-tuning)
    #[arg(long, default_value_t = 0.1)]
    pretrain_lr: f32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let (curve, out) = match cli.command {
        Command::Logistic(args) => (run_logistic(&args)?, args.out),
        Command::Linear(args) => (run_linear(&args)?, args.out),
        Command::Sda(args) => (run_sda(&args)?, args.run.out.clone()),
    };

    if let Some((batch, err)) = curve.best_valid() {
        info!("best validation error {err} after batch {}", batch + 1);
    }

    match out {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            curve.write_csv(BufWriter::new(file))?;
            info!("wrote {} rows to {}", curve.len(), path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            curve.write_csv(&mut lock)?;
            lock.flush()?;
        }
    }
    Ok(())
}

fn run_logistic(args: &RunArgs) -> Result<ErrorCurve> {
    let (n_in, n_out) = (20, 3);
    let mut rng = StdRng::seed_from_u64(args.seed);
    let w = gaussian(&mut rng, n_out * n_in, 1.0);

    let mut rows = Vec::with_capacity(args.samples);
    let mut labels = Vec::with_capacity(args.samples);
    for _ in 0..args.samples {
        let x = gaussian(&mut rng, n_in, 1.0);
        let scores: Vec<f32> = (0..n_out)
            .map(|o| dot(&w[o * n_in..(o + 1) * n_in], &x) + rng.sample::<f32, _>(StandardNormal))
            .collect();
        labels.push(argmax(&scores));
        rows.push(x);
    }

    let data = Dataset::new(Inputs::from_rows(&rows)?, labels)?;
    let model = LogisticRegression::new(n_in, n_out)?;
    train_incrementally(model, data, args, classification_error)
}

fn run_linear(args: &RunArgs) -> Result<ErrorCurve> {
    let (n_in, n_out) = (20, 10);
    let mut rng = StdRng::seed_from_u64(args.seed);
    let w = gaussian(&mut rng, n_out * n_in, 1.0);

    let mut rows = Vec::with_capacity(args.samples);
    let mut targets = Vec::with_capacity(args.samples);
    for _ in 0..args.samples {
        let x = gaussian(&mut rng, n_in, 1.0);
        let noise = gaussian(&mut rng, n_out, 0.1);
        let y: Vec<f32> = (0..n_out)
            .map(|o| dot(&w[o * n_in..(o + 1) * n_in], &x) + noise[o])
            .collect();
        rows.push(x);
        targets.push(y);
    }

    let data = Dataset::new(Inputs::from_rows(&rows)?, targets)?;
    let model = LinearRegression::new(n_in, n_out)?;
    train_incrementally(model, data, args, mean_squared_error)
}

fn run_sda(args: &SdaArgs) -> Result<ErrorCurve> {
    let (n_in, n_classes, flip) = (32, 4, 0.1);
    let mut rng = StdRng::seed_from_u64(args.run.seed);
    let prototypes: Vec<Vec<f32>> = (0..n_classes)
        .map(|_| (0..n_in).map(|_| if rng.gen_bool(0.5) { 1.0 } else { 0.0 }).collect())
        .collect();

    let mut rows = Vec::with_capacity(args.run.samples);
    let mut labels = Vec::with_capacity(args.run.samples);
    for _ in 0..args.run.samples {
        let class = rng.gen_range(0..n_classes);
        let row: Vec<f32> = prototypes[class]
            .iter()
            .map(|&v| if rng.gen_bool(flip) { 1.0 - v } else { v })
            .collect();
        rows.push(row);
        labels.push(class);
    }
    let data = Dataset::new(Inputs::from_rows(&rows)?, labels)?;

    let config = SdaConfig {
        input_dim: n_in,
        corruption_levels: vec![args.corruption; args.hidden.len()],
        hidden_sizes: args.hidden.clone(),
        n_classes,
        seed: args.run.seed,
        ..SdaConfig::default()
    };
    let mut model = Sda::new(config)?;

    let n_train = train_len(data.len(), args.run.valid)?;
    let history = model.pretrain(
        &Inputs::from_flat(
            data.inputs().rows(0, n_train).to_vec(),
            data.input_dim(),
        )?,
        args.run.batch_size,
        args.pretrain_epochs,
        args.pretrain_lr,
    )?;
    for (i, costs) in history.iter().enumerate() {
        if let Some(last) = costs.last() {
            info!("layer {i} final reconstruction cost {last}");
        }
    }

    train_incrementally(model, data, &args.run, classification_error)
}

/// Feed the training split through a `Trainer` one sample at a time and evaluate the
/// held-out tail after every completed batch.
fn train_incrementally<M, F>(
    model: M,
    data: Dataset<M::Target>,
    args: &RunArgs,
    validate: F,
) -> Result<ErrorCurve>
where
    M: Model,
    F: Fn(&M, &Dataset<M::Target>) -> feap::Result<f32>,
{
    let n_train = train_len(data.len(), args.valid)?;
    let (train, valid) = data.split_at(n_train)?;

    let mut trainer = Trainer::new(model, args.batch_size)?;
    if let Some(lr) = args.lr {
        trainer.set_learning_rate(lr)?;
    }
    info!(
        "training on {} samples, validating on {}, batch size {}, lr {}",
        train.len(),
        valid.len(),
        trainer.batch_size(),
        trainer.learning_rate()
    );

    let mut curve = ErrorCurve::new();
    for idx in 0..train.len() {
        if let Some(cost) = trainer.train(train.input(idx), train.target(idx).clone())? {
            let err = validate(trainer.model(), &valid)?;
            curve.push(cost, err);
        }
    }

    let leftover = trainer.buffered();
    if let Some(cost) = trainer.flush()? {
        info!("trained final partial batch of {leftover} samples");
        let err = validate(trainer.model(), &valid)?;
        curve.push(cost, err);
    }
    Ok(curve)
}

fn train_len(samples: usize, valid: usize) -> Result<usize> {
    if valid == 0 || valid >= samples {
        anyhow::bail!("need 0 < valid ({valid}) < samples ({samples})");
    }
    Ok(samples - valid)
}

fn gaussian<R: Rng>(rng: &mut R, len: usize, scale: f32) -> Vec<f32> {
    (0..len)
        .map(|_| scale * rng.sample::<f32, _>(StandardNormal))
        .collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map_or(0, |(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(samples: usize, valid: usize, batch_size: usize) -> RunArgs {
        RunArgs {
            samples,
            valid,
            batch_size,
            lr: None,
            seed: 1,
            out: None,
        }
    }

    #[test]
    fn trailing_partial_batch_is_trained_and_recorded() {
        let rows: Vec<Vec<f32>> = (0..25).map(|i| vec![(i % 2) as f32, 1.0]).collect();
        let labels: Vec<usize> = (0..25).map(|i| i % 2).collect();
        let data = Dataset::new(Inputs::from_rows(&rows).unwrap(), labels).unwrap();

        // 20 training samples in batches of 8: two full batches plus one of 4.
        let model = LogisticRegression::new(2, 2).unwrap();
        let curve =
            train_incrementally(model, data, &run_args(25, 5, 8), classification_error).unwrap();
        assert_eq!(curve.len(), 3);
    }

    #[test]
    fn sda_pretraining_rate_is_its_own_flag() {
        let cli = Cli::try_parse_from(["feap", "sda", "--lr", "0.3", "--pretrain-lr", "0.05"])
            .unwrap();
        let Command::Sda(args) = cli.command else {
            panic!("expected the sda subcommand");
        };
        assert_eq!(args.run.lr, Some(0.3));
        assert_eq!(args.pretrain_lr, 0.05);

        let cli = Cli::try_parse_from(["feap", "sda"]).unwrap();
        let Command::Sda(args) = cli.command else {
            panic!("expected the sda subcommand");
        };
        assert_eq!(args.run.lr, None);
        assert_eq!(args.pretrain_lr, 0.1);
    }
}
