use log::debug;

use crate::dae::validate_lr;
use crate::error::check_len;
use crate::{Error, Inputs, Model, Result, Unsupervised};

/// Incremental mini-batch trainer.
///
/// Samples arrive one at a time. Once `batch_size` of them are buffered the wrapped
/// model trains on the whole batch and the buffer starts over:
///
/// ```rust
/// use feap::{LinearRegression, Trainer};
///
/// # fn main() -> feap::Result<()> {
/// let mut trainer = Trainer::new(LinearRegression::new(2, 1)?, 2)?;
/// assert_eq!(trainer.train(&[0.0, 1.0], vec![1.0])?, None);
/// assert!(trainer.train(&[1.0, 0.0], vec![2.0])?.is_some());
/// # Ok(())
/// # }
/// ```
///
/// `T` is the per-sample target type: `M::Target` for trainers built with
/// [`Trainer::new`], `()` for purely unsupervised models built with
/// [`Trainer::unlabeled`].
#[derive(Debug, Clone)]
pub struct Trainer<M, T> {
    model: M,
    batch_size: usize,
    /// `None` means the model's default learning rate.
    learning_rate: Option<f32>,
    inputs: Inputs,
    targets: Vec<T>,
    batches: usize,
}

impl<M: Model> Trainer<M, M::Target> {
    pub fn new(model: M, batch_size: usize) -> Result<Self> {
        let input_dim = model.input_dim();
        Self::with_input_dim(model, input_dim, batch_size)
    }

    /// Learning rate passed to `fit_batch`.
    #[inline]
    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
            .unwrap_or_else(|| self.model.default_learning_rate())
    }

    /// Buffer one labeled sample; returns the batch cost when a batch completes.
    pub fn train(&mut self, input: &[f32], target: M::Target) -> Result<Option<f32>> {
        check_len("input", input.len(), self.model.input_dim())?;
        if self.targets.len() != self.inputs.len() {
            return Err(Error::InvalidData(
                "trainer buffer holds unlabeled samples; flush them first".to_owned(),
            ));
        }
        self.inputs.push(input)?;
        self.targets.push(target);

        if self.inputs.len() < self.batch_size {
            return Ok(None);
        }
        self.run_labeled().map(Some)
    }

    /// Train on whatever is buffered, even if the batch is not full.
    pub fn flush(&mut self) -> Result<Option<f32>> {
        if self.inputs.is_empty() {
            return Ok(None);
        }
        if self.targets.len() != self.inputs.len() {
            return Err(Error::InvalidData(
                "trainer buffer holds unlabeled samples".to_owned(),
            ));
        }
        self.run_labeled().map(Some)
    }

    fn run_labeled(&mut self) -> Result<f32> {
        let lr = self.learning_rate();
        let result = self.model.fit_batch(&self.inputs, &self.targets, lr);
        let n = self.inputs.len();
        self.inputs.clear();
        self.targets.clear();

        let cost = result?;
        self.batches += 1;
        debug!("batch {} ({n} samples): cost {cost}", self.batches);
        Ok(cost)
    }
}

impl<M: Unsupervised> Trainer<M, ()> {
    /// Trainer for a model that only learns from unlabeled samples.
    pub fn unlabeled(model: M, batch_size: usize) -> Result<Self> {
        let input_dim = model.input_dim();
        Self::with_input_dim(model, input_dim, batch_size)
    }
}

impl<M, T> Trainer<M, T> {
    fn with_input_dim(model: M, input_dim: usize, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be > 0".to_owned()));
        }
        Ok(Self {
            model,
            batch_size,
            learning_rate: None,
            inputs: Inputs::with_capacity(input_dim, batch_size)?,
            targets: Vec::with_capacity(batch_size),
            batches: 0,
        })
    }

    /// Override the model's default learning rate for labeled batches.
    pub fn with_learning_rate(mut self, lr: f32) -> Result<Self> {
        self.set_learning_rate(lr)?;
        Ok(self)
    }

    pub fn set_learning_rate(&mut self, lr: f32) -> Result<()> {
        validate_lr(lr)?;
        self.learning_rate = Some(lr);
        Ok(())
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Samples waiting for the next batch.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.inputs.len()
    }

    /// Batches trained so far.
    #[inline]
    pub fn batches(&self) -> usize {
        self.batches
    }

    #[inline]
    pub fn model(&self) -> &M {
        &self.model
    }

    #[inline]
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_inner(self) -> M {
        self.model
    }
}

impl<M: Unsupervised, T> Trainer<M, T> {
    /// Buffer one unlabeled sample; returns the cost when a batch completes.
    pub fn train_unlabeled(&mut self, input: &[f32]) -> Result<Option<f32>> {
        check_len("input", input.len(), Unsupervised::input_dim(&self.model))?;
        if !self.targets.is_empty() {
            return Err(Error::InvalidData(
                "trainer buffer holds labeled samples; flush them first".to_owned(),
            ));
        }
        self.inputs.push(input)?;

        if self.inputs.len() < self.batch_size {
            return Ok(None);
        }
        self.run_unlabeled().map(Some)
    }

    /// Train on buffered unlabeled samples, even if the batch is not full.
    pub fn flush_unlabeled(&mut self) -> Result<Option<f32>> {
        if self.inputs.is_empty() {
            return Ok(None);
        }
        if !self.targets.is_empty() {
            return Err(Error::InvalidData(
                "trainer buffer holds labeled samples".to_owned(),
            ));
        }
        self.run_unlabeled().map(Some)
    }

    fn run_unlabeled(&mut self) -> Result<f32> {
        let result = self.model.fit_unlabeled(&self.inputs);
        let n = self.inputs.len();
        self.inputs.clear();

        let cost = result?;
        self.batches += 1;
        debug!("unlabeled batch {} ({n} samples): cost {cost}", self.batches);
        Ok(cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{DenoisingAutoencoder, LogisticRegression, Sda, SdaConfig};

    #[test]
    fn returns_cost_only_when_batch_is_full() {
        let model = LogisticRegression::new(2, 2).unwrap();
        let mut trainer = Trainer::new(model, 3).unwrap();
        assert_eq!(trainer.learning_rate(), 0.13);

        assert_eq!(trainer.train(&[0.0, 1.0], 0).unwrap(), None);
        assert_eq!(trainer.train(&[1.0, 0.0], 1).unwrap(), None);
        assert_eq!(trainer.buffered(), 2);

        let cost = trainer.train(&[1.0, 1.0], 1).unwrap();
        // Zero-initialized 2-class model: NLL = ln 2.
        assert!((cost.unwrap() - std::f32::consts::LN_2).abs() < 1e-5);
        assert_eq!(trainer.buffered(), 0);
        assert_eq!(trainer.batches(), 1);
    }

    #[test]
    fn rejects_bad_settings_and_inputs() {
        assert!(Trainer::new(LogisticRegression::new(2, 2).unwrap(), 0).is_err());

        let mut trainer = Trainer::new(LogisticRegression::new(2, 2).unwrap(), 2).unwrap();
        assert!(trainer.train(&[0.0], 0).is_err());
        assert_eq!(trainer.buffered(), 0);
        assert!(trainer.set_learning_rate(f32::NAN).is_err());
    }

    #[test]
    fn failed_batch_clears_the_buffer() {
        let mut trainer = Trainer::new(LogisticRegression::new(2, 2).unwrap(), 2).unwrap();
        trainer.train(&[0.0, 1.0], 0).unwrap();
        assert!(trainer.train(&[0.0, 1.0], 7).is_err());
        assert_eq!(trainer.buffered(), 0);
        assert_eq!(trainer.batches(), 0);
    }

    #[test]
    fn flush_trains_partial_batches() {
        let mut trainer = Trainer::new(LogisticRegression::new(2, 2).unwrap(), 10).unwrap();
        assert_eq!(trainer.flush().unwrap(), None);
        trainer.train(&[0.0, 1.0], 0).unwrap();
        assert!(trainer.flush().unwrap().is_some());
        assert_eq!(trainer.buffered(), 0);
    }

    #[test]
    fn unlabeled_and_labeled_samples_do_not_mix() {
        let cfg = SdaConfig {
            input_dim: 4,
            hidden_sizes: vec![3],
            n_classes: 2,
            corruption_levels: vec![0.1],
            pretrain_epochs: 2,
            ..SdaConfig::default()
        };
        let mut trainer = Trainer::new(Sda::new(cfg).unwrap(), 2).unwrap();

        trainer.train_unlabeled(&[1.0, 0.0, 1.0, 0.0]).unwrap();
        assert!(trainer.train(&[1.0, 0.0, 1.0, 0.0], 1).is_err());
        let cost = trainer.train_unlabeled(&[0.0, 1.0, 0.0, 1.0]).unwrap();
        assert!(cost.is_some_and(f32::is_finite));

        trainer.train(&[1.0, 0.0, 1.0, 0.0], 1).unwrap();
        assert!(trainer.train_unlabeled(&[1.0, 0.0, 1.0, 0.0]).is_err());
        assert!(trainer.flush().unwrap().is_some());
    }

    #[test]
    fn flush_unlabeled_trains_partial_batches() {
        let cfg = SdaConfig {
            input_dim: 4,
            hidden_sizes: vec![3],
            n_classes: 2,
            corruption_levels: vec![0.1],
            pretrain_epochs: 1,
            ..SdaConfig::default()
        };
        let mut trainer = Trainer::new(Sda::new(cfg).unwrap(), 5).unwrap();
        assert_eq!(trainer.flush_unlabeled().unwrap(), None);

        trainer.train_unlabeled(&[1.0, 0.0, 1.0, 0.0]).unwrap();
        trainer.train_unlabeled(&[0.0, 1.0, 0.0, 1.0]).unwrap();
        assert_eq!(trainer.buffered(), 2);
        assert!(trainer.flush().is_err());

        let cost = trainer.flush_unlabeled().unwrap();
        assert!(cost.is_some_and(f32::is_finite));
        assert_eq!(trainer.buffered(), 0);
        assert_eq!(trainer.batches(), 1);

        trainer.train(&[1.0, 0.0, 1.0, 0.0], 0).unwrap();
        assert!(trainer.flush_unlabeled().is_err());
    }

    #[test]
    fn standalone_autoencoder_trains_through_trainer() {
        let dae = DenoisingAutoencoder::new(4, 2, 0.1, 3)
            .unwrap()
            .with_learning_rate(0.5)
            .unwrap();
        let before = dae.encoder().clone();
        let mut trainer = Trainer::unlabeled(dae, 2).unwrap();
        assert!(Trainer::unlabeled(DenoisingAutoencoder::new(4, 2, 0.1, 3).unwrap(), 0).is_err());

        assert!(trainer.train_unlabeled(&[0.0; 3]).is_err());
        assert_eq!(trainer.train_unlabeled(&[1.0, 1.0, 0.0, 0.0]).unwrap(), None);
        let cost = trainer.train_unlabeled(&[0.0, 0.0, 1.0, 1.0]).unwrap();
        assert!(cost.is_some_and(f32::is_finite));

        trainer.train_unlabeled(&[1.0, 0.0, 0.0, 1.0]).unwrap();
        assert!(trainer.flush_unlabeled().unwrap().is_some());
        assert_eq!(trainer.batches(), 2);

        let dae = trainer.into_inner();
        assert_ne!(dae.encoder(), &before);
    }
}
