//! Stacked autoencoder configuration.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dae::{validate_corruption_level, validate_lr};
use crate::{Error, Result};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct SdaConfig {
    pub input_dim: usize,
    pub hidden_sizes: Vec<usize>,
    pub n_classes: usize,
    /// One level per hidden layer.
    pub corruption_levels: Vec<f32>,
    /// Passes of `train_unsupervised` per unlabeled batch.
    pub pretrain_epochs: usize,
    pub pretrain_lr: f32,
    pub finetune_lr: f32,
    /// Run one pretraining step on every labeled batch before fine-tuning it.
    pub pretrain_while_finetuning: bool,
    /// Seed for weight init and input corruption.
    pub seed: u64,
}

impl Default for SdaConfig {
    fn default() -> Self {
        Self {
            input_dim: 784,
            hidden_sizes: vec![500, 500],
            n_classes: 10,
            corruption_levels: vec![0.1, 0.1],
            pretrain_epochs: 100,
            pretrain_lr: 1e-3,
            finetune_lr: 0.13,
            pretrain_while_finetuning: true,
            seed: 0,
        }
    }
}

impl SdaConfig {
    pub fn validate(&self) -> Result<()> {
        if self.input_dim == 0 {
            return Err(Error::InvalidConfig("input_dim must be > 0".to_owned()));
        }
        if self.hidden_sizes.is_empty() {
            return Err(Error::InvalidConfig(
                "sda needs at least one hidden layer".to_owned(),
            ));
        }
        if self.hidden_sizes.contains(&0) {
            return Err(Error::InvalidConfig(
                "all hidden sizes must be > 0".to_owned(),
            ));
        }
        if self.n_classes < 2 {
            return Err(Error::InvalidConfig(format!(
                "n_classes must be >= 2, got {}",
                self.n_classes
            )));
        }
        if self.corruption_levels.len() != self.hidden_sizes.len() {
            return Err(Error::InvalidConfig(format!(
                "corruption_levels length {} does not match hidden_sizes length {}",
                self.corruption_levels.len(),
                self.hidden_sizes.len()
            )));
        }
        for &level in &self.corruption_levels {
            validate_corruption_level(level)?;
        }
        if self.pretrain_epochs == 0 {
            return Err(Error::InvalidConfig(
                "pretrain_epochs must be > 0".to_owned(),
            ));
        }
        validate_lr(self.pretrain_lr)?;
        validate_lr(self.finetune_lr)?;
        Ok(())
    }

    /// Input width of hidden layer `i`.
    #[inline]
    pub(crate) fn layer_input_dim(&self, i: usize) -> usize {
        if i == 0 {
            self.input_dim
        } else {
            self.hidden_sizes[i - 1]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SdaConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_mismatched_or_degenerate_settings() {
        let base = SdaConfig::default();

        let cfg = SdaConfig {
            hidden_sizes: vec![],
            corruption_levels: vec![],
            ..base.clone()
        };
        assert!(cfg.validate().is_err());

        let cfg = SdaConfig {
            corruption_levels: vec![0.1],
            ..base.clone()
        };
        assert!(cfg.validate().is_err());

        let cfg = SdaConfig {
            corruption_levels: vec![0.1, 1.0],
            ..base.clone()
        };
        assert!(cfg.validate().is_err());

        let cfg = SdaConfig {
            finetune_lr: 0.0,
            ..base.clone()
        };
        assert!(cfg.validate().is_err());

        let cfg = SdaConfig {
            n_classes: 1,
            ..base
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn layer_input_dims_chain() {
        let cfg = SdaConfig {
            input_dim: 20,
            hidden_sizes: vec![8, 4],
            ..SdaConfig::default()
        };
        assert_eq!(cfg.layer_input_dim(0), 20);
        assert_eq!(cfg.layer_input_dim(1), 8);
    }
}
