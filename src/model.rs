//! Model traits shared by the trainer and the evaluation helpers.

use crate::{Inputs, Result};

/// A model trained with supervision, one mini-batch at a time.
pub trait Model {
    /// Per-sample training target: a class index or a target row.
    type Target: Clone;
    /// What `predict` returns for one sample.
    type Output;

    fn input_dim(&self) -> usize;

    /// Learning rate used when the caller does not pick one.
    fn default_learning_rate(&self) -> f32;

    /// One training step over the whole batch. Returns the cost before the update.
    fn fit_batch(&mut self, inputs: &Inputs, targets: &[Self::Target], lr: f32) -> Result<f32>;

    fn predict(&self, input: &[f32]) -> Result<Self::Output>;
}

/// A model that can learn from unlabeled inputs.
pub trait Unsupervised {
    fn input_dim(&self) -> usize;

    /// Train on unlabeled inputs using the model's own schedule. Returns the last cost.
    fn fit_unlabeled(&mut self, inputs: &Inputs) -> Result<f32>;

    /// Learned representation of one input.
    fn transform(&self, input: &[f32]) -> Result<Vec<f32>>;
}
