//! Output layers: softmax (logistic) regression and linear regression.
//!
//! Both are affine maps `W x + b` with zero-initialized parameters, stored as an
//! identity-activation [`HiddenLayer`] so they share the batched forward/backward code.

use log::trace;

use crate::activation::{Activation, argmax, softmax_rows};
use crate::dae::validate_lr;
use crate::error::check_len;
use crate::{Error, HiddenLayer, Inputs, Model, Result};

const PROB_FLOOR: f32 = 1e-12;

/// Multiclass logistic regression `p(y | x) = softmax(W x + b)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticRegression {
    affine: HiddenLayer,
}

impl LogisticRegression {
    pub fn new(in_dim: usize, n_classes: usize) -> Result<Self> {
        let affine = HiddenLayer::from_parts(
            in_dim,
            n_classes,
            Activation::Identity,
            vec![0.0; in_dim * n_classes],
            vec![0.0; n_classes],
        )?;
        Ok(Self { affine })
    }

    pub fn from_layer(affine: HiddenLayer) -> Result<Self> {
        if affine.activation() != Activation::Identity {
            return Err(Error::InvalidConfig(
                "logistic regression layer must use the identity activation".to_owned(),
            ));
        }
        Ok(Self { affine })
    }

    #[inline]
    pub fn in_dim(&self) -> usize {
        self.affine.in_dim()
    }

    #[inline]
    pub fn n_classes(&self) -> usize {
        self.affine.out_dim()
    }

    #[inline]
    pub fn layer(&self) -> &HiddenLayer {
        &self.affine
    }

    #[inline]
    pub fn layer_mut(&mut self) -> &mut HiddenLayer {
        &mut self.affine
    }

    /// Softmax class probabilities for one input.
    pub fn class_probabilities(&self, input: &[f32]) -> Result<Vec<f32>> {
        check_len("input", input.len(), self.in_dim())?;
        let mut probs = vec![0.0; self.n_classes()];
        self.probabilities_batch(input, 1, &mut probs);
        Ok(probs)
    }

    /// Mean negative log likelihood of `labels`.
    pub fn negative_log_likelihood(&self, inputs: &Inputs, labels: &[usize]) -> Result<f32> {
        self.check_batch(inputs, labels)?;
        let n = inputs.len();
        let mut probs = vec![0.0; n * self.n_classes()];
        self.probabilities_batch(inputs.as_flat(), n, &mut probs);
        Ok(nll(&probs, labels, self.n_classes()))
    }

    /// Fraction of `inputs` whose predicted class differs from `labels`.
    pub fn errors(&self, inputs: &Inputs, labels: &[usize]) -> Result<f32> {
        self.check_batch(inputs, labels)?;
        let n = inputs.len();
        let k = self.n_classes();
        let mut probs = vec![0.0; n * k];
        self.probabilities_batch(inputs.as_flat(), n, &mut probs);
        Ok(error_rate(&probs, labels, k))
    }

    pub(crate) fn probabilities_batch(&self, inputs: &[f32], n: usize, out: &mut [f32]) {
        self.affine.forward_batch(inputs, n, out);
        softmax_rows(out, self.n_classes());
    }

    /// Backprop of the mean NLL through the softmax and affine map.
    ///
    /// `probs` holds the output of `probabilities_batch` and is overwritten with
    /// `dL/d(logits)`. Returns the cost.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn backward_batch(
        &self,
        inputs: &[f32],
        probs: &mut [f32],
        labels: &[usize],
        n: usize,
        d_inputs: Option<&mut [f32]>,
        d_weights: &mut [f32],
        d_biases: &mut [f32],
    ) -> f32 {
        let k = self.n_classes();
        let cost = nll(probs, labels, k);

        let inv_n = 1.0 / n as f32;
        for (row, &y) in probs.chunks_exact_mut(k).zip(labels) {
            row[y] -= 1.0;
            for v in row.iter_mut() {
                *v *= inv_n;
            }
        }

        self.affine
            .backward_pre_activation(inputs, n, probs, d_inputs, d_weights, d_biases);
        cost
    }

    pub(crate) fn check_batch(&self, inputs: &Inputs, labels: &[usize]) -> Result<()> {
        if inputs.is_empty() {
            return Err(Error::InvalidData("inputs must not be empty".to_owned()));
        }
        check_len("input row", inputs.input_dim(), self.in_dim())?;
        check_labels(labels, inputs.len(), self.n_classes())
    }
}

impl Model for LogisticRegression {
    type Target = usize;
    type Output = usize;

    fn input_dim(&self) -> usize {
        self.in_dim()
    }

    fn default_learning_rate(&self) -> f32 {
        0.13
    }

    fn fit_batch(&mut self, inputs: &Inputs, labels: &[usize], lr: f32) -> Result<f32> {
        validate_lr(lr)?;
        self.check_batch(inputs, labels)?;

        let n = inputs.len();
        let mut probs = vec![0.0; n * self.n_classes()];
        self.probabilities_batch(inputs.as_flat(), n, &mut probs);

        let mut d_weights = vec![0.0; self.affine.weights().len()];
        let mut d_biases = vec![0.0; self.n_classes()];
        let cost = self.backward_batch(
            inputs.as_flat(),
            &mut probs,
            labels,
            n,
            None,
            &mut d_weights,
            &mut d_biases,
        );
        self.affine.sgd_step(&d_weights, &d_biases, lr);

        trace!("logistic regression step: n={n} cost={cost}");
        Ok(cost)
    }

    fn predict(&self, input: &[f32]) -> Result<usize> {
        Ok(argmax(&self.class_probabilities(input)?))
    }
}

/// Linear regression `y = W x + b` trained on half the summed squared error.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRegression {
    affine: HiddenLayer,
}

impl LinearRegression {
    pub fn new(in_dim: usize, out_dim: usize) -> Result<Self> {
        let affine = HiddenLayer::from_parts(
            in_dim,
            out_dim,
            Activation::Identity,
            vec![0.0; in_dim * out_dim],
            vec![0.0; out_dim],
        )?;
        Ok(Self { affine })
    }

    pub fn from_layer(affine: HiddenLayer) -> Result<Self> {
        if affine.activation() != Activation::Identity {
            return Err(Error::InvalidConfig(
                "linear regression layer must use the identity activation".to_owned(),
            ));
        }
        Ok(Self { affine })
    }

    #[inline]
    pub fn in_dim(&self) -> usize {
        self.affine.in_dim()
    }

    #[inline]
    pub fn out_dim(&self) -> usize {
        self.affine.out_dim()
    }

    #[inline]
    pub fn layer(&self) -> &HiddenLayer {
        &self.affine
    }

    /// Mean over samples of `0.5 * ||W x + b - y||^2`.
    pub fn cost(&self, inputs: &Inputs, targets: &[Vec<f32>]) -> Result<f32> {
        let flat_targets = self.check_batch(inputs, targets)?;
        let n = inputs.len();
        let mut preds = vec![0.0; n * self.out_dim()];
        self.affine.forward_batch(inputs.as_flat(), n, &mut preds);
        Ok(half_squared_error(&preds, &flat_targets, n))
    }

    fn check_batch(&self, inputs: &Inputs, targets: &[Vec<f32>]) -> Result<Vec<f32>> {
        if inputs.is_empty() {
            return Err(Error::InvalidData("inputs must not be empty".to_owned()));
        }
        check_len("input row", inputs.input_dim(), self.in_dim())?;
        check_len("targets", targets.len(), inputs.len())?;

        let mut flat = Vec::with_capacity(targets.len() * self.out_dim());
        for t in targets {
            check_len("target row", t.len(), self.out_dim())?;
            flat.extend_from_slice(t);
        }
        Ok(flat)
    }
}

impl Model for LinearRegression {
    type Target = Vec<f32>;
    type Output = Vec<f32>;

    fn input_dim(&self) -> usize {
        self.in_dim()
    }

    fn default_learning_rate(&self) -> f32 {
        0.1
    }

    fn fit_batch(&mut self, inputs: &Inputs, targets: &[Vec<f32>], lr: f32) -> Result<f32> {
        validate_lr(lr)?;
        let flat_targets = self.check_batch(inputs, targets)?;

        let n = inputs.len();
        let mut preds = vec![0.0; n * self.out_dim()];
        self.affine.forward_batch(inputs.as_flat(), n, &mut preds);
        let cost = half_squared_error(&preds, &flat_targets, n);

        let inv_n = 1.0 / n as f32;
        let d_preds: Vec<f32> = preds
            .iter()
            .zip(&flat_targets)
            .map(|(p, t)| (p - t) * inv_n)
            .collect();

        let mut d_weights = vec![0.0; self.affine.weights().len()];
        let mut d_biases = vec![0.0; self.out_dim()];
        self.affine.backward_pre_activation(
            inputs.as_flat(),
            n,
            &d_preds,
            None,
            &mut d_weights,
            &mut d_biases,
        );
        self.affine.sgd_step(&d_weights, &d_biases, lr);

        trace!("linear regression step: n={n} cost={cost}");
        Ok(cost)
    }

    fn predict(&self, input: &[f32]) -> Result<Vec<f32>> {
        check_len("input", input.len(), self.in_dim())?;
        let mut out = vec![0.0; self.out_dim()];
        self.affine.forward(input, &mut out);
        Ok(out)
    }
}

pub(crate) fn check_labels(labels: &[usize], n: usize, n_classes: usize) -> Result<()> {
    check_len("labels", labels.len(), n)?;
    if let Some((i, &y)) = labels.iter().enumerate().find(|(_, y)| **y >= n_classes) {
        return Err(Error::InvalidData(format!(
            "label {i} is {y}, expected < {n_classes}"
        )));
    }
    Ok(())
}

fn nll(probs: &[f32], labels: &[usize], k: usize) -> f32 {
    let mut sum = 0.0_f32;
    for (row, &y) in probs.chunks_exact(k).zip(labels) {
        sum -= row[y].max(PROB_FLOOR).ln();
    }
    sum / labels.len() as f32
}

pub(crate) fn error_rate(probs: &[f32], labels: &[usize], k: usize) -> f32 {
    let wrong = probs
        .chunks_exact(k)
        .zip(labels)
        .filter(|(row, y)| argmax(row) != **y)
        .count();
    wrong as f32 / labels.len() as f32
}

fn half_squared_error(preds: &[f32], targets: &[f32], n: usize) -> f32 {
    let mut sum = 0.0_f32;
    for (p, t) in preds.iter().zip(targets) {
        let diff = p - t;
        sum = diff.mul_add(diff, sum);
    }
    0.5 * sum / n as f32
}
