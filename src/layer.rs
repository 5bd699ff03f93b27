use rand::Rng;
use rand::distributions::{Distribution, Uniform};

use crate::activation::Activation;
use crate::matmul::{add_row_bias, column_sums, matmul_nn, matmul_nt, matmul_tn};
use crate::{Error, Result};

/// Dense layer `y = activation(W x + b)`.
///
/// Inside a stacked autoencoder the same `HiddenLayer` doubles as the encoder of the
/// matching denoising autoencoder, so its `W`/`b` are updated by both pretraining and
/// fine-tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct HiddenLayer {
    in_dim: usize,
    out_dim: usize,
    activation: Activation,
    /// Row-major matrix with shape (out_dim, in_dim).
    weights: Vec<f32>,
    biases: Vec<f32>,
}

impl HiddenLayer {
    /// Random init: `W ~ U(-r, r)` with `r = gain * sqrt(6 / (in_dim + out_dim))`, `b = 0`.
    pub fn new_with_rng<R: Rng + ?Sized>(
        in_dim: usize,
        out_dim: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        if in_dim == 0 || out_dim == 0 {
            return Err(Error::InvalidConfig(format!(
                "layer dims must be > 0, got in_dim={in_dim} out_dim={out_dim}"
            )));
        }

        let range = activation.init_gain() * (6.0 / (in_dim + out_dim) as f32).sqrt();
        let dist = Uniform::new_inclusive(-range, range);
        let weights = (0..in_dim * out_dim).map(|_| dist.sample(rng)).collect();

        Ok(Self {
            in_dim,
            out_dim,
            activation,
            weights,
            biases: vec![0.0; out_dim],
        })
    }

    /// Build a layer from existing parameters.
    pub fn from_parts(
        in_dim: usize,
        out_dim: usize,
        activation: Activation,
        weights: Vec<f32>,
        biases: Vec<f32>,
    ) -> Result<Self> {
        if in_dim == 0 || out_dim == 0 {
            return Err(Error::InvalidConfig(format!(
                "layer dims must be > 0, got in_dim={in_dim} out_dim={out_dim}"
            )));
        }
        if weights.len() != in_dim * out_dim {
            return Err(Error::InvalidShape(format!(
                "weights length {} does not match out_dim * in_dim ({out_dim} * {in_dim})",
                weights.len()
            )));
        }
        if biases.len() != out_dim {
            return Err(Error::InvalidShape(format!(
                "biases length {} does not match out_dim {out_dim}",
                biases.len()
            )));
        }
        if weights.iter().chain(&biases).any(|v| !v.is_finite()) {
            return Err(Error::InvalidData(
                "layer parameters must be finite".to_owned(),
            ));
        }

        Ok(Self {
            in_dim,
            out_dim,
            activation,
            weights,
            biases,
        })
    }

    #[inline]
    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    #[inline]
    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    #[inline]
    pub fn activation(&self) -> Activation {
        self.activation
    }

    #[inline]
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    #[inline]
    pub fn biases(&self) -> &[f32] {
        &self.biases
    }

    #[inline]
    pub fn weights_mut(&mut self) -> &mut [f32] {
        &mut self.weights
    }

    #[inline]
    pub fn biases_mut(&mut self) -> &mut [f32] {
        &mut self.biases
    }

    /// Forward pass for a single sample.
    ///
    /// Shape contract:
    /// - `input.len() == self.in_dim`
    /// - `output.len() == self.out_dim`
    #[inline]
    pub fn forward(&self, input: &[f32], output: &mut [f32]) {
        assert_eq!(input.len(), self.in_dim, "input len does not match in_dim");
        assert_eq!(output.len(), self.out_dim, "output len does not match out_dim");

        for o in 0..self.out_dim {
            let row = &self.weights[o * self.in_dim..(o + 1) * self.in_dim];
            let mut sum = self.biases[o];
            for (w, x) in row.iter().zip(input) {
                sum = w.mul_add(*x, sum);
            }
            output[o] = self.activation.forward(sum);
        }
    }

    /// Forward pass for `n` samples stored row-major.
    ///
    /// - `inputs`: `(n, in_dim)`
    /// - `outputs`: `(n, out_dim)`, overwritten
    pub fn forward_batch(&self, inputs: &[f32], n: usize, outputs: &mut [f32]) {
        assert_eq!(inputs.len(), n * self.in_dim, "inputs shape mismatch");
        assert_eq!(outputs.len(), n * self.out_dim, "outputs shape mismatch");

        matmul_nt(n, self.out_dim, self.in_dim, inputs, &self.weights, 0.0, outputs);
        add_row_bias(outputs, &self.biases);
        self.activation.apply(outputs);
    }

    /// Backward pass for `n` samples (overwrite semantics).
    ///
    /// - `inputs`, `outputs`: exactly what `forward_batch` saw and produced
    /// - `d_outputs`: upstream `dL/d(outputs)`, converted in place into `dL/dz`
    /// - `d_inputs`: if present, overwritten with `dL/d(inputs)` `(n, in_dim)`
    /// - `d_weights`, `d_biases`: overwritten with the summed parameter gradients
    #[allow(clippy::too_many_arguments)]
    pub fn backward_batch(
        &self,
        inputs: &[f32],
        outputs: &[f32],
        n: usize,
        d_outputs: &mut [f32],
        d_inputs: Option<&mut [f32]>,
        d_weights: &mut [f32],
        d_biases: &mut [f32],
    ) {
        assert_eq!(inputs.len(), n * self.in_dim, "inputs shape mismatch");
        assert_eq!(outputs.len(), n * self.out_dim, "outputs shape mismatch");
        assert_eq!(d_outputs.len(), outputs.len(), "d_outputs shape mismatch");

        if self.activation != Activation::Identity {
            for (d, &y) in d_outputs.iter_mut().zip(outputs) {
                *d *= self.activation.grad_from_output(y);
            }
        }
        self.backward_pre_activation(inputs, n, d_outputs, d_inputs, d_weights, d_biases);
    }

    /// Backward pass starting from `d_z = dL/dz`, the gradient w.r.t. the
    /// pre-activation `z = W x + b` (overwrite semantics, `n` samples).
    pub fn backward_pre_activation(
        &self,
        inputs: &[f32],
        n: usize,
        d_z: &[f32],
        d_inputs: Option<&mut [f32]>,
        d_weights: &mut [f32],
        d_biases: &mut [f32],
    ) {
        assert_eq!(inputs.len(), n * self.in_dim, "inputs shape mismatch");
        assert_eq!(d_z.len(), n * self.out_dim, "d_z shape mismatch");
        assert_eq!(d_weights.len(), self.weights.len(), "d_weights shape mismatch");
        assert_eq!(d_biases.len(), self.out_dim, "d_biases shape mismatch");

        // dW (out, in) = dZ^T (out, n) * X (n, in)
        matmul_tn(self.out_dim, self.in_dim, n, d_z, inputs, 0.0, d_weights);
        column_sums(d_z, d_biases);

        if let Some(d_inputs) = d_inputs {
            assert_eq!(d_inputs.len(), inputs.len(), "d_inputs shape mismatch");
            // dX (n, in) = dZ (n, out) * W (out, in)
            matmul_nn(n, self.in_dim, self.out_dim, d_z, &self.weights, 0.0, d_inputs);
        }
    }

    /// `param -= lr * d_param`.
    #[inline]
    pub fn sgd_step(&mut self, d_weights: &[f32], d_biases: &[f32], lr: f32) {
        assert_eq!(d_weights.len(), self.weights.len(), "d_weights shape mismatch");
        assert_eq!(d_biases.len(), self.biases.len(), "d_biases shape mismatch");

        for (w, &g) in self.weights.iter_mut().zip(d_weights) {
            *w -= lr * g;
        }
        for (b, &g) in self.biases.iter_mut().zip(d_biases) {
            *b -= lr * g;
        }
    }
}
