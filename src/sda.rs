//! Stacked denoising autoencoder.
//!
//! The network is a stack of sigmoid [`HiddenLayer`]s with a [`LogisticRegression`]
//! on top. Every hidden layer also serves as the encoder of a denoising autoencoder:
//! decoder `i` (a [`TiedDecoder`]) borrows hidden layer `i` mutably while it trains, so
//! pretraining and fine-tuning move the very same `W` and `b`.
//!
//! Training happens in two stages:
//!
//! 1. Unsupervised pretraining, layer by layer. Autoencoder `i` learns to reconstruct
//!    the clean output of layer `i - 1` (or the raw input) from a corrupted copy.
//! 2. Supervised fine-tuning: gradient descent on the negative log likelihood of the
//!    logistic layer, back-propagated through every hidden layer.
//!
//! The visible biases of the decoders are only used while pretraining; fine-tuning
//! updates hidden layers and the logistic layer.

use log::{debug, info, trace};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::activation::{Activation, argmax};
use crate::dae::validate_lr;
use crate::error::check_len;
use crate::regression::error_rate;
use crate::{
    Error, HiddenLayer, Inputs, LogisticRegression, Model, Result, SdaConfig, TiedDecoder,
    Unsupervised,
};

#[derive(Debug, Clone)]
pub struct Sda {
    config: SdaConfig,
    layers: Vec<HiddenLayer>,
    decoders: Vec<TiedDecoder>,
    output: LogisticRegression,
    rng: StdRng,
}

impl Sda {
    /// Build a randomly initialized stack from `config`.
    pub fn new(config: SdaConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let mut layers = Vec::with_capacity(config.hidden_sizes.len());
        let mut decoders = Vec::with_capacity(config.hidden_sizes.len());
        for (i, (&size, &level)) in config
            .hidden_sizes
            .iter()
            .zip(&config.corruption_levels)
            .enumerate()
        {
            let layer = HiddenLayer::new_with_rng(
                config.layer_input_dim(i),
                size,
                Activation::Sigmoid,
                &mut rng,
            )?;
            decoders.push(TiedDecoder::new(&layer, level)?);
            layers.push(layer);
        }

        let top = *config
            .hidden_sizes
            .last()
            .ok_or_else(|| Error::InvalidConfig("sda needs at least one hidden layer".to_owned()))?;
        let output = LogisticRegression::new(top, config.n_classes)?;

        Ok(Self {
            config,
            layers,
            decoders,
            output,
            rng,
        })
    }

    /// Reassemble a stack from trained parts, checking that the shapes chain and that
    /// every layer and decoder matches `config`.
    pub fn from_parts(
        config: SdaConfig,
        layers: Vec<HiddenLayer>,
        decoders: Vec<TiedDecoder>,
        output: LogisticRegression,
    ) -> Result<Self> {
        config.validate()?;
        check_len("layers", layers.len(), config.hidden_sizes.len())?;
        check_len("decoders", decoders.len(), layers.len())?;

        for (i, (layer, decoder)) in layers.iter().zip(&decoders).enumerate() {
            if layer.in_dim() != config.layer_input_dim(i)
                || layer.out_dim() != config.hidden_sizes[i]
            {
                return Err(Error::InvalidShape(format!(
                    "layer {i} is {}x{}, expected {}x{}",
                    layer.out_dim(),
                    layer.in_dim(),
                    config.hidden_sizes[i],
                    config.layer_input_dim(i)
                )));
            }
            check_len("decoder visible bias", decoder.visible_bias().len(), layer.in_dim())?;
            if layer.activation() != Activation::Sigmoid {
                return Err(Error::InvalidConfig(format!(
                    "layer {i} uses {:?}, expected sigmoid",
                    layer.activation()
                )));
            }
            if decoder.corruption_level() != config.corruption_levels[i] {
                return Err(Error::InvalidConfig(format!(
                    "decoder {i} corruption level {} does not match config {}",
                    decoder.corruption_level(),
                    config.corruption_levels[i]
                )));
            }
        }
        check_len("output in_dim", output.in_dim(), config.hidden_sizes[layers.len() - 1])?;
        check_len("output classes", output.n_classes(), config.n_classes)?;

        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            layers,
            decoders,
            output,
            rng,
        })
    }

    #[inline]
    pub fn config(&self) -> &SdaConfig {
        &self.config
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.config.input_dim
    }

    #[inline]
    pub fn n_classes(&self) -> usize {
        self.output.n_classes()
    }

    #[inline]
    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn layers(&self) -> &[HiddenLayer] {
        &self.layers
    }

    #[inline]
    pub fn decoders(&self) -> &[TiedDecoder] {
        &self.decoders
    }

    #[inline]
    pub fn output_layer(&self) -> &LogisticRegression {
        &self.output
    }

    /// Output of the last hidden layer for one input.
    pub fn transform(&self, input: &[f32]) -> Result<Vec<f32>> {
        check_len("input", input.len(), self.input_dim())?;
        let mut current = input.to_vec();
        for layer in &self.layers {
            let mut next = vec![0.0; layer.out_dim()];
            layer.forward(&current, &mut next);
            current = next;
        }
        Ok(current)
    }

    /// Class probabilities from the logistic layer for one input.
    pub fn class_probabilities(&self, input: &[f32]) -> Result<Vec<f32>> {
        let top = self.transform(input)?;
        self.output.class_probabilities(&top)
    }

    /// Fraction of misclassified samples.
    pub fn errors(&self, inputs: &Inputs, labels: &[usize]) -> Result<f32> {
        self.check_inputs(inputs)?;
        crate::regression::check_labels(labels, inputs.len(), self.n_classes())?;

        let n = inputs.len();
        let activations = self.forward_hidden(inputs.as_flat(), n);
        let mut probs = vec![0.0; n * self.n_classes()];
        self.output
            .probabilities_batch(last(&activations, inputs.as_flat()), n, &mut probs);
        Ok(error_rate(&probs, labels, self.n_classes()))
    }

    /// Mean reconstruction cost of autoencoder `layer` on the clean representation of
    /// `inputs` at that depth.
    pub fn reconstruction_cost(&self, layer: usize, inputs: &Inputs) -> Result<f32> {
        self.check_inputs(inputs)?;
        if layer >= self.n_layers() {
            return Err(Error::InvalidConfig(format!(
                "layer {layer} out of range for {} layers",
                self.n_layers()
            )));
        }
        let n = inputs.len();
        let activations = self.forward_hidden(inputs.as_flat(), n);
        let repr = if layer == 0 {
            inputs.as_flat()
        } else {
            &activations[layer - 1]
        };
        Ok(self.decoders[layer].cost(&self.layers[layer], repr, n))
    }

    /// One pretraining step per layer on a single batch.
    ///
    /// Layer `i` takes a corrupted-input gradient step, then the batch is mapped through
    /// its (uncorrupted, freshly updated) encoder to feed layer `i + 1`. Returns the mean
    /// of the per-layer costs.
    pub fn train_unsupervised(&mut self, inputs: &Inputs, lr: f32) -> Result<f32> {
        validate_lr(lr)?;
        self.check_inputs(inputs)?;

        let n = inputs.len();
        let mut repr = inputs.as_flat().to_vec();
        let mut total = 0.0_f32;
        for i in 0..self.layers.len() {
            let cost = self.decoders[i].pretrain_step(&mut self.layers[i], &repr, n, lr, &mut self.rng);
            trace!("layer {i} pretraining cost {cost}");
            total += cost;

            if i + 1 < self.layers.len() {
                let mut next = vec![0.0; n * self.layers[i].out_dim()];
                self.layers[i].forward_batch(&repr, n, &mut next);
                repr = next;
            }
        }
        Ok(total / self.layers.len() as f32)
    }

    /// Greedy layer-wise pretraining over a whole dataset.
    ///
    /// Layer `i` trains for `epochs` passes over mini-batches of `batch_size` rows before
    /// layer `i + 1` starts. Returns the mean cost of every epoch, per layer.
    pub fn pretrain(
        &mut self,
        inputs: &Inputs,
        batch_size: usize,
        epochs: usize,
        lr: f32,
    ) -> Result<Vec<Vec<f32>>> {
        validate_lr(lr)?;
        self.check_inputs(inputs)?;
        if batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be > 0".to_owned()));
        }
        if epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be > 0".to_owned()));
        }

        let n = inputs.len();
        let mut repr = inputs.as_flat().to_vec();
        let mut history = Vec::with_capacity(self.layers.len());

        for i in 0..self.layers.len() {
            let dim = self.layers[i].in_dim();
            info!(
                "pretraining layer {i} ({dim} -> {}), corruption {}",
                self.layers[i].out_dim(),
                self.decoders[i].corruption_level()
            );

            let mut costs = Vec::with_capacity(epochs);
            for epoch in 0..epochs {
                let mut total = 0.0_f32;
                let mut batches = 0_usize;
                for start in (0..n).step_by(batch_size) {
                    let end = (start + batch_size).min(n);
                    let batch = &repr[start * dim..end * dim];
                    total += self.decoders[i].pretrain_step(
                        &mut self.layers[i],
                        batch,
                        end - start,
                        lr,
                        &mut self.rng,
                    );
                    batches += 1;
                }
                let mean = total / batches as f32;
                debug!("layer {i} epoch {epoch}: reconstruction cost {mean}");
                costs.push(mean);
            }
            history.push(costs);

            let mut next = vec![0.0; n * self.layers[i].out_dim()];
            self.layers[i].forward_batch(&repr, n, &mut next);
            repr = next;
        }

        Ok(history)
    }

    /// One supervised SGD step through the whole stack. Returns the NLL before the update.
    pub fn finetune_step(&mut self, inputs: &Inputs, labels: &[usize], lr: f32) -> Result<f32> {
        validate_lr(lr)?;
        self.check_inputs(inputs)?;
        crate::regression::check_labels(labels, inputs.len(), self.n_classes())?;

        let n = inputs.len();
        let x = inputs.as_flat();
        let activations = self.forward_hidden(x, n);
        let top = last(&activations, x);

        let mut d_repr = vec![0.0; top.len()];
        let mut d_out_w = vec![0.0; self.output.layer().weights().len()];
        let mut d_out_b = vec![0.0; self.n_classes()];
        let mut probs = vec![0.0; n * self.n_classes()];
        self.output.probabilities_batch(top, n, &mut probs);
        let cost = self.output.backward_batch(
            top,
            &mut probs,
            labels,
            n,
            Some(&mut d_repr),
            &mut d_out_w,
            &mut d_out_b,
        );

        let mut grads = Vec::with_capacity(self.layers.len());
        for i in (0..self.layers.len()).rev() {
            let layer = &self.layers[i];
            let layer_in: &[f32] = if i == 0 { x } else { &activations[i - 1] };

            let mut d_w = vec![0.0; layer.weights().len()];
            let mut d_b = vec![0.0; layer.out_dim()];
            let mut d_in = if i > 0 {
                Some(vec![0.0; layer_in.len()])
            } else {
                None
            };
            layer.backward_batch(
                layer_in,
                &activations[i],
                n,
                &mut d_repr,
                d_in.as_deref_mut(),
                &mut d_w,
                &mut d_b,
            );
            grads.push((d_w, d_b));
            if let Some(d_in) = d_in {
                d_repr = d_in;
            }
        }

        // Gradients were collected top-down.
        for (layer, (d_w, d_b)) in self.layers.iter_mut().rev().zip(&grads) {
            layer.sgd_step(d_w, d_b, lr);
        }
        self.output.layer_mut().sgd_step(&d_out_w, &d_out_b, lr);

        trace!("finetune step: n={n} cost={cost}");
        Ok(cost)
    }

    /// Post-activation outputs of every hidden layer, bottom to top.
    fn forward_hidden(&self, inputs: &[f32], n: usize) -> Vec<Vec<f32>> {
        let mut activations: Vec<Vec<f32>> = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let mut out = vec![0.0; n * layer.out_dim()];
            layer.forward_batch(last(&activations, inputs), n, &mut out);
            activations.push(out);
        }
        activations
    }

    fn check_inputs(&self, inputs: &Inputs) -> Result<()> {
        if inputs.is_empty() {
            return Err(Error::InvalidData("inputs must not be empty".to_owned()));
        }
        check_len("input row", inputs.input_dim(), self.input_dim())
    }
}

#[inline]
fn last<'a>(activations: &'a [Vec<f32>], inputs: &'a [f32]) -> &'a [f32] {
    activations.last().map_or(inputs, Vec::as_slice)
}

impl Model for Sda {
    type Target = usize;
    type Output = usize;

    fn input_dim(&self) -> usize {
        self.config.input_dim
    }

    fn default_learning_rate(&self) -> f32 {
        self.config.finetune_lr
    }

    /// Optional pretraining step (at the same learning rate), then fine-tuning.
    fn fit_batch(&mut self, inputs: &Inputs, labels: &[usize], lr: f32) -> Result<f32> {
        // Reject the batch before the pretraining step touches any parameter.
        validate_lr(lr)?;
        self.check_inputs(inputs)?;
        crate::regression::check_labels(labels, inputs.len(), self.n_classes())?;

        if self.config.pretrain_while_finetuning {
            self.train_unsupervised(inputs, lr)?;
        }
        self.finetune_step(inputs, labels, lr)
    }

    fn predict(&self, input: &[f32]) -> Result<usize> {
        Ok(argmax(&self.class_probabilities(input)?))
    }
}

impl Unsupervised for Sda {
    fn input_dim(&self) -> usize {
        self.config.input_dim
    }

    /// `pretrain_epochs` rounds of [`Sda::train_unsupervised`] at `pretrain_lr`.
    fn fit_unlabeled(&mut self, inputs: &Inputs) -> Result<f32> {
        let lr = self.config.pretrain_lr;
        let mut cost = 0.0;
        for _ in 0..self.config.pretrain_epochs {
            cost = self.train_unsupervised(inputs, lr)?;
        }
        debug!(
            "unsupervised batch of {} after {} epochs: cost {cost}",
            inputs.len(),
            self.config.pretrain_epochs
        );
        Ok(cost)
    }

    fn transform(&self, input: &[f32]) -> Result<Vec<f32>> {
        Sda::transform(self, input)
    }
}
