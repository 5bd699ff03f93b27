//! Denoising autoencoders with tied weights.
//!
//! The encoder is an ordinary [`HiddenLayer`]; the decoder reuses the transpose of the
//! encoder's weight matrix and only owns a visible bias. That split is what lets a
//! stacked autoencoder pretrain layer `i` by lending `&mut` access to its hidden layer
//! for the duration of a step: there is a single copy of `W` and `b_hid`.
//!
//! For one corrupted mini-batch `x~` of clean inputs `x`:
//!
//! - `h = encoder(x~)`
//! - `z = sigmoid(h W + b_vis)`
//! - `L = mean_batch( -sum_i [x_i ln z_i + (1 - x_i) ln(1 - z_i)] )`

use log::trace;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::activation::Activation;
use crate::error::check_len;
use crate::matmul::{add_row_bias, column_sums, matmul_nn, matmul_nt, matmul_tn};
use crate::{Error, HiddenLayer, Inputs, Result, Unsupervised};

const PROB_CLAMP: f32 = 1e-7;

/// Decoder half of a tied-weight denoising autoencoder.
#[derive(Debug, Clone, PartialEq)]
pub struct TiedDecoder {
    visible_bias: Vec<f32>,
    corruption_level: f32,
}

impl TiedDecoder {
    /// Decoder for `encoder`, with a zero visible bias.
    pub fn new(encoder: &HiddenLayer, corruption_level: f32) -> Result<Self> {
        Self::from_parts(vec![0.0; encoder.in_dim()], corruption_level)
    }

    pub fn from_parts(visible_bias: Vec<f32>, corruption_level: f32) -> Result<Self> {
        validate_corruption_level(corruption_level)?;
        if visible_bias.is_empty() {
            return Err(Error::InvalidConfig(
                "visible bias must not be empty".to_owned(),
            ));
        }
        if visible_bias.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidData(
                "visible bias must be finite".to_owned(),
            ));
        }
        Ok(Self {
            visible_bias,
            corruption_level,
        })
    }

    #[inline]
    pub fn visible_bias(&self) -> &[f32] {
        &self.visible_bias
    }

    #[inline]
    pub fn corruption_level(&self) -> f32 {
        self.corruption_level
    }

    /// Zero each element independently with probability `corruption_level`.
    pub fn corrupt<R: Rng + ?Sized>(&self, inputs: &[f32], rng: &mut R, out: &mut [f32]) {
        assert_eq!(inputs.len(), out.len(), "corrupt: shape mismatch");

        if self.corruption_level == 0.0 {
            out.copy_from_slice(inputs);
            return;
        }
        // The level is validated to [0, 1), so `keep` is a valid probability.
        let keep = 1.0 - f64::from(self.corruption_level);
        for (o, &x) in out.iter_mut().zip(inputs) {
            *o = if rng.gen_bool(keep) { x } else { 0.0 };
        }
    }

    /// `z = sigmoid(h W + b_vis)` for `n` hidden codes.
    pub fn decode_batch(&self, encoder: &HiddenLayer, hidden: &[f32], n: usize, out: &mut [f32]) {
        let (in_dim, hid) = (encoder.in_dim(), encoder.out_dim());
        assert_eq!(self.visible_bias.len(), in_dim, "decoder/encoder mismatch");
        assert_eq!(hidden.len(), n * hid, "hidden shape mismatch");
        assert_eq!(out.len(), n * in_dim, "output shape mismatch");

        matmul_nn(n, in_dim, hid, hidden, encoder.weights(), 0.0, out);
        add_row_bias(out, &self.visible_bias);
        Activation::Sigmoid.apply(out);
    }

    /// Reconstruction cost of clean inputs, without corruption or updates.
    pub fn cost(&self, encoder: &HiddenLayer, inputs: &[f32], n: usize) -> f32 {
        let mut hidden = vec![0.0; n * encoder.out_dim()];
        encoder.forward_batch(inputs, n, &mut hidden);
        let mut recon = vec![0.0; inputs.len()];
        self.decode_batch(encoder, &hidden, n, &mut recon);
        cross_entropy(inputs, &recon, n)
    }

    /// One SGD step on a corrupted copy of `inputs` (`n` rows).
    ///
    /// Updates the shared encoder `W`/`b_hid` and the visible bias. Returns the cost
    /// measured before the update.
    pub fn pretrain_step<R: Rng + ?Sized>(
        &mut self,
        encoder: &mut HiddenLayer,
        inputs: &[f32],
        n: usize,
        lr: f32,
        rng: &mut R,
    ) -> f32 {
        let (in_dim, hid) = (encoder.in_dim(), encoder.out_dim());
        assert_eq!(inputs.len(), n * in_dim, "inputs shape mismatch");
        assert!(n > 0, "pretrain_step needs at least one sample");

        let mut corrupted = vec![0.0; inputs.len()];
        self.corrupt(inputs, rng, &mut corrupted);

        let mut hidden = vec![0.0; n * hid];
        encoder.forward_batch(&corrupted, n, &mut hidden);

        let mut d_recon = vec![0.0; inputs.len()];
        self.decode_batch(encoder, &hidden, n, &mut d_recon);
        let cost = cross_entropy(inputs, &d_recon, n);

        // Sigmoid + cross-entropy: dL/d(pre-activation) = (z - x) / n.
        let inv_n = 1.0 / n as f32;
        for (d, &x) in d_recon.iter_mut().zip(inputs) {
            *d = (*d - x) * inv_n;
        }

        let mut d_visible = vec![0.0; in_dim];
        column_sums(&d_recon, &mut d_visible);

        // dL/dh (n, hid) = dZ (n, in) * W^T
        let mut d_hidden = vec![0.0; n * hid];
        matmul_nt(n, hid, in_dim, &d_recon, encoder.weights(), 0.0, &mut d_hidden);

        let mut d_weights = vec![0.0; hid * in_dim];
        let mut d_hid_bias = vec![0.0; hid];
        encoder.backward_batch(
            &corrupted,
            &hidden,
            n,
            &mut d_hidden,
            None,
            &mut d_weights,
            &mut d_hid_bias,
        );
        // Decoder path through the tied weights: dW += h^T (hid, n) * dZ (n, in)
        matmul_tn(hid, in_dim, n, &hidden, &d_recon, 1.0, &mut d_weights);

        encoder.sgd_step(&d_weights, &d_hid_bias, lr);
        for (b, &g) in self.visible_bias.iter_mut().zip(&d_visible) {
            *b -= lr * g;
        }

        trace!("dae pretrain step: n={n} cost={cost}");
        cost
    }
}

/// A standalone denoising autoencoder that owns its encoder.
#[derive(Debug, Clone)]
pub struct DenoisingAutoencoder {
    encoder: HiddenLayer,
    decoder: TiedDecoder,
    learning_rate: f32,
    rng: StdRng,
}

impl DenoisingAutoencoder {
    /// Sigmoid encoder with `hidden_dim` units and zero visible bias.
    pub fn new(in_dim: usize, hidden_dim: usize, corruption_level: f32, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let encoder = HiddenLayer::new_with_rng(in_dim, hidden_dim, Activation::Sigmoid, &mut rng)?;
        let decoder = TiedDecoder::new(&encoder, corruption_level)?;
        Ok(Self {
            encoder,
            decoder,
            learning_rate: 0.1,
            rng,
        })
    }

    /// Learning rate used by [`Unsupervised::fit_unlabeled`].
    pub fn with_learning_rate(mut self, lr: f32) -> Result<Self> {
        validate_lr(lr)?;
        self.learning_rate = lr;
        Ok(self)
    }

    #[inline]
    pub fn encoder(&self) -> &HiddenLayer {
        &self.encoder
    }

    #[inline]
    pub fn decoder(&self) -> &TiedDecoder {
        &self.decoder
    }

    #[inline]
    pub fn hidden_dim(&self) -> usize {
        self.encoder.out_dim()
    }

    /// One corrupted SGD step over every row of `inputs`.
    pub fn train_batch(&mut self, inputs: &Inputs, lr: f32) -> Result<f32> {
        validate_lr(lr)?;
        self.check_inputs(inputs)?;
        let cost = self.decoder.pretrain_step(
            &mut self.encoder,
            inputs.as_flat(),
            inputs.len(),
            lr,
            &mut self.rng,
        );
        Ok(cost)
    }

    /// Decoder output for one clean input.
    pub fn reconstruct(&self, input: &[f32]) -> Result<Vec<f32>> {
        check_len("input", input.len(), self.encoder.in_dim())?;
        let mut hidden = vec![0.0; self.encoder.out_dim()];
        self.encoder.forward(input, &mut hidden);
        let mut out = vec![0.0; input.len()];
        self.decoder.decode_batch(&self.encoder, &hidden, 1, &mut out);
        Ok(out)
    }

    /// Mean reconstruction cross-entropy over clean `inputs`.
    pub fn reconstruction_cost(&self, inputs: &Inputs) -> Result<f32> {
        self.check_inputs(inputs)?;
        Ok(self
            .decoder
            .cost(&self.encoder, inputs.as_flat(), inputs.len()))
    }

    fn check_inputs(&self, inputs: &Inputs) -> Result<()> {
        if inputs.is_empty() {
            return Err(Error::InvalidData("inputs must not be empty".to_owned()));
        }
        check_len("input row", inputs.input_dim(), self.encoder.in_dim())
    }
}

impl Unsupervised for DenoisingAutoencoder {
    fn input_dim(&self) -> usize {
        self.encoder.in_dim()
    }

    fn fit_unlabeled(&mut self, inputs: &Inputs) -> Result<f32> {
        self.train_batch(inputs, self.learning_rate)
    }

    fn transform(&self, input: &[f32]) -> Result<Vec<f32>> {
        check_len("input", input.len(), self.encoder.in_dim())?;
        let mut hidden = vec![0.0; self.encoder.out_dim()];
        self.encoder.forward(input, &mut hidden);
        Ok(hidden)
    }
}

/// Mean over `n` rows of the summed binary cross-entropy between targets `x` and
/// probabilities `z`.
pub(crate) fn cross_entropy(x: &[f32], z: &[f32], n: usize) -> f32 {
    debug_assert_eq!(x.len(), z.len());
    let mut sum = 0.0_f32;
    for (&t, &p) in x.iter().zip(z) {
        let p = p.clamp(PROB_CLAMP, 1.0 - PROB_CLAMP);
        sum -= t * p.ln() + (1.0 - t) * (1.0 - p).ln();
    }
    sum / n as f32
}

pub(crate) fn validate_corruption_level(level: f32) -> Result<()> {
    if !(level.is_finite() && (0.0..1.0).contains(&level)) {
        return Err(Error::InvalidConfig(format!(
            "corruption level must be finite and in [0,1), got {level}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_lr(lr: f32) -> Result<()> {
    if !(lr.is_finite() && lr > 0.0) {
        return Err(Error::InvalidConfig(format!(
            "learning rate must be finite and > 0, got {lr}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::activation::sigmoid;
    use crate::layer::tests::assert_close;

    fn decode_one(dec: &TiedDecoder, enc: &HiddenLayer, h: &[f32], i: usize) -> f32 {
        let mut z = dec.visible_bias[i];
        for (j, &hj) in h.iter().enumerate() {
            z += hj * enc.weights()[j * enc.in_dim() + i];
        }
        sigmoid(z)
    }

    fn patterns() -> Inputs {
        Inputs::from_rows(&[
            vec![1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0, 1.0, 0.0, 1.0],
            vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0],
            vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0],
        ])
        .unwrap()
    }

    #[test]
    fn corruption_level_is_validated() {
        assert!(DenoisingAutoencoder::new(4, 2, 1.0, 0).is_err());
        assert!(DenoisingAutoencoder::new(4, 2, -0.1, 0).is_err());
        assert!(DenoisingAutoencoder::new(4, 2, f32::NAN, 0).is_err());
        assert!(DenoisingAutoencoder::new(4, 2, 0.3, 0).is_ok());
    }

    #[test]
    fn corrupt_only_zeroes_elements() {
        let mut rng = StdRng::seed_from_u64(5);
        let enc = HiddenLayer::new_with_rng(1000, 1, Activation::Sigmoid, &mut rng).unwrap();
        let dec = TiedDecoder::new(&enc, 0.5).unwrap();

        let inputs = vec![2.0_f32; 1000];
        let mut out = vec![0.0_f32; 1000];
        dec.corrupt(&inputs, &mut rng, &mut out);

        assert!(out.iter().all(|&v| v == 0.0 || v == 2.0));
        let zeros = out.iter().filter(|&&v| v == 0.0).count();
        assert!((350..650).contains(&zeros), "zeros={zeros}");

        let clean = TiedDecoder::new(&enc, 0.0).unwrap();
        clean.corrupt(&inputs, &mut rng, &mut out);
        assert_eq!(out, inputs);
    }

    #[test]
    fn decode_uses_transposed_encoder_weights() {
        let mut rng = StdRng::seed_from_u64(9);
        let enc = HiddenLayer::new_with_rng(3, 2, Activation::Sigmoid, &mut rng).unwrap();
        let dec = TiedDecoder::from_parts(vec![0.1, -0.2, 0.3], 0.0).unwrap();
        let h = [0.25_f32, 0.75];

        let mut z = [0.0_f32; 3];
        dec.decode_batch(&enc, &h, 1, &mut z);
        for i in 0..3 {
            assert!((z[i] - decode_one(&dec, &enc, &h, i)).abs() < 1e-6);
        }
    }

    #[test]
    fn pretrain_step_matches_numeric_gradients_without_corruption() {
        let mut rng = StdRng::seed_from_u64(11);
        let enc = HiddenLayer::new_with_rng(6, 3, Activation::Sigmoid, &mut rng).unwrap();
        let dec = TiedDecoder::from_parts(vec![0.05; 6], 0.0).unwrap();
        let data = patterns();
        let (x, n) = (data.as_flat(), data.len());

        // With lr the update is exactly -lr * grad; recover grad from the update.
        let lr = 1e-3_f32;
        let mut enc_after = enc.clone();
        let mut dec_after = dec.clone();
        dec_after.pretrain_step(&mut enc_after, x, n, lr, &mut rng);

        let eps = 1e-2_f32;
        for p in [0_usize, 4, 7, 17] {
            let mut plus = enc.clone();
            plus.weights_mut()[p] += eps;
            let mut minus = enc.clone();
            minus.weights_mut()[p] -= eps;
            let numeric = (dec.cost(&plus, x, n) - dec.cost(&minus, x, n)) / (2.0 * eps);
            let analytic = (enc.weights()[p] - enc_after.weights()[p]) / lr;
            assert_close(analytic, numeric, 2e-2, 2e-2);
        }
        for p in 0..3 {
            let mut plus = enc.clone();
            plus.biases_mut()[p] += eps;
            let mut minus = enc.clone();
            minus.biases_mut()[p] -= eps;
            let numeric = (dec.cost(&plus, x, n) - dec.cost(&minus, x, n)) / (2.0 * eps);
            let analytic = (enc.biases()[p] - enc_after.biases()[p]) / lr;
            assert_close(analytic, numeric, 2e-2, 2e-2);
        }
        for p in 0..6 {
            let mut plus = dec.clone();
            plus.visible_bias[p] += eps;
            let mut minus = dec.clone();
            minus.visible_bias[p] -= eps;
            let numeric = (plus.cost(&enc, x, n) - minus.cost(&enc, x, n)) / (2.0 * eps);
            let analytic = (dec.visible_bias[p] - dec_after.visible_bias[p]) / lr;
            assert_close(analytic, numeric, 2e-2, 2e-2);
        }
    }

    #[test]
    fn training_lowers_reconstruction_cost() {
        let data = patterns();
        let mut dae = DenoisingAutoencoder::new(6, 4, 0.1, 42)
            .unwrap()
            .with_learning_rate(0.5)
            .unwrap();
        let before = dae.reconstruction_cost(&data).unwrap();
        for _ in 0..500 {
            dae.fit_unlabeled(&data).unwrap();
        }
        let after = dae.reconstruction_cost(&data).unwrap();
        assert!(after < before * 0.7, "before={before} after={after}");

        let code = dae.transform(data.row(0)).unwrap();
        assert_eq!(code.len(), 4);
        assert!(code.iter().all(|&h| (0.0..=1.0).contains(&h)));
        assert_eq!(dae.reconstruct(data.row(0)).unwrap().len(), 6);
    }

    #[test]
    fn rejects_wrong_input_width() {
        let mut dae = DenoisingAutoencoder::new(6, 4, 0.1, 0).unwrap();
        let bad = Inputs::from_rows(&[vec![0.0; 5]]).unwrap();
        assert!(dae.fit_unlabeled(&bad).is_err());
        assert!(dae.transform(&[0.0; 5]).is_err());
    }
}
