//! Activation functions.
//!
//! A hidden layer computes a pre-activation value `z = W x + b` and then applies an
//! activation function element-wise: `y = activation(z)`.
//!
//! Layers cache the *post-activation* outputs `y`; backprop recovers `dL/dz` from
//! `dL/dy` using `y` alone, so no separate `z` buffer is kept.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Element-wise activation function.
pub enum Activation {
    #[default]
    Sigmoid,
    Tanh,
    Identity,
}

impl Activation {
    #[inline]
    pub fn forward(self, x: f32) -> f32 {
        match self {
            Activation::Sigmoid => sigmoid(x),
            Activation::Tanh => x.tanh(),
            Activation::Identity => x,
        }
    }

    /// Derivative of the activation with respect to its input, expressed in terms
    /// of the cached post-activation output `y`.
    #[inline]
    pub fn grad_from_output(self, y: f32) -> f32 {
        match self {
            Activation::Sigmoid => y * (1.0 - y),
            Activation::Tanh => 1.0 - y * y,
            Activation::Identity => 1.0,
        }
    }

    /// Apply the activation in place.
    #[inline]
    pub(crate) fn apply(self, values: &mut [f32]) {
        if self == Activation::Identity {
            return;
        }
        for v in values.iter_mut() {
            *v = self.forward(*v);
        }
    }

    /// Scale for the uniform weight init range `sqrt(6 / (fan_in + fan_out))`.
    ///
    /// Sigmoid saturates sooner than tanh, so its range is four times wider.
    #[inline]
    pub(crate) fn init_gain(self) -> f32 {
        match self {
            Activation::Sigmoid => 4.0,
            Activation::Tanh | Activation::Identity => 1.0,
        }
    }
}

#[inline]
pub(crate) fn sigmoid(x: f32) -> f32 {
    // Numerically stable sigmoid.
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

/// Row-wise softmax over a `(rows, cols)` row-major buffer, in place.
pub(crate) fn softmax_rows(values: &mut [f32], cols: usize) {
    debug_assert!(cols > 0);
    debug_assert_eq!(values.len() % cols, 0);

    for row in values.chunks_exact_mut(cols) {
        let mut max_v = row[0];
        for &v in row.iter().skip(1) {
            if v > max_v {
                max_v = v;
            }
        }
        let mut sum = 0.0_f32;
        for v in row.iter_mut() {
            *v = (*v - max_v).exp();
            sum += *v;
        }
        let inv = 1.0 / sum;
        for v in row.iter_mut() {
            *v *= inv;
        }
    }
}

/// Index of the largest value (first one wins on ties).
pub(crate) fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}
