//! Stacked denoising autoencoders with hand-written backprop.
//!
//! `feap` is a small training toolkit built from a few dense pieces:
//!
//! - [`HiddenLayer`]: `activation(W x + b)` with batched forward/backward.
//! - [`DenoisingAutoencoder`] / [`TiedDecoder`]: tied-weight autoencoders trained to
//!   undo masking noise.
//! - [`LogisticRegression`] and [`LinearRegression`]: zero-initialized output layers.
//! - [`Sda`]: sigmoid hidden layers, one autoencoder per layer sharing its weights, and
//!   a logistic layer on top. Trained by layer-wise pretraining then fine-tuning.
//! - [`Trainer`]: feeds samples one at a time and trains once a batch is full.
//!
//! # Data layout and shapes
//!
//! - Scalars are `f32`.
//! - [`Inputs`] and [`Dataset`] store samples contiguously in row-major layout.
//! - Layer weights are row-major with shape `(out_dim, in_dim)`.
//!
//! # Panics vs `Result`
//!
//! Layer-level hot-path methods (`forward_batch`, `backward_batch`, `pretrain_step`)
//! assert their shape contracts and panic on misuse. Model-level APIs (`fit_batch`,
//! `predict`, [`Trainer::train`], constructors) validate and return [`Result`].
//!
//! # Quick start
//!
//! ```rust
//! use feap::{Inputs, Model, Sda, SdaConfig};
//!
//! # fn main() -> feap::Result<()> {
//! let mut sda = Sda::new(SdaConfig {
//!     input_dim: 4,
//!     hidden_sizes: vec![3],
//!     n_classes: 2,
//!     corruption_levels: vec![0.2],
//!     ..SdaConfig::default()
//! })?;
//!
//! let x = Inputs::from_rows(&[vec![1.0, 1.0, 0.0, 0.0], vec![0.0, 0.0, 1.0, 1.0]])?;
//! sda.pretrain(&x, 2, 10, 0.1)?;
//! for _ in 0..50 {
//!     sda.finetune_step(&x, &[0, 1], 0.5)?;
//! }
//! let _class = sda.predict(&[1.0, 1.0, 0.0, 0.0])?;
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod config;
pub mod dae;
pub mod data;
pub mod error;
pub mod eval;
pub mod layer;
pub(crate) mod matmul;
pub mod model;
pub mod regression;
pub mod sda;
pub mod trainer;

#[cfg(feature = "serde")]
pub mod serde_model;

pub use activation::Activation;
pub use config::SdaConfig;
pub use dae::{DenoisingAutoencoder, TiedDecoder};
pub use data::{Dataset, Inputs};
pub use error::{Error, Result};
pub use eval::{ErrorCurve, classification_error, mean_squared_error};
pub use layer::HiddenLayer;
pub use model::{Model, Unsupervised};
pub use regression::{LinearRegression, LogisticRegression};
pub use sda::Sda;
pub use trainer::Trainer;

#[cfg(feature = "serde")]
pub use serde_model::JsonModel;
