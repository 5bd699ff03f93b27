//! Model serialization (feature: `serde`).
//!
//! A versioned JSON format for [`Sda`], [`LogisticRegression`] and [`LinearRegression`].
//!
//! - Internal structs are not serialized directly; the `Serialized*` mirrors keep the
//!   file format stable when the in-memory layout changes.
//! - Loading validates dimensions, parameter lengths and finiteness.
//! - The corruption RNG is not stored: a loaded [`Sda`] reseeds it from `config.seed`.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{
    Activation, Error, HiddenLayer, LinearRegression, LogisticRegression, Result, Sda, SdaConfig,
    TiedDecoder,
};

pub const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedLayer {
    pub in_dim: usize,
    pub out_dim: usize,
    pub activation: SerializedActivation,
    /// Row-major (out_dim, in_dim).
    pub weights: Vec<f32>,
    pub biases: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializedActivation {
    Sigmoid,
    Tanh,
    Identity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedDecoder {
    pub visible_bias: Vec<f32>,
    pub corruption_level: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedSda {
    pub format_version: u32,
    pub config: SdaConfig,
    pub layers: Vec<SerializedLayer>,
    pub decoders: Vec<SerializedDecoder>,
    pub output: SerializedLayer,
}

/// Single affine layer models (logistic and linear regression).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedRegression {
    pub format_version: u32,
    pub layer: SerializedLayer,
}

impl From<Activation> for SerializedActivation {
    fn from(value: Activation) -> Self {
        match value {
            Activation::Sigmoid => SerializedActivation::Sigmoid,
            Activation::Tanh => SerializedActivation::Tanh,
            Activation::Identity => SerializedActivation::Identity,
        }
    }
}

impl From<SerializedActivation> for Activation {
    fn from(value: SerializedActivation) -> Self {
        match value {
            SerializedActivation::Sigmoid => Activation::Sigmoid,
            SerializedActivation::Tanh => Activation::Tanh,
            SerializedActivation::Identity => Activation::Identity,
        }
    }
}

impl From<&HiddenLayer> for SerializedLayer {
    fn from(layer: &HiddenLayer) -> Self {
        Self {
            in_dim: layer.in_dim(),
            out_dim: layer.out_dim(),
            activation: layer.activation().into(),
            weights: layer.weights().to_vec(),
            biases: layer.biases().to_vec(),
        }
    }
}

impl TryFrom<SerializedLayer> for HiddenLayer {
    type Error = Error;

    fn try_from(value: SerializedLayer) -> Result<Self> {
        HiddenLayer::from_parts(
            value.in_dim,
            value.out_dim,
            value.activation.into(),
            value.weights,
            value.biases,
        )
        .map_err(|e| Error::InvalidData(format!("invalid layer: {e}")))
    }
}

impl From<&Sda> for SerializedSda {
    fn from(model: &Sda) -> Self {
        Self {
            format_version: MODEL_FORMAT_VERSION,
            config: model.config().clone(),
            layers: model.layers().iter().map(SerializedLayer::from).collect(),
            decoders: model
                .decoders()
                .iter()
                .map(|d| SerializedDecoder {
                    visible_bias: d.visible_bias().to_vec(),
                    corruption_level: d.corruption_level(),
                })
                .collect(),
            output: model.output_layer().layer().into(),
        }
    }
}

impl TryFrom<SerializedSda> for Sda {
    type Error = Error;

    fn try_from(value: SerializedSda) -> Result<Self> {
        check_version(value.format_version)?;

        let layers = value
            .layers
            .into_iter()
            .enumerate()
            .map(|(i, l)| {
                HiddenLayer::try_from(l).map_err(|e| Error::InvalidData(format!("layer {i}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        let decoders = value
            .decoders
            .into_iter()
            .map(|d| TiedDecoder::from_parts(d.visible_bias, d.corruption_level))
            .collect::<Result<Vec<_>>>()?;
        let output = LogisticRegression::from_layer(value.output.try_into()?)?;

        Sda::from_parts(value.config, layers, decoders, output)
    }
}

impl From<&LogisticRegression> for SerializedRegression {
    fn from(model: &LogisticRegression) -> Self {
        Self {
            format_version: MODEL_FORMAT_VERSION,
            layer: model.layer().into(),
        }
    }
}

impl TryFrom<SerializedRegression> for LogisticRegression {
    type Error = Error;

    fn try_from(value: SerializedRegression) -> Result<Self> {
        check_version(value.format_version)?;
        LogisticRegression::from_layer(value.layer.try_into()?)
    }
}

impl From<&LinearRegression> for SerializedRegression {
    fn from(model: &LinearRegression) -> Self {
        Self {
            format_version: MODEL_FORMAT_VERSION,
            layer: model.layer().into(),
        }
    }
}

impl TryFrom<SerializedRegression> for LinearRegression {
    type Error = Error;

    fn try_from(value: SerializedRegression) -> Result<Self> {
        check_version(value.format_version)?;
        LinearRegression::from_layer(value.layer.try_into()?)
    }
}

fn check_version(version: u32) -> Result<()> {
    if version != MODEL_FORMAT_VERSION {
        return Err(Error::InvalidData(format!(
            "unsupported model format_version {version}; expected {MODEL_FORMAT_VERSION}"
        )));
    }
    Ok(())
}

/// JSON persistence for models with a `Serialized*` mirror.
pub trait JsonModel: Sized {
    type Serialized: Serialize + DeserializeOwned + TryInto<Self, Error = Error>;

    fn to_serialized(&self) -> Self::Serialized;

    /// Serialize the model to a compact JSON string.
    fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(&self.to_serialized())
            .map_err(|e| Error::InvalidData(format!("failed to serialize model: {e}")))
    }

    /// Serialize the model to a pretty-printed JSON string.
    fn to_json_string_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_serialized())
            .map_err(|e| Error::InvalidData(format!("failed to serialize model: {e}")))
    }

    /// Parse a model from a JSON string.
    fn from_json_str(s: &str) -> Result<Self> {
        let ser: Self::Serialized = serde_json::from_str(s)
            .map_err(|e| Error::InvalidData(format!("failed to parse model json: {e}")))?;
        ser.try_into()
    }

    /// Save the model to a JSON file (pretty-printed).
    fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let s = self.to_json_string_pretty()?;
        let p = path.as_ref();
        std::fs::write(p, s)
            .map_err(|e| Error::Io(format!("failed to write {}: {e}", p.display())))
    }

    /// Load a model from a JSON file.
    fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        let s = std::fs::read_to_string(p)
            .map_err(|e| Error::Io(format!("failed to read {}: {e}", p.display())))?;
        Self::from_json_str(&s)
    }
}

impl JsonModel for Sda {
    type Serialized = SerializedSda;

    fn to_serialized(&self) -> SerializedSda {
        self.into()
    }
}

impl JsonModel for LogisticRegression {
    type Serialized = SerializedRegression;

    fn to_serialized(&self) -> SerializedRegression {
        self.into()
    }
}

impl JsonModel for LinearRegression {
    type Serialized = SerializedRegression;

    fn to_serialized(&self) -> SerializedRegression {
        self.into()
    }
}
