//! Validation metrics and error curves.
//!
//! Metrics run sample by sample through [`Model::predict`], so they work for any model
//! and never touch its parameters.

use std::io::Write;

use crate::{Dataset, Error, Model, Result};

/// Fraction of samples whose predicted class differs from the label.
pub fn classification_error<M>(model: &M, data: &Dataset<usize>) -> Result<f32>
where
    M: Model<Output = usize>,
{
    check_dataset(model, data.len(), data.input_dim())?;
    let mut wrong = 0_usize;
    for idx in 0..data.len() {
        if model.predict(data.input(idx))? != *data.target(idx) {
            wrong += 1;
        }
    }
    Ok(wrong as f32 / data.len() as f32)
}

/// Squared error averaged over outputs, then over samples.
pub fn mean_squared_error<M>(model: &M, data: &Dataset<Vec<f32>>) -> Result<f32>
where
    M: Model<Output = Vec<f32>>,
{
    check_dataset(model, data.len(), data.input_dim())?;
    let mut total = 0.0_f32;
    for idx in 0..data.len() {
        let pred = model.predict(data.input(idx))?;
        let target = data.target(idx);
        if pred.len() != target.len() || target.is_empty() {
            return Err(Error::InvalidShape(format!(
                "sample {idx}: prediction len {} does not match target len {}",
                pred.len(),
                target.len()
            )));
        }
        let sum_sq: f32 = pred.iter().zip(target).map(|(p, t)| (p - t) * (p - t)).sum();
        total += sum_sq / target.len() as f32;
    }
    Ok(total / data.len() as f32)
}

fn check_dataset<M: Model>(model: &M, len: usize, input_dim: usize) -> Result<()> {
    if len == 0 {
        return Err(Error::InvalidData("dataset must not be empty".to_owned()));
    }
    if input_dim != model.input_dim() {
        return Err(Error::InvalidData(format!(
            "dataset input_dim {input_dim} does not match model input_dim {}",
            model.input_dim()
        )));
    }
    Ok(())
}

/// Training cost and validation error recorded after every completed batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorCurve {
    pub train: Vec<f32>,
    pub valid: Vec<f32>,
}

impl ErrorCurve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, train: f32, valid: f32) {
        self.train.push(train);
        self.valid.push(valid);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.train.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.train.is_empty()
    }

    /// Lowest validation error and the batch it was reached at.
    pub fn best_valid(&self) -> Option<(usize, f32)> {
        self.valid
            .iter()
            .copied()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Write `batch,train,valid` rows with a header line.
    pub fn write_csv<W: Write>(&self, mut out: W) -> Result<()> {
        writeln!(out, "batch,train,valid")?;
        for (i, (t, v)) in self.train.iter().zip(&self.valid).enumerate() {
            writeln!(out, "{},{t},{v}", i + 1)?;
        }
        out.flush()?;
        Ok(())
    }
}
