//! Contiguous sample storage.
//!
//! `Inputs` holds a row-major `(len, input_dim)` feature matrix. `Dataset<T>` pairs it
//! with one target per row: a class index (`usize`) for classifiers or a `Vec<f32>` row
//! for regressors.

use crate::{Error, Result};

/// A collection of input samples (X).
///
/// Stored as a contiguous buffer with row-major layout:
/// - `inputs.len() == len * input_dim`
#[derive(Debug, Clone, PartialEq)]
pub struct Inputs {
    inputs: Vec<f32>,
    len: usize,
    input_dim: usize,
}

impl Inputs {
    /// Empty inputs with room for `capacity` rows.
    pub fn with_capacity(input_dim: usize, capacity: usize) -> Result<Self> {
        if input_dim == 0 {
            return Err(Error::InvalidData("input_dim must be > 0".to_owned()));
        }
        Ok(Self {
            inputs: Vec::with_capacity(capacity * input_dim),
            len: 0,
            input_dim,
        })
    }

    /// Build inputs from a flat buffer with shape `(len, input_dim)`.
    pub fn from_flat(inputs: Vec<f32>, input_dim: usize) -> Result<Self> {
        if input_dim == 0 {
            return Err(Error::InvalidData("input_dim must be > 0".to_owned()));
        }
        if !inputs.len().is_multiple_of(input_dim) {
            return Err(Error::InvalidData(format!(
                "inputs length {} is not divisible by input_dim {}",
                inputs.len(),
                input_dim
            )));
        }

        let len = inputs.len() / input_dim;

        Ok(Self {
            inputs,
            len,
            input_dim,
        })
    }

    /// Build inputs from per-sample rows (copied into contiguous storage).
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let first = rows
            .first()
            .ok_or_else(|| Error::InvalidData("inputs must not be empty".to_owned()))?;

        let mut inputs = Self::with_capacity(first.len(), rows.len())?;
        for row in rows {
            inputs.push(row)?;
        }
        Ok(inputs)
    }

    /// Append one row.
    pub fn push(&mut self, row: &[f32]) -> Result<()> {
        if row.len() != self.input_dim {
            return Err(Error::InvalidShape(format!(
                "input row {} has len {}, expected {}",
                self.len,
                row.len(),
                self.input_dim
            )));
        }
        self.inputs.extend_from_slice(row);
        self.len += 1;
        Ok(())
    }

    /// Drop every row, keeping the allocation.
    #[inline]
    pub fn clear(&mut self) {
        self.inputs.clear();
        self.len = 0;
    }

    #[inline]
    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    /// Returns true if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    /// Returns the per-sample input dimension.
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    #[inline]
    /// Returns the `idx`-th input row (shape: `(input_dim,)`).
    ///
    /// Panics if `idx >= len`.
    pub fn row(&self, idx: usize) -> &[f32] {
        let start = idx * self.input_dim;
        &self.inputs[start..start + self.input_dim]
    }

    #[inline]
    /// The whole `(len, input_dim)` buffer.
    pub fn as_flat(&self) -> &[f32] {
        &self.inputs
    }

    /// Contiguous rows `start..end` as a flat slice.
    ///
    /// Panics if the range is out of bounds.
    #[inline]
    pub fn rows(&self, start: usize, end: usize) -> &[f32] {
        &self.inputs[start * self.input_dim..end * self.input_dim]
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[f32]> + '_ {
        self.inputs.chunks_exact(self.input_dim)
    }
}

/// A supervised dataset: inputs (X) and one target per row (Y).
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset<T> {
    inputs: Inputs,
    targets: Vec<T>,
}

impl<T> Dataset<T> {
    pub fn new(inputs: Inputs, targets: Vec<T>) -> Result<Self> {
        if inputs.len() != targets.len() {
            return Err(Error::InvalidData(format!(
                "inputs/targets length mismatch: {} vs {}",
                inputs.len(),
                targets.len()
            )));
        }
        Ok(Self { inputs, targets })
    }

    /// Build a dataset from a flat `(len, input_dim)` buffer and per-row targets.
    pub fn from_flat(inputs: Vec<f32>, input_dim: usize, targets: Vec<T>) -> Result<Self> {
        Self::new(Inputs::from_flat(inputs, input_dim)?, targets)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.inputs.input_dim()
    }

    #[inline]
    pub fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    #[inline]
    pub fn targets(&self) -> &[T] {
        &self.targets
    }

    #[inline]
    pub fn input(&self, idx: usize) -> &[f32] {
        self.inputs.row(idx)
    }

    #[inline]
    pub fn target(&self, idx: usize) -> &T {
        &self.targets[idx]
    }

    /// Split into `(head, tail)` where `head` holds the first `at` samples.
    pub fn split_at(self, at: usize) -> Result<(Self, Self)> {
        if at > self.len() {
            return Err(Error::InvalidData(format!(
                "split index {at} exceeds dataset length {}",
                self.len()
            )));
        }
        let dim = self.input_dim();
        let Self {
            inputs,
            mut targets,
        } = self;

        let mut flat = inputs.inputs;
        let tail_flat = flat.split_off(at * dim);
        let tail_targets = targets.split_off(at);

        let head = Self::from_flat(flat, dim, targets)?;
        let tail = Self::from_flat(tail_flat, dim, tail_targets)?;
        Ok((head, tail))
    }
}

impl Dataset<Vec<f32>> {
    /// Per-row target dimension, validated to be uniform.
    pub fn target_dim(&self) -> Result<usize> {
        let dim = self.targets.first().map(Vec::len).unwrap_or(0);
        for (i, t) in self.targets.iter().enumerate() {
            if t.len() != dim {
                return Err(Error::InvalidData(format!(
                    "target row {i} has len {}, expected {dim}",
                    t.len()
                )));
            }
        }
        Ok(dim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_from_flat_validates_shapes() {
        let ok = Dataset::from_flat(vec![0.0, 1.0, 2.0, 3.0], 2, vec![0_usize, 1]);
        assert!(ok.is_ok());

        let err = Dataset::from_flat(vec![0.0, 1.0, 2.0], 2, vec![0_usize]);
        assert!(err.is_err());

        let err = Dataset::from_flat(vec![0.0, 1.0, 2.0, 3.0], 2, vec![0_usize]);
        assert!(err.is_err());
    }

    #[test]
    fn push_rejects_wrong_width_and_clear_keeps_dim() {
        let mut inputs = Inputs::with_capacity(2, 4).unwrap();
        inputs.push(&[1.0, 2.0]).unwrap();
        assert!(inputs.push(&[1.0]).is_err());
        assert_eq!(inputs.len(), 1);

        inputs.clear();
        assert!(inputs.is_empty());
        assert_eq!(inputs.input_dim(), 2);
    }

    #[test]
    fn split_at_keeps_rows_aligned_with_targets() {
        let ds = Dataset::from_flat(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0], 2, vec![7_usize, 8, 9])
            .unwrap();
        let (head, tail) = ds.split_at(2).unwrap();
        assert_eq!(head.len(), 2);
        assert_eq!(tail.len(), 1);
        assert_eq!(tail.input(0), &[4.0, 5.0]);
        assert_eq!(*tail.target(0), 9);
    }
}
