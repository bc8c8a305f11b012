//! Model output normalisation
//!
//! Exported classifiers disagree on output shape. Every shape we accept maps
//! to one scalar probability:
//!
//! | shape      | value      |
//! |------------|------------|
//! | `[]`       | the scalar |
//! | `[1]`      | `[0]`      |
//! | `[n]`, n≥2 | `[1]` (positive class) |
//! | `[n, 1]`   | `[0, 0]`   |
//! | `[1, w]`, w≥2 | `[0, 1]` (positive class) |
//!
//! Anything else is `UnsupportedOutputShape`.

use super::DetectorError;

/// Raw tensor pulled out of a classifier
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl RawOutput {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self { shape, data }
    }

    pub fn scalar(value: f32) -> Self {
        Self::new(Vec::new(), vec![value])
    }

    pub fn probability(&self) -> Result<f32, DetectorError> {
        normalize_output(&self.shape, &self.data)
    }
}

pub fn normalize_output(shape: &[usize], data: &[f32]) -> Result<f32, DetectorError> {
    let unsupported = || DetectorError::UnsupportedOutputShape { shape: shape.to_vec() };

    let expected: usize = shape.iter().product();
    if data.is_empty() || data.len() != expected {
        return Err(unsupported());
    }

    match *shape {
        [] | [1] => Ok(data[0]),
        [n] if n >= 2 => Ok(data[1]),
        [_, 1] => Ok(data[0]),
        [1, w] if w >= 2 => Ok(data[1]),
        _ => Err(unsupported()),
    }
}
