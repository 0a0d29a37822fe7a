use crate::error::Error;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "serialization")]
use std::fs::File;
#[cfg(feature = "serialization")]
use std::io::{BufReader, BufWriter};
#[cfg(feature = "serialization")]
use std::path::Path;

use ndarray::{ArrayD, IxDyn, NdFloat, ShapeError};

/// Owned, dynamically ranked host array.
///
/// Every kernel in the crate takes and returns `Array<F>`, where `F` is the
/// element precision (`f32` or `f64`) chosen once for a call graph. Rank is
/// dynamic so that shape preconditions are checked when a kernel is called.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct Array<F = f32> {
    pub(crate) data: ArrayD<F>,
}

impl<F: NdFloat> Array<F> {
    pub fn new(data: ArrayD<F>) -> Self {
        Self { data }
    }

    pub fn into_ndarray(self) -> ArrayD<F> {
        self.data
    }

    pub fn from_vec(data: Vec<F>, shape: &[usize]) -> Result<Self, Error> {
        let actual_len = data.len();
        let map_err = |_e: ShapeError| Error::ShapeMismatch {
            expected: shape.to_vec(),
            actual: vec![actual_len],
        };
        let array = ArrayD::from_shape_vec(IxDyn(shape), data).map_err(map_err)?;
        Ok(Self { data: array })
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            data: ArrayD::zeros(IxDyn(shape)),
        }
    }

    pub fn ones(shape: &[usize]) -> Self {
        Self {
            data: ArrayD::ones(IxDyn(shape)),
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the array contains no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get_data(&self) -> &ArrayD<F> {
        &self.data
    }

    pub fn get_data_mut(&mut self) -> &mut ArrayD<F> {
        &mut self.data
    }

    /// Elements in logical (row-major) order.
    pub fn into_raw_vec(self) -> Vec<F> {
        if !self.data.is_standard_layout() {
            return self.data.iter().copied().collect();
        }
        let len = self.data.len();
        match self.data.into_raw_vec_and_offset() {
            (raw, Some(0) | None) if raw.len() == len => raw,
            (raw, offset) => {
                let start = offset.unwrap_or(0);
                raw[start..start + len].to_vec()
            }
        }
    }

    /// Reshapes the array without changing its data.
    /// The new shape must have the same total number of elements.
    pub fn reshape(&mut self, shape: &[usize]) -> Result<(), Error> {
        let old_size = self.data.len();
        let new_size = shape.iter().product::<usize>();
        if old_size != new_size {
            return Err(Error::ShapeMismatch {
                expected: shape.to_vec(),
                actual: self.data.shape().to_vec(),
            });
        }
        let new_data = self
            .data
            .to_shape(IxDyn(shape))
            .map_err(|e| Error::ShapeError(e.to_string()))?
            .into_owned();
        self.data = new_data;
        Ok(())
    }
}

#[cfg(feature = "serialization")]
impl<F> Array<F>
where
    F: NdFloat + Serialize + for<'de> Deserialize<'de>,
{
    /// Writes the array (shape and data) to `path` as JSON.
    ///
    /// Used to checkpoint affine parameters between training runs.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let file = File::create(path)
            .map_err(|e| Error::IoErrorString(format!("Failed to create file: {}", e)))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer(writer, self)
            .map_err(|e| Error::SerializationError(format!("Failed to serialize array: {}", e)))
    }

    /// Loads an array previously written by [`Array::save_to_file`].
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path)
            .map_err(|e| Error::IoErrorString(format!("Failed to open file: {}", e)))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| {
            Error::DeserializationError(format!("Failed to deserialize array: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_length_mismatch() {
        let result = Array::<f32>::from_vec(vec![1.0, 2.0, 3.0], &[2, 2]);
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_reshape_keeps_row_major_order() {
        let mut a = Array::<f64>::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        a.reshape(&[3, 2]).unwrap();
        assert_eq!(a.shape(), &[3, 2]);
        assert_eq!(a.into_raw_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_reshape_size_mismatch() {
        let mut a = Array::<f64>::zeros(&[2, 3]);
        assert!(a.reshape(&[4, 2]).is_err());
    }
}
