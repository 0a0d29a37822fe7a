use crate::error::Error;
use ndarray::NdFloat;

/// Converts a dimension or loop index into the active float precision.
pub(crate) fn to_float<F: NdFloat>(value: usize) -> Result<F, Error> {
    F::from(value).ok_or_else(|| {
        Error::InternalLogicError(format!("{} is not representable as a float", value))
    })
}

/// Converts an integral, non-negative float produced by a border policy into an index.
pub(crate) fn to_index<F: NdFloat>(value: F) -> Result<usize, Error> {
    value.to_usize().ok_or_else(|| {
        Error::InternalLogicError(format!("{} does not resolve to a pixel index", value))
    })
}

/// Fails with `DimensionMismatch` unless `shape` has exactly `rank` axes.
pub(crate) fn expect_rank(shape: &[usize], rank: usize) -> Result<(), Error> {
    if shape.len() != rank {
        return Err(Error::DimensionMismatch(rank, shape.len()));
    }
    Ok(())
}

/// Fails with `ShapeMismatch` unless `actual` equals `expected`.
pub(crate) fn expect_shape(actual: &[usize], expected: &[usize]) -> Result<(), Error> {
    if actual != expected {
        return Err(Error::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
    Ok(())
}
