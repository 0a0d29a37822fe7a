use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Shape error: {0}")]
    ShapeError(String),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Incompatible shapes for operation {op}: {shape_a:?} and {shape_b:?}")]
    IncompatibleShapes {
        op: String,
        shape_a: Vec<usize>,
        shape_b: Vec<usize>,
    },

    #[error("Dimension mismatch: expected {0}, got {1}")]
    DimensionMismatch(usize, usize),

    #[error("Invalid border mode '{0}': expected one of 'nearest', 'mirror', 'wrap'")]
    InvalidBorderMode(String),

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("I/O error: {0}")]
    IoErrorString(String),

    #[cfg(feature = "serialization")]
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[cfg(feature = "serialization")]
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Operation cannot be performed on an empty image")]
    EmptyTensor,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Error during parameter initialization")]
    InitializationError,

    #[error("Internal logic error: {0}")]
    InternalLogicError(String),

    #[error("Gradient check error: analytical={analytical:?}, numerical={numerical:?}, max_rel_error={max_rel_error}, max_abs_error={max_abs_error}, at_index={at_index}")]
    GradientCheckError {
        analytical: Vec<f64>,
        numerical: Vec<f64>,
        max_rel_error: f64,
        max_abs_error: f64,
        at_index: usize,
    },
}
