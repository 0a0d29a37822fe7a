//! A differentiable affine image resampler ("spatial transformer")
//!
//! Given a batch of NCHW feature maps and one 2x3 affine matrix per sample, the
//! crate generates a normalized sampling grid, bilinearly samples the input at the
//! grid locations and provides the matching backward passes:
//! - [`ops::generate_grid`] / [`ops::grid_backward`] - affine grid and its gradient w.r.t. theta
//! - [`ops::sample`] / [`ops::sample_backward`] - bilinear sampling and its gradients
//!   w.r.t. the input pixels and the grid
//! - [`SpatialTransformer`] - the explicit forward/backward pair composed from the above
//!
//! All kernels are pure functions, generic over the element precision (`f32` or `f64`).
//!
//! # Features
//! - `cpu_openblas` - Use OpenBLAS for the grid matrix products
//! - `rayon` - Process batch entries in parallel
//! - `serialization` - serde support and JSON persistence for configs and arrays
//! - `debug_logs` - Print shape/border-mode traces from every kernel
//!
//! # Example
//! ```rust
//! use spatial_transformer::{init, Array, BorderMode, SpatialTransformer, TransformerConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let input = Array::<f64>::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[1, 1, 2, 2])?;
//!     let theta = init::identity_theta::<f64>(1);
//!
//!     let config = TransformerConfig::new().with_border_mode("nearest".parse::<BorderMode>()?);
//!     let transformer = SpatialTransformer::new(config)?;
//!
//!     // The identity transform reproduces the input
//!     let fwd = transformer.forward(&input, &theta)?;
//!     assert_eq!(fwd.output.get_data(), input.get_data());
//!
//!     // Backward pass with an upstream gradient of ones
//!     let grad_output = Array::ones(fwd.output.shape());
//!     let grads = transformer.backward(&input, &theta, &fwd.grid, &grad_output)?;
//!     println!("Gradient of theta: {:?}", grads.theta);
//!     Ok(())
//! }
//! ```

// --- Central debug_println macro definition ---
/// Conditional logging macro. Prints if 'debug_logs' feature is enabled.
#[cfg(feature = "debug_logs")]
#[macro_export]
macro_rules! debug_println {
    ($($arg:tt)*) => {
        ::std::println!("[DEBUG {}] {}", module_path!(), ::std::format_args!($($arg)*))
    };
}

/// Conditional logging macro (disabled version). Does nothing.
#[cfg(not(feature = "debug_logs"))]
#[macro_export]
macro_rules! debug_println {
    ($($arg:tt)*) => {};
}

// Links the BLAS provider behind ndarray's `blas` feature
#[cfg(feature = "cpu_openblas")]
extern crate openblas_src;

// Declare the modules within the crate
pub mod array;
pub mod border;
pub mod config;
pub mod error;
pub mod init;
pub mod ops;
pub mod transformer;
mod util;

// Gradient-checking helpers, shared by unit and integration tests
pub mod test_utils;

// Re-export the public types for easier use by consumers of the library
pub use array::Array;
pub use border::BorderMode;
pub use config::{OutputDims, TransformerConfig};
pub use error::Error;
pub use ops::{generate_grid, grid_backward, sample, sample_backward, spatial_transform};
pub use transformer::{SpatialTransformer, TransformerGrads, TransformerOutput};
