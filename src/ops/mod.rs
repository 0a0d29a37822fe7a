//! Spatial-transformer kernels: grid generation, bilinear sampling and their
//! backward passes, plus the composed forward entry point.
//!
//! Every function is pure and generic over the element precision `F`, so one
//! call graph runs entirely in `f32` or entirely in `f64`.

pub mod grid;
pub mod sampler;

pub use grid::{generate_grid, grid_backward, linspace, normalized_mesh};
pub use sampler::{sample, sample_backward, Neighborhood, SampleGeometry};

use crate::array::Array;
use crate::config::{OutputDims, TransformerConfig};
use crate::error::Error;
use crate::util::expect_rank;
use ndarray::NdFloat;

/// Resamples `input` `(N, C, H, W)` through the per-sample affine matrices `theta`
/// `(N, 2, 3)`.
///
/// The output has shape `(N, C, floor(scale_height * H), floor(scale_width * W))`.
/// Equivalent to `sample(input, generate_grid(theta, dims), border_mode)`.
///
/// # Errors
/// * `DimensionMismatch` if `input` is not 4D or `theta` is not 3D.
/// * `IncompatibleShapes` if the batch sizes of `input` and `theta` differ.
/// * `InvalidOperation` if a scale factor is not finite and positive.
pub fn spatial_transform<F: NdFloat>(
    input: &Array<F>,
    theta: &Array<F>,
    config: &TransformerConfig,
) -> Result<Array<F>, Error> {
    let out_dims = transform_dims(input, theta, config)?;
    debug_println!(
        "spatial_transform: input={:?}, theta={:?}, out_dims={:?}, border_mode={}",
        input.shape(),
        theta.shape(),
        out_dims,
        config.border_mode
    );
    let grid = generate_grid(theta, out_dims)?;
    sample(input, &grid, config.border_mode)
}

/// Checks the `input` / `theta` preconditions and derives the output shape.
pub(crate) fn transform_dims<F: NdFloat>(
    input: &Array<F>,
    theta: &Array<F>,
    config: &TransformerConfig,
) -> Result<OutputDims, Error> {
    expect_rank(input.shape(), 4)?;
    expect_rank(theta.shape(), 3)?;
    if input.shape()[0] != theta.shape()[0] {
        return Err(Error::IncompatibleShapes {
            op: "spatial_transform".to_string(),
            shape_a: input.shape().to_vec(),
            shape_b: theta.shape().to_vec(),
        });
    }
    OutputDims::from_input(input.shape(), config)
}
