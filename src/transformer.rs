//! Explicit forward/backward pairing of the spatial-transformer kernels.

use crate::array::Array;
use crate::config::TransformerConfig;
use crate::error::Error;
use crate::ops::{self, transform_dims};
use ndarray::NdFloat;

/// Result of [`SpatialTransformer::forward`].
///
/// The grid is handed back to the caller so the backward pass can reuse it; the
/// transformer itself keeps nothing between calls.
#[derive(Debug, Clone)]
pub struct TransformerOutput<F> {
    /// Resampled image `(N, C, H_out, W_out)`.
    pub output: Array<F>,
    /// Sampling grid `(2, N, H_out, W_out)`.
    pub grid: Array<F>,
}

/// Gradients produced by [`SpatialTransformer::backward`].
#[derive(Debug, Clone)]
pub struct TransformerGrads<F> {
    pub input: Array<F>,
    pub grid: Array<F>,
    pub theta: Array<F>,
}

/// A differentiable affine resampler with fixed scale factors and border policy.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpatialTransformer {
    config: TransformerConfig,
}

impl SpatialTransformer {
    /// Fails if the configuration's scale factors are not finite and positive.
    pub fn new(config: TransformerConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TransformerConfig {
        &self.config
    }

    /// Generates the grid for `theta` and samples `input` through it.
    pub fn forward<F: NdFloat>(
        &self,
        input: &Array<F>,
        theta: &Array<F>,
    ) -> Result<TransformerOutput<F>, Error> {
        let out_dims = transform_dims(input, theta, &self.config)?;
        let grid = ops::generate_grid(theta, out_dims)?;
        let output = ops::sample(input, &grid, self.config.border_mode)?;
        Ok(TransformerOutput { output, grid })
    }

    /// Propagates `grad_output` back to the input image, the grid and `theta`.
    ///
    /// `grid` must be the grid returned by the matching `forward` call.
    pub fn backward<F: NdFloat>(
        &self,
        input: &Array<F>,
        theta: &Array<F>,
        grid: &Array<F>,
        grad_output: &Array<F>,
    ) -> Result<TransformerGrads<F>, Error> {
        let (grad_input, grad_grid) =
            ops::sample_backward(input, grid, grad_output, self.config.border_mode)?;
        let grad_theta = ops::grid_backward(theta, &grad_grid)?;
        Ok(TransformerGrads {
            input: grad_input,
            grid: grad_grid,
            theta: grad_theta,
        })
    }
}
