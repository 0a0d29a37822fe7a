//! Sampling-grid generation from affine parameters and its backward pass.

use crate::array::Array;
use crate::config::OutputDims;
use crate::error::Error;
use crate::util::{expect_rank, expect_shape, to_float};
use ndarray::{s, Array1, Array2, Array3, Axis, Ix3, NdFloat};

/// `count` evenly spaced values from `start` to `stop` inclusive, built as
/// `i * step + start` with `step = (stop - start) / (count - 1)`.
///
/// A single sample sits at the midpoint `(start + stop) / 2`, so a one-pixel
/// output axis samples the centre of the input instead of dividing by zero.
pub fn linspace<F: NdFloat>(start: F, stop: F, count: usize) -> Result<Array1<F>, Error> {
    match count {
        0 => Ok(Array1::zeros(0)),
        1 => Ok(Array1::from_elem(1, (start + stop) / (F::one() + F::one()))),
        _ => {
            let step = (stop - start) / to_float::<F>(count - 1)?;
            let values = (0..count)
                .map(|i| Ok(to_float::<F>(i)? * step + start))
                .collect::<Result<Vec<F>, Error>>()?;
            Ok(Array1::from(values))
        }
    }
}

/// Homogeneous mesh of normalized output coordinates, shape `(3, height * width)`.
///
/// Row 0 holds x (varying fastest, along the width), row 1 holds y and row 2 is
/// all ones. The mesh depends only on the output shape.
pub fn normalized_mesh<F: NdFloat>(height: usize, width: usize) -> Result<Array2<F>, Error> {
    let locations = height
        .checked_mul(width)
        .and_then(|p| p.checked_mul(3).map(|_| p))
        .ok_or_else(|| {
            Error::InvalidOperation(format!(
                "Mesh of {}x{} locations overflows usize",
                height, width
            ))
        })?;
    let one = F::one();
    let xs = linspace(-one, one, width)?;
    let ys = linspace(-one, one, height)?;
    Ok(Array2::from_shape_fn((3, locations), |(row, p)| match row {
        0 => xs[p % width],
        1 => ys[p / width],
        _ => one,
    }))
}

/// Applies each batch entry's 2x3 affine matrix to the normalized mesh.
///
/// `theta` must be `(N, 2, 3)` with `N == out_dims.batch`. Returns the sampling
/// grid with shape `(2, N, out_dims.height, out_dims.width)`; row 0 holds x and
/// row 1 holds y. Values are not clamped to `[-1, 1]`.
pub fn generate_grid<F: NdFloat>(theta: &Array<F>, out_dims: OutputDims) -> Result<Array<F>, Error> {
    expect_rank(theta.shape(), 3)?;
    expect_shape(theta.shape(), &[out_dims.batch, 2, 3])?;
    out_dims.checked_len()?;
    debug_println!(
        "generate_grid: theta={:?}, out_dims={:?}",
        theta.shape(),
        out_dims
    );

    let theta3 = theta
        .get_data()
        .view()
        .into_dimensionality::<Ix3>()
        .map_err(|e| Error::ShapeError(format!("theta is not 3D: {}", e)))?;
    let mesh = normalized_mesh::<F>(out_dims.height, out_dims.width)?;

    let n = out_dims.batch;
    let mut grid = Array3::<F>::zeros((2, n, out_dims.spatial_size()));
    for (b, affine) in theta3.axis_iter(Axis(0)).enumerate() {
        // (2, 3) x (3, P) -> (2, P)
        grid.slice_mut(s![.., b, ..]).assign(&affine.dot(&mesh));
    }

    let grid = grid
        .into_shape_with_order((2, n, out_dims.height, out_dims.width))
        .map_err(|e| Error::ShapeError(e.to_string()))?;
    Ok(Array::new(grid.into_dyn()))
}

/// Gradient of [`generate_grid`] with respect to `theta`.
///
/// `grad_grid` has the grid's shape `(2, N, H_out, W_out)`. The mesh is rebuilt
/// from `H_out` and `W_out` exactly as the forward pass built it; `theta` only
/// supplies the batch size since the grid is linear in it. Per batch entry the
/// result is `grad_grid_b (2 x P) . mesh^T (P x 3)`.
pub fn grid_backward<F: NdFloat>(theta: &Array<F>, grad_grid: &Array<F>) -> Result<Array<F>, Error> {
    expect_rank(theta.shape(), 3)?;
    expect_rank(grad_grid.shape(), 4)?;
    let n = theta.shape()[0];
    expect_shape(theta.shape(), &[n, 2, 3])?;
    let (out_h, out_w) = (grad_grid.shape()[2], grad_grid.shape()[3]);
    expect_shape(grad_grid.shape(), &[2, n, out_h, out_w])?;
    debug_println!(
        "grid_backward: theta={:?}, grad_grid={:?}",
        theta.shape(),
        grad_grid.shape()
    );

    let mesh = normalized_mesh::<F>(out_h, out_w)?;
    let grad_flat = grad_grid
        .get_data()
        .to_shape((2, n, out_h * out_w))
        .map_err(|e| Error::ShapeError(e.to_string()))?;

    let mut grad_theta = Array3::<F>::zeros((n, 2, 3));
    for (b, mut slot) in grad_theta.axis_iter_mut(Axis(0)).enumerate() {
        // (2, P) x (P, 3) -> (2, 3)
        let grad_b = grad_flat.index_axis(Axis(1), b);
        slot.assign(&grad_b.dot(&mesh.t()));
    }
    Ok(Array::new(grad_theta.into_dyn()))
}
