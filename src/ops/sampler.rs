//! Bilinear sampling of NCHW images at sampling-grid locations, and its backward pass.
//!
//! Both passes work on a channel-last view of the input: each batch entry is a
//! `(H * W, C)` matrix whose row `y * W + x` holds the channel vector of pixel
//! `(x, y)`, so one row gather fetches a whole channel vector. Work is split per
//! batch entry; batch entries own disjoint rows of the input gradient, which makes
//! the scatter-add race free when entries run in parallel (`rayon` feature).

use crate::array::Array;
use crate::border::BorderMode;
use crate::config::OutputDims;
use crate::error::Error;
use crate::util::{expect_rank, expect_shape, to_float, to_index};
use ndarray::{Array3, ArrayD, ArrayView2, ArrayViewMut2, Axis, Ix4, NdFloat, Zip};

/// Extent of the sampled image and the border policy applied to its neighbours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleGeometry<F> {
    height: usize,
    width: usize,
    height_f: F,
    width_f: F,
    border_mode: BorderMode,
}

impl<F: NdFloat> SampleGeometry<F> {
    /// Fails with `EmptyTensor` if either extent is zero, since no pixel could be gathered.
    pub fn new(height: usize, width: usize, border_mode: BorderMode) -> Result<Self, Error> {
        if height == 0 || width == 0 {
            return Err(Error::EmptyTensor);
        }
        Ok(Self {
            height,
            width,
            height_f: to_float(height)?,
            width_f: to_float(width)?,
            border_mode,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn border_mode(&self) -> BorderMode {
        self.border_mode
    }

    /// Converts a normalized grid coordinate pair to pixel space:
    /// `x = (gx + 1) / 2 * (W - 1)`, `y = (gy + 1) / 2 * (H - 1)`.
    pub fn to_pixel(&self, gx: F, gy: F) -> (F, F) {
        let (scale_x, scale_y) = self.pixel_scale();
        ((gx + F::one()) * scale_x, (gy + F::one()) * scale_y)
    }

    /// `d pixel / d normalized` along x and y: `(W - 1) / 2` and `(H - 1) / 2`.
    pub fn pixel_scale(&self) -> (F, F) {
        let one = F::one();
        let two = one + one;
        ((self.width_f - one) / two, (self.height_f - one) / two)
    }
}

/// The 2x2 pixel neighbourhood of one sampling location.
///
/// Corners are ordered `a = (x0, y0)`, `b = (x0, y1)`, `c = (x1, y0)`,
/// `d = (x1, y1)`. Indices have the border policy applied; weights and their
/// partials always come from the unclipped floor coordinates, so the four
/// weights sum to one under every policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighborhood<F> {
    /// Rows `y * W + x` of one batch entry's `(H * W, C)` pixel matrix.
    pub indices: [usize; 4],
    pub weights: [F; 4],
    /// Partial derivative of each weight w.r.t. the pixel-space x coordinate.
    pub dx: [F; 4],
    /// Partial derivative of each weight w.r.t. the pixel-space y coordinate.
    pub dy: [F; 4],
}

impl<F: NdFloat> Neighborhood<F> {
    /// Locates the neighbourhood of normalized grid point `(gx, gy)`.
    ///
    /// Fails with `InvalidOperation` if the point maps to a pixel coordinate that
    /// is not finite or is too large for its two neighbours to be distinct.
    pub fn locate(gx: F, gy: F, geometry: &SampleGeometry<F>) -> Result<Self, Error> {
        let one = F::one();
        let (x, y) = geometry.to_pixel(gx, gy);

        let x0_f = x.floor();
        let y0_f = y.floor();
        let x1_f = x0_f + one;
        let y1_f = y0_f + one;
        if !x1_f.is_finite() || !y1_f.is_finite() || x1_f == x0_f || y1_f == y0_f {
            return Err(Error::InvalidOperation(format!(
                "grid point ({}, {}) maps to unresolvable pixel coordinate ({}, {})",
                gx, gy, x, y
            )));
        }

        let border = geometry.border_mode;
        let x0 = to_index(border.resolve(x0_f, geometry.width_f))?;
        let x1 = to_index(border.resolve(x1_f, geometry.width_f))?;
        let y0 = to_index(border.resolve(y0_f, geometry.height_f))?;
        let y1 = to_index(border.resolve(y1_f, geometry.height_f))?;

        let w = geometry.width;
        let indices = [y0 * w + x0, y1 * w + x0, y0 * w + x1, y1 * w + x1];

        // distances to the far and near neighbour along each axis
        let (far_x, near_x) = (x1_f - x, x - x0_f);
        let (far_y, near_y) = (y1_f - y, y - y0_f);

        Ok(Self {
            indices,
            weights: [
                far_x * far_y,
                far_x * near_y,
                near_x * far_y,
                near_x * near_y,
            ],
            dx: [-far_y, -near_y, far_y, near_y],
            dy: [-far_x, far_x, -near_x, near_x],
        })
    }

    pub fn weight_sum(&self) -> F {
        self.weights.iter().fold(F::zero(), |acc, &w| acc + w)
    }
}

/// Validated shapes shared by the forward and backward passes.
struct SamplerShape<F> {
    batch: usize,
    channels: usize,
    out_height: usize,
    out_width: usize,
    geometry: SampleGeometry<F>,
}

impl<F: NdFloat> SamplerShape<F> {
    fn check(input: &Array<F>, grid: &Array<F>, border_mode: BorderMode) -> Result<Self, Error> {
        expect_rank(input.shape(), 4)?;
        expect_rank(grid.shape(), 4)?;
        let (n, c, h, w) = (
            input.shape()[0],
            input.shape()[1],
            input.shape()[2],
            input.shape()[3],
        );
        let (out_height, out_width) = (grid.shape()[2], grid.shape()[3]);
        if grid.shape()[1] != n {
            return Err(Error::IncompatibleShapes {
                op: "sample".to_string(),
                shape_a: input.shape().to_vec(),
                shape_b: grid.shape().to_vec(),
            });
        }
        expect_shape(grid.shape(), &[2, n, out_height, out_width])?;
        if grid.get_data().iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidOperation(
                "sampling grid contains non-finite coordinates".to_string(),
            ));
        }
        OutputDims::new(n, c, out_height, out_width).checked_len()?;
        Ok(Self {
            batch: n,
            channels: c,
            out_height,
            out_width,
            geometry: SampleGeometry::new(h, w, border_mode)?,
        })
    }

    fn out_shape(&self) -> Vec<usize> {
        vec![self.batch, self.channels, self.out_height, self.out_width]
    }

    fn locations(&self) -> usize {
        self.out_height * self.out_width
    }

    fn pixels(&self) -> usize {
        self.geometry.height * self.geometry.width
    }
}

/// Permutes a 4D array with `axes` and flattens the middle two resulting axes,
/// giving `(d0, d1 * d2, d3)` rows.
fn to_rows<F: NdFloat>(data: &ArrayD<F>, axes: [usize; 4]) -> Result<Array3<F>, Error> {
    let permuted = data
        .view()
        .into_dimensionality::<Ix4>()
        .map_err(|e| Error::ShapeError(e.to_string()))?
        .permuted_axes(axes);
    let (d0, d1, d2, d3) = permuted.dim();
    let rows = permuted
        .to_shape((d0, d1 * d2, d3))
        .map_err(|e| Error::ShapeError(e.to_string()))?;
    Ok(rows.into_owned())
}

/// Inverse of [`to_rows`]: splits axis 1 into `(d1, d2)` and permutes with `axes`.
fn from_rows<F: NdFloat>(
    rows: Array3<F>,
    d1: usize,
    d2: usize,
    axes: [usize; 4],
) -> Result<Array<F>, Error> {
    let (d0, _, d3) = rows.dim();
    let split = rows
        .into_shape_with_order((d0, d1, d2, d3))
        .map_err(|e| Error::ShapeError(e.to_string()))?;
    let permuted = split.permuted_axes(axes);
    Ok(Array::new(permuted.as_standard_layout().into_owned().into_dyn()))
}

/// Samples `input` `(N, C, H, W)` at `grid` `(2, N, H_out, W_out)` with bilinear
/// interpolation, returning `(N, C, H_out, W_out)`.
pub fn sample<F: NdFloat>(
    input: &Array<F>,
    grid: &Array<F>,
    border_mode: BorderMode,
) -> Result<Array<F>, Error> {
    let shape = SamplerShape::check(input, grid, border_mode)?;
    debug_println!(
        "sample: input={:?}, grid={:?}, border_mode={}",
        input.shape(),
        grid.shape(),
        border_mode
    );

    // (N, H*W, C) and (N, P, 2)
    let pixels = to_rows(input.get_data(), [0, 2, 3, 1])?;
    let coords = to_rows(grid.get_data(), [1, 2, 3, 0])?;
    let mut out = Array3::<F>::zeros((shape.batch, shape.locations(), shape.channels));
    let geometry = &shape.geometry;

    let zip = Zip::from(out.axis_iter_mut(Axis(0)))
        .and(pixels.axis_iter(Axis(0)))
        .and(coords.axis_iter(Axis(0)));
    #[cfg(feature = "rayon")]
    let status = zip.par_map_collect(|out_b, pixels_b, coords_b| {
        sample_batch(out_b, pixels_b, coords_b, geometry)
    });
    #[cfg(not(feature = "rayon"))]
    let status =
        zip.map_collect(|out_b, pixels_b, coords_b| sample_batch(out_b, pixels_b, coords_b, geometry));
    status.into_iter().collect::<Result<(), Error>>()?;

    let output = from_rows(out, shape.out_height, shape.out_width, [0, 3, 1, 2])?;
    debug_assert_eq!(output.shape(), shape.out_shape().as_slice());
    Ok(output)
}

fn sample_batch<F: NdFloat>(
    mut out: ArrayViewMut2<F>,
    pixels: ArrayView2<F>,
    coords: ArrayView2<F>,
    geometry: &SampleGeometry<F>,
) -> Result<(), Error> {
    for (mut out_row, coord) in out.outer_iter_mut().zip(coords.outer_iter()) {
        let hood = Neighborhood::locate(coord[0], coord[1], geometry)?;
        for (&idx, &weight) in hood.indices.iter().zip(hood.weights.iter()) {
            out_row.scaled_add(weight, &pixels.row(idx));
        }
    }
    Ok(())
}

/// Backward pass of [`sample`].
///
/// Given the upstream gradient `grad_output` `(N, C, H_out, W_out)`, returns
/// `(grad_input, grad_grid)` shaped like `input` and `grid`. Neighbourhoods are
/// recomputed with the same border policy as the forward pass. Contributions of
/// several output locations to one input pixel are summed.
pub fn sample_backward<F: NdFloat>(
    input: &Array<F>,
    grid: &Array<F>,
    grad_output: &Array<F>,
    border_mode: BorderMode,
) -> Result<(Array<F>, Array<F>), Error> {
    let shape = SamplerShape::check(input, grid, border_mode)?;
    expect_rank(grad_output.shape(), 4)?;
    expect_shape(grad_output.shape(), &shape.out_shape())?;
    debug_println!(
        "sample_backward: input={:?}, grid={:?}, grad_output={:?}, border_mode={}",
        input.shape(),
        grid.shape(),
        grad_output.shape(),
        border_mode
    );

    let pixels = to_rows(input.get_data(), [0, 2, 3, 1])?;
    let coords = to_rows(grid.get_data(), [1, 2, 3, 0])?;
    let grad_rows = to_rows(grad_output.get_data(), [0, 2, 3, 1])?;
    let mut grad_pixels = Array3::<F>::zeros((shape.batch, shape.pixels(), shape.channels));
    let mut grad_coords = Array3::<F>::zeros((shape.batch, shape.locations(), 2));
    let geometry = &shape.geometry;

    let zip = Zip::from(grad_pixels.axis_iter_mut(Axis(0)))
        .and(grad_coords.axis_iter_mut(Axis(0)))
        .and(pixels.axis_iter(Axis(0)))
        .and(coords.axis_iter(Axis(0)))
        .and(grad_rows.axis_iter(Axis(0)));
    #[cfg(feature = "rayon")]
    let status = zip.par_map_collect(
        |grad_pixels_b, grad_coords_b, pixels_b, coords_b, grad_rows_b| {
            sample_backward_batch(
                grad_pixels_b,
                grad_coords_b,
                pixels_b,
                coords_b,
                grad_rows_b,
                geometry,
            )
        },
    );
    #[cfg(not(feature = "rayon"))]
    let status = zip.map_collect(|grad_pixels_b, grad_coords_b, pixels_b, coords_b, grad_rows_b| {
        sample_backward_batch(
            grad_pixels_b,
            grad_coords_b,
            pixels_b,
            coords_b,
            grad_rows_b,
            geometry,
        )
    });
    status.into_iter().collect::<Result<(), Error>>()?;

    let grad_input = from_rows(
        grad_pixels,
        shape.geometry.height,
        shape.geometry.width,
        [0, 3, 1, 2],
    )?;
    let grad_grid = from_rows(grad_coords, shape.out_height, shape.out_width, [3, 0, 1, 2])?;
    Ok((grad_input, grad_grid))
}

fn sample_backward_batch<F: NdFloat>(
    mut grad_pixels: ArrayViewMut2<F>,
    mut grad_coords: ArrayViewMut2<F>,
    pixels: ArrayView2<F>,
    coords: ArrayView2<F>,
    grad_rows: ArrayView2<F>,
    geometry: &SampleGeometry<F>,
) -> Result<(), Error> {
    let (scale_x, scale_y) = geometry.pixel_scale();
    let locations = grad_coords
        .outer_iter_mut()
        .zip(coords.outer_iter())
        .zip(grad_rows.outer_iter());
    for ((mut grad_coord, coord), grad_row) in locations {
        let hood = Neighborhood::locate(coord[0], coord[1], geometry)?;
        let mut grad_x = F::zero();
        let mut grad_y = F::zero();
        for k in 0..4 {
            let idx = hood.indices[k];
            let upstream_dot_pixel = grad_row.dot(&pixels.row(idx));
            grad_x += hood.dx[k] * upstream_dot_pixel;
            grad_y += hood.dy[k] * upstream_dot_pixel;
            grad_pixels
                .row_mut(idx)
                .scaled_add(hood.weights[k], &grad_row);
        }
        grad_coord[0] = grad_x * scale_x;
        grad_coord[1] = grad_y * scale_y;
    }
    Ok(())
}
