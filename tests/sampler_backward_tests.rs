use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use spatial_transformer::init::random_uniform_with_rng;
use spatial_transformer::ops::{sample, sample_backward};
use spatial_transformer::{Array, BorderMode, Error};

fn column_grid(px: f64, width: usize) -> Array<f64> {
    let gx = px / ((width as f64 - 1.0) / 2.0) - 1.0;
    Array::from_vec(vec![gx, -1.0], &[2, 1, 1, 1]).unwrap()
}

#[test]
fn test_scatter_add_accumulates_shared_pixel() {
    // Two output locations both gather input pixel (0, 0) with weight 1.
    let input = Array::<f64>::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[1, 1, 2, 2]).unwrap();
    let grid = Array::from_vec(vec![-1.0, -1.0, -1.0, -1.0], &[2, 1, 1, 2]).unwrap();
    let grad_output = Array::from_vec(vec![3.0, 5.0], &[1, 1, 1, 2]).unwrap();

    let (grad_input, grad_grid) =
        sample_backward(&input, &grid, &grad_output, BorderMode::Nearest).unwrap();
    assert_eq!(grad_input.shape(), &[1, 1, 2, 2]);
    assert_eq!(grad_input.into_raw_vec(), vec![8.0, 0.0, 0.0, 0.0]);
    assert_eq!(grad_grid.shape(), &[2, 1, 1, 2]);
}

#[test]
fn test_upsampling_gradient_mass_is_preserved() {
    // Weights sum to one, so every channel's total gradient is conserved.
    let mut rng = StdRng::seed_from_u64(21);
    let input = random_uniform_with_rng::<f64, _>(&[2, 3, 3, 4], -1.0, 1.0, &mut rng).unwrap();
    let grid = random_uniform_with_rng::<f64, _>(&[2, 2, 7, 9], -1.4, 1.4, &mut rng).unwrap();
    let grad_output =
        random_uniform_with_rng::<f64, _>(&[2, 3, 7, 9], -1.0, 1.0, &mut rng).unwrap();

    for mode in BorderMode::ALL {
        let (grad_input, _) = sample_backward(&input, &grid, &grad_output, mode).unwrap();
        for b in 0..2 {
            for c in 0..3 {
                let upstream: f64 = grad_output
                    .get_data()
                    .slice(ndarray::s![b, c, .., ..])
                    .sum();
                let scattered: f64 = grad_input.get_data().slice(ndarray::s![b, c, .., ..]).sum();
                assert_relative_eq!(scattered, upstream, epsilon = 1e-10);
            }
        }
    }
}

#[test]
fn test_nearest_out_of_range_keeps_unclipped_weights() {
    // x = 4.3 on a 4 pixel row: both x neighbours clamp to column 3, the weights
    // 0.7 / 0.3 still come from the unclipped floor coordinates.
    let input = Array::<f64>::from_vec(vec![10.0, 20.0, 30.0, 40.0], &[1, 1, 1, 4]).unwrap();
    let grid = column_grid(4.3, 4);
    let grad_output = Array::from_vec(vec![2.0], &[1, 1, 1, 1]).unwrap();

    let (grad_input, grad_grid) =
        sample_backward(&input, &grid, &grad_output, BorderMode::Nearest).unwrap();
    let gi = grad_input.get_data();
    assert_relative_eq!(gi[[0, 0, 0, 0]], 0.0);
    assert_relative_eq!(gi[[0, 0, 0, 1]], 0.0);
    assert_relative_eq!(gi[[0, 0, 0, 2]], 0.0);
    assert_relative_eq!(gi[[0, 0, 0, 3]], 2.0, epsilon = 1e-9);
    // the clamped neighbours are the same pixel, so the output is flat in x
    assert_relative_eq!(grad_grid.get_data()[[0, 0, 0, 0]], 0.0, epsilon = 1e-9);
    assert_relative_eq!(grad_grid.get_data()[[1, 0, 0, 0]], 0.0);
}

#[test]
fn test_wrap_out_of_range_gradients() {
    let input = Array::<f64>::from_vec(vec![10.0, 20.0, 30.0, 40.0], &[1, 1, 1, 4]).unwrap();
    let grid = column_grid(4.3, 4);
    let grad_output = Array::from_vec(vec![2.0], &[1, 1, 1, 1]).unwrap();

    let (grad_input, grad_grid) =
        sample_backward(&input, &grid, &grad_output, BorderMode::Wrap).unwrap();
    let gi = grad_input.get_data();
    assert_relative_eq!(gi[[0, 0, 0, 0]], 0.7 * 2.0, epsilon = 1e-9);
    assert_relative_eq!(gi[[0, 0, 0, 1]], 0.3 * 2.0, epsilon = 1e-9);
    assert_relative_eq!(gi[[0, 0, 0, 2]], 0.0);
    assert_relative_eq!(gi[[0, 0, 0, 3]], 0.0);
    // d out / d x = I[x1] - I[x0] = 10, times (W - 1) / 2 = 1.5
    assert_relative_eq!(grad_grid.get_data()[[0, 0, 0, 0]], 2.0 * 10.0 * 1.5, epsilon = 1e-9);
}

#[test]
fn test_mirror_out_of_range_gradients() {
    let input = Array::<f64>::from_vec(vec![10.0, 20.0, 30.0, 40.0], &[1, 1, 1, 4]).unwrap();
    let grid = column_grid(4.3, 4);
    let grad_output = Array::from_vec(vec![2.0], &[1, 1, 1, 1]).unwrap();

    let (grad_input, grad_grid) =
        sample_backward(&input, &grid, &grad_output, BorderMode::Mirror).unwrap();
    let gi = grad_input.get_data();
    assert_relative_eq!(gi[[0, 0, 0, 0]], 0.0);
    assert_relative_eq!(gi[[0, 0, 0, 1]], 0.3 * 2.0, epsilon = 1e-9);
    assert_relative_eq!(gi[[0, 0, 0, 2]], 0.7 * 2.0, epsilon = 1e-9);
    assert_relative_eq!(gi[[0, 0, 0, 3]], 0.0);
    // I[x1] - I[x0] = 20 - 30
    assert_relative_eq!(grad_grid.get_data()[[0, 0, 0, 0]], 2.0 * -10.0 * 1.5, epsilon = 1e-9);
}

#[test]
fn test_interior_grid_gradient() {
    // f(x, y) = 1 + x + 2y on a 2x2 image: d f / d gx = 1 * 0.5, d f / d gy = 2 * 0.5
    let input = Array::<f64>::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[1, 1, 2, 2]).unwrap();
    let grid = Array::from_vec(vec![0.3, -0.4], &[2, 1, 1, 1]).unwrap();
    let grad_output = Array::from_vec(vec![1.0], &[1, 1, 1, 1]).unwrap();
    let (_, grad_grid) =
        sample_backward(&input, &grid, &grad_output, BorderMode::Nearest).unwrap();
    assert_relative_eq!(grad_grid.get_data()[[0, 0, 0, 0]], 0.5, epsilon = 1e-12);
    assert_relative_eq!(grad_grid.get_data()[[1, 0, 0, 0]], 1.0, epsilon = 1e-12);
}

#[test]
fn test_batch_entries_are_independent() {
    let mut rng = StdRng::seed_from_u64(8);
    let input = random_uniform_with_rng::<f64, _>(&[3, 2, 4, 4], -1.0, 1.0, &mut rng).unwrap();
    let grid = random_uniform_with_rng::<f64, _>(&[2, 3, 5, 5], -1.2, 1.2, &mut rng).unwrap();
    let grad_output =
        random_uniform_with_rng::<f64, _>(&[3, 2, 5, 5], -1.0, 1.0, &mut rng).unwrap();

    let output = sample(&input, &grid, BorderMode::Wrap).unwrap();
    let (grad_input, grad_grid) =
        sample_backward(&input, &grid, &grad_output, BorderMode::Wrap).unwrap();

    for b in 0..3 {
        let take = |a: &Array<f64>, axis: usize| {
            let view = a
                .get_data()
                .slice_axis(ndarray::Axis(axis), ndarray::Slice::from(b..b + 1));
            Array::new(view.to_owned())
        };
        let input_b = take(&input, 0);
        let grid_b = take(&grid, 1);
        let grad_output_b = take(&grad_output, 0);

        assert_eq!(sample(&input_b, &grid_b, BorderMode::Wrap).unwrap(), take(&output, 0));
        let (gi_b, gg_b) =
            sample_backward(&input_b, &grid_b, &grad_output_b, BorderMode::Wrap).unwrap();
        assert_eq!(gi_b, take(&grad_input, 0));
        assert_eq!(gg_b, take(&grad_grid, 1));
    }
}

#[test]
fn test_grad_output_shape_mismatch() {
    let input = Array::<f32>::ones(&[1, 2, 3, 3]);
    let grid = Array::<f32>::zeros(&[2, 1, 2, 2]);
    let grad_output = Array::<f32>::ones(&[1, 2, 3, 3]);
    assert!(matches!(
        sample_backward(&input, &grid, &grad_output, BorderMode::Nearest),
        Err(Error::ShapeMismatch { .. })
    ));
    let grad_output = Array::<f32>::ones(&[1, 2, 2]);
    assert!(matches!(
        sample_backward(&input, &grid, &grad_output, BorderMode::Nearest),
        Err(Error::DimensionMismatch(4, 3))
    ));
}

#[test]
fn test_zero_upstream_gives_zero_gradients() {
    let input = Array::<f32>::ones(&[2, 1, 3, 3]);
    let grid = Array::<f32>::from_vec(vec![0.25; 2 * 2 * 2 * 2], &[2, 2, 2, 2]).unwrap();
    let grad_output = Array::<f32>::zeros(&[2, 1, 2, 2]);
    let (grad_input, grad_grid) =
        sample_backward(&input, &grid, &grad_output, BorderMode::Mirror).unwrap();
    assert!(grad_input.get_data().iter().all(|&v| v == 0.0));
    assert!(grad_grid.get_data().iter().all(|&v| v == 0.0));
}
