use crate::array::Array;
use crate::error::Error;
use ndarray::{Array3, NdFloat};
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

/// Identity affine parameters `[[1, 0, 0], [0, 1, 0]]` for every batch entry.
pub fn identity_theta<F: NdFloat>(batch: usize) -> Array<F> {
    let theta = Array3::from_shape_fn((batch, 2, 3), |(_, row, col)| {
        if row == col {
            F::one()
        } else {
            F::zero()
        }
    });
    Array::new(theta.into_dyn())
}

/// Identity affine parameters plus independent N(0, std_dev^2) noise on all six entries.
///
/// The usual starting point for a localisation network's final layer.
pub fn perturbed_identity<F: NdFloat>(batch: usize, std_dev: f64) -> Result<Array<F>, Error> {
    perturbed_identity_with_rng(batch, std_dev, &mut rand::rng())
}

/// [`perturbed_identity`] drawing from a caller-supplied generator.
pub fn perturbed_identity_with_rng<F: NdFloat, R: Rng + ?Sized>(
    batch: usize,
    std_dev: f64,
    rng: &mut R,
) -> Result<Array<F>, Error> {
    if std_dev.is_nan() || std_dev < 0.0 {
        return Err(Error::InvalidOperation(format!(
            "Standard deviation ({}) must be non-negative for normal distribution",
            std_dev
        )));
    }
    let dist = Normal::new(0.0, std_dev).map_err(|_| Error::InitializationError)?;
    let mut theta = identity_theta::<F>(batch);
    for value in theta.get_data_mut().iter_mut() {
        let noise = F::from(dist.sample(rng)).ok_or(Error::InitializationError)?;
        *value += noise;
    }
    Ok(theta)
}

/// Array of the given shape filled from U(low, high).
pub fn random_uniform<F: NdFloat>(shape: &[usize], low: f64, high: f64) -> Result<Array<F>, Error> {
    random_uniform_with_rng(shape, low, high, &mut rand::rng())
}

/// [`random_uniform`] drawing from a caller-supplied generator.
pub fn random_uniform_with_rng<F: NdFloat, R: Rng + ?Sized>(
    shape: &[usize],
    low: f64,
    high: f64,
    rng: &mut R,
) -> Result<Array<F>, Error> {
    if high <= low {
        return Err(Error::InvalidOperation(format!(
            "Upper bound ({}) must be greater than lower bound ({}) for uniform distribution",
            high, low
        )));
    }

    // Use checked_product for potentially large shapes
    let size: usize = shape
        .iter()
        .try_fold(1usize, |acc, &x| acc.checked_mul(x))
        .ok_or_else(|| {
            Error::InvalidOperation("Shape dimensions multiply to overflow usize".to_string())
        })?;

    let dist = Uniform::new(low, high).map_err(|_| Error::InitializationError)?;
    let data = (0..size)
        .map(|_| F::from(dist.sample(rng)).ok_or(Error::InitializationError))
        .collect::<Result<Vec<F>, Error>>()?;
    Array::from_vec(data, shape)
}
