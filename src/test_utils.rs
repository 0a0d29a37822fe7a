use crate::{Array, Error};
use ndarray::NdFloat;

/// Checks an analytical gradient against central finite differences.
///
/// # Arguments
/// * `func`: A closure mapping a point to a scalar loss.
/// * `point`: The point at which the gradient is evaluated.
/// * `analytical`: The gradient to check, shaped like `point`.
/// * `epsilon`: A small value for finite difference perturbation (e.g., 1e-6 for `f64`).
/// * `tolerance`: The maximum allowed error. Errors are relative for gradients larger
///   than one in magnitude and absolute otherwise.
///
/// # Returns
/// * `Ok(())` if the gradients match within the tolerance.
/// * `Err(Error::GradientCheckError)` describing the worst mismatch otherwise.
pub fn check_gradient<F, L>(
    func: L,
    point: &Array<F>,
    analytical: &Array<F>,
    epsilon: F,
    tolerance: F,
) -> Result<(), Error>
where
    F: NdFloat,
    L: Fn(&Array<F>) -> Result<F, Error>,
{
    if analytical.shape() != point.shape() {
        return Err(Error::ShapeMismatch {
            expected: point.shape().to_vec(),
            actual: analytical.shape().to_vec(),
        });
    }
    let numerical = compute_numerical_gradient(&func, point, epsilon)?;
    let analytical: Vec<F> = analytical.get_data().iter().copied().collect();
    compare_gradients(&analytical, &numerical, tolerance)
}

/// Central-difference gradient of `func` at `point`, in logical element order.
pub fn compute_numerical_gradient<F, L>(
    func: &L,
    point: &Array<F>,
    epsilon: F,
) -> Result<Vec<F>, Error>
where
    F: NdFloat,
    L: Fn(&Array<F>) -> Result<F, Error>,
{
    let two = F::one() + F::one();
    let shape = point.shape().to_vec();
    let original_data: Vec<F> = point.get_data().iter().copied().collect();
    let mut numerical = Vec::with_capacity(original_data.len());

    for i in 0..original_data.len() {
        let mut data_plus = original_data.clone();
        data_plus[i] += epsilon;
        let loss_plus = func(&Array::from_vec(data_plus, &shape)?)?;

        let mut data_minus = original_data.clone();
        data_minus[i] -= epsilon;
        let loss_minus = func(&Array::from_vec(data_minus, &shape)?)?;

        // Central difference formula
        numerical.push((loss_plus - loss_minus) / (two * epsilon));
    }

    Ok(numerical)
}

fn compare_gradients<F: NdFloat>(analytical: &[F], numerical: &[F], tolerance: F) -> Result<(), Error> {
    if analytical.len() != numerical.len() {
        return Err(Error::InternalLogicError(format!(
            "Gradient size mismatch: analytical size={}, numerical size={}",
            analytical.len(),
            numerical.len()
        )));
    }

    let mut max_rel_err = F::zero();
    let mut max_abs_err = F::zero();
    let mut max_err_idx = 0;

    for (i, (&a, &n)) in analytical.iter().zip(numerical.iter()).enumerate() {
        let abs_err = (a - n).abs();
        let rel_err = abs_err / a.abs().max(n.abs()).max(F::one());

        if rel_err > max_rel_err {
            max_rel_err = rel_err;
            max_abs_err = abs_err;
            max_err_idx = i;
        }
    }

    if max_rel_err <= tolerance {
        Ok(())
    } else {
        let to_f64 = |values: &[F]| -> Vec<f64> {
            values.iter().map(|v| v.to_f64().unwrap_or(f64::NAN)).collect()
        };
        Err(Error::GradientCheckError {
            analytical: to_f64(analytical),
            numerical: to_f64(numerical),
            max_rel_error: max_rel_err.to_f64().unwrap_or(f64::NAN),
            max_abs_error: max_abs_err.to_f64().unwrap_or(f64::NAN),
            at_index: max_err_idx,
        })
    }
}

/// Asserts that two arrays have the same shape and element-wise differ by less than `tol`.
pub fn assert_array_close<F: NdFloat>(a: &Array<F>, b: &Array<F>, tol: F) {
    assert_eq!(a.shape(), b.shape(), "Array shapes don't match");
    for (i, (a_val, b_val)) in a.get_data().iter().zip(b.get_data().iter()).enumerate() {
        assert!(
            (*a_val - *b_val).abs() < tol,
            "Values at index {i} aren't close enough: a={a_val}, b={b_val}, diff={}, tol={tol}",
            (*a_val - *b_val).abs()
        );
    }
}
