//! Finite difference utilities for gradient verification.
//!
//! Used to check each closed-form `backward` against a numerical estimate of
//! its `forward`.

use lf_tensor::prelude::*;

use crate::loss::Loss;

/// Compute gradients using central finite differences.
///
/// # Arguments
/// * `f` - Function that takes a slice of variable values and returns a scalar
/// * `point` - The point at which to compute gradients
/// * `eps` - Step size for finite differences (typically 1e-7 to 1e-5)
///
/// # Example
/// ```
/// use lf_loss::gradcheck::finite_diff_grad;
///
/// // f(x, y) = x^2 + y^2
/// let f = |v: &[f64]| v[0] * v[0] + v[1] * v[1];
/// let grads = finite_diff_grad(f, &[3.0, 4.0], 1e-7);
///
/// assert!((grads[0] - 6.0).abs() < 1e-5);
/// assert!((grads[1] - 8.0).abs() < 1e-5);
/// ```
pub fn finite_diff_grad<F>(mut f: F, point: &[f64], eps: f64) -> Vec<f64>
where
    F: FnMut(&[f64]) -> f64,
{
    let mut grads = Vec::with_capacity(point.len());
    let mut perturbed = point.to_vec();

    for i in 0..point.len() {
        perturbed[i] = point[i] + eps;
        let f_plus = f(&perturbed);

        perturbed[i] = point[i] - eps;
        let f_minus = f(&perturbed);

        perturbed[i] = point[i]; // restore

        grads.push((f_plus - f_minus) / (2.0 * eps));
    }

    grads
}

/// Maximum absolute difference between two gradient vectors.
///
/// Vectors of different lengths compare as infinitely far apart.
pub fn max_grad_error(grad1: &[f64], grad2: &[f64]) -> f64 {
    if grad1.len() != grad2.len() {
        return f64::INFINITY;
    }
    grad1
        .iter()
        .zip(grad2)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max)
}

/// Relative error `|a - b| / |a + b|` (Euclidean norms).
///
/// Two all-zero vectors have relative error 0.
pub fn relative_error(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return f64::INFINITY;
    }
    let diff = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt();
    let total = a.iter().zip(b).map(|(x, y)| (x + y).powi(2)).sum::<f64>().sqrt();
    if diff == 0.0 {
        0.0
    } else {
        diff / total
    }
}

/// Compare `loss.backward` against central differences of `loss.forward`
/// at `prediction`, returning the relative error.
pub fn check_loss_gradient<B, L>(
    loss: &L,
    prediction: &Tensor<B>,
    target: &Tensor<B>,
    eps: f64,
) -> Result<f64>
where
    B: Backend,
    L: Loss<B> + ?Sized,
{
    let analytic: Vec<f64> = loss
        .backward(prediction, target)?
        .as_slice()
        .iter()
        .map(|v| v.to_f64_lossy())
        .collect();

    let shape = prediction.shape().clone();
    let point: Vec<f64> = prediction.as_slice().iter().map(|v| v.to_f64_lossy()).collect();

    let mut failure = None;
    let numeric = finite_diff_grad(
        |values| {
            let data = values.iter().map(|&v| B::Elem::constant(v)).collect();
            match Tensor::from_vec(data, shape.clone()).and_then(|p| loss.forward(&p, target)) {
                Ok(value) => value.to_f64_lossy(),
                Err(e) => {
                    failure.get_or_insert(e);
                    f64::NAN
                }
            }
        },
        &point,
        eps,
    );

    match failure {
        Some(e) => Err(e),
        None => Ok(relative_error(&analytic, &numeric)),
    }
}
