//! The loss contract shared by every variant in the catalog.

use lf_tensor::prelude::*;
use tracing::trace;

/// A closed-form loss: a scalar forward pass and its analytic gradient.
///
/// Both calls are pure functions of `(prediction, target, self)`. Nothing
/// computed in `forward` is carried into `backward`, so configuration changed
/// between calls is always observed.
pub trait Loss<B: Backend>: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &'static str;

    /// Scalar loss value.
    fn forward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<B::Elem>;

    /// Gradient of [`Loss::forward`] with respect to `prediction`.
    ///
    /// The result always has the prediction's shape.
    fn backward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>>;

    /// Run forward and backward together.
    fn evaluate(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Evaluation<B>> {
        let value = self.forward(prediction, target)?;
        let gradient = self.backward(prediction, target)?;
        trace!(
            loss = self.name(),
            value = value.to_f64_lossy(),
            numel = prediction.numel(),
            "evaluated loss"
        );
        Ok(Evaluation { value, gradient })
    }
}

/// A loss defined element by element, which can also be left unreduced.
pub trait PointwiseLoss<B: Backend>: Loss<B> {
    /// Per-element loss tensor with the prediction's shape (no reduction).
    fn unreduced(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>>;
}

/// Output of one forward/backward pair.
#[derive(Clone, Debug)]
pub struct Evaluation<B: Backend> {
    /// Scalar loss.
    pub value: B::Elem,
    /// Gradient with the prediction's shape.
    pub gradient: Tensor<B>,
}

impl<B: Backend> Loss<B> for Box<dyn Loss<B>> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn forward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<B::Elem> {
        (**self).forward(prediction, target)
    }

    fn backward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        (**self).backward(prediction, target)
    }
}

/// Fail unless prediction and target have identical shapes.
pub(crate) fn same_shape<B: Backend>(
    op: &'static str,
    prediction: &Tensor<B>,
    target: &Tensor<B>,
) -> Result<()> {
    prediction.expect_shape(op, target)
}

/// Fail with `DomainViolation` if `pred` holds for any element of `x`.
pub(crate) fn reject_any<B, F>(op: &'static str, x: &Tensor<B>, pred: F, reason: &str) -> Result<()>
where
    B: Backend,
    F: Fn(B::Elem) -> bool,
{
    match x.as_slice().iter().position(|&v| pred(v)) {
        Some(idx) => Err(Error::domain(
            op,
            format!("{reason} (element {idx} = {})", x.as_slice()[idx]),
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MeanSquaredError;
    use lf_backend_cpu::CpuBackend;

    type T = Tensor<CpuBackend>;

    #[test]
    fn test_evaluate_pairs_forward_and_backward() {
        let loss = MeanSquaredError::default();
        let p = T::from_vec(vec![1.0, 2.0], [2]).unwrap();
        let t = T::from_vec(vec![0.0, 0.0], [2]).unwrap();

        let eval = loss.evaluate(&p, &t).unwrap();
        assert_eq!(eval.value, loss.forward(&p, &t).unwrap());
        assert_eq!(eval.gradient.as_slice(), &[1.0, 2.0]);
    }

    #[test]
    fn test_boxed_loss_delegates() {
        let boxed: Box<dyn Loss<CpuBackend>> = Box::new(MeanSquaredError::default());
        let p = T::from_vec(vec![3.0], [1]).unwrap();
        let t = T::zeros([1]);
        assert_eq!(boxed.name(), "mse");
        assert_eq!(boxed.forward(&p, &t).unwrap(), 9.0);
    }

    #[test]
    fn test_reject_any_reports_element() {
        let x = T::from_vec(vec![1.0, -2.0], [2]).unwrap();
        let err = reject_any("test", &x, |v| v < 0.0, "negative").unwrap_err();
        assert!(err.to_string().contains("element 1"));
    }
}
