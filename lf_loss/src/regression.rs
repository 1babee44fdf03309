//! Element-wise regression losses.
//!
//! Every loss here compares prediction and target element by element. Both
//! tensors must have the same shape; broadcasting is not applied.

use lf_tensor::prelude::*;
use lf_tensor::scalar;

use crate::loss::{reject_any, same_shape, Loss, PointwiseLoss};
use crate::reduction::Reduction;

/// Mean Squared Error: `L = (p - t)^2`, `grad = 2 (p - t)`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeanSquaredError {
    reduction: Reduction,
}

impl MeanSquaredError {
    pub fn new(reduction: Reduction) -> Self {
        Self { reduction }
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    pub fn set_reduction(&mut self, reduction: Reduction) {
        self.reduction = reduction;
    }
}

impl<B: Backend> Loss<B> for MeanSquaredError {
    fn name(&self) -> &'static str {
        "mse"
    }

    fn forward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<B::Elem> {
        let losses = self.unreduced(prediction, target)?;
        Ok(self.reduction.reduce(losses.sum(), losses.numel()))
    }

    fn backward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        same_shape("mse", prediction, target)?;
        let grad = prediction.sub(target)?.scale(B::Elem::constant(2.0));
        Ok(self.reduction.scale_gradient(grad, prediction.numel()))
    }
}

impl<B: Backend> PointwiseLoss<B> for MeanSquaredError {
    fn unreduced(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        same_shape("mse", prediction, target)?;
        Ok(prediction.sub(target)?.square())
    }
}

/// Mean Absolute Error: `L = |p - t|`, `grad = sign(p - t)` (zero where `p == t`).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeanAbsoluteError {
    reduction: Reduction,
}

/// The same loss under its other common name.
pub type L1Loss = MeanAbsoluteError;

impl MeanAbsoluteError {
    pub fn new(reduction: Reduction) -> Self {
        Self { reduction }
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    pub fn set_reduction(&mut self, reduction: Reduction) {
        self.reduction = reduction;
    }
}

impl<B: Backend> Loss<B> for MeanAbsoluteError {
    fn name(&self) -> &'static str {
        "mae"
    }

    fn forward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<B::Elem> {
        let losses = self.unreduced(prediction, target)?;
        Ok(self.reduction.reduce(losses.sum(), losses.numel()))
    }

    fn backward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        same_shape("mae", prediction, target)?;
        let grad = prediction.sub(target)?.signum();
        Ok(self.reduction.scale_gradient(grad, prediction.numel()))
    }
}

impl<B: Backend> PointwiseLoss<B> for MeanAbsoluteError {
    fn unreduced(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        same_shape("mae", prediction, target)?;
        Ok(prediction.sub(target)?.abs())
    }
}

/// Mean Squared Logarithmic Error: `L = (ln(1 + p) - ln(1 + t))^2`.
///
/// Defined for `p, t > -1`; anything else is a domain violation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeanSquaredLogError {
    reduction: Reduction,
}

impl MeanSquaredLogError {
    pub fn new(reduction: Reduction) -> Self {
        Self { reduction }
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    pub fn set_reduction(&mut self, reduction: Reduction) {
        self.reduction = reduction;
    }

    /// `ln(1 + p) - ln(1 + t)` after validating the domain.
    fn log_residual<B: Backend>(prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        same_shape("msle", prediction, target)?;
        let minus_one = -B::Elem::one();
        reject_any("msle", prediction, |v| v <= minus_one, "prediction must be > -1")?;
        reject_any("msle", target, |v| v <= minus_one, "target must be > -1")?;
        prediction.ln_1p().sub(&target.ln_1p())
    }
}

impl<B: Backend> Loss<B> for MeanSquaredLogError {
    fn name(&self) -> &'static str {
        "msle"
    }

    fn forward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<B::Elem> {
        let losses = self.unreduced(prediction, target)?;
        Ok(self.reduction.reduce(losses.sum(), losses.numel()))
    }

    fn backward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        let residual = Self::log_residual(prediction, target)?;
        let two = B::Elem::constant(2.0);
        let grad = residual.zip_map(prediction, |r, p| two * r / (B::Elem::one() + p))?;
        Ok(self.reduction.scale_gradient(grad, prediction.numel()))
    }
}

impl<B: Backend> PointwiseLoss<B> for MeanSquaredLogError {
    fn unreduced(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        Ok(Self::log_residual(prediction, target)?.square())
    }
}

/// Mean Bias Error: `L = t - p`.
///
/// The gradient is `-1` everywhere, under either reduction, independent of
/// the residual.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeanBiasError {
    reduction: Reduction,
}

impl MeanBiasError {
    pub fn new(reduction: Reduction) -> Self {
        Self { reduction }
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    pub fn set_reduction(&mut self, reduction: Reduction) {
        self.reduction = reduction;
    }
}

impl<B: Backend> Loss<B> for MeanBiasError {
    fn name(&self) -> &'static str {
        "mbe"
    }

    fn forward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<B::Elem> {
        let losses = self.unreduced(prediction, target)?;
        Ok(self.reduction.reduce(losses.sum(), losses.numel()))
    }

    fn backward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        same_shape("mbe", prediction, target)?;
        Ok(Tensor::full(prediction.shape(), -B::Elem::one()))
    }
}

impl<B: Backend> PointwiseLoss<B> for MeanBiasError {
    fn unreduced(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        same_shape("mbe", prediction, target)?;
        target.sub(prediction)
    }
}

/// Mean Absolute Percentage Error: `L = 100 |p - t| / |t|`, always averaged.
///
/// A zero target is a domain violation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeanAbsolutePercentageError;

impl MeanAbsolutePercentageError {
    pub fn new() -> Self {
        Self
    }

    fn check_target<B: Backend>(prediction: &Tensor<B>, target: &Tensor<B>) -> Result<()> {
        same_shape("mape", prediction, target)?;
        reject_any("mape", target, |v| v == B::Elem::zero(), "target must be non-zero")
    }
}

impl<B: Backend> Loss<B> for MeanAbsolutePercentageError {
    fn name(&self) -> &'static str {
        "mape"
    }

    fn forward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<B::Elem> {
        let losses = self.unreduced(prediction, target)?;
        Ok(Reduction::Mean.reduce(losses.sum(), losses.numel()))
    }

    fn backward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        Self::check_target(prediction, target)?;
        let hundred = B::Elem::constant(100.0);
        let grad = prediction.zip_map(target, |p, t| {
            let s = if p < t { -B::Elem::one() } else { B::Elem::one() };
            hundred * s / t.abs()
        })?;
        Ok(Reduction::Mean.scale_gradient(grad, prediction.numel()))
    }
}

impl<B: Backend> PointwiseLoss<B> for MeanAbsolutePercentageError {
    fn unreduced(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        Self::check_target(prediction, target)?;
        let hundred = B::Elem::constant(100.0);
        prediction.zip_map(target, |p, t| hundred * (p - t).abs() / t.abs())
    }
}

/// Huber loss: quadratic within `delta` of the target, linear beyond it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HuberLoss {
    delta: f64,
    reduction: Reduction,
}

impl HuberLoss {
    /// `delta` must be strictly positive.
    pub fn new(delta: f64, reduction: Reduction) -> Result<Self> {
        if !(delta.is_finite() && delta > 0.0) {
            return Err(Error::config("huber", format!("delta must be > 0, got {delta}")));
        }
        Ok(Self { delta, reduction })
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    pub fn set_reduction(&mut self, reduction: Reduction) {
        self.reduction = reduction;
    }
}

impl Default for HuberLoss {
    fn default() -> Self {
        Self {
            delta: 1.0,
            reduction: Reduction::Mean,
        }
    }
}

impl<B: Backend> Loss<B> for HuberLoss {
    fn name(&self) -> &'static str {
        "huber"
    }

    fn forward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<B::Elem> {
        let losses = self.unreduced(prediction, target)?;
        Ok(self.reduction.reduce(losses.sum(), losses.numel()))
    }

    fn backward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        same_shape("huber", prediction, target)?;
        let delta = B::Elem::constant(self.delta);
        let grad = prediction.sub(target)?.map(|d| {
            if d.abs() <= delta {
                d
            } else {
                delta * scalar::sign(d)
            }
        });
        Ok(self.reduction.scale_gradient(grad, prediction.numel()))
    }
}

impl<B: Backend> PointwiseLoss<B> for HuberLoss {
    fn unreduced(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        same_shape("huber", prediction, target)?;
        let delta = B::Elem::constant(self.delta);
        let half = B::Elem::constant(0.5);
        Ok(prediction.sub(target)?.map(|d| {
            let a = d.abs();
            if a <= delta {
                half * d * d
            } else {
                delta * (a - half * delta)
            }
        }))
    }
}

/// Log-cosh loss: `L = ln(cosh(a (p - t))) / a`, `grad = tanh(a (p - t))`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LogCoshLoss {
    smoothing: f64,
    reduction: Reduction,
}

impl LogCoshLoss {
    /// `smoothing` (the factor `a`) must be strictly positive.
    pub fn new(smoothing: f64, reduction: Reduction) -> Result<Self> {
        if !(smoothing.is_finite() && smoothing > 0.0) {
            return Err(Error::config(
                "log_cosh",
                format!("smoothing factor must be > 0, got {smoothing}"),
            ));
        }
        Ok(Self {
            smoothing,
            reduction,
        })
    }

    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    pub fn set_reduction(&mut self, reduction: Reduction) {
        self.reduction = reduction;
    }
}

impl Default for LogCoshLoss {
    fn default() -> Self {
        Self {
            smoothing: 1.0,
            reduction: Reduction::Sum,
        }
    }
}

impl<B: Backend> Loss<B> for LogCoshLoss {
    fn name(&self) -> &'static str {
        "log_cosh"
    }

    fn forward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<B::Elem> {
        let losses = self.unreduced(prediction, target)?;
        Ok(self.reduction.reduce(losses.sum(), losses.numel()))
    }

    fn backward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        same_shape("log_cosh", prediction, target)?;
        let a = B::Elem::constant(self.smoothing);
        let grad = prediction.sub(target)?.scale(a).tanh();
        Ok(self.reduction.scale_gradient(grad, prediction.numel()))
    }
}

impl<B: Backend> PointwiseLoss<B> for LogCoshLoss {
    fn unreduced(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        same_shape("log_cosh", prediction, target)?;
        let a = B::Elem::constant(self.smoothing);
        Ok(prediction.sub(target)?.map(|d| scalar::log_cosh(a * d) / a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use lf_backend_cpu::CpuBackend;

    type T = Tensor<CpuBackend>;

    fn t(data: Vec<f64>) -> T {
        let n = data.len();
        T::from_vec(data, [n]).unwrap()
    }

    #[test]
    fn test_mse() {
        let loss = MeanSquaredError::default();
        let p = t(vec![1.0, 0.0, 1.0, 0.0, -1.0, 0.0, -1.0, 0.0]);
        let y = T::zeros([8]);
        assert_abs_diff_eq!(loss.forward(&p, &y).unwrap(), 0.5, epsilon = 1e-12);

        let grad = loss.backward(&p, &y).unwrap();
        assert_eq!(grad.as_slice()[0], 0.25);
        assert_eq!(grad.as_slice()[4], -0.25);
    }

    #[test]
    fn test_mse_shape_mismatch() {
        let loss = MeanSquaredError::default();
        let err = loss.forward(&t(vec![1.0, 2.0]), &t(vec![1.0])).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { op: "mse", .. }));
    }

    #[test]
    fn test_l1_sum() {
        let loss = L1Loss::new(Reduction::Sum);
        let p = T::full([7], 0.5);
        let y = T::zeros([7]);
        assert_abs_diff_eq!(loss.forward(&p, &y).unwrap(), 3.5, epsilon = 1e-12);
        assert!(loss.backward(&p, &y).unwrap().as_slice().iter().all(|&g| g == 1.0));
    }

    #[test]
    fn test_mae_zero_gradient_at_target() {
        let loss = MeanAbsoluteError::default();
        let p = t(vec![1.0, 2.0, 3.0]);
        let grad = loss.backward(&p, &p).unwrap();
        assert_eq!(grad.as_slice(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_msle() {
        let loss = MeanSquaredLogError::default();
        let p = t(vec![2.0]);
        let y = t(vec![3.0]);
        assert_abs_diff_eq!(loss.forward(&p, &y).unwrap(), 0.08276097481015166, epsilon = 1e-12);
        assert_abs_diff_eq!(
            loss.backward(&p, &y).unwrap().as_slice()[0],
            -0.1917880483011872,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_msle_domain() {
        let loss = MeanSquaredLogError::default();
        let err = loss.forward(&t(vec![-1.0]), &t(vec![0.0])).unwrap_err();
        assert!(matches!(err, Error::DomainViolation { op: "msle", .. }));
    }

    #[test]
    fn test_mbe() {
        let loss = MeanBiasError::default();
        let p = t(vec![1.0, 0.0, 1.0, -1.0, -1.0, 0.0, -1.0, 0.0]);
        let y = T::zeros([8]);
        assert_abs_diff_eq!(loss.forward(&p, &y).unwrap(), 0.125, epsilon = 1e-12);
        let grad = loss.backward(&p, &y).unwrap();
        assert!(grad.as_slice().iter().all(|&g| g == -1.0));
    }

    #[test]
    fn test_mape() {
        let loss = MeanAbsolutePercentageError::new();
        let p = t(vec![3.0, -0.5, 2.0, 7.0]);
        let y = t(vec![2.5, 0.2, 2.0, 8.0]);
        assert_abs_diff_eq!(loss.forward(&p, &y).unwrap(), 95.625, epsilon = 1e-9);

        let grad = loss.backward(&p, &y).unwrap();
        let expected = [10.0, -125.0, 12.5, -3.125];
        for (g, e) in grad.as_slice().iter().zip(expected) {
            assert_abs_diff_eq!(*g, e, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_mape_zero_target() {
        let loss = MeanAbsolutePercentageError::new();
        let err = loss.backward(&t(vec![1.0]), &t(vec![0.0])).unwrap_err();
        assert!(matches!(err, Error::DomainViolation { op: "mape", .. }));
    }

    #[test]
    fn test_huber() {
        let loss = HuberLoss::default();
        let p = t(vec![17.45, 12.91, 13.63, 29.01, 7.12, 15.47, 31.52, 31.97]);
        let y = t(vec![16.52, 13.11, 13.67, 29.51, 24.31, 15.03, 30.72, 34.07]);
        assert_abs_diff_eq!(loss.forward(&p, &y).unwrap(), 2.41063125, epsilon = 1e-9);

        let grad = loss.backward(&p, &y).unwrap();
        assert_abs_diff_eq!(grad.sum(), -0.07125, epsilon = 1e-9);
        assert_abs_diff_eq!(grad.as_slice()[0], 0.11625, epsilon = 1e-9);
        assert_abs_diff_eq!(grad.as_slice()[4], -0.125, epsilon = 1e-9);
    }

    #[test]
    fn test_huber_rejects_delta() {
        assert!(matches!(
            HuberLoss::new(0.0, Reduction::Mean),
            Err(Error::InvalidConfiguration { op: "huber", .. })
        ));
        assert!(HuberLoss::new(f64::NAN, Reduction::Mean).is_err());
    }

    #[test]
    fn test_log_cosh() {
        let loss = LogCoshLoss::new(2.0, Reduction::Sum).unwrap();
        let p = t(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let y = t(vec![1.0, 2.4, 3.4, 4.2, 5.5]);
        assert_abs_diff_eq!(loss.forward(&p, &y).unwrap(), 0.5466207182638233, epsilon = 1e-12);
        assert_abs_diff_eq!(
            loss.backward(&p, &y).unwrap().sum(),
            -2.4696166587466877,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_log_cosh_large_residual_is_finite() {
        let loss = LogCoshLoss::default();
        let p = t(vec![1000.0]);
        let y = t(vec![0.0]);
        assert_abs_diff_eq!(
            loss.forward(&p, &y).unwrap(),
            1000.0 - std::f64::consts::LN_2,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_unreduced_keeps_shape() {
        let p = T::from_vec(vec![1.0, 2.0, 3.0, 4.0], [2, 2]).unwrap();
        let y = T::zeros([2, 2]);
        let losses = MeanSquaredError::default().unreduced(&p, &y).unwrap();
        assert_eq!(losses.shape().dims(), &[2, 2]);
        assert_eq!(losses.as_slice(), &[1.0, 4.0, 9.0, 16.0]);
    }
}
