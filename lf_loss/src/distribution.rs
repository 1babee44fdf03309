//! Losses over counts and probability distributions.

use std::f64::consts::PI;

use lf_tensor::prelude::*;

use crate::loss::{reject_any, same_shape, Loss, PointwiseLoss};
use crate::reduction::Reduction;

/// Negative log likelihood of a Poisson-distributed target.
///
/// With `log_input` the prediction is the log-rate: `L = e^p - t p`.
/// Otherwise it is the rate itself, restricted to `[0, 1]`:
/// `L = p - t ln(p + eps)`. With `full` the Stirling approximation
/// `t ln t - t + 0.5 ln(2 pi t)` is added wherever `t > 1`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoissonNllLoss {
    log_input: bool,
    full: bool,
    epsilon: f64,
    reduction: Reduction,
}

impl PoissonNllLoss {
    pub fn new(log_input: bool, full: bool, epsilon: f64, reduction: Reduction) -> Result<Self> {
        if !(epsilon.is_finite() && epsilon >= 0.0) {
            return Err(Error::config(
                "poisson_nll",
                format!("epsilon must be >= 0, got {epsilon}"),
            ));
        }
        Ok(Self {
            log_input,
            full,
            epsilon,
            reduction,
        })
    }

    pub fn log_input(&self) -> bool {
        self.log_input
    }

    pub fn full(&self) -> bool {
        self.full
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    pub fn set_reduction(&mut self, reduction: Reduction) {
        self.reduction = reduction;
    }

    fn check_inputs<B: Backend>(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<()> {
        same_shape("poisson_nll", prediction, target)?;
        if self.log_input {
            return Ok(());
        }
        let (zero, one) = (B::Elem::zero(), B::Elem::one());
        reject_any(
            "poisson_nll",
            prediction,
            |p| !(p >= zero && p <= one),
            "prediction must lie in [0, 1] when log_input is false",
        )
    }
}

impl Default for PoissonNllLoss {
    fn default() -> Self {
        Self {
            log_input: true,
            full: false,
            epsilon: 1e-8,
            reduction: Reduction::Mean,
        }
    }
}

/// `t ln t - t + 0.5 ln(2 pi t)` for `t > 1`, zero otherwise.
fn stirling<T: Element>(t: T) -> T {
    if t > T::one() {
        t * t.ln() - t + T::constant(0.5) * (T::constant(2.0 * PI) * t).ln()
    } else {
        T::zero()
    }
}

impl<B: Backend> Loss<B> for PoissonNllLoss {
    fn name(&self) -> &'static str {
        "poisson_nll"
    }

    fn forward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<B::Elem> {
        let losses = self.unreduced(prediction, target)?;
        Ok(self.reduction.reduce(losses.sum(), losses.numel()))
    }

    fn backward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        self.check_inputs(prediction, target)?;
        let grad = if self.log_input {
            prediction.exp().sub(target)?
        } else {
            let eps = B::Elem::constant(self.epsilon);
            prediction.zip_map(target, |p, t| B::Elem::one() - t / (p + eps))?
        };
        Ok(self.reduction.scale_gradient(grad, prediction.numel()))
    }
}

impl<B: Backend> PointwiseLoss<B> for PoissonNllLoss {
    fn unreduced(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        self.check_inputs(prediction, target)?;
        let eps = B::Elem::constant(self.epsilon);
        let log_input = self.log_input;
        let full = self.full;
        prediction.zip_map(target, |p, t| {
            let base = if log_input {
                p.exp() - t * p
            } else {
                p - t * (p + eps).ln()
            };
            if full {
                base + stirling(t)
            } else {
                base
            }
        })
    }
}

/// Kullback-Leibler divergence of `prediction` from `target`, both already
/// probabilities: `L = t (ln t - ln p)`, with `0 ln 0 = 0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KlDivergence {
    reduction: Reduction,
}

impl KlDivergence {
    /// `take_mean` selects mean over sum reduction.
    pub fn new(take_mean: bool) -> Self {
        Self {
            reduction: Reduction::from_take_mean(take_mean),
        }
    }

    pub fn take_mean(&self) -> bool {
        self.reduction == Reduction::Mean
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    pub fn set_reduction(&mut self, reduction: Reduction) {
        self.reduction = reduction;
    }

    fn check_inputs<B: Backend>(prediction: &Tensor<B>, target: &Tensor<B>) -> Result<()> {
        same_shape("kl_divergence", prediction, target)?;
        let zero = B::Elem::zero();
        reject_any("kl_divergence", target, |t| t < zero, "target must be >= 0")?;
        let bad = prediction.zip_map(target, |p, t| {
            if t > zero && (p.is_nan() || p <= zero) {
                B::Elem::one()
            } else {
                zero
            }
        })?;
        reject_any(
            "kl_divergence",
            &bad,
            |flag| flag > zero,
            "prediction must be > 0 where target is > 0",
        )
    }
}

impl Default for KlDivergence {
    fn default() -> Self {
        Self::new(false)
    }
}

impl<B: Backend> Loss<B> for KlDivergence {
    fn name(&self) -> &'static str {
        "kl_divergence"
    }

    fn forward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<B::Elem> {
        let losses = self.unreduced(prediction, target)?;
        Ok(self.reduction.reduce(losses.sum(), losses.numel()))
    }

    fn backward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        Self::check_inputs(prediction, target)?;
        let zero = B::Elem::zero();
        let grad = prediction.zip_map(target, |p, t| if t > zero { -t / p } else { zero })?;
        Ok(self.reduction.scale_gradient(grad, prediction.numel()))
    }
}

impl<B: Backend> PointwiseLoss<B> for KlDivergence {
    fn unreduced(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        Self::check_inputs(prediction, target)?;
        let zero = B::Elem::zero();
        prediction.zip_map(target, |p, t| {
            if t > zero {
                t * (t.ln() - p.ln())
            } else {
                zero
            }
        })
    }
}

/// Label-weighted linear score `L = -p t`, reported as an earth mover
/// distance.
///
/// This is a lightweight proxy and not an optimal-transport distance.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EarthMoverDistance {
    reduction: Reduction,
}

impl EarthMoverDistance {
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

impl<B: Backend> Loss<B> for EarthMoverDistance {
    fn name(&self) -> &'static str {
        "earth_mover"
    }

    fn forward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<B::Elem> {
        let losses = self.unreduced(prediction, target)?;
        Ok(self.reduction.reduce(losses.sum(), losses.numel()))
    }

    fn backward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        same_shape("earth_mover", prediction, target)?;
        Ok(self.reduction.scale_gradient(target.neg(), prediction.numel()))
    }
}

impl<B: Backend> PointwiseLoss<B> for EarthMoverDistance {
    fn unreduced(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        same_shape("earth_mover", prediction, target)?;
        Ok(prediction.mul(target)?.neg())
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

    fn poisson_pair() -> (T, T) {
        (
            t(vec![1.0, 1.0, 1.9, 1.6, -1.9, 3.7, -1.0, 0.5]),
            t(vec![1.0, 3.0, 1.0, 2.0, 1.0, 4.0, 2.0, 1.0]),
        )
    }

    #[test]
    fn test_poisson_default() {
        let (p, y) = poisson_pair();
        let loss = PoissonNllLoss::default();
        assert_abs_diff_eq!(loss.forward(&p, &y).unwrap(), 4.898620526844259, epsilon = 1e-9);

        let grad = loss.backward(&p, &y).unwrap();
        let expected = [
            0.214785, -0.0352148, 0.710737, 0.369129, -0.106304, 4.555913, -0.204015, 0.0810902,
        ];
        for (g, e) in grad.as_slice().iter().zip(expected) {
            assert_abs_diff_eq!(*g, e, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_poisson_full() {
        let (p, y) = poisson_pair();
        let sum = PoissonNllLoss::new(true, true, 1e-8, Reduction::Sum).unwrap();
        assert_abs_diff_eq!(sum.forward(&p, &y).unwrap(), 45.41392188575038, epsilon = 1e-9);
        let mean = PoissonNllLoss::new(true, true, 1e-8, Reduction::Mean).unwrap();
        assert_abs_diff_eq!(mean.forward(&p, &y).unwrap(), 5.676740235718798, epsilon = 1e-9);
    }

    #[test]
    fn test_poisson_rate_input() {
        let (_, y) = poisson_pair();
        let p = t(vec![
            0.658502, 0.445627, 0.667651, 0.310549, 0.589540, 0.052568, 0.549769, 0.381504,
        ]);
        let loss = PoissonNllLoss::new(false, true, 1e-8, Reduction::Mean).unwrap();
        assert_abs_diff_eq!(loss.forward(&p, &y).unwrap(), 3.7421552389709953, epsilon = 1e-9);

        let grad = loss.backward(&p, &y).unwrap();
        assert_abs_diff_eq!(grad.as_slice()[5], -9.386488070406317, epsilon = 1e-6);
        assert_abs_diff_eq!(grad.as_slice()[0], -0.0648247812485796, epsilon = 1e-9);
    }

    #[test]
    fn test_poisson_rate_domain() {
        let (p, y) = poisson_pair();
        let loss = PoissonNllLoss::new(false, false, 1e-8, Reduction::Mean).unwrap();
        assert!(matches!(
            loss.forward(&p, &y),
            Err(Error::DomainViolation { op: "poisson_nll", .. })
        ));
    }

    #[test]
    fn test_kl_equal_distributions() {
        let loss = KlDivergence::default();
        let x = T::ones([6]);
        assert_abs_diff_eq!(loss.forward(&x, &x).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_kl_zero_target() {
        let loss = KlDivergence::new(true);
        let p = t(vec![0.5, 0.5]);
        let y = t(vec![1.0, 0.0]);
        assert_abs_diff_eq!(loss.forward(&p, &y).unwrap(), 2f64.ln() / 2.0, epsilon = 1e-12);
        assert_eq!(loss.backward(&p, &y).unwrap().as_slice(), &[-1.0, 0.0]);
    }

    #[test]
    fn test_kl_domain() {
        let loss = KlDivergence::default();
        let err = loss.forward(&t(vec![0.0]), &t(vec![0.5])).unwrap_err();
        assert!(matches!(err, Error::DomainViolation { op: "kl_divergence", .. }));
        // A zero prediction is fine where the target is zero.
        assert!(loss.forward(&t(vec![0.0]), &t(vec![0.0])).is_ok());
    }

    #[test]
    fn test_earth_mover() {
        let p = t(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let y = t(vec![1.0, 0.0, 1.0, 0.0, 1.0]);

        let mean = EarthMoverDistance::default();
        assert_abs_diff_eq!(mean.forward(&p, &y).unwrap(), -1.8, epsilon = 1e-12);

        let sum = EarthMoverDistance::new(Reduction::Sum);
        assert_abs_diff_eq!(sum.forward(&p, &y).unwrap(), -9.0, epsilon = 1e-12);
        assert_eq!(
            sum.backward(&p, &y).unwrap().as_slice(),
            &[-1.0, 0.0, -1.0, 0.0, -1.0]
        );
    }
}
