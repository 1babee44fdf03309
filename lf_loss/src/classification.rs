//! Classification and overlap losses.

use lf_tensor::prelude::*;
use lf_tensor::scalar;

use crate::loss::{reject_any, same_shape, Loss, PointwiseLoss};
use crate::reduction::Reduction;

fn check_epsilon(op: &'static str, epsilon: f64) -> Result<()> {
    if epsilon.is_finite() && epsilon >= 0.0 {
        Ok(())
    } else {
        Err(Error::config(op, format!("epsilon must be >= 0, got {epsilon}")))
    }
}

/// Binary cross-entropy on probabilities, stabilised by `epsilon`.
///
/// `L = -[t ln(p + eps) + (1 - t) ln(1 - p + eps)]`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CrossEntropyError {
    epsilon: f64,
    reduction: Reduction,
}

impl CrossEntropyError {
    pub fn new(epsilon: f64, reduction: Reduction) -> Result<Self> {
        check_epsilon("cross_entropy", epsilon)?;
        Ok(Self { epsilon, reduction })
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
}

impl Default for CrossEntropyError {
    fn default() -> Self {
        Self {
            epsilon: 1e-10,
            reduction: Reduction::Sum,
        }
    }
}

impl<B: Backend> Loss<B> for CrossEntropyError {
    fn name(&self) -> &'static str {
        "cross_entropy"
    }

    fn forward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<B::Elem> {
        let losses = self.unreduced(prediction, target)?;
        Ok(self.reduction.reduce(losses.sum(), losses.numel()))
    }

    fn backward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        same_shape("cross_entropy", prediction, target)?;
        let eps = B::Elem::constant(self.epsilon);
        let one = B::Elem::one();
        let zero = B::Elem::zero();
        let grad = prediction.zip_map(target, |p, t| {
            let pos = if t == zero { zero } else { t / (p + eps) };
            let neg = if t == one { zero } else { (one - t) / (one - p + eps) };
            neg - pos
        })?;
        Ok(self.reduction.scale_gradient(grad, prediction.numel()))
    }
}

impl<B: Backend> PointwiseLoss<B> for CrossEntropyError {
    fn unreduced(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        same_shape("cross_entropy", prediction, target)?;
        let eps = B::Elem::constant(self.epsilon);
        let one = B::Elem::one();
        let zero = B::Elem::zero();
        // Hard labels drop the vanishing term so `epsilon = 0` stays finite.
        prediction.zip_map(target, |p, t| {
            let pos = if t == zero { zero } else { t * (p + eps).ln() };
            let neg = if t == one { zero } else { (one - t) * (one - p + eps).ln() };
            -(pos + neg)
        })
    }
}

/// Binary cross-entropy computed directly from logits.
///
/// `L = max(p, 0) - p t + ln(1 + e^{-|p|})`, `grad = sigmoid(p) - t`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SigmoidCrossEntropyError {
    reduction: Reduction,
}

impl SigmoidCrossEntropyError {
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

impl Default for SigmoidCrossEntropyError {
    fn default() -> Self {
        Self::new(Reduction::Sum)
    }
}

impl<B: Backend> Loss<B> for SigmoidCrossEntropyError {
    fn name(&self) -> &'static str {
        "sigmoid_cross_entropy"
    }

    fn forward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<B::Elem> {
        let losses = self.unreduced(prediction, target)?;
        Ok(self.reduction.reduce(losses.sum(), losses.numel()))
    }

    fn backward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        same_shape("sigmoid_cross_entropy", prediction, target)?;
        let grad = prediction.sigmoid().sub(target)?;
        Ok(self.reduction.scale_gradient(grad, prediction.numel()))
    }
}

impl<B: Backend> PointwiseLoss<B> for SigmoidCrossEntropyError {
    fn unreduced(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        same_shape("sigmoid_cross_entropy", prediction, target)?;
        prediction.zip_map(target, |p, t| scalar::softplus(p) - p * t)
    }
}

/// Two-class logistic loss on `{-1, 1}` labels: `L = ln(1 + e^{-t p})`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SoftMarginLoss {
    reduction: Reduction,
}

impl SoftMarginLoss {
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

impl Default for SoftMarginLoss {
    fn default() -> Self {
        Self::new(Reduction::Sum)
    }
}

impl<B: Backend> Loss<B> for SoftMarginLoss {
    fn name(&self) -> &'static str {
        "soft_margin"
    }

    fn forward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<B::Elem> {
        let losses = self.unreduced(prediction, target)?;
        Ok(self.reduction.reduce(losses.sum(), losses.numel()))
    }

    fn backward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        same_shape("soft_margin", prediction, target)?;
        let grad = prediction.zip_map(target, |p, t| -t * scalar::sigmoid(-t * p))?;
        Ok(self.reduction.scale_gradient(grad, prediction.numel()))
    }
}

impl<B: Backend> PointwiseLoss<B> for SoftMarginLoss {
    fn unreduced(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        same_shape("soft_margin", prediction, target)?;
        prediction.zip_map(target, |p, t| scalar::softplus(-t * p))
    }
}

/// Hinge embedding loss on `{-1, 1}` labels, with `0` read as `-1`.
///
/// `L = max(0, margin - t p)`, gradient `-t` where the hinge is active.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HingeEmbeddingLoss {
    margin: f64,
    reduction: Reduction,
}

impl HingeEmbeddingLoss {
    pub fn new(margin: f64, reduction: Reduction) -> Result<Self> {
        if !margin.is_finite() {
            return Err(Error::config(
                "hinge_embedding",
                format!("margin must be finite, got {margin}"),
            ));
        }
        Ok(Self { margin, reduction })
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    pub fn set_reduction(&mut self, reduction: Reduction) {
        self.reduction = reduction;
    }

    fn check_labels<B: Backend>(prediction: &Tensor<B>, target: &Tensor<B>) -> Result<()> {
        same_shape("hinge_embedding", prediction, target)?;
        let one = B::Elem::one();
        reject_any(
            "hinge_embedding",
            target,
            |t| t != one && t != -one && t != B::Elem::zero(),
            "target must be 1, -1 or 0",
        )
    }

    fn label_sign<T: Element>(t: T) -> T {
        if t == T::zero() {
            -T::one()
        } else {
            t
        }
    }
}

impl Default for HingeEmbeddingLoss {
    fn default() -> Self {
        Self {
            margin: 1.0,
            reduction: Reduction::Mean,
        }
    }
}

impl<B: Backend> Loss<B> for HingeEmbeddingLoss {
    fn name(&self) -> &'static str {
        "hinge_embedding"
    }

    fn forward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<B::Elem> {
        let losses = self.unreduced(prediction, target)?;
        Ok(self.reduction.reduce(losses.sum(), losses.numel()))
    }

    fn backward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        Self::check_labels(prediction, target)?;
        let margin = B::Elem::constant(self.margin);
        let zero = B::Elem::zero();
        let grad = prediction.zip_map(target, |p, t| {
            let t = Self::label_sign(t);
            if margin - t * p > zero {
                -t
            } else {
                zero
            }
        })?;
        Ok(self.reduction.scale_gradient(grad, prediction.numel()))
    }
}

impl<B: Backend> PointwiseLoss<B> for HingeEmbeddingLoss {
    fn unreduced(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        Self::check_labels(prediction, target)?;
        let margin = B::Elem::constant(self.margin);
        prediction.zip_map(target, |p, t| {
            (margin - Self::label_sign(t) * p).max(B::Elem::zero())
        })
    }
}

/// Dice loss over the whole tensor:
/// `L = 1 - (2 sum(p t) + smooth) / (sum(p^2) + sum(t^2) + smooth)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiceLoss {
    smooth: f64,
}

impl DiceLoss {
    /// `smooth` must be non-negative.
    pub fn new(smooth: f64) -> Result<Self> {
        if !(smooth.is_finite() && smooth >= 0.0) {
            return Err(Error::config("dice", format!("smooth must be >= 0, got {smooth}")));
        }
        Ok(Self { smooth })
    }

    pub fn smooth(&self) -> f64 {
        self.smooth
    }

    /// Numerator and denominator of the overlap ratio.
    fn ratio_terms<B: Backend>(
        &self,
        prediction: &Tensor<B>,
        target: &Tensor<B>,
    ) -> Result<(B::Elem, B::Elem)> {
        same_shape("dice", prediction, target)?;
        let smooth = B::Elem::constant(self.smooth);
        let numerator = B::Elem::constant(2.0) * prediction.dot(target)? + smooth;
        let denominator = prediction.square().sum() + target.square().sum() + smooth;
        if denominator == B::Elem::zero() {
            return Err(Error::domain(
                "dice",
                "prediction and target are all zero and smooth is 0",
            ));
        }
        Ok((numerator, denominator))
    }
}

impl Default for DiceLoss {
    fn default() -> Self {
        Self { smooth: 1.0 }
    }
}

impl<B: Backend> Loss<B> for DiceLoss {
    fn name(&self) -> &'static str {
        "dice"
    }

    fn forward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<B::Elem> {
        let (numerator, denominator) = self.ratio_terms(prediction, target)?;
        Ok(B::Elem::one() - numerator / denominator)
    }

    fn backward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        let (numerator, denominator) = self.ratio_terms(prediction, target)?;
        let scale = B::Elem::constant(-2.0) / (denominator * denominator);
        prediction.zip_map(target, |p, t| scale * (t * denominator - p * numerator))
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
    fn test_cross_entropy() {
        let loss = CrossEntropyError::new(1e-6, Reduction::Sum).unwrap();
        let p = T::full([8], 0.5);
        let y = T::zeros([8]);
        assert_abs_diff_eq!(loss.forward(&p, &y).unwrap(), 5.545161444495562, epsilon = 1e-9);
        let grad = loss.backward(&p, &y).unwrap();
        assert_abs_diff_eq!(grad.as_slice()[3], 1.999996000008, epsilon = 1e-9);
    }

    #[test]
    fn test_cross_entropy_hard_labels_without_epsilon() {
        let loss = CrossEntropyError::new(0.0, Reduction::Sum).unwrap();
        let p = t(vec![0.0, 1.0]);
        let y = t(vec![0.0, 1.0]);
        assert_eq!(loss.forward(&p, &y).unwrap(), 0.0);
        assert_eq!(loss.backward(&p, &y).unwrap().as_slice(), &[1.0, -1.0]);
    }

    #[test]
    fn test_cross_entropy_rejects_negative_epsilon() {
        assert!(CrossEntropyError::new(-1.0, Reduction::Sum).is_err());
    }

    #[test]
    fn test_sigmoid_cross_entropy() {
        let loss = SigmoidCrossEntropyError::new(Reduction::Mean);

        let p = T::full([8], 0.5);
        let y = T::zeros([8]);
        assert_abs_diff_eq!(loss.forward(&p, &y).unwrap(), 0.9740769841801066, epsilon = 1e-12);

        let p = t(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let y = t(vec![0.0, 0.0, 1.0, 0.0, 1.0]);
        assert_abs_diff_eq!(loss.forward(&p, &y).unwrap(), 1.502728465308373, epsilon = 1e-12);

        let grad = SigmoidCrossEntropyError::default().backward(&p, &y).unwrap();
        let expected = [0.7310585786, 0.8807970780, -0.0474258732, 0.9820137900, -0.0066928509];
        for (g, e) in grad.as_slice().iter().zip(expected) {
            assert_abs_diff_eq!(*g, e, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_sigmoid_cross_entropy_extreme_logits() {
        let loss = SigmoidCrossEntropyError::default();
        let p = t(vec![800.0, -800.0]);
        let y = t(vec![1.0, 0.0]);
        let value = loss.forward(&p, &y).unwrap();
        assert!(value.is_finite());
        assert_abs_diff_eq!(value, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_soft_margin() {
        let p = T::from_vec(
            vec![0.1778, 0.0957, 0.1397, 0.1203, 0.2403, 0.1925, -0.2264, -0.3400, -0.3336],
            [3, 3],
        )
        .unwrap();
        let y = T::from_vec(vec![1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, 1.0], [3, 3]).unwrap();

        let loss = SoftMarginLoss::default();
        assert_abs_diff_eq!(loss.forward(&p, &y).unwrap(), 6.4145579722471, epsilon = 1e-9);
        assert_abs_diff_eq!(
            loss.backward(&p, &y).unwrap().sum(),
            -1.4822734123305898,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_hinge_embedding() {
        let loss = HingeEmbeddingLoss::new(1.0, Reduction::Sum).unwrap();
        let p = t(vec![0.3, 0.3, 2.0, 0.0]);
        let y = t(vec![1.0, -1.0, -1.0, 0.0]);
        assert_abs_diff_eq!(loss.forward(&p, &y).unwrap(), 6.0, epsilon = 1e-12);
        assert_eq!(loss.backward(&p, &y).unwrap().as_slice(), &[-1.0, 1.0, 1.0, 1.0]);

        let p = t(vec![2.0, -3.0]);
        let y = t(vec![1.0, -1.0]);
        assert_eq!(loss.forward(&p, &y).unwrap(), 0.0);
        assert_eq!(loss.backward(&p, &y).unwrap().as_slice(), &[0.0, 0.0]);
    }

    #[test]
    fn test_hinge_embedding_fixed_point() {
        let loss = HingeEmbeddingLoss::default();
        let ones = T::ones([10]);
        assert_eq!(loss.forward(&ones, &ones).unwrap(), 0.0);
        assert!(loss.backward(&ones, &ones).unwrap().as_slice().iter().all(|&g| g == 0.0));
    }

    #[test]
    fn test_hinge_embedding_rejects_labels() {
        let loss = HingeEmbeddingLoss::default();
        let err = loss.forward(&t(vec![0.3]), &t(vec![0.5])).unwrap_err();
        assert!(matches!(err, Error::DomainViolation { op: "hinge_embedding", .. }));
    }

    #[test]
    fn test_dice() {
        let loss = DiceLoss::default();
        let p = T::full([10], 0.5);
        let y = T::ones([10]);
        assert_abs_diff_eq!(loss.forward(&p, &y).unwrap(), 0.18518518518518523, epsilon = 1e-12);
        let grad = loss.backward(&p, &y).unwrap();
        assert!(grad
            .as_slice()
            .iter()
            .all(|&g| (g + 0.0877914951989026).abs() < 1e-12));
    }

    #[test]
    fn test_dice_fixed_point() {
        let loss = DiceLoss::default();
        let x = t(vec![0.2, 0.9, 0.4]);
        assert_abs_diff_eq!(loss.forward(&x, &x).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_dice_degenerate() {
        let loss = DiceLoss::new(0.0).unwrap();
        let z = T::zeros([3]);
        assert!(matches!(
            loss.forward(&z, &z),
            Err(Error::DomainViolation { op: "dice", .. })
        ));
    }
}
