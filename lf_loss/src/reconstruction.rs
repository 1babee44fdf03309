//! Variational reconstruction loss and its Bernoulli likelihood.

use lf_tensor::prelude::*;
use lf_tensor::scalar;
use tracing::debug;

use crate::loss::{same_shape, Loss, PointwiseLoss};
use crate::reduction::Reduction;

/// Reconstruction term plus a KL penalty against a unit Gaussian prior.
///
/// With target rows `r` and `latent_size` `z`, the prediction stacks along
/// its leading axis:
///
/// ```text
/// rows [0, r)          reconstruction, scored by the inner loss
/// rows [r, r + z)      latent mean
/// rows [r + z, r + 2z) latent log-variance
/// ```
///
/// `L = inner(recon, target) + kl_weight * -0.5 * sum(1 + lv - mu^2 - e^lv)`.
/// With `latent_size == 0` this is the inner loss unchanged.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconstructionLoss<L> {
    inner: L,
    latent_size: usize,
    kl_weight: f64,
}

/// The three segments of a reconstruction prediction.
struct Segments<B: Backend> {
    recon: Tensor<B>,
    mean: Tensor<B>,
    log_var: Tensor<B>,
}

impl<L> ReconstructionLoss<L> {
    /// `kl_weight` must be finite and non-negative.
    pub fn new(inner: L, latent_size: usize, kl_weight: f64) -> Result<Self> {
        if !(kl_weight.is_finite() && kl_weight >= 0.0) {
            return Err(Error::config(
                "reconstruction",
                format!("kl_weight must be >= 0, got {kl_weight}"),
            ));
        }
        Ok(Self {
            inner,
            latent_size,
            kl_weight,
        })
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    pub fn latent_size(&self) -> usize {
        self.latent_size
    }

    pub fn kl_weight(&self) -> f64 {
        self.kl_weight
    }

    fn split<B: Backend>(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Segments<B>> {
        let r = target.rows();
        let z = self.latent_size;
        let expected = target.shape().with_leading(r + 2 * z);
        if target.shape().is_scalar() || prediction.shape() != &expected {
            return Err(Error::shape_mismatch(
                "reconstruction",
                &expected,
                prediction.shape(),
            ));
        }

        let (recon, latent) = prediction.split_rows(r)?;
        let (mean, log_var) = latent.split_rows(z)?;
        debug!(
            recon_rows = r,
            latent_rows = z,
            "reconstruction: partitioned prediction"
        );
        Ok(Segments {
            recon,
            mean,
            log_var,
        })
    }
}

impl<L: Default> Default for ReconstructionLoss<L> {
    fn default() -> Self {
        Self {
            inner: L::default(),
            latent_size: 0,
            kl_weight: 1.0,
        }
    }
}

impl<B: Backend, L: Loss<B>> Loss<B> for ReconstructionLoss<L> {
    fn name(&self) -> &'static str {
        "reconstruction"
    }

    fn forward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<B::Elem> {
        if self.latent_size == 0 {
            return self.inner.forward(prediction, target);
        }
        let Segments {
            recon,
            mean,
            log_var,
        } = self.split(prediction, target)?;

        let one = B::Elem::one();
        let kl_terms = mean.zip_map(&log_var, |mu, lv| one + lv - mu * mu - lv.exp())?;
        let kl = B::Elem::constant(-0.5) * kl_terms.sum();

        Ok(self.inner.forward(&recon, target)? + B::Elem::constant(self.kl_weight) * kl)
    }

    fn backward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        if self.latent_size == 0 {
            return self.inner.backward(prediction, target);
        }
        let Segments {
            recon,
            mean,
            log_var,
        } = self.split(prediction, target)?;

        let weight = B::Elem::constant(self.kl_weight);
        let recon_grad = self.inner.backward(&recon, target)?;
        let mean_grad = mean.scale(weight);
        let log_var_grad = log_var
            .exp()
            .add_scalar(-B::Elem::one())
            .scale(B::Elem::constant(0.5) * weight);

        Tensor::concat_rows(&[&recon_grad, &mean_grad, &log_var_grad])
    }
}

/// Bernoulli negative log likelihood of targets in `[0, 1]` given logits.
///
/// `L = -[t ln(s + eps) + (1 - t) ln(1 - s + eps)]` with `s = sigmoid(p)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BernoulliNll {
    epsilon: f64,
    reduction: Reduction,
}

impl BernoulliNll {
    pub fn new(epsilon: f64, reduction: Reduction) -> Result<Self> {
        if !(epsilon.is_finite() && epsilon >= 0.0) {
            return Err(Error::config(
                "bernoulli_nll",
                format!("epsilon must be >= 0, got {epsilon}"),
            ));
        }
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

impl Default for BernoulliNll {
    fn default() -> Self {
        Self {
            epsilon: 1e-10,
            reduction: Reduction::Sum,
        }
    }
}

impl<B: Backend> Loss<B> for BernoulliNll {
    fn name(&self) -> &'static str {
        "bernoulli_nll"
    }

    fn forward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<B::Elem> {
        let losses = self.unreduced(prediction, target)?;
        Ok(self.reduction.reduce(losses.sum(), losses.numel()))
    }

    fn backward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        same_shape("bernoulli_nll", prediction, target)?;
        let eps = B::Elem::constant(self.epsilon);
        let one = B::Elem::one();
        let grad = prediction.zip_map(target, |p, t| {
            let s = scalar::sigmoid(p);
            -(t / (s + eps) - (one - t) / (one - s + eps)) * s * (one - s)
        })?;
        Ok(self.reduction.scale_gradient(grad, prediction.numel()))
    }
}

impl<B: Backend> PointwiseLoss<B> for BernoulliNll {
    fn unreduced(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        same_shape("bernoulli_nll", prediction, target)?;
        let eps = B::Elem::constant(self.epsilon);
        let one = B::Elem::one();
        prediction.zip_map(target, |p, t| {
            let s = scalar::sigmoid(p);
            -(t * (s + eps).ln() + (one - t) * (one - s + eps).ln())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MeanSquaredError;
    use approx::assert_abs_diff_eq;
    use lf_backend_cpu::CpuBackend;

    type T = Tensor<CpuBackend>;

    fn vae_inputs() -> (T, T) {
        // Two reconstruction rows, then one mean row and one log-variance row.
        let p = T::from_vec(
            vec![1.0, 2.0, 3.0, 4.0, 1.0, 2.0, 0.0, 2f64.ln()],
            [4, 2],
        )
        .unwrap();
        let y = T::from_vec(vec![1.0, 2.0, 3.0, 3.0], [2, 2]).unwrap();
        (p, y)
    }

    #[test]
    fn test_reconstruction_forward() {
        let (p, y) = vae_inputs();
        let loss = ReconstructionLoss::new(MeanSquaredError::new(Reduction::Sum), 1, 1.0).unwrap();
        let expected = 1.0 + 3.0 - 2f64.ln() / 2.0;
        assert_abs_diff_eq!(loss.forward(&p, &y).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_reconstruction_backward_layout() {
        let (p, y) = vae_inputs();
        let loss = ReconstructionLoss::new(MeanSquaredError::new(Reduction::Sum), 1, 2.0).unwrap();
        let grad = loss.backward(&p, &y).unwrap();
        assert_eq!(grad.shape().dims(), &[4, 2]);

        let expected = [0.0, 0.0, 0.0, 2.0, 2.0, 4.0, 0.0, 1.0];
        for (g, e) in grad.as_slice().iter().zip(expected) {
            assert_abs_diff_eq!(*g, e, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_reconstruction_without_latent_is_inner() {
        let loss: ReconstructionLoss<MeanSquaredError> = ReconstructionLoss::default();
        let p = T::from_vec(vec![1.0, 3.0], [2]).unwrap();
        let y = T::zeros([2]);
        assert_eq!(loss.forward(&p, &y).unwrap(), 5.0);
        assert_eq!(loss.backward(&p, &y).unwrap().as_slice(), &[1.0, 3.0]);
    }

    #[test]
    fn test_reconstruction_bad_partition() {
        let (_, y) = vae_inputs();
        let p = T::zeros([5, 2]);
        let loss = ReconstructionLoss::new(MeanSquaredError::default(), 1, 1.0).unwrap();
        assert!(matches!(
            loss.forward(&p, &y),
            Err(Error::ShapeMismatch { op: "reconstruction", .. })
        ));
    }

    #[test]
    fn test_bernoulli_nll() {
        let loss = BernoulliNll::default();
        let p = T::zeros([4]);
        let y = T::from_vec(vec![1.0, 0.0, 1.0, 0.0], [4]).unwrap();
        assert_abs_diff_eq!(loss.forward(&p, &y).unwrap(), 4.0 * 2f64.ln(), epsilon = 1e-8);

        let grad = loss.backward(&p, &y).unwrap();
        assert_abs_diff_eq!(grad.as_slice()[0], -0.5, epsilon = 1e-8);
        assert_abs_diff_eq!(grad.as_slice()[1], 0.5, epsilon = 1e-8);
    }
}
