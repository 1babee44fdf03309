//! # lf_loss - Closed-Form Loss Functions
//!
//! A catalog of loss functions for the terminal node of a gradient-based
//! training pipeline. Every loss computes a scalar `forward` value and an
//! analytic `backward` gradient shaped like the prediction, written once
//! against the [`lf_tensor::Backend`] contract.
//!
//! ## Overview
//!
//! - [`Loss`] / [`PointwiseLoss`] - the two-call contract (plus the unreduced
//!   per-element form)
//! - [`Reduction`] - sum or mean, applied identically to value and gradient
//! - [`LossConfig`] - serde-tagged configuration building any variant
//! - [`gradcheck`] - finite difference checks for `backward`
//!
//! ## Example
//!
//! ```
//! use lf_backend_cpu::CpuBackend;
//! use lf_loss::{HuberLoss, Loss, Reduction};
//! use lf_tensor::Tensor;
//!
//! let loss = HuberLoss::new(1.0, Reduction::Mean).unwrap();
//! let p = Tensor::<CpuBackend>::from_vec(vec![0.5, 3.0], [2]).unwrap();
//! let t = Tensor::<CpuBackend>::zeros([2]);
//!
//! let eval = loss.evaluate(&p, &t).unwrap();
//! assert_eq!(eval.gradient.shape(), p.shape());
//! ```

pub mod classification;
pub mod config;
pub mod distribution;
pub mod gradcheck;
pub mod loss;
pub mod ranking;
pub mod reconstruction;
pub mod reduction;
pub mod regression;

pub use classification::{
    CrossEntropyError, DiceLoss, HingeEmbeddingLoss, SigmoidCrossEntropyError, SoftMarginLoss,
};
pub use config::LossConfig;
pub use distribution::{EarthMoverDistance, KlDivergence, PoissonNllLoss};
pub use lf_tensor::{Error, Result};
pub use loss::{Evaluation, Loss, PointwiseLoss};
pub use ranking::{CosineEmbeddingLoss, MarginRankingLoss, RankingGradient};
pub use reconstruction::{BernoulliNll, ReconstructionLoss};
pub use reduction::Reduction;
pub use regression::{
    HuberLoss, L1Loss, LogCoshLoss, MeanAbsoluteError, MeanAbsolutePercentageError,
    MeanBiasError, MeanSquaredError, MeanSquaredLogError,
};
