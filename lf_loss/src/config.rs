//! Serializable loss configuration.
//!
//! A [`LossConfig`] names a variant and its parameters. Omitted fields take
//! the variant's documented default, so `{"type": "huber"}` is a Huber loss
//! with `delta = 1` and mean reduction.

use lf_tensor::prelude::*;
use serde::{Deserialize, Serialize};

use crate::classification::{
    CrossEntropyError, DiceLoss, HingeEmbeddingLoss, SigmoidCrossEntropyError, SoftMarginLoss,
};
use crate::distribution::{EarthMoverDistance, KlDivergence, PoissonNllLoss};
use crate::loss::Loss;
use crate::ranking::{CosineEmbeddingLoss, MarginRankingLoss, RankingGradient};
use crate::reconstruction::{BernoulliNll, ReconstructionLoss};
use crate::reduction::Reduction;
use crate::regression::{
    HuberLoss, LogCoshLoss, MeanAbsoluteError, MeanAbsolutePercentageError, MeanBiasError,
    MeanSquaredError, MeanSquaredLogError,
};

fn sum() -> Reduction {
    Reduction::Sum
}

fn one() -> f64 {
    1.0
}

fn yes() -> bool {
    true
}

fn ce_epsilon() -> f64 {
    1e-10
}

fn poisson_epsilon() -> f64 {
    1e-8
}

fn bernoulli() -> Box<LossConfig> {
    Box::new(LossConfig::BernoulliNll {
        epsilon: ce_epsilon(),
        reduction: Reduction::Sum,
    })
}

/// Every configurable loss, tagged by `type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LossConfig {
    Mse {
        #[serde(default)]
        reduction: Reduction,
    },
    #[serde(alias = "l1")]
    Mae {
        #[serde(default)]
        reduction: Reduction,
    },
    Msle {
        #[serde(default)]
        reduction: Reduction,
    },
    Mbe {
        #[serde(default)]
        reduction: Reduction,
    },
    Mape,
    Huber {
        #[serde(default = "one")]
        delta: f64,
        #[serde(default)]
        reduction: Reduction,
    },
    LogCosh {
        #[serde(default = "one")]
        smoothing: f64,
        #[serde(default = "sum")]
        reduction: Reduction,
    },
    CrossEntropy {
        #[serde(default = "ce_epsilon")]
        epsilon: f64,
        #[serde(default = "sum")]
        reduction: Reduction,
    },
    SigmoidCrossEntropy {
        #[serde(default = "sum")]
        reduction: Reduction,
    },
    PoissonNll {
        #[serde(default = "yes")]
        log_input: bool,
        #[serde(default)]
        full: bool,
        #[serde(default = "poisson_epsilon")]
        epsilon: f64,
        #[serde(default)]
        reduction: Reduction,
    },
    KlDivergence {
        #[serde(default)]
        take_mean: bool,
    },
    Dice {
        #[serde(default = "one")]
        smooth: f64,
    },
    EarthMover {
        #[serde(default)]
        reduction: Reduction,
    },
    HingeEmbedding {
        #[serde(default = "one")]
        margin: f64,
        #[serde(default)]
        reduction: Reduction,
    },
    SoftMargin {
        #[serde(default = "sum")]
        reduction: Reduction,
    },
    CosineEmbedding {
        #[serde(default)]
        margin: f64,
        #[serde(default = "yes")]
        similarity: bool,
        #[serde(default)]
        take_mean: bool,
    },
    MarginRanking {
        #[serde(default = "one")]
        margin: f64,
        #[serde(default)]
        reduction: Reduction,
        #[serde(default)]
        gradient: RankingGradient,
    },
    BernoulliNll {
        #[serde(default = "ce_epsilon")]
        epsilon: f64,
        #[serde(default = "sum")]
        reduction: Reduction,
    },
    Reconstruction {
        #[serde(default = "bernoulli")]
        inner: Box<LossConfig>,
        #[serde(default)]
        latent_size: usize,
        #[serde(default = "one")]
        kl_weight: f64,
    },
}

impl Default for LossConfig {
    fn default() -> Self {
        LossConfig::Mse {
            reduction: Reduction::Mean,
        }
    }
}

impl LossConfig {
    /// Validate the parameters and construct the loss.
    pub fn build<B: Backend>(&self) -> Result<Box<dyn Loss<B>>> {
        let loss: Box<dyn Loss<B>> = match *self {
            LossConfig::Mse { reduction } => Box::new(MeanSquaredError::new(reduction)),
            LossConfig::Mae { reduction } => Box::new(MeanAbsoluteError::new(reduction)),
            LossConfig::Msle { reduction } => Box::new(MeanSquaredLogError::new(reduction)),
            LossConfig::Mbe { reduction } => Box::new(MeanBiasError::new(reduction)),
            LossConfig::Mape => Box::new(MeanAbsolutePercentageError::new()),
            LossConfig::Huber { delta, reduction } => Box::new(HuberLoss::new(delta, reduction)?),
            LossConfig::LogCosh {
                smoothing,
                reduction,
            } => Box::new(LogCoshLoss::new(smoothing, reduction)?),
            LossConfig::CrossEntropy { epsilon, reduction } => {
                Box::new(CrossEntropyError::new(epsilon, reduction)?)
            }
            LossConfig::SigmoidCrossEntropy { reduction } => {
                Box::new(SigmoidCrossEntropyError::new(reduction))
            }
            LossConfig::PoissonNll {
                log_input,
                full,
                epsilon,
                reduction,
            } => Box::new(PoissonNllLoss::new(log_input, full, epsilon, reduction)?),
            LossConfig::KlDivergence { take_mean } => Box::new(KlDivergence::new(take_mean)),
            LossConfig::Dice { smooth } => Box::new(DiceLoss::new(smooth)?),
            LossConfig::EarthMover { reduction } => Box::new(EarthMoverDistance::new(reduction)),
            LossConfig::HingeEmbedding { margin, reduction } => {
                Box::new(HingeEmbeddingLoss::new(margin, reduction)?)
            }
            LossConfig::SoftMargin { reduction } => Box::new(SoftMarginLoss::new(reduction)),
            LossConfig::CosineEmbedding {
                margin,
                similarity,
                take_mean,
            } => Box::new(CosineEmbeddingLoss::new(margin, similarity, take_mean)?),
            LossConfig::MarginRanking {
                margin,
                reduction,
                gradient,
            } => Box::new(MarginRankingLoss::new(margin, reduction)?.with_gradient(gradient)),
            LossConfig::BernoulliNll { epsilon, reduction } => {
                Box::new(BernoulliNll::new(epsilon, reduction)?)
            }
            LossConfig::Reconstruction {
                ref inner,
                latent_size,
                kl_weight,
            } => Box::new(ReconstructionLoss::new(
                inner.build::<B>()?,
                latent_size,
                kl_weight,
            )?),
        };
        Ok(loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lf_backend_cpu::CpuBackend;

    #[test]
    fn test_default_builds_mse() {
        let loss = LossConfig::default().build::<CpuBackend>().unwrap();
        assert_eq!(loss.name(), "mse");
    }

    #[test]
    fn test_invalid_parameters_fail_at_build() {
        let config = LossConfig::Huber {
            delta: -1.0,
            reduction: Reduction::Mean,
        };
        assert!(matches!(
            config.build::<CpuBackend>(),
            Err(Error::InvalidConfiguration { op: "huber", .. })
        ));

        let nested = LossConfig::Reconstruction {
            inner: Box::new(LossConfig::Dice { smooth: -1.0 }),
            latent_size: 1,
            kl_weight: 1.0,
        };
        assert!(nested.build::<CpuBackend>().is_err());
    }

    #[test]
    fn test_reconstruction_wraps_built_inner() {
        let config = LossConfig::Reconstruction {
            inner: bernoulli(),
            latent_size: 0,
            kl_weight: 1.0,
        };
        let loss = config.build::<CpuBackend>().unwrap();
        assert_eq!(loss.name(), "reconstruction");

        let p = Tensor::<CpuBackend>::zeros([2]);
        let y = Tensor::<CpuBackend>::ones([2]);
        let expected = bernoulli().build::<CpuBackend>().unwrap().forward(&p, &y).unwrap();
        assert_eq!(loss.forward(&p, &y).unwrap(), expected);
    }
}
