//! Pairwise losses: cosine embedding and margin ranking.

use lf_tensor::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::loss::{same_shape, Loss};
use crate::reduction::Reduction;

/// Cosine embedding loss between paired vectors.
///
/// Each contiguous run along the last axis is one vector, so a `[n, d]`
/// tensor holds `n` vectors of length `d` and a `[b, n, d]` tensor holds
/// `b * n`. Per pair, with `cos = a.b / (|a| |b|)`:
///
/// - similarity: `L = 1 - cos`
/// - dissimilarity: `L = max(0, cos - margin)`
///
/// A pair containing a zero-norm vector has `cos = 0` and contributes a zero
/// gradient.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CosineEmbeddingLoss {
    margin: f64,
    /// Pull pairs together when set, push them apart otherwise. Read on every
    /// call.
    similarity: bool,
    reduction: Reduction,
}

/// Cosine and norms of one vector pair.
struct PairStats<T> {
    cos: T,
    norm_a: T,
    norm_b: T,
}

impl CosineEmbeddingLoss {
    /// `margin` must lie in `[-1, 1]`.
    pub fn new(margin: f64, similarity: bool, take_mean: bool) -> Result<Self> {
        if !(-1.0..=1.0).contains(&margin) {
            return Err(Error::config(
                "cosine_embedding",
                format!("margin must be in [-1, 1], got {margin}"),
            ));
        }
        Ok(Self {
            margin,
            similarity,
            reduction: Reduction::from_take_mean(take_mean),
        })
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    pub fn similarity(&self) -> bool {
        self.similarity
    }

    pub fn set_similarity(&mut self, similarity: bool) {
        self.similarity = similarity;
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    pub fn set_reduction(&mut self, reduction: Reduction) {
        self.reduction = reduction;
    }

    /// Per-pair statistics; `None` marks a pair with a zero-norm vector.
    fn pair_stats<T: Element>(a: &[T], b: &[T]) -> Option<PairStats<T>> {
        let dot: T = a.iter().zip(b).map(|(&x, &y)| x * y).sum();
        let norm_a = a.iter().map(|&x| x * x).sum::<T>().sqrt();
        let norm_b = b.iter().map(|&y| y * y).sum::<T>().sqrt();
        if norm_a == T::zero() || norm_b == T::zero() {
            return None;
        }
        Some(PairStats {
            cos: dot / (norm_a * norm_b),
            norm_a,
            norm_b,
        })
    }

    fn vector_len<B: Backend>(prediction: &Tensor<B>, target: &Tensor<B>) -> Result<usize> {
        same_shape("cosine_embedding", prediction, target)?;
        if prediction.numel() == 0 {
            return Err(Error::shape_mismatch(
                "cosine_embedding",
                &Shape::new(vec![1]),
                prediction.shape(),
            ));
        }
        Ok(prediction.shape().last_dim())
    }
}

impl Default for CosineEmbeddingLoss {
    fn default() -> Self {
        Self {
            margin: 0.0,
            similarity: true,
            reduction: Reduction::Sum,
        }
    }
}

impl<B: Backend> Loss<B> for CosineEmbeddingLoss {
    fn name(&self) -> &'static str {
        "cosine_embedding"
    }

    fn forward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<B::Elem> {
        let d = Self::vector_len(prediction, target)?;
        let margin = B::Elem::constant(self.margin);
        let one = B::Elem::one();

        let mut total = B::Elem::zero();
        let mut pairs = 0;
        for (a, b) in prediction
            .as_slice()
            .chunks_exact(d)
            .zip(target.as_slice().chunks_exact(d))
        {
            let cos = match Self::pair_stats(a, b) {
                Some(stats) => stats.cos,
                None => {
                    debug!(pair = pairs, "cosine_embedding: zero-norm vector, cos taken as 0");
                    B::Elem::zero()
                }
            };
            let term = if self.similarity {
                one - cos
            } else {
                (cos - margin).max(B::Elem::zero())
            };
            total = total + term;
            pairs += 1;
        }

        Ok(self.reduction.reduce(total, pairs))
    }

    fn backward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        let d = Self::vector_len(prediction, target)?;
        let margin = B::Elem::constant(self.margin);

        let mut grad = Vec::with_capacity(prediction.numel());
        for (a, b) in prediction
            .as_slice()
            .chunks_exact(d)
            .zip(target.as_slice().chunks_exact(d))
        {
            let Some(PairStats { cos, norm_a, norm_b }) = Self::pair_stats(a, b) else {
                grad.extend(std::iter::repeat(B::Elem::zero()).take(d));
                continue;
            };
            // d cos / d a = (b / |b| - cos * a / |a|) / |a|
            let sign = if self.similarity {
                -B::Elem::one()
            } else if cos > margin {
                B::Elem::one()
            } else {
                grad.extend(std::iter::repeat(B::Elem::zero()).take(d));
                continue;
            };
            grad.extend(
                a.iter()
                    .zip(b)
                    .map(|(&x, &y)| sign * (y / norm_b - cos * x / norm_a) / norm_a),
            );
        }

        let pairs = prediction.numel() / d;
        let grad = Tensor::from_vec(grad, prediction.shape())?;
        Ok(self.reduction.scale_gradient(grad, pairs))
    }
}

/// Gradient convention for [`MarginRankingLoss`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingGradient {
    /// The exact derivative of the hinge: `-t` on the first half and `+t` on
    /// the second wherever the hinge is active.
    #[default]
    Analytic,
    /// Residual-weighted gradient `(x2 - x1)` on the first half and its
    /// negation on the second, wherever the hinge is active or at its kink.
    Residual,
}

/// Margin ranking loss over two stacked inputs.
///
/// The prediction holds `input1` over `input2` along the leading axis, each
/// half shaped like the target. `L = max(0, -t (x1 - x2) + margin)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarginRankingLoss {
    margin: f64,
    reduction: Reduction,
    gradient: RankingGradient,
}

impl MarginRankingLoss {
    pub fn new(margin: f64, reduction: Reduction) -> Result<Self> {
        if !margin.is_finite() {
            return Err(Error::config(
                "margin_ranking",
                format!("margin must be finite, got {margin}"),
            ));
        }
        Ok(Self {
            margin,
            reduction,
            gradient: RankingGradient::Analytic,
        })
    }

    /// Select the gradient convention.
    pub fn with_gradient(mut self, gradient: RankingGradient) -> Self {
        self.gradient = gradient;
        self
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

    pub fn gradient(&self) -> RankingGradient {
        self.gradient
    }

    /// Split the stacked prediction into `(input1, input2)`.
    fn halves<B: Backend>(
        prediction: &Tensor<B>,
        target: &Tensor<B>,
    ) -> Result<(Tensor<B>, Tensor<B>)> {
        let k = target.rows();
        let expected = target.shape().with_leading(2 * k);
        if target.shape().is_scalar() || prediction.shape() != &expected {
            return Err(Error::shape_mismatch(
                "margin_ranking",
                &expected,
                prediction.shape(),
            ));
        }
        prediction.split_rows(k)
    }

    /// `margin - t (x1 - x2)` per pair.
    fn hinge<B: Backend>(
        &self,
        x1: &Tensor<B>,
        x2: &Tensor<B>,
        target: &Tensor<B>,
    ) -> Result<Tensor<B>> {
        let margin = B::Elem::constant(self.margin);
        Ok(target.mul(&x1.sub(x2)?)?.neg().add_scalar(margin))
    }
}

impl Default for MarginRankingLoss {
    fn default() -> Self {
        Self {
            margin: 1.0,
            reduction: Reduction::Mean,
            gradient: RankingGradient::Analytic,
        }
    }
}

impl<B: Backend> Loss<B> for MarginRankingLoss {
    fn name(&self) -> &'static str {
        "margin_ranking"
    }

    fn forward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<B::Elem> {
        let (x1, x2) = Self::halves(prediction, target)?;
        let hinge = self.hinge(&x1, &x2, target)?;
        let total = hinge.map(|h| h.max(B::Elem::zero())).sum();
        Ok(self.reduction.reduce(total, target.numel()))
    }

    fn backward(&self, prediction: &Tensor<B>, target: &Tensor<B>) -> Result<Tensor<B>> {
        let (x1, x2) = Self::halves(prediction, target)?;
        let hinge = self.hinge(&x1, &x2, target)?;
        let zero = B::Elem::zero();

        let first = match self.gradient {
            RankingGradient::Analytic => {
                hinge.zip_map(target, |h, t| if h > zero { -t } else { zero })?
            }
            RankingGradient::Residual => {
                let residual = x2.sub(&x1)?;
                hinge.zip_map(&residual, |h, r| if h >= zero { r } else { zero })?
            }
        };
        let second = first.neg();

        let grad = Tensor::concat_rows(&[&first, &second])?;
        Ok(self.reduction.scale_gradient(grad, target.numel()))
    }
}
