//! Weights that keep resampling across neighboring pixels unbiased.
//!
//! Reservoirs are combined in two steps. Each reservoir `i` gets a resampling weight `m_i`
//! before it is streamed into the output. Once the output sample `y` is chosen, its weight is
//! multiplied by `nume / denom`. A strategy is a pure pair of these two functions.
//!
//! Candidates are indexed in the order they are resampled. The center pixel is always last.
//! `targets[j]` always means the target function of the domain of candidate `j`, evaluated at
//! the sample in question.
//!
//! * Daqi Lin, Markus Kettunen, Benedikt Bitterli, Jacopo Pantaleoni, Cem Yuksel and Chris Wyman.
//!   Generalized resampled importance sampling: foundations of ReSTIR. 2022.
//! * Benedikt Bitterli, Chris Wyman, Matt Pharr, Peter Shirley, Aaron Lefohn and Wojciech Jarosz.
//!   Spatiotemporal reservoir resampling for real-time ray tracing with dynamic direct lighting. 2020.

use std::fmt::Debug;

/// A pair of resampling and normalization weights
pub trait BiasCorrection: Send + Sync + Debug {
    /// `true` if [`BiasCorrection::resampling_weight`] reads `targets`. Evaluating them costs a
    /// target function per candidate and per domain.
    fn needs_resampling_targets(&self) -> bool {
        false
    }

    /// `true` if [`BiasCorrection::normalization`] reads `targets`
    fn needs_normalization_targets(&self) -> bool {
        false
    }

    /// Weight of candidate `index` while resampling. `confidences[j]` is `M` of candidate `j`,
    /// `targets[j]` is evaluated at the sample of candidate `index`.
    fn resampling_weight(&self, index: usize, confidences: &[f64], targets: &[f64]) -> f64;

    /// `(nume, denom)` for the sample picked from candidate `selected`. `targets[j]` is evaluated
    /// at that sample.
    fn normalization(&self, selected: usize, confidences: &[f64], targets: &[f64]) -> (f64, f64);
}

/// Divides by the number of candidates. Biased as soon as a neighbor could not have produced the
/// picked sample.
#[derive(Clone, Copy, Debug, Default)]
pub struct OneOverM;

impl BiasCorrection for OneOverM {
    fn resampling_weight(&self, index: usize, confidences: &[f64], _: &[f64]) -> f64 {
        confidences[index]
    }

    fn normalization(&self, _: usize, confidences: &[f64], _: &[f64]) -> (f64, f64) {
        (1.0, confidences.iter().sum())
    }
}

/// Only counts the candidates whose domain could have produced the picked sample
#[derive(Clone, Copy, Debug, Default)]
pub struct OneOverZ;

impl BiasCorrection for OneOverZ {
    fn needs_normalization_targets(&self) -> bool {
        true
    }

    fn resampling_weight(&self, index: usize, confidences: &[f64], _: &[f64]) -> f64 {
        confidences[index]
    }

    fn normalization(&self, _: usize, confidences: &[f64], targets: &[f64]) -> (f64, f64) {
        let z = confidences
            .iter()
            .zip(targets)
            .filter(|(_, target)| **target > 0.0)
            .map(|(confidence, _)| confidence)
            .sum();
        (1.0, z)
    }
}

/// Balance heuristic on the picked sample only
#[derive(Clone, Copy, Debug, Default)]
pub struct MisLike;

impl BiasCorrection for MisLike {
    fn needs_normalization_targets(&self) -> bool {
        true
    }

    fn resampling_weight(&self, _: usize, _: &[f64], _: &[f64]) -> f64 {
        1.0
    }

    fn normalization(&self, selected: usize, _: &[f64], targets: &[f64]) -> (f64, f64) {
        (targets[selected], targets.iter().sum())
    }
}

/// [`MisLike`] with every domain weighted by its confidence
#[derive(Clone, Copy, Debug, Default)]
pub struct MisLikeConfidence;

impl BiasCorrection for MisLikeConfidence {
    fn needs_normalization_targets(&self) -> bool {
        true
    }

    fn resampling_weight(&self, index: usize, confidences: &[f64], _: &[f64]) -> f64 {
        confidences[index]
    }

    fn normalization(&self, selected: usize, confidences: &[f64], targets: &[f64]) -> (f64, f64) {
        let denom = confidences
            .iter()
            .zip(targets)
            .map(|(confidence, target)| confidence * target)
            .sum();
        (targets[selected], denom)
    }
}

/// Generalized balance heuristic. Quadratic in the number of candidates.
#[derive(Clone, Copy, Debug, Default)]
pub struct MisGbh;

impl BiasCorrection for MisGbh {
    fn needs_resampling_targets(&self) -> bool {
        true
    }

    fn resampling_weight(&self, index: usize, _: &[f64], targets: &[f64]) -> f64 {
        let sum: f64 = targets.iter().sum();
        if sum > 0.0 {
            targets[index] / sum
        } else {
            0.0
        }
    }

    fn normalization(&self, _: usize, _: &[f64], _: &[f64]) -> (f64, f64) {
        (1.0, 1.0)
    }
}

/// [`MisGbh`] with every domain weighted by its confidence
#[derive(Clone, Copy, Debug, Default)]
pub struct MisGbhConfidence;

impl BiasCorrection for MisGbhConfidence {
    fn needs_resampling_targets(&self) -> bool {
        true
    }

    fn resampling_weight(&self, index: usize, confidences: &[f64], targets: &[f64]) -> f64 {
        let sum: f64 = confidences
            .iter()
            .zip(targets)
            .map(|(confidence, target)| confidence * target)
            .sum();
        if sum > 0.0 {
            confidences[index] * targets[index] / sum
        } else {
            0.0
        }
    }

    fn normalization(&self, _: usize, _: &[f64], _: &[f64]) -> (f64, f64) {
        (1.0, 1.0)
    }
}

/// Runtime selection of a [`BiasCorrection`] strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BiasCorrectionMode {
    OneOverM,
    OneOverZ,
    #[default]
    MisLike,
    MisLikeConfidence,
    MisGbh,
    MisGbhConfidence,
}

impl BiasCorrectionMode {
    pub const ALL: [Self; 6] = [
        Self::OneOverM,
        Self::OneOverZ,
        Self::MisLike,
        Self::MisLikeConfidence,
        Self::MisGbh,
        Self::MisGbhConfidence,
    ];

    #[must_use]
    pub fn strategy(self) -> &'static dyn BiasCorrection {
        match self {
            Self::OneOverM => &OneOverM,
            Self::OneOverZ => &OneOverZ,
            Self::MisLike => &MisLike,
            Self::MisLikeConfidence => &MisLikeConfidence,
            Self::MisGbh => &MisGbh,
            Self::MisGbhConfidence => &MisGbhConfidence,
        }
    }
}
