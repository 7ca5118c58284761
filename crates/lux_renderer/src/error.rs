//! Configuration errors reported before any sampling starts.

use thiserror::Error;

/// A tracer or material was configured with values that cannot render.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("num_samples must be at least 1")]
    ZeroSamples,

    #[error("min_samples ({min}) exceeds num_samples ({num})")]
    MinSamplesExceedsTotal { min: u32, num: u32 },

    #[error("{points} focus points but {probs} focus point probabilities")]
    FocusPointMismatch { points: usize, probs: usize },

    #[error("focus point probabilities must be non-negative and sum to at most 1 (sum = {sum})")]
    InvalidFocusProbabilities { sum: f64 },

    #[error("roulette_delta must be finite and non-negative, got {0}")]
    InvalidRouletteDelta(f64),

    #[error("{materials} joined materials but {probs} probabilities")]
    JoinedMaterialMismatch { materials: usize, probs: usize },

    #[error("joined material probabilities must be non-negative and sum to 1 (sum = {sum})")]
    InvalidJoinedProbabilities { sum: f64 },
}

/// Validate a set of mixture probabilities.
///
/// Returns the sum on success so callers can reuse it.
pub(crate) fn probability_sum(probs: &[f64]) -> Option<f64> {
    if probs.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return None;
    }
    Some(probs.iter().sum())
}
