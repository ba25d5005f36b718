//! Combines component scores into a home-win probability.
//!
//! The normalization is fixed:
//!
//! ```text
//! p(home) = 1 / (1 + exp(-k · Σ wᵢ·sᵢ))
//! ```
//!
//! with `k` the logistic scale (default 0.25, refit with
//! [`super::calibration::fit_logistic_scale`]). It is strictly increasing in
//! the weighted sum, stays in [0, 1], and maps a sum of exactly 0 to exactly
//! 0.5. There is no randomness and no clock input, so identical inputs always
//! produce bit-identical probabilities.

use serde::Serialize;

use super::components::ComponentScores;
use super::weights::WeightSet;
use crate::error::ConfigError;
use crate::models::Side;

/// Default logistic scale constant.
pub const DEFAULT_LOGISTIC_SCALE: f64 = 0.25;

/// Positive, finite slope of the logistic transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LogisticScale(f64);

impl LogisticScale {
    pub fn new(k: f64) -> Result<Self, ConfigError> {
        if k.is_finite() && k > 0.0 {
            Ok(LogisticScale(k))
        } else {
            Err(ConfigError::InvalidScale(k))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for LogisticScale {
    fn default() -> Self {
        LogisticScale(DEFAULT_LOGISTIC_SCALE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aggregation {
    pub weighted_sum: f64,
    pub home_win_probability: f64,
    pub predicted_winner: Side,
}

impl Aggregation {
    /// Probability that the predicted winner wins.
    pub fn winner_probability(&self) -> f64 {
        match self.predicted_winner {
            Side::Home => self.home_win_probability,
            Side::Away => 1.0 - self.home_win_probability,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PredictionAggregator {
    scale: LogisticScale,
}

impl PredictionAggregator {
    pub fn new(scale: LogisticScale) -> Self {
        PredictionAggregator { scale }
    }

    pub fn scale(&self) -> LogisticScale {
        self.scale
    }

    pub fn aggregate(&self, scores: &ComponentScores, weights: &WeightSet) -> Aggregation {
        let weighted_sum = weights.weighted_sum(scores);
        let home_win_probability = self.probability(weighted_sum);
        Aggregation {
            weighted_sum,
            home_win_probability,
            predicted_winner: winner_for(home_win_probability),
        }
    }

    /// Logistic transform of a weighted sum.
    pub fn probability(&self, weighted_sum: f64) -> f64 {
        if weighted_sum.is_nan() {
            return 0.5;
        }
        sigmoid(self.scale.value() * weighted_sum).clamp(0.0, 1.0)
    }
}

/// Home unless the probability is strictly below 0.5; an exact 0.5 goes home.
pub fn winner_for(home_win_probability: f64) -> Side {
    if home_win_probability < 0.5 {
        Side::Away
    } else {
        Side::Home
    }
}

/// Numerically stable logistic sigmoid.
pub(crate) fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}
