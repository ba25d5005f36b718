use crate::error::ConfigError;
use crate::models::Confidence;

/// Margin cut-offs for confidence tiers. Invariant: `0 < low < high < 0.5`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceThresholds {
    low: f64,
    high: f64,
}

impl ConfidenceThresholds {
    pub fn new(low: f64, high: f64) -> Result<Self, ConfigError> {
        // written so that NaN fails every comparison and is rejected
        if 0.0 < low && low < high && high < 0.5 {
            Ok(ConfidenceThresholds { low, high })
        } else {
            Err(ConfigError::InvalidThresholds { low, high })
        }
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        ConfidenceThresholds {
            low: 0.05,
            high: 0.15,
        }
    }
}

/// Maps a probability to a tier by its distance from a coin flip.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceClassifier {
    thresholds: ConfidenceThresholds,
}

impl ConfidenceClassifier {
    pub fn new(thresholds: ConfidenceThresholds) -> Self {
        ConfidenceClassifier { thresholds }
    }

    pub fn thresholds(&self) -> ConfidenceThresholds {
        self.thresholds
    }

    /// `margin < low` → Low, `margin < high` → Medium, otherwise High.
    /// A NaN probability classifies as Low.
    pub fn classify(&self, probability: f64) -> Confidence {
        let margin = (probability - 0.5).abs();
        if !(margin >= self.thresholds.low) {
            Confidence::Low
        } else if margin < self.thresholds.high {
            Confidence::Medium
        } else {
            Confidence::High
        }
    }
}
