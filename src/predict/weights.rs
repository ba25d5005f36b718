use clap::ValueEnum;
use serde::Serialize;

use super::components::{Component, ComponentScores};
use crate::error::ConfigError;

/// Allowed drift of the weight total away from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Per-component weights. Non-negative and summing to 1; the constructor is
/// the only way in, so a `WeightSet` value is always valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightSet {
    weights: [f64; 5],
}

/// Named weight tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WeightPreset {
    /// 25 / 25 / 20 / 15 / 15 (canonical)
    Balanced,
    /// 35 / 15 / 25 / 20 / 5 (older table, kept for comparison runs)
    RatingHeavy,
}

impl WeightPreset {
    pub fn weights(self) -> WeightSet {
        let table = match self {
            WeightPreset::Balanced => [0.25, 0.25, 0.20, 0.15, 0.15],
            WeightPreset::RatingHeavy => [0.35, 0.15, 0.25, 0.20, 0.05],
        };
        WeightSet { weights: table }
    }
}

impl Default for WeightSet {
    fn default() -> Self {
        WeightPreset::Balanced.weights()
    }
}

impl WeightSet {
    /// Weights in `Component::ALL` order.
    pub fn new(weights: [f64; 5]) -> Result<Self, ConfigError> {
        for (component, w) in Component::ALL.iter().zip(weights.iter()) {
            if !w.is_finite() {
                return Err(ConfigError::InvalidWeights(format!(
                    "{} weight is not finite",
                    component
                )));
            }
            if *w < 0.0 {
                return Err(ConfigError::InvalidWeights(format!(
                    "{} weight {} is negative",
                    component, w
                )));
            }
        }
        let total: f64 = weights.iter().sum();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::InvalidWeights(format!(
                "weights sum to {}, expected 1.0",
                total
            )));
        }
        Ok(WeightSet { weights })
    }

    /// Parse a comma-separated list of five weights.
    pub fn parse_list(raw: &str) -> Result<Self, ConfigError> {
        let parsed: Vec<f64> = raw
            .split(',')
            .map(|part| {
                part.trim().parse::<f64>().map_err(|_| {
                    ConfigError::InvalidWeights(format!("`{}` is not a number", part.trim()))
                })
            })
            .collect::<Result<_, _>>()?;
        let weights: [f64; 5] = parsed.try_into().map_err(|v: Vec<f64>| {
            ConfigError::InvalidWeights(format!("expected 5 weights, got {}", v.len()))
        })?;
        Self::new(weights)
    }

    pub fn get(&self, component: Component) -> f64 {
        self.weights[component.index()]
    }

    /// Σ weight_i × score_i
    pub fn weighted_sum(&self, scores: &ComponentScores) -> f64 {
        self.weights
            .iter()
            .zip(scores.values().iter())
            .map(|(w, s)| w * s)
            .sum()
    }
}
