pub mod aggregate;
pub mod calibration;
pub mod components;
pub mod confidence;
pub mod engine;
pub mod weights;

pub use aggregate::{Aggregation, LogisticScale, PredictionAggregator};
pub use components::{Component, ComponentScore, ComponentScorer, ComponentScores, ScorerConfig};
pub use confidence::{ConfidenceClassifier, ConfidenceThresholds};
pub use engine::{EngineConfig, PredictionEngine, ScoredMatchup};
pub use weights::{WeightPreset, WeightSet};
