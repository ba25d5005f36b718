use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

use super::aggregate::{Aggregation, LogisticScale, PredictionAggregator};
use super::components::{ComponentScorer, ComponentScores, ScorerConfig};
use super::confidence::{ConfidenceClassifier, ConfidenceThresholds};
use super::weights::WeightSet;
use crate::error::MissingStatField;
use crate::models::{Confidence, Matchup, Prediction, Side};
use crate::reasoning::{ReasoningContext, ReasoningGenerator};

/// Reasoning calls in flight at once while predicting a slate.
pub const SLATE_CONCURRENCY: usize = 8;

/// Validated configuration shared by every prediction in a run.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub weights: WeightSet,
    pub scale: LogisticScale,
    pub thresholds: ConfidenceThresholds,
    pub scorer: ScorerConfig,
}

/// Deterministic part of a prediction: everything except reasoning text and
/// timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatchup {
    pub scores: ComponentScores,
    pub defaulted: Vec<MissingStatField>,
    pub weights: WeightSet,
    pub aggregation: Aggregation,
    pub confidence: Confidence,
}

/// Scorer → aggregator → classifier → reasoning.
pub struct PredictionEngine {
    scorer: ComponentScorer,
    weights: WeightSet,
    aggregator: PredictionAggregator,
    classifier: ConfidenceClassifier,
    reasoning: ReasoningGenerator,
}

impl PredictionEngine {
    pub fn new(config: EngineConfig, reasoning: ReasoningGenerator) -> Self {
        PredictionEngine {
            scorer: ComponentScorer::new(config.scorer),
            weights: config.weights,
            aggregator: PredictionAggregator::new(config.scale),
            classifier: ConfidenceClassifier::new(config.thresholds),
            reasoning,
        }
    }

    pub fn weights(&self) -> &WeightSet {
        &self.weights
    }

    /// Score a matchup with the run's weights, or `weights` when given.
    pub fn score(&self, matchup: &Matchup, weights: Option<&WeightSet>) -> ScoredMatchup {
        let weights = *weights.unwrap_or(&self.weights);
        let breakdown = self
            .scorer
            .score(&matchup.home, &matchup.away, &matchup.context);
        for missing in &breakdown.defaulted {
            warn!("{}", missing);
        }
        let aggregation = self.aggregator.aggregate(&breakdown.scores, &weights);
        let confidence = self.classifier.classify(aggregation.home_win_probability);
        ScoredMatchup {
            scores: breakdown.scores,
            defaulted: breakdown.defaulted,
            weights,
            aggregation,
            confidence,
        }
    }

    pub async fn predict(&self, matchup: &Matchup) -> Prediction {
        self.predict_with_weights(matchup, None).await
    }

    pub async fn predict_with_weights(
        &self,
        matchup: &Matchup,
        weights: Option<&WeightSet>,
    ) -> Prediction {
        let scored = self.score(matchup, weights);
        let ctx = ReasoningContext {
            matchup,
            scores: &scored.scores,
            weights: &scored.weights,
            aggregation: &scored.aggregation,
            confidence: scored.confidence,
        };
        let reasoning = self.reasoning.explain(&ctx).await;

        let predicted_winner = match scored.aggregation.predicted_winner {
            Side::Home => matchup.home.team_id.clone(),
            Side::Away => matchup.away.team_id.clone(),
        };
        info!(
            "Predicted {} vs {}: P(home)={:.3}, pick={}, confidence={}",
            matchup.home.team_id,
            matchup.away.team_id,
            scored.aggregation.home_win_probability,
            predicted_winner,
            scored.confidence
        );

        Prediction {
            home_team: matchup.home.team_id.clone(),
            away_team: matchup.away.team_id.clone(),
            home_win_probability: scored.aggregation.home_win_probability,
            predicted_winner,
            confidence: scored.confidence,
            reasoning: reasoning.text,
            reasoning_source: reasoning.source,
            generated_at: Utc::now(),
        }
    }

    /// Predict every matchup with the run's weights. At most
    /// [`SLATE_CONCURRENCY`] reasoning calls run at once; the output keeps
    /// input order.
    pub async fn predict_slate(&self, matchups: &[Matchup]) -> Vec<Prediction> {
        stream::iter(matchups)
            .map(|m| self.predict(m))
            .buffered(SLATE_CONCURRENCY)
            .collect()
            .await
    }
}
