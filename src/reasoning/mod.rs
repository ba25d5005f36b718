//! Natural-language justification for predictions.
//!
//! The primary path sends a fixed, auditable prompt to a [`TextProvider`] under
//! a hard timeout. Any provider failure (or a generator built without one)
//! falls back to a deterministic templated sentence, so explaining a
//! prediction never fails.

pub mod fallback;
pub mod prompt;
pub mod provider;

pub use fallback::fallback_reasoning;
pub use prompt::build_prompt;
pub use provider::{ChatCompletionsProvider, ChatProviderConfig, TextProvider};

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::models::{Confidence, Matchup, ReasoningSource, Side};
use crate::predict::aggregate::Aggregation;
use crate::predict::components::ComponentScores;
use crate::predict::weights::WeightSet;

/// Default bound on a single provider call.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(8);

/// Everything the explanation is allowed to draw on.
#[derive(Debug, Clone, Copy)]
pub struct ReasoningContext<'a> {
    pub matchup: &'a Matchup,
    pub scores: &'a ComponentScores,
    pub weights: &'a WeightSet,
    pub aggregation: &'a Aggregation,
    pub confidence: Confidence,
}

impl<'a> ReasoningContext<'a> {
    pub fn winner_id(&self) -> &'a str {
        match self.aggregation.predicted_winner {
            Side::Home => &self.matchup.home.team_id,
            Side::Away => &self.matchup.away.team_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reasoning {
    pub text: String,
    pub source: ReasoningSource,
}

#[derive(Clone)]
pub struct ReasoningGenerator {
    provider: Option<Arc<dyn TextProvider>>,
    timeout: Duration,
}

impl ReasoningGenerator {
    pub fn new(provider: Arc<dyn TextProvider>, timeout: Duration) -> Self {
        ReasoningGenerator {
            provider: Some(provider),
            timeout,
        }
    }

    /// Generator that always uses the templated fallback.
    pub fn fallback_only() -> Self {
        ReasoningGenerator {
            provider: None,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub async fn explain(&self, ctx: &ReasoningContext<'_>) -> Reasoning {
        let Some(provider) = &self.provider else {
            return Self::fallback(ctx);
        };

        let prompt = build_prompt(ctx);
        match self.call_provider(provider.as_ref(), &prompt).await {
            Ok(text) => {
                debug!(
                    "Reasoning for {} vs {} from {}",
                    ctx.matchup.home.team_id,
                    ctx.matchup.away.team_id,
                    provider.name()
                );
                Reasoning {
                    text,
                    source: ReasoningSource::Provider,
                }
            }
            Err(e) => {
                warn!(
                    "Provider '{}' failed for {} vs {}, using fallback reasoning: {}",
                    provider.name(),
                    ctx.matchup.home.team_id,
                    ctx.matchup.away.team_id,
                    e
                );
                Self::fallback(ctx)
            }
        }
    }

    async fn call_provider(
        &self,
        provider: &dyn TextProvider,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let text = tokio::time::timeout(self.timeout, provider.generate(prompt))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??;
        let text = text.trim();
        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text.to_string())
    }

    fn fallback(ctx: &ReasoningContext<'_>) -> Reasoning {
        Reasoning {
            text: fallback_reasoning(ctx),
            source: ReasoningSource::Fallback,
        }
    }
}
