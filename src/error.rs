use std::time::Duration;

use thiserror::Error;

/// Setup-time configuration errors. These are fatal and always surfaced to
/// the caller; nothing in the crate silently corrects them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid weights: {0}")]
    InvalidWeights(String),

    #[error("invalid confidence thresholds: low={low}, high={high} (need 0 < low < high < 0.5)")]
    InvalidThresholds { low: f64, high: f64 },

    #[error("invalid logistic scale {0} (must be finite and > 0)")]
    InvalidScale(f64),

    #[error("invalid refresh window: {0}")]
    InvalidWindow(String),
}

/// A stat field that was absent (or non-finite) and replaced with the
/// configured default. Recovered locally, reported alongside the scores.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("missing stat `{field}` for team {team_id}, defaulted to {default}")]
pub struct MissingStatField {
    pub team_id: String,
    pub field: &'static str,
    pub default: f64,
}

/// Failure of the external text-generation provider. Always recovered via
/// the fallback reasoning path.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("provider quota exhausted: {0}")]
    Quota(String),

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider returned an empty completion")]
    EmptyResponse,
}

/// Failure of a scheduled or manual refresh. Logged by the scheduler; never
/// stops it and never advances `last_updated`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RefreshError {
    #[error("refresh timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream refresh failed: {0}")]
    Upstream(String),
}
