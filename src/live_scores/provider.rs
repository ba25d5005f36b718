use anyhow::Result;
use async_trait::async_trait;

use crate::models::LiveGame;

/// Source of live game snapshots.
#[async_trait]
pub trait ScoreProvider: Send + Sync {
    /// Current state of every game the provider knows about today.
    async fn fetch_live_games(&self) -> Result<Vec<LiveGame>>;

    fn name(&self) -> &str;

    /// Tie-break weight when providers disagree, in (0, 1].
    fn trust(&self) -> f64 {
        0.85
    }
}
