use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Season statistics snapshot for one team.
///
/// Every numeric field is optional: feeds are frequently incomplete, and a
/// missing value is replaced by the scorer's configured default (and reported)
/// rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamStats {
    pub team_id: String,
    /// Power rating (Elo-like, unbounded)
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub wins: Option<u32>,
    #[serde(default)]
    pub losses: Option<u32>,
    #[serde(default)]
    pub home_wins: Option<u32>,
    #[serde(default)]
    pub home_losses: Option<u32>,
    #[serde(default)]
    pub away_wins: Option<u32>,
    #[serde(default)]
    pub away_losses: Option<u32>,
    /// Points produced per 100 possessions (higher is better)
    #[serde(default)]
    pub offensive_rating: Option<f64>,
    /// Points allowed per 100 possessions (lower is better)
    #[serde(default)]
    pub defensive_rating: Option<f64>,
    #[serde(default)]
    pub points_for_per_game: Option<f64>,
    #[serde(default)]
    pub points_against_per_game: Option<f64>,
    /// Wins over the most recent `recent_games` games
    #[serde(default)]
    pub recent_wins: Option<u32>,
    #[serde(default)]
    pub recent_games: Option<u32>,
}

impl TeamStats {
    pub fn new(team_id: impl Into<String>) -> Self {
        TeamStats {
            team_id: team_id.into(),
            ..Default::default()
        }
    }
}

/// Game-specific circumstances that are not part of either team's season line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchupContext {
    /// Neutral venue: no home-field bonus
    #[serde(default)]
    pub neutral_site: bool,
    #[serde(default)]
    pub home_rest_days: Option<u32>,
    #[serde(default)]
    pub away_rest_days: Option<u32>,
    #[serde(default)]
    pub rivalry: bool,
    /// Head-to-head wins by the home team in previous meetings
    #[serde(default)]
    pub h2h_home_wins: u32,
    /// Head-to-head wins by the away team in previous meetings
    #[serde(default)]
    pub h2h_away_wins: u32,
}

/// One game to predict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matchup {
    pub home: TeamStats,
    pub away: TeamStats,
    #[serde(default)]
    pub context: MatchupContext,
}

impl Matchup {
    pub fn new(home: TeamStats, away: TeamStats) -> Self {
        Matchup {
            home,
            away,
            context: MatchupContext::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

/// Confidence tier, ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::Low => write!(f, "low"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::High => write!(f, "high"),
        }
    }
}

/// Where a prediction's reasoning text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningSource {
    Provider,
    Fallback,
}

/// A finished prediction. Created once per matchup per scoring run and never
/// mutated; re-predicting a matchup produces a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub home_team: String,
    pub away_team: String,
    /// P(home wins), always in [0, 1]
    pub home_win_probability: f64,
    /// Team id of the pick; the home team on an exact 0.5
    pub predicted_winner: String,
    pub confidence: Confidence,
    pub reasoning: String,
    pub reasoning_source: ReasoningSource,
    pub generated_at: DateTime<Utc>,
}

/// Raw live game state as fetched from a score provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveGame {
    pub event_id: String,
    pub sport: String,
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    pub home_score: i32,
    pub away_score: i32,
    pub minute: Option<i32>,
    pub status: GameStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    NotStarted,
    InProgress,
    HalfTime,
    Finished,
}
