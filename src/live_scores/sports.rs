use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use super::provider::ScoreProvider;
use crate::models::{GameStatus, LiveGame, Side};

pub const THESPORTSDB_BASE_URL: &str = "https://www.thesportsdb.com/api/v1/json";
/// TheSportsDB's public free-tier key
pub const THESPORTSDB_FREE_KEY: &str = "3";

/// Live-score provider backed by TheSportsDB REST API.
/// Docs: <https://www.thesportsdb.com/api.php>
pub struct TheSportsDB {
    http: Client,
    api_key: String,
    base_url: String,
}

impl TheSportsDB {
    pub fn new(api_key: Option<&str>, base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(TheSportsDB {
            http,
            api_key: api_key.unwrap_or(THESPORTSDB_FREE_KEY).to_string(),
            base_url: base_url
                .unwrap_or(THESPORTSDB_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }

    fn status_from_str(s: &str) -> GameStatus {
        match s.trim().to_lowercase().as_str() {
            "not started" | "ns" | "pre" | "scheduled" | "" => GameStatus::NotStarted,
            "half time" | "halftime" | "ht" => GameStatus::HalfTime,
            "match finished" | "finished" | "final" | "ft" | "aot" | "aet" | "pen"
            | "final/ot" | "postponed" | "cancelled" => GameStatus::Finished,
            _ => GameStatus::InProgress,
        }
    }
}

#[async_trait]
impl ScoreProvider for TheSportsDB {
    fn name(&self) -> &str {
        "TheSportsDB"
    }

    fn trust(&self) -> f64 {
        0.9
    }

    async fn fetch_live_games(&self) -> Result<Vec<LiveGame>> {
        let url = format!("{}/{}/livescore.php", self.base_url, self.api_key);
        debug!("Fetching live games from {}", self.base_url);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("TheSportsDB request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("TheSportsDB error: {}", resp.status());
        }

        let raw: Value = resp
            .json()
            .await
            .context("Failed to parse TheSportsDB response")?;

        Ok(parse_livescore_response(&raw))
    }
}

/// The API mixes quoted and bare integers.
fn int_field(ev: &Value, key: &str) -> Option<i32> {
    match &ev[key] {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        _ => None,
    }
}

pub(crate) fn parse_livescore_response(raw: &Value) -> Vec<LiveGame> {
    let Some(events) = raw["events"].as_array() else {
        return Vec::new();
    };

    events
        .iter()
        .filter_map(|ev| {
            let event_id = ev["idEvent"].as_str()?.to_string();
            let home_team = ev["strHomeTeam"].as_str()?.to_string();
            let away_team = ev["strAwayTeam"].as_str()?.to_string();
            let status = TheSportsDB::status_from_str(ev["strStatus"].as_str().unwrap_or("In Progress"));
            Some(LiveGame {
                event_id,
                sport: ev["strSport"]
                    .as_str()
                    .unwrap_or("american football")
                    .to_lowercase(),
                league: ev["strLeague"].as_str().unwrap_or("unknown").to_string(),
                home_team,
                away_team,
                home_score: int_field(ev, "intHomeScore").unwrap_or(0),
                away_score: int_field(ev, "intAwayScore").unwrap_or(0),
                minute: int_field(ev, "intProgress").or_else(|| int_field(ev, "strProgress")),
                status,
            })
        })
        .collect()
}

/// A scoreline difference between two snapshots of the same game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreChange {
    pub home_delta: i32,
    pub away_delta: i32,
    /// Side whose score went up; `None` on corrections that only lowered a score
    pub scoring_side: Option<Side>,
    pub kind: &'static str,
}

impl fmt::Display for ScoreChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scoring_side {
            Some(side) => write!(
                f,
                "{} {:?} ({:+}/{:+})",
                self.kind, side, self.home_delta, self.away_delta
            ),
            None => write!(f, "{} ({:+}/{:+})", self.kind, self.home_delta, self.away_delta),
        }
    }
}

pub fn detect_score_change(prev: &LiveGame, curr: &LiveGame) -> Option<ScoreChange> {
    let home_delta = curr.home_score - prev.home_score;
    let away_delta = curr.away_score - prev.away_score;
    if home_delta == 0 && away_delta == 0 {
        return None;
    }
    let scoring_side = if home_delta > 0 {
        Some(Side::Home)
    } else if away_delta > 0 {
        Some(Side::Away)
    } else {
        None
    };
    let points = if home_delta != 0 { home_delta } else { away_delta };
    Some(ScoreChange {
        home_delta,
        away_delta,
        scoring_side,
        kind: classify_points(&curr.sport, points),
    })
}

fn classify_points(sport: &str, points: i32) -> &'static str {
    match sport {
        "american football" | "american_football" | "nfl" => match points {
            6 => "touchdown",
            7 | 8 => "touchdown+conversion",
            3 => "field_goal",
            2 => "safety",
            1 => "extra_point",
            _ => "score_change",
        },
        "basketball" | "nba" => match points {
            3 => "three_pointer",
            2 => "basket",
            1 => "free_throw",
            _ => "score_change",
        },
        "soccer" | "football" | "ice hockey" | "ice_hockey" | "nhl" if points > 0 => "goal",
        "baseball" | "mlb" if points > 0 => "run",
        _ => "score_change",
    }
}
