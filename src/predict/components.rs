//! Per-matchup component scores.
//!
//! Each component turns one statistical differential into a signed number:
//! positive favours the home team, negative the away team, and the magnitude
//! grows with the underlying gap. Scores are pure functions of the two stat
//! lines plus the matchup context.
//!
//! Components, in their fixed tie-break order:
//! - **rating-differential**: power-rating gap
//! - **season-performance**: win percentage and per-game point margin
//! - **situational**: home field, home/away splits, rest, rivalry damping
//! - **matchup**: net efficiency gap and head-to-head record
//! - **recent-form**: win rate over the last few games

use serde::Serialize;

use crate::error::MissingStatField;
use crate::models::{MatchupContext, TeamStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Component {
    RatingDifferential,
    SeasonPerformance,
    Situational,
    Matchup,
    RecentForm,
}

impl Component {
    /// All components in tie-break order.
    pub const ALL: [Component; 5] = [
        Component::RatingDifferential,
        Component::SeasonPerformance,
        Component::Situational,
        Component::Matchup,
        Component::RecentForm,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn key(self) -> &'static str {
        match self {
            Component::RatingDifferential => "rating-differential",
            Component::SeasonPerformance => "season-performance",
            Component::Situational => "situational",
            Component::Matchup => "matchup",
            Component::RecentForm => "recent-form",
        }
    }

    /// Human-readable name used in reasoning text.
    pub fn label(self) -> &'static str {
        match self {
            Component::RatingDifferential => "rating differential",
            Component::SeasonPerformance => "season performance",
            Component::Situational => "situational edge",
            Component::Matchup => "matchup",
            Component::RecentForm => "recent form",
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComponentScore {
    pub component: Component,
    pub value: f64,
}

/// Exactly one score per component.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ComponentScores {
    values: [f64; 5],
}

impl ComponentScores {
    /// Values in `Component::ALL` order.
    pub fn from_values(values: [f64; 5]) -> Self {
        ComponentScores { values }
    }

    pub fn get(&self, component: Component) -> f64 {
        self.values[component.index()]
    }

    pub fn values(&self) -> &[f64; 5] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = ComponentScore> + '_ {
        Component::ALL.iter().map(move |&component| ComponentScore {
            component,
            value: self.get(component),
        })
    }

    /// Scores by absolute magnitude, largest first; equal magnitudes keep the
    /// fixed component order.
    pub fn ranked(&self) -> Vec<ComponentScore> {
        let mut scores: Vec<ComponentScore> = self.iter().collect();
        scores.sort_by(|a, b| {
            b.value
                .abs()
                .total_cmp(&a.value.abs())
                .then(a.component.cmp(&b.component))
        });
        scores
    }
}

/// Tunable constants for the component formulas.
#[derive(Debug, Clone, PartialEq)]
pub struct ScorerConfig {
    /// Substituted for any missing or non-finite stat field
    pub missing_stat_default: f64,
    /// Rating points per unit of rating-differential score
    pub rating_scale: f64,
    pub win_pct_weight: f64,
    pub point_margin_weight: f64,
    /// Flat situational bonus for the home side (not applied at neutral sites)
    pub home_field_advantage: f64,
    pub split_weight: f64,
    pub rest_weight_per_day: f64,
    pub max_rest_edge_days: f64,
    /// Multiplier applied to the situational score in rivalry games
    pub rivalry_damping: f64,
    pub efficiency_weight: f64,
    pub head_to_head_weight: f64,
    pub form_weight: f64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        ScorerConfig {
            missing_stat_default: 0.0,
            rating_scale: 25.0,
            win_pct_weight: 10.0,
            point_margin_weight: 0.25,
            home_field_advantage: 0.5,
            split_weight: 5.0,
            rest_weight_per_day: 0.3,
            max_rest_edge_days: 3.0,
            rivalry_damping: 0.8,
            efficiency_weight: 0.25,
            head_to_head_weight: 2.0,
            form_weight: 8.0,
        }
    }
}

/// Scorer output: the five scores plus every field that had to be defaulted.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub scores: ComponentScores,
    pub defaulted: Vec<MissingStatField>,
}

#[derive(Debug, Clone, Default)]
pub struct ComponentScorer {
    config: ScorerConfig,
}

impl ComponentScorer {
    pub fn new(config: ScorerConfig) -> Self {
        ComponentScorer { config }
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    pub fn score(
        &self,
        home: &TeamStats,
        away: &TeamStats,
        context: &MatchupContext,
    ) -> ScoreBreakdown {
        let mut reader = StatReader {
            default: self.config.missing_stat_default,
            defaulted: Vec::new(),
        };
        let h = ResolvedStats::read(home, &mut reader);
        let a = ResolvedStats::read(away, &mut reader);

        let scores = ComponentScores::from_values([
            self.rating_differential(&h, &a),
            self.season_performance(&h, &a),
            self.situational(&h, &a, context),
            self.matchup(&h, &a, context),
            self.recent_form(&h, &a),
        ]);

        ScoreBreakdown {
            scores,
            defaulted: reader.defaulted,
        }
    }

    fn rating_differential(&self, h: &ResolvedStats, a: &ResolvedStats) -> f64 {
        (h.rating - a.rating) / self.config.rating_scale
    }

    fn season_performance(&self, h: &ResolvedStats, a: &ResolvedStats) -> f64 {
        let pct_gap = win_pct(h.wins, h.losses) - win_pct(a.wins, a.losses);
        let margin_gap = (h.points_for - h.points_against) - (a.points_for - a.points_against);
        self.config.win_pct_weight * pct_gap + self.config.point_margin_weight * margin_gap
    }

    fn situational(&self, h: &ResolvedStats, a: &ResolvedStats, ctx: &MatchupContext) -> f64 {
        let cfg = &self.config;
        let home_field = if ctx.neutral_site {
            0.0
        } else {
            cfg.home_field_advantage
        };
        // Home side's record at home against the visitor's record on the road
        let split_gap = win_pct(h.home_wins, h.home_losses) - win_pct(a.away_wins, a.away_losses);
        let rest_gap = match (ctx.home_rest_days, ctx.away_rest_days) {
            (Some(hr), Some(ar)) => (hr as f64 - ar as f64)
                .clamp(-cfg.max_rest_edge_days, cfg.max_rest_edge_days),
            _ => 0.0,
        };
        let raw = home_field + cfg.split_weight * split_gap + cfg.rest_weight_per_day * rest_gap;
        if ctx.rivalry {
            raw * cfg.rivalry_damping
        } else {
            raw
        }
    }

    fn matchup(&self, h: &ResolvedStats, a: &ResolvedStats, ctx: &MatchupContext) -> f64 {
        let net_gap = (h.offensive - h.defensive) - (a.offensive - a.defensive);
        let meetings = ctx.h2h_home_wins + ctx.h2h_away_wins;
        let h2h = if meetings == 0 {
            0.0
        } else {
            (ctx.h2h_home_wins as f64 - ctx.h2h_away_wins as f64) / meetings as f64
        };
        self.config.efficiency_weight * net_gap + self.config.head_to_head_weight * h2h
    }

    fn recent_form(&self, h: &ResolvedStats, a: &ResolvedStats) -> f64 {
        self.config.form_weight * (form(h.recent_wins, h.recent_games) - form(a.recent_wins, a.recent_games))
    }
}

/// Win fraction, 0.5 when no games are on record.
fn win_pct(wins: f64, losses: f64) -> f64 {
    let games = wins + losses;
    if games <= 0.0 {
        0.5
    } else {
        (wins / games).clamp(0.0, 1.0)
    }
}

fn form(wins: f64, games: f64) -> f64 {
    if games <= 0.0 {
        0.5
    } else {
        (wins / games).clamp(0.0, 1.0)
    }
}

struct StatReader {
    default: f64,
    defaulted: Vec<MissingStatField>,
}

impl StatReader {
    fn value(&mut self, team: &TeamStats, field: &'static str, v: Option<f64>) -> f64 {
        match v {
            Some(x) if x.is_finite() => x,
            _ => {
                self.defaulted.push(MissingStatField {
                    team_id: team.team_id.clone(),
                    field,
                    default: self.default,
                });
                self.default
            }
        }
    }

    fn count(&mut self, team: &TeamStats, field: &'static str, v: Option<u32>) -> f64 {
        match v {
            Some(n) => n as f64,
            None => self.value(team, field, None).max(0.0),
        }
    }
}

/// A stat line with every gap filled in.
struct ResolvedStats {
    rating: f64,
    wins: f64,
    losses: f64,
    home_wins: f64,
    home_losses: f64,
    away_wins: f64,
    away_losses: f64,
    offensive: f64,
    defensive: f64,
    points_for: f64,
    points_against: f64,
    recent_wins: f64,
    recent_games: f64,
}

impl ResolvedStats {
    fn read(t: &TeamStats, r: &mut StatReader) -> Self {
        ResolvedStats {
            rating: r.value(t, "rating", t.rating),
            wins: r.count(t, "wins", t.wins),
            losses: r.count(t, "losses", t.losses),
            home_wins: r.count(t, "home_wins", t.home_wins),
            home_losses: r.count(t, "home_losses", t.home_losses),
            away_wins: r.count(t, "away_wins", t.away_wins),
            away_losses: r.count(t, "away_losses", t.away_losses),
            offensive: r.value(t, "offensive_rating", t.offensive_rating),
            defensive: r.value(t, "defensive_rating", t.defensive_rating),
            points_for: r.value(t, "points_for_per_game", t.points_for_per_game).max(0.0),
            points_against: r
                .value(t, "points_against_per_game", t.points_against_per_game)
                .max(0.0),
            recent_wins: r.count(t, "recent_wins", t.recent_wins),
            recent_games: r.count(t, "recent_games", t.recent_games),
        }
    }
}
