use std::fmt::Write;

use super::ReasoningContext;
use crate::models::TeamStats;

/// How many ranked components are flagged as key factors in the prompt.
pub const HIGHLIGHTED_FACTORS: usize = 3;

const INSTRUCTIONS: &str = "You are a sports analyst writing a short pick explanation. \
In two or three sentences, explain why the model favours the predicted winner. \
Use only the figures below; do not invent injuries, news or statistics.";

/// Builds the provider prompt. The template is fixed and the output depends
/// only on the context, so the same prediction always yields the same prompt.
pub fn build_prompt(ctx: &ReasoningContext<'_>) -> String {
    let home = &ctx.matchup.home;
    let away = &ctx.matchup.away;
    let c = &ctx.matchup.context;
    let mut out = String::new();

    // writeln! into a String cannot fail
    let _ = writeln!(out, "{}", INSTRUCTIONS);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Matchup: {} (away) at {} (home){}",
        away.team_id,
        home.team_id,
        if c.neutral_site { ", neutral site" } else { "" }
    );
    let _ = writeln!(out, "Predicted winner: {}", ctx.winner_id());
    let _ = writeln!(
        out,
        "Home win probability: {} (~{:.1}%)",
        ctx.aggregation.home_win_probability,
        ctx.aggregation.home_win_probability * 100.0
    );
    let _ = writeln!(out, "Confidence: {}", ctx.confidence);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Component breakdown (ranked by absolute score, positive favours home, * = key factor):"
    );
    for (rank, score) in ctx.scores.ranked().iter().enumerate() {
        let weight = ctx.weights.get(score.component);
        let _ = writeln!(
            out,
            "{} {}. {}: {:+.4} (weight {:.2}, contribution {:+.4})",
            if rank < HIGHLIGHTED_FACTORS { "*" } else { " " },
            rank + 1,
            score.component,
            score.value,
            weight,
            weight * score.value
        );
    }
    let _ = writeln!(out, "Weighted sum: {:+.4}", ctx.aggregation.weighted_sum);
    let _ = writeln!(out);
    let _ = writeln!(out, "Team statistics:");
    let _ = writeln!(out, "{}", stat_line(home, "home"));
    let _ = writeln!(out, "{}", stat_line(away, "away"));
    let _ = writeln!(out);
    let _ = write!(
        out,
        "Context: rest days {} / {}; rivalry: {}; head-to-head: {} {} - {} {}",
        opt(c.home_rest_days),
        opt(c.away_rest_days),
        if c.rivalry { "yes" } else { "no" },
        home.team_id,
        c.h2h_home_wins,
        c.h2h_away_wins,
        away.team_id
    );
    out
}

fn stat_line(t: &TeamStats, side: &str) -> String {
    format!(
        "{} ({}): rating {}, record {}-{}, home {}-{}, away {}-{}, off rtg {}, def rtg {}, PF/G {}, PA/G {}, recent {}/{}",
        t.team_id,
        side,
        optf(t.rating),
        opt(t.wins),
        opt(t.losses),
        opt(t.home_wins),
        opt(t.home_losses),
        opt(t.away_wins),
        opt(t.away_losses),
        optf(t.offensive_rating),
        optf(t.defensive_rating),
        optf(t.points_for_per_game),
        optf(t.points_against_per_game),
        opt(t.recent_wins),
        opt(t.recent_games),
    )
}

fn opt(v: Option<u32>) -> String {
    v.map(|n| n.to_string()).unwrap_or_else(|| "n/a".into())
}

fn optf(v: Option<f64>) -> String {
    v.map(|x| format!("{:.1}", x)).unwrap_or_else(|| "n/a".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::components::tests::full_stats;
    use crate::reasoning::tests::context_fixture;

    #[test]
    fn prompt_carries_probability_winner_and_ranked_breakdown() {
        let fx = context_fixture(full_stats("BUF", 1600.0), full_stats("MIA", 1500.0));
        let prompt = build_prompt(&fx.context());

        let p = fx.aggregation.home_win_probability;
        assert!(prompt.contains(&format!("Home win probability: {} ", p)));
        assert!(prompt.contains(&format!("{}", p)));
        assert!(prompt.contains("Predicted winner: BUF"));
        assert!(prompt.contains("Matchup: MIA (away) at BUF (home)"));

        let lines: Vec<&str> = prompt
            .lines()
            .filter(|l| l.contains("(weight "))
            .collect();
        assert_eq!(lines.len(), 5);
        // rating differential (4.0) outranks the situational edge (1.75)
        assert!(lines[0].starts_with("* 1. rating-differential: +4.0000"));
        assert!(lines[1].starts_with("* 2. situational: +1.7500"));
        assert!(lines[2].starts_with("* 3."));
        assert!(lines[3].starts_with("  4."));
    }

    #[test]
    fn prompt_is_deterministic_and_marks_missing_stats() {
        let fx = context_fixture(TeamStats::new("H"), full_stats("A", 1500.0));
        let a = build_prompt(&fx.context());
        let b = build_prompt(&fx.context());
        assert_eq!(a, b);
        assert!(a.contains("H (home): rating n/a"));
        assert!(a.contains("A (away): rating 1500.0"));
    }
}
