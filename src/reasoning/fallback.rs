use super::ReasoningContext;
use crate::models::Side;
use crate::predict::components::ComponentScore;

/// At most this many supporting factors are named.
const MAX_FACTORS: usize = 2;

/// Templated explanation used when the provider is bypassed or fails.
/// Never empty, never fails.
pub fn fallback_reasoning(ctx: &ReasoningContext<'_>) -> String {
    let winner = ctx.winner_id();
    let lead = format!(
        "{} is the pick with a {:.1}% chance to win ({} confidence)",
        if winner.trim().is_empty() {
            match ctx.aggregation.predicted_winner {
                Side::Home => "The home team",
                Side::Away => "The away team",
            }
        } else {
            winner
        },
        ctx.aggregation.winner_probability() * 100.0,
        ctx.confidence
    );

    let factors = supporting_factors(ctx);
    match factors.as_slice() {
        [] => format!("{}.", lead),
        [only] => format!("{}, led by {}.", lead, only.component.label()),
        [first, second, ..] => format!(
            "{}, led by {} and {}.",
            lead,
            first.component.label(),
            second.component.label()
        ),
    }
}

/// Components pointing the same way as the pick, strongest first.
fn supporting_factors(ctx: &ReasoningContext<'_>) -> Vec<ComponentScore> {
    ctx.scores
        .ranked()
        .into_iter()
        .filter(|s| match ctx.aggregation.predicted_winner {
            Side::Home => s.value > 0.0,
            Side::Away => s.value < 0.0,
        })
        .take(MAX_FACTORS)
        .collect()
}
