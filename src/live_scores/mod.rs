pub mod provider;
pub mod scoreboard;
pub mod sports;

pub use provider::ScoreProvider;
pub use scoreboard::LiveScoreboard;
pub use sports::{detect_score_change, ScoreChange, TheSportsDB};
