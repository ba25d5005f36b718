pub mod config;
pub mod error;
pub mod live_scores;
pub mod models;
pub mod polling;
pub mod predict;
pub mod reasoning;
