use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use gameday_predictor::config::{Command, Config};
use gameday_predictor::live_scores::{LiveScoreboard, ScoreProvider, TheSportsDB};
use gameday_predictor::models::Matchup;
use gameday_predictor::polling::{
    spawn_scheduler, RefreshSource, SchedulerHandle, SchedulerState, SystemClock,
};
use gameday_predictor::predict::calibration::{fit_logistic_scale, ScaleSample};
use gameday_predictor::predict::PredictionEngine;

/// Per-provider bound inside one refresh
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();
    config.validate()?;

    match &config.command {
        Command::Predict { input } => run_predict(&config, input).await,
        Command::Calibrate { history } => run_calibrate(&config, history),
        Command::Watch => run_watch(&config).await,
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read stdin")
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    }
}

async fn run_predict(config: &Config, input: &Path) -> Result<()> {
    let slate: Vec<Matchup> = serde_json::from_str(&read_input(input)?)
        .with_context(|| format!("{} is not a JSON array of matchups", input.display()))?;
    let reasoning = config.reasoning_generator()?;
    if !reasoning.has_provider() {
        info!("No text provider configured; using templated reasoning");
    }
    let engine = PredictionEngine::new(config.engine_config()?, reasoning);

    info!("Predicting {} matchups", slate.len());
    for prediction in engine.predict_slate(&slate).await {
        println!("{}", serde_json::to_string(&prediction)?);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct HistoricalGame {
    #[serde(flatten)]
    matchup: Matchup,
    home_won: bool,
}

fn run_calibrate(config: &Config, history: &Path) -> Result<()> {
    let games: Vec<HistoricalGame> = serde_json::from_str(&read_input(history)?)
        .with_context(|| format!("{} is not a JSON array of results", history.display()))?;
    let engine_config = config.engine_config()?;
    let initial = engine_config.scale.value();
    let engine = PredictionEngine::new(
        engine_config,
        gameday_predictor::reasoning::ReasoningGenerator::fallback_only(),
    );

    let samples: Vec<ScaleSample> = games
        .iter()
        .map(|g| ScaleSample {
            weighted_sum: engine.score(&g.matchup, None).aggregation.weighted_sum,
            home_won: if g.home_won { 1.0 } else { 0.0 },
        })
        .collect();

    let Some(fit) = fit_logistic_scale(&samples, initial, 2_000, 0.05, 1e-4) else {
        anyhow::bail!(
            "cannot calibrate from {} results: need at least 8 with both home wins and losses",
            samples.len()
        );
    };
    info!(
        "Fitted logistic scale {:.4} (was {:.4}); log-loss {:.4} -> {:.4}",
        fit.scale, initial, fit.metrics.logloss_before, fit.metrics.logloss_after
    );
    println!(
        "{}",
        serde_json::json!({
            "samples": samples.len(),
            "initial_scale": initial,
            "fitted_scale": fit.scale,
            "logloss_before": fit.metrics.logloss_before,
            "logloss_after": fit.metrics.logloss_after,
            "brier_before": fit.metrics.brier_before,
            "brier_after": fit.metrics.brier_after,
        })
    );
    Ok(())
}

async fn run_watch(config: &Config) -> Result<()> {
    let providers: Vec<Arc<dyn ScoreProvider>> = vec![Arc::new(TheSportsDB::new(
        config.live_scores_api_key.as_deref(),
        Some(config.live_scores_api_url.as_str()),
        PROVIDER_TIMEOUT,
    )?)];
    info!("Configured {} score provider(s)", providers.len());

    let scoreboard = Arc::new(LiveScoreboard::new(
        providers,
        PROVIDER_TIMEOUT.min(config.refresh_timeout()),
        config.track_events.clone(),
    ));

    // seed the scoreboard so the liveness check knows about today's games
    match tokio::time::timeout(config.refresh_timeout(), scoreboard.refresh()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Initial refresh failed: {}", e),
        Err(_) => warn!("Initial refresh timed out"),
    }

    let (handle, task) = spawn_scheduler(
        config.scheduler_config()?,
        SystemClock,
        Some(scoreboard.liveness_check()),
        scoreboard.clone(),
        config.refresh_timeout(),
    );
    let mut snapshots = handle.subscribe();
    handle.start().await?;
    snapshots.changed().await.ok();
    let mut last_seen = snapshots.borrow_and_update().clone();
    if last_seen.state == SchedulerState::Stopped {
        info!("Outside the refresh window with no live games; `refresh` or `start` to poll");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut stop_requested = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    let command = line.trim();
                    match command {
                        "stop" => stop_requested = true,
                        "start" | "resume" => stop_requested = false,
                        _ => {}
                    }
                    if !apply_console_command(&handle, command).await? {
                        break;
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("stdin closed: {}", e);
                    stdin_open = false;
                }
            },
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snap = snapshots.borrow_and_update().clone();
                if snap.last_updated != last_seen.last_updated {
                    for game in scoreboard.games() {
                        println!("{}", serde_json::to_string(&game)?);
                    }
                }
                if stopped_because_final(
                    last_seen.state,
                    snap.state,
                    stop_requested,
                    scoreboard.all_finished(),
                ) {
                    info!("All tracked games are final; exiting");
                    break;
                }
                if last_seen.state != snap.state {
                    info!("Scheduler {:?} -> {:?}", last_seen.state, snap.state);
                }
                last_seen = snap;
            }
        }
        if last_seen.state == SchedulerState::Stopped && !stdin_open {
            info!("Polling stopped and stdin closed; exiting");
            break;
        }
    }

    handle.shutdown().await.ok();
    task.await.context("scheduler task panicked")?;
    Ok(())
}

/// An Active/Paused -> Stopped transition nobody asked for, with every game
/// final, is the scheduler's auto-stop.
fn stopped_because_final(
    previous: SchedulerState,
    current: SchedulerState,
    stop_requested: bool,
    all_finished: bool,
) -> bool {
    previous != SchedulerState::Stopped
        && current == SchedulerState::Stopped
        && !stop_requested
        && all_finished
}

/// Returns false when the console asks to quit.
async fn apply_console_command(handle: &SchedulerHandle, command: &str) -> Result<bool> {
    let state = handle.snapshot().state;
    match command {
        "" => {}
        "start" => handle.start().await?,
        "pause" if state == SchedulerState::Active => handle.toggle_pause().await?,
        "resume" if state == SchedulerState::Paused => handle.toggle_pause().await?,
        "pause" | "resume" => info!("Nothing to {} while {:?}", command, state),
        "refresh" => handle.manual_refresh().await?,
        "hide" => handle.set_visible(false).await?,
        "show" => handle.set_visible(true).await?,
        "stop" => handle.stop().await?,
        "status" => println!("{}", serde_json::to_string(&handle.snapshot())?),
        "quit" | "exit" => return Ok(false),
        other => warn!(
            "Unknown command `{}` (start, pause, resume, refresh, hide, show, stop, status, quit)",
            other
        ),
    }
    Ok(true)
}
