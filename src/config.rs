use anyhow::Context;
use chrono::FixedOffset;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;
use crate::polling::{RefreshWindow, SchedulerConfig};
use crate::predict::aggregate::{LogisticScale, DEFAULT_LOGISTIC_SCALE};
use crate::predict::{ConfidenceThresholds, EngineConfig, ScorerConfig, WeightPreset, WeightSet};
use crate::reasoning::{ChatCompletionsProvider, ChatProviderConfig, ReasoningGenerator};

/// Game-day win predictions and live score polling
#[derive(Parser, Debug, Clone)]
#[command(name = "gameday-predictor", version, about)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,

    /// Named weight table
    #[arg(long, env = "WEIGHT_PRESET", value_enum, default_value = "balanced", global = true)]
    pub weight_preset: WeightPreset,

    /// Explicit weights overriding the preset: rating-differential,
    /// season-performance, situational, matchup, recent-form
    #[arg(long, env = "WEIGHTS", global = true)]
    pub weights: Option<String>,

    /// Logistic scale k in p = 1 / (1 + exp(-k * weighted_sum))
    #[arg(long, env = "LOGISTIC_SCALE", default_value_t = DEFAULT_LOGISTIC_SCALE, global = true)]
    pub logistic_scale: f64,

    /// Margin |p - 0.5| below which confidence is Low
    #[arg(long, env = "CONFIDENCE_LOW", default_value = "0.05", global = true)]
    pub confidence_low: f64,

    /// Margin |p - 0.5| at or above which confidence is High
    #[arg(long, env = "CONFIDENCE_HIGH", default_value = "0.15", global = true)]
    pub confidence_high: f64,

    /// Value substituted for missing stat fields
    #[arg(long, env = "MISSING_STAT_DEFAULT", default_value = "0.0", global = true)]
    pub missing_stat_default: f64,

    /// Situational bonus for the home side at non-neutral venues
    #[arg(long, env = "HOME_FIELD_ADVANTAGE", default_value = "0.5", global = true)]
    pub home_field_advantage: f64,

    /// Base URL of an OpenAI-compatible chat completions API
    #[arg(
        long,
        env = "LLM_API_URL",
        default_value = "https://api.openai.com/v1",
        global = true
    )]
    pub llm_api_url: String,

    /// API key for the text provider; without it reasoning uses the template
    #[arg(long, env = "LLM_API_KEY", global = true, hide_env_values = true)]
    pub llm_api_key: Option<String>,

    #[arg(long, env = "LLM_MODEL", default_value = "gpt-4o-mini", global = true)]
    pub llm_model: String,

    /// Hard bound on one reasoning call
    #[arg(long, env = "LLM_TIMEOUT_MS", default_value = "8000", global = true)]
    pub llm_timeout_ms: u64,

    /// Never call the text provider
    #[arg(long, env = "FALLBACK_ONLY", default_value = "false", global = true)]
    pub fallback_only: bool,

    /// Live data refresh interval
    #[arg(long, env = "REFRESH_INTERVAL_MS", default_value = "60000", global = true)]
    pub refresh_interval_ms: u64,

    /// Weekday hour ranges in which polling may start, e.g. `sun=12-24,mon=19-24`
    #[arg(
        long,
        env = "REFRESH_WINDOW",
        default_value = crate::polling::window::DEFAULT_WINDOW_SPEC,
        global = true
    )]
    pub refresh_window: String,

    /// UTC offset (hours) the refresh window is evaluated in
    #[arg(
        long,
        env = "WINDOW_UTC_OFFSET_HOURS",
        default_value = "0",
        allow_negative_numbers = true,
        global = true
    )]
    pub window_utc_offset_hours: i32,

    /// Stop polling once every tracked game is final
    #[arg(
        long,
        env = "AUTO_STOP_WHEN_FINAL",
        default_value = "true",
        action = clap::ArgAction::Set,
        global = true
    )]
    pub auto_stop_when_final: bool,

    /// Upper bound on one refresh, including every provider call
    #[arg(long, env = "REFRESH_TIMEOUT_SECS", default_value = "10", global = true)]
    pub refresh_timeout_secs: u64,

    /// Live scores API base URL
    #[arg(
        long,
        env = "LIVE_SCORES_API_URL",
        default_value = crate::live_scores::sports::THESPORTSDB_BASE_URL,
        global = true
    )]
    pub live_scores_api_url: String,

    /// Live scores API key (TheSportsDB free key when absent)
    #[arg(long, env = "LIVE_SCORES_API_KEY", global = true, hide_env_values = true)]
    pub live_scores_api_key: Option<String>,

    /// Event id to track; repeat for several. None tracks every live game
    #[arg(long = "track-event", env = "TRACK_EVENTS", value_delimiter = ',', global = true)]
    pub track_events: Vec<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Predict every matchup in a JSON slate, one JSON prediction per line
    Predict {
        /// JSON array of matchups; `-` reads stdin
        #[arg(long, short)]
        input: PathBuf,
    },
    /// Fit the logistic scale to historical results
    Calibrate {
        /// JSON array of matchups with a `home_won` flag
        #[arg(long)]
        history: PathBuf,
    },
    /// Poll live scores; stdin accepts pause, resume, refresh, hide, show, stop
    Watch,
}

impl Config {
    /// Check every value and cross-field constraint before anything runs.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.weight_set()?;
        LogisticScale::new(self.logistic_scale)?;
        ConfidenceThresholds::new(self.confidence_low, self.confidence_high)?;
        self.refresh_window()?;
        if !self.missing_stat_default.is_finite() {
            anyhow::bail!("missing_stat_default must be finite");
        }
        if !self.home_field_advantage.is_finite() {
            anyhow::bail!("home_field_advantage must be finite");
        }
        if self.refresh_interval_ms == 0 {
            anyhow::bail!("refresh_interval_ms must be positive");
        }
        if self.refresh_timeout_secs == 0 {
            anyhow::bail!("refresh_timeout_secs must be positive");
        }
        if self.llm_timeout_ms == 0 {
            anyhow::bail!("llm_timeout_ms must be positive");
        }
        Ok(())
    }

    /// `--weights` when given, otherwise the preset table.
    pub fn weight_set(&self) -> Result<WeightSet, ConfigError> {
        match &self.weights {
            Some(raw) => WeightSet::parse_list(raw),
            None => Ok(self.weight_preset.weights()),
        }
    }

    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        Ok(EngineConfig {
            weights: self.weight_set()?,
            scale: LogisticScale::new(self.logistic_scale)?,
            thresholds: ConfidenceThresholds::new(self.confidence_low, self.confidence_high)?,
            scorer: ScorerConfig {
                missing_stat_default: self.missing_stat_default,
                home_field_advantage: self.home_field_advantage,
                ..ScorerConfig::default()
            },
        })
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_millis(self.llm_timeout_ms)
    }

    pub fn reasoning_generator(&self) -> anyhow::Result<ReasoningGenerator> {
        if self.fallback_only {
            return Ok(ReasoningGenerator::fallback_only());
        }
        let Some(api_key) = self.llm_api_key.clone() else {
            return Ok(ReasoningGenerator::fallback_only());
        };
        let provider = ChatCompletionsProvider::new(ChatProviderConfig {
            api_url: self.llm_api_url.clone(),
            api_key,
            model: self.llm_model.clone(),
            timeout: self.llm_timeout(),
            max_tokens: 200,
        })
        .context("Failed to build text provider")?;
        Ok(ReasoningGenerator::new(Arc::new(provider), self.llm_timeout()))
    }

    pub fn refresh_window(&self) -> Result<RefreshWindow, ConfigError> {
        let offset = self
            .window_utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ConfigError::InvalidWindow(format!(
                    "utc offset {}h out of range",
                    self.window_utc_offset_hours
                ))
            })?;
        RefreshWindow::parse(&self.refresh_window, offset)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    pub fn scheduler_config(&self) -> Result<SchedulerConfig, ConfigError> {
        Ok(SchedulerConfig {
            refresh_interval: Duration::from_millis(self.refresh_interval_ms),
            window: self.refresh_window()?,
            auto_stop_when_final: self.auto_stop_when_final,
        })
    }
}
