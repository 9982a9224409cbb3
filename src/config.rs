/// Run configuration.
///
/// Three layers, strongest first: CLI flags, an optional TOML config file,
/// then environment variables (a `.env` file is honored via dotenv). The
/// CLI mirrors the historical script flags; the config file exists so a
/// cron entry can stay short.
///
/// The bot token is deliberately accepted from the environment
/// (`RAINMON_BOT_TOKEN`) so it can be kept out of shell history and
/// crontabs.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

use crate::alert::transitions::DebounceConfig;
use crate::analysis::rain::{RainPolicy, RainRule};
use crate::logging::{self, Source};
use crate::store;

pub const BOT_TOKEN_ENV: &str = "RAINMON_BOT_TOKEN";

// ---------------------------------------------------------------------------
// CLI surface
// ---------------------------------------------------------------------------

/// Rain alert bot: watches the 24h forecast for one city and notifies
/// Telegram subscribers when the rain signal changes.
#[derive(Debug, Parser)]
#[command(name = "rainmon", version, about)]
pub struct Cli {
    /// City to watch (geocoded via Open-Meteo).
    #[arg(long)]
    pub city: Option<String>,

    /// Optional TOML config file; CLI flags override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Alert when hourly precipitation probability reaches this percentage.
    #[arg(long, value_name = "PCT")]
    pub prob_threshold: Option<u8>,

    /// Alert when hourly precipitation reaches this many millimetres.
    #[arg(long, value_name = "MM")]
    pub mm_threshold: Option<f64>,

    /// How the two predicates combine into the rain signal.
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Telegram bot token; falls back to the RAINMON_BOT_TOKEN env var.
    #[arg(long)]
    pub bot_token: Option<String>,

    /// Seed chat ids, comma-separated. Merged into the subscriber set
    /// before the command feed is processed.
    #[arg(long, value_name = "IDS")]
    pub seed_chats: Option<String>,

    /// Disable TLS certificate verification (emergency use only).
    #[arg(long)]
    pub insecure: bool,

    /// Consecutive rain detections required before a RAIN notification.
    /// 0 disables debouncing (notify on every change).
    #[arg(long, value_name = "N")]
    pub debounce_need: Option<u32>,

    /// Forecast peak (mm) that commits RAIN immediately, bypassing the
    /// debounce counter.
    #[arg(long, value_name = "MM")]
    pub heavy_rain_mm: Option<f64>,

    /// Path of the JSON state file.
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Run even during the 22:00–06:59 quiet window.
    #[arg(long)]
    pub no_quiet_hours: bool,

    /// Append log output to this file in addition to the console.
    #[arg(long)]
    pub log_file: Option<String>,

    /// Log hourly forecast details and other debug output.
    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyArg {
    /// prob >= threshold OR mm >= threshold (default)
    ProbOrMm,
    /// prob >= threshold AND mm >= threshold
    ProbAndMm,
    /// probability threshold only
    ProbOnly,
    /// prob >= threshold OR any nonzero mm
    ProbOrAnyMm,
}

impl From<PolicyArg> for RainRule {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::ProbOrMm => RainRule::ProbabilityOrAmount,
            PolicyArg::ProbAndMm => RainRule::ProbabilityAndAmount,
            PolicyArg::ProbOnly => RainRule::ProbabilityOnly,
            PolicyArg::ProbOrAnyMm => RainRule::ProbabilityOrAnyAmount,
        }
    }
}

// ---------------------------------------------------------------------------
// Config file
// ---------------------------------------------------------------------------

/// Shape of the optional TOML config file. Every field is optional; the
/// file only needs to mention what it wants to set.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub city: Option<String>,
    pub prob_threshold: Option<u8>,
    pub mm_threshold: Option<f64>,
    pub policy: Option<PolicyArg>,
    pub bot_token: Option<String>,
    pub seed_chats: Option<String>,
    pub insecure: Option<bool>,
    pub debounce_need: Option<u32>,
    pub heavy_rain_mm: Option<f64>,
    pub state_file: Option<PathBuf>,
    pub quiet_hours: Option<bool>,
    pub log_file: Option<String>,
}

// ---------------------------------------------------------------------------
// Quiet hours
// ---------------------------------------------------------------------------

/// Nightly window during which the whole run is skipped. The historical
/// window is 22:00 through 06:59 local time, so the 07:00 cron run is the
/// first of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietHours {
    pub start_hour: u32,
    /// First hour that is no longer quiet.
    pub end_hour: u32,
}

impl QuietHours {
    pub const DEFAULT: QuietHours = QuietHours { start_hour: 22, end_hour: 7 };

    /// Whether the given local hour falls inside the quiet window.
    /// Handles windows that wrap past midnight.
    pub fn covers_hour(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub city: String,
    pub policy: RainPolicy,
    pub bot_token: String,
    pub seed_chat_ids: Vec<i64>,
    pub insecure: bool,
    /// `None` = simple notify-on-change behavior.
    pub debounce: Option<DebounceConfig>,
    pub state_path: PathBuf,
    pub quiet_hours: Option<QuietHours>,
    pub log_file: Option<String>,
    pub verbose: bool,
}

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    MissingCity,
    MissingBotToken,
    FileRead(String),
    FileParse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingCity => write!(f, "No city given (--city or config file)"),
            ConfigError::MissingBotToken => write!(
                f,
                "No bot token given (--bot-token, config file, or {})",
                BOT_TOKEN_ENV
            ),
            ConfigError::FileRead(msg) => write!(f, "Could not read config file: {}", msg),
            ConfigError::FileParse(msg) => write!(f, "Could not parse config file: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Merges CLI flags over the config file over the environment.
    pub fn resolve(cli: Cli) -> Result<Config, ConfigError> {
        let file = match &cli.config {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .map_err(|e| ConfigError::FileRead(e.to_string()))?;
                toml::from_str::<FileConfig>(&contents)
                    .map_err(|e| ConfigError::FileParse(e.to_string()))?
            }
            None => FileConfig::default(),
        };
        Config::merge(cli, file, std::env::var(BOT_TOKEN_ENV).ok())
    }

    /// Pure merge, separated from `resolve` so tests can drive it without
    /// touching the filesystem or process environment.
    pub fn merge(
        cli: Cli,
        file: FileConfig,
        env_token: Option<String>,
    ) -> Result<Config, ConfigError> {
        let city = cli.city.or(file.city).ok_or(ConfigError::MissingCity)?;

        let bot_token = cli
            .bot_token
            .or(file.bot_token)
            .or(env_token)
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingBotToken)?;

        let defaults = RainPolicy::default();
        let policy = RainPolicy {
            probability_threshold_pct: cli
                .prob_threshold
                .or(file.prob_threshold)
                .unwrap_or(defaults.probability_threshold_pct),
            amount_threshold_mm: cli
                .mm_threshold
                .or(file.mm_threshold)
                .unwrap_or(defaults.amount_threshold_mm),
            rule: cli.policy.or(file.policy).map(RainRule::from).unwrap_or(defaults.rule),
        };

        let need = cli.debounce_need.or(file.debounce_need).unwrap_or(0);
        let debounce = (need > 0).then(|| DebounceConfig {
            need,
            immediate_override_mm: Some(
                cli.heavy_rain_mm.or(file.heavy_rain_mm).unwrap_or(5.0),
            ),
        });

        let seed_spec = cli.seed_chats.or(file.seed_chats).unwrap_or_default();
        let seed_chat_ids = parse_seed_ids(&seed_spec);

        let quiet_enabled = !cli.no_quiet_hours && file.quiet_hours.unwrap_or(true);

        Ok(Config {
            city,
            policy,
            bot_token,
            seed_chat_ids,
            insecure: cli.insecure || file.insecure.unwrap_or(false),
            debounce,
            state_path: cli
                .state_file
                .or(file.state_file)
                .unwrap_or_else(store::default_state_path),
            quiet_hours: quiet_enabled.then_some(QuietHours::DEFAULT),
            log_file: cli.log_file.or(file.log_file),
            verbose: cli.verbose,
        })
    }
}

/// Parses a comma-separated chat id list. Invalid entries are logged and
/// skipped rather than failing startup.
pub fn parse_seed_ids(spec: &str) -> Vec<i64> {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                logging::warn(Source::System, None, &format!("Skipping invalid chat id: {}", s));
                None
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
