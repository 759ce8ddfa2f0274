//! Application-level configuration loading: grid limits, scoring rules, expiry and storage.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::{
    lines::DiagonalRule,
    scoring::{DEFAULT_POINTS_PER_LINE, ScoringRules},
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "MUSIC_BINGO_CONFIG_PATH";
/// Smallest grid a host may ask for.
pub const MIN_GRID_SIZE: usize = 2;

/// Persistence backend selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    Mongo,
    Couch,
}

impl StorageBackend {
    pub fn name(self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Mongo => "mongo",
            StorageBackend::Couch => "couch",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pub default_grid_size: usize,
    pub max_grid_size: usize,
    pub points_per_line: u32,
    pub diagonals: DiagonalRule,
    pub game_ttl_hours: u64,
    /// How long finished games are kept before the sweeper deletes them.
    pub finished_retention_hours: u64,
    pub expiry_sweep_secs: u64,
    /// Load-apply-write attempts per command before giving up on version conflicts.
    pub command_retries: u32,
    /// Buffered events per game subscription channel.
    pub sse_capacity: usize,
    pub storage: StorageBackend,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_grid_size: 4,
            max_grid_size: 8,
            points_per_line: DEFAULT_POINTS_PER_LINE,
            diagonals: DiagonalRule::default(),
            game_ttl_hours: 24,
            finished_retention_hours: 24,
            expiry_sweep_secs: 60,
            command_retries: 3,
            sse_capacity: 32,
            storage: StorageBackend::default(),
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        storage = ?config.storage,
                        diagonals = ?config.diagonals,
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        let mut config: Self = serde_json::from_str(contents)?;
        config.max_grid_size = config.max_grid_size.max(MIN_GRID_SIZE);
        config.default_grid_size = config
            .default_grid_size
            .clamp(MIN_GRID_SIZE, config.max_grid_size);
        config.command_retries = config.command_retries.max(1);
        config.sse_capacity = config.sse_capacity.max(1);
        Ok(config)
    }

    pub fn scoring_rules(&self) -> ScoringRules {
        ScoringRules {
            points_per_line: self.points_per_line,
            diagonals: self.diagonals,
        }
    }

    pub fn game_ttl(&self) -> Duration {
        Duration::from_secs(self.game_ttl_hours.saturating_mul(60 * 60))
    }

    pub fn finished_retention(&self) -> Duration {
        Duration::from_secs(self.finished_retention_hours.saturating_mul(60 * 60))
    }

    pub fn expiry_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_sweep_secs.max(1))
    }

    /// Whether `size` is an acceptable grid side length.
    pub fn accepts_grid_size(&self, size: usize) -> bool {
        (MIN_GRID_SIZE..=self.max_grid_size).contains(&size)
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
