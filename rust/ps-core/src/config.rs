//! Worker configuration schema (YAML).
//!
//! Ranges and boards are accepted in a human form here and converted to the
//! engine's buffers by [`GameConfig::to_solver_config`]. Nothing downstream of
//! that conversion coerces or defaults a field.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::cards::parse_cards;
use crate::solver_config::{BetSizeSchedule, SolverConfig, NUM_HANDS};

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    /// The game to solve.
    pub game: GameConfig,
    #[serde(default)]
    pub solve: SolveConfig,
}

/// Which engine variant to bootstrap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantPreference {
    /// Ask the capability probe.
    #[default]
    Auto,
    Baseline,
    Accelerated,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Engine thread-pool size.
    #[serde(default = "default_worker_threads")]
    pub threads: u32,
    #[serde(default)]
    pub variant: VariantPreference,
    /// Optional NDJSON event log path.
    #[serde(default)]
    pub event_log: Option<String>,
}

fn default_worker_threads() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: default_worker_threads(),
            variant: VariantPreference::Auto,
            event_log: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Maximum requests awaiting a response.
    #[serde(default = "default_client_max_inflight")]
    pub max_inflight: usize,
    /// Bounded outbound queue capacity in frames.
    #[serde(default = "default_client_max_outbound_queue")]
    pub max_outbound_queue: usize,
}

fn default_client_max_inflight() -> usize {
    64
}

fn default_client_max_outbound_queue() -> usize {
    256
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_inflight: default_client_max_inflight(),
            max_outbound_queue: default_client_max_outbound_queue(),
        }
    }
}

/// A range: the string `uniform`, or one weight per hand index.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RangeSpec {
    Named(String),
    Weights(Vec<f32>),
}

impl RangeSpec {
    fn to_weights(&self, player: &str) -> Result<Vec<f32>, ConfigError> {
        match self {
            RangeSpec::Named(name) if name == "uniform" => Ok(vec![1.0; NUM_HANDS]),
            RangeSpec::Named(name) => Err(ConfigError::Invalid(format!(
                "{player} range: unknown named range {name:?}"
            ))),
            RangeSpec::Weights(w) => Ok(w.clone()),
        }
    }
}

/// A board: a card string such as `"Td9d6h"`, or card ids.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum BoardSpec {
    Cards(String),
    Ids(Vec<u8>),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GameConfig {
    pub oop_range: RangeSpec,
    pub ip_range: RangeSpec,
    pub board: BoardSpec,
    pub starting_pot: i32,
    pub effective_stack: i32,
    pub bet_sizes: BetSizeSchedule,
    #[serde(default = "default_add_allin_threshold")]
    pub add_allin_threshold: f64,
    #[serde(default = "default_force_allin_threshold")]
    pub force_allin_threshold: f64,
    #[serde(default)]
    pub adjust_last_two_bet_sizes: bool,
}

fn default_add_allin_threshold() -> f64 {
    1.5
}

fn default_force_allin_threshold() -> f64 {
    0.15
}

impl GameConfig {
    pub fn to_solver_config(&self) -> Result<SolverConfig, ConfigError> {
        let board = match &self.board {
            BoardSpec::Cards(s) => parse_cards(s).map_err(ConfigError::Invalid)?,
            BoardSpec::Ids(ids) => ids.clone(),
        };
        Ok(SolverConfig {
            oop_range: self.oop_range.to_weights("oop")?,
            ip_range: self.ip_range.to_weights("ip")?,
            board,
            starting_pot: self.starting_pot,
            effective_stack: self.effective_stack,
            bet_sizes: self.bet_sizes.clone(),
            add_allin_threshold: self.add_allin_threshold,
            force_allin_threshold: self.force_allin_threshold,
            adjust_last_two_bet_sizes: self.adjust_last_two_bet_sizes,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SolveConfig {
    #[serde(default = "default_solve_max_iterations")]
    pub max_iterations: u32,
    /// Stop once exploitability (percent of the starting pot) is at or below this.
    #[serde(default = "default_solve_target_exploitability")]
    pub target_exploitability: f32,
    #[serde(default)]
    pub compression: bool,
    /// Refuse to allocate when the engine reports more than this many bytes.
    #[serde(default)]
    pub max_memory_bytes: Option<u64>,
}

fn default_solve_max_iterations() -> u32 {
    1000
}

fn default_solve_target_exploitability() -> f32 {
    0.5
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_solve_max_iterations(),
            target_exploitability: default_solve_target_exploitability(),
            compression: false,
            max_memory_bytes: None,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        if config.worker.threads == 0 {
            return Err(ConfigError::Invalid("worker.threads must be >= 1".into()));
        }
        if config.client.max_inflight == 0 {
            return Err(ConfigError::Invalid("client.max_inflight must be >= 1".into()));
        }
        if config.client.max_outbound_queue == 0 {
            return Err(ConfigError::Invalid(
                "client.max_outbound_queue must be >= 1".into(),
            ));
        }
        Ok(config)
    }
}
