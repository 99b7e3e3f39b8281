//! The compute engine contract.
//!
//! An engine ships as interchangeable variants (baseline, accelerated). Each
//! variant loads into an [`EngineModule`] which, once its runtime and thread
//! pool are initialized, constructs [`GameManager`] objects. All variants
//! present the identical operation set.

use std::fmt;

use thiserror::Error;

use crate::solver_config::SolverConfig;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid board: {0}")]
    InvalidBoard(String),
    #[error("invalid range for {player}: {msg}")]
    InvalidRange { player: &'static str, msg: String },
    #[error("invalid bet size: {0}")]
    InvalidBetSize(String),
    #[error("invalid pot/stack: {0}")]
    InvalidStack(String),
    #[error("`{op}` is not allowed in state {state}")]
    OutOfOrder { op: &'static str, state: &'static str },
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("thread pool error: {0}")]
    ThreadPool(String),
}

/// The game-manager object: the full operation set of one engine instance.
///
/// Calls must be issued one at a time; implementations are not reentrant.
pub trait GameManager: Send {
    /// Bind ranges, board, sizing and the bet/raise schedule; builds the game tree.
    fn init(&mut self, config: SolverConfig) -> Result<(), EngineError>;

    /// Bytes that `allocate_memory(enable_compression)` would commit. Pure.
    fn memory_usage(&self, enable_compression: bool) -> Result<u64, EngineError>;

    fn allocate_memory(&mut self, enable_compression: bool) -> Result<(), EngineError>;

    /// One optimization step. `iteration` is caller-supplied.
    fn solve_step(&mut self, iteration: u32) -> Result<(), EngineError>;

    fn exploitability(&self) -> Result<f32, EngineError>;

    fn ev(&self) -> Result<Vec<f32>, EngineError>;

    fn finalize(&mut self) -> Result<(), EngineError>;
}

/// A loaded engine code unit.
pub trait EngineModule: Send {
    /// Prepare low-level runtime state. Must run before the pool is created.
    fn init_runtime(&mut self) -> Result<(), EngineError>;

    fn init_thread_pool(&mut self, thread_count: usize) -> Result<(), EngineError>;

    /// Construct a fresh, unconfigured game manager.
    fn new_game_manager(&self) -> Result<Box<dyn GameManager>, EngineError>;

    /// Worker threads in the pool (0 before `init_thread_pool`).
    fn thread_count(&self) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantKind {
    Baseline,
    Accelerated,
}

impl VariantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantKind::Baseline => "baseline",
            VariantKind::Accelerated => "accelerated",
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One binary-compatible engine build.
pub trait EngineVariant: Send + Sync {
    fn kind(&self) -> VariantKind;

    fn name(&self) -> &str;

    /// Load the code unit. Runtime and pool are initialized by the caller.
    fn load(&self) -> Result<Box<dyn EngineModule>, EngineError>;
}

#[derive(Debug, Error)]
#[error("capability probe failed: {0}")]
pub struct ProbeError(pub String);

/// Reports whether the host supports the accelerated variant's required feature.
pub trait CapabilityProbe: Send + Sync {
    fn accelerated_supported(&self) -> Result<bool, ProbeError>;
}

/// A probe with a predetermined answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe(pub bool);

impl CapabilityProbe for FixedProbe {
    fn accelerated_supported(&self) -> Result<bool, ProbeError> {
        Ok(self.0)
    }
}
