//! ps-core: engine contract shared by the worker and its callers.
//!
//! The compute engine is an external collaborator; this crate pins down the
//! operation set every engine variant must present, the game configuration
//! passed to `init`, and the YAML configuration of the worker itself.

pub mod cards;
pub mod config;
pub mod engine;
pub mod solver_config;

pub use cards::{card_from_str, parse_cards, Card, Combo, DECK_SIZE};
pub use config::{
    BoardSpec, ClientConfig, Config, ConfigError, GameConfig, RangeSpec, SolveConfig,
    VariantPreference, WorkerConfig,
};
pub use engine::{
    CapabilityProbe, EngineError, EngineModule, EngineVariant, FixedProbe, GameManager,
    ProbeError, VariantKind,
};
pub use solver_config::{
    BetSizeSchedule, PlayerSizes, SolverConfig, StreetSizes, MAX_BOARD, NUM_HANDS,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
