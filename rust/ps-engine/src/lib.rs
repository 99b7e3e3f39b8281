//! ps-engine: the bundled reference compute engine.
//!
//! Two binary-compatible variants share one implementation and differ only in
//! the dot-product kernel used by the solve step:
//! - `baseline`: scalar loop
//! - `accelerated`: lane-chunked loop the compiler maps onto SIMD registers
//!
//! The game manager solves the root betting decision of the configured street
//! with regret matching+ on a rayon thread pool.

pub mod equity;
pub mod game;
pub mod kernel;
pub mod probe;
pub mod storage;
pub mod tree;
pub mod variant;

pub use game::ReferenceGame;
pub use kernel::Kernel;
pub use probe::HostProbe;
pub use variant::{AcceleratedVariant, BaselineVariant, ReferenceModule};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
