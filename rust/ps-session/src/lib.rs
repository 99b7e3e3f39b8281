//! ps-session: engine selection, bootstrap and the compute session.
//!
//! Leaf-first:
//! - [`BackendSelector`]: probe result -> engine variant
//! - [`Bootstrapper`]: load, runtime init, thread-pool init
//! - [`ComputeSession`]: one engine instance and its forwarded operations
//! - [`SessionRegistry`]: the single session slot
//! - [`Orchestrator`]: owns the above; nothing is published until bootstrap fully succeeds

pub mod bootstrap;
pub mod orchestrator;
pub mod registry;
pub mod scripted;
pub mod selector;
pub mod session;

pub use bootstrap::{BootstrapError, Bootstrapper};
pub use orchestrator::{BootstrapAttempt, Orchestrator};
pub use registry::SessionRegistry;
pub use selector::BackendSelector;
pub use session::{ComputeSession, SessionInfo, SessionState};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
