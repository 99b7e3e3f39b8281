//! Lifecycle owner for the worker's single session.
//!
//! Bootstrap runs probe -> select -> load -> runtime -> pool -> construct and
//! publishes the session only when every step succeeded. A failed attempt
//! leaves the registry empty so the caller may retry.

use std::sync::Arc;

use ps_core::{CapabilityProbe, VariantPreference};

use crate::bootstrap::{BootstrapError, Bootstrapper};
use crate::registry::SessionRegistry;
use crate::selector::BackendSelector;
use crate::session::{ComputeSession, SessionInfo};

/// What the last bootstrap call got as far as deciding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapAttempt {
    /// Probe answer, `None` when the probe was skipped or failed.
    pub accelerated: Option<bool>,
    /// Name of the chosen variant, `None` when selection never happened.
    pub variant: Option<String>,
}

pub struct Orchestrator {
    selector: BackendSelector,
    probe: Arc<dyn CapabilityProbe>,
    preference: VariantPreference,
    bootstrapper: Bootstrapper,
    registry: SessionRegistry,
    next_session_id: u64,
    last_attempt: BootstrapAttempt,
}

impl Orchestrator {
    pub fn new(selector: BackendSelector, probe: Arc<dyn CapabilityProbe>) -> Self {
        Self {
            selector,
            probe,
            preference: VariantPreference::Auto,
            bootstrapper: Bootstrapper,
            registry: SessionRegistry::new(),
            next_session_id: 1,
            last_attempt: BootstrapAttempt::default(),
        }
    }

    /// Override probe-driven selection.
    pub fn with_preference(mut self, preference: VariantPreference) -> Self {
        self.preference = preference;
        self
    }

    pub fn last_attempt(&self) -> &BootstrapAttempt {
        &self.last_attempt
    }

    pub fn is_bootstrapped(&self) -> bool {
        !self.registry.is_empty()
    }

    pub fn session(&self) -> Option<&ComputeSession> {
        self.registry.get()
    }

    pub fn session_mut(&mut self) -> Option<&mut ComputeSession> {
        self.registry.get_mut()
    }

    pub fn bootstrap(&mut self, thread_count: u32) -> Result<SessionInfo, BootstrapError> {
        self.last_attempt = BootstrapAttempt::default();
        if let Some(existing) = self.registry.get() {
            return Err(BootstrapError::AlreadyBootstrapped(existing.id()));
        }

        let variant = match self.preference {
            VariantPreference::Auto => {
                let (variant, accelerated) = self.selector.select(self.probe.as_ref())?;
                self.last_attempt.accelerated = Some(accelerated);
                variant
            }
            VariantPreference::Baseline => self.selector.variant(false),
            VariantPreference::Accelerated => self.selector.variant(true),
        };
        self.last_attempt.variant = Some(variant.name().to_string());

        let module = self
            .bootstrapper
            .bootstrap(variant.as_ref(), thread_count as usize)?;
        let session = ComputeSession::new(self.next_session_id, variant.as_ref(), module)?;
        self.next_session_id += 1;
        let published = self.registry.publish(session)?;
        Ok(published.info())
    }
}
