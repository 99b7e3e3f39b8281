use std::sync::Arc;

use ps_core::{CapabilityProbe, EngineVariant, ProbeError};

/// Strategy table: capability flag -> engine variant.
#[derive(Clone)]
pub struct BackendSelector {
    baseline: Arc<dyn EngineVariant>,
    accelerated: Arc<dyn EngineVariant>,
}

impl BackendSelector {
    pub fn new(baseline: Arc<dyn EngineVariant>, accelerated: Arc<dyn EngineVariant>) -> Self {
        Self {
            baseline,
            accelerated,
        }
    }

    pub fn variant(&self, accelerated: bool) -> Arc<dyn EngineVariant> {
        if accelerated {
            Arc::clone(&self.accelerated)
        } else {
            Arc::clone(&self.baseline)
        }
    }

    /// Query the probe once and pick the matching variant.
    ///
    /// Returns the variant and the probe's answer. Loading is not attempted here.
    pub fn select(
        &self,
        probe: &dyn CapabilityProbe,
    ) -> Result<(Arc<dyn EngineVariant>, bool), ProbeError> {
        let accelerated = probe.accelerated_supported()?;
        Ok((self.variant(accelerated), accelerated))
    }
}
