use crate::bootstrap::BootstrapError;
use crate::session::ComputeSession;

/// At most one session, published once and never replaced.
#[derive(Default)]
pub struct SessionRegistry {
    slot: Option<ComputeSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    pub fn get(&self) -> Option<&ComputeSession> {
        self.slot.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut ComputeSession> {
        self.slot.as_mut()
    }

    /// Fill the slot. An occupied slot is left untouched.
    pub fn publish(
        &mut self,
        session: ComputeSession,
    ) -> Result<&mut ComputeSession, BootstrapError> {
        if let Some(existing) = &self.slot {
            return Err(BootstrapError::AlreadyBootstrapped(existing.id()));
        }
        Ok(self.slot.insert(session))
    }
}
