//! `ComputeSession`: the externally callable surface over one engine instance.
//!
//! Every operation is a direct forward. The tracked state is informational:
//! it records the last successful transition and is never used to reject a call.

use ps_core::{EngineError, EngineModule, EngineVariant, GameManager, SolverConfig, VariantKind};

use crate::bootstrap::BootstrapError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Configured,
    Allocated,
    Solving,
    Finalized,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Configured => "configured",
            SessionState::Allocated => "allocated",
            SessionState::Solving => "solving",
            SessionState::Finalized => "finalized",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub session_id: u64,
    pub variant: VariantKind,
    pub variant_name: String,
    pub thread_count: u32,
    pub state: SessionState,
}

pub struct ComputeSession {
    id: u64,
    variant: VariantKind,
    variant_name: String,
    game: Box<dyn GameManager>,
    // Owns the runtime and pool; dropped after `game`.
    module: Box<dyn EngineModule>,
    state: SessionState,
}

impl ComputeSession {
    /// Construct the engine object on a bootstrapped module.
    pub fn new(
        id: u64,
        variant: &dyn EngineVariant,
        module: Box<dyn EngineModule>,
    ) -> Result<Self, BootstrapError> {
        let game = module
            .new_game_manager()
            .map_err(BootstrapError::Construct)?;
        Ok(Self {
            id,
            variant: variant.kind(),
            variant_name: variant.name().to_string(),
            game,
            module,
            state: SessionState::Uninitialized,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id,
            variant: self.variant,
            variant_name: self.variant_name.clone(),
            thread_count: self.module.thread_count() as u32,
            state: self.state,
        }
    }

    fn advance(&mut self, to: SessionState) {
        self.state = to;
    }

    pub fn init(&mut self, config: SolverConfig) -> Result<(), EngineError> {
        self.game.init(config)?;
        self.advance(SessionState::Configured);
        Ok(())
    }

    pub fn memory_usage(&self, enable_compression: bool) -> Result<u64, EngineError> {
        self.game.memory_usage(enable_compression)
    }

    pub fn allocate_memory(&mut self, enable_compression: bool) -> Result<(), EngineError> {
        self.game.allocate_memory(enable_compression)?;
        self.advance(SessionState::Allocated);
        Ok(())
    }

    pub fn iterate(&mut self, iteration: u32) -> Result<(), EngineError> {
        self.game.solve_step(iteration)?;
        self.advance(SessionState::Solving);
        Ok(())
    }

    pub fn exploitability(&self) -> Result<f32, EngineError> {
        self.game.exploitability()
    }

    pub fn ev(&self) -> Result<Vec<f32>, EngineError> {
        self.game.ev()
    }

    pub fn finalize(&mut self) -> Result<(), EngineError> {
        self.game.finalize()?;
        self.advance(SessionState::Finalized);
        Ok(())
    }
}
