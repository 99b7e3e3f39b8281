use thiserror::Error;

use ps_core::{EngineError, EngineModule, EngineVariant, ProbeError};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error("failed to load engine variant `{variant}`: {source}")]
    Load { variant: String, source: EngineError },
    #[error("engine runtime initialization failed: {0}")]
    Runtime(EngineError),
    #[error("thread pool initialization failed: {0}")]
    ThreadPool(EngineError),
    #[error("failed to construct game manager: {0}")]
    Construct(EngineError),
    #[error("session {0} is already bootstrapped")]
    AlreadyBootstrapped(u64),
}

/// Two-phase engine startup.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bootstrapper;

impl Bootstrapper {
    /// Load `variant`, initialize its runtime, then a pool of `thread_count` workers.
    ///
    /// Any failure drops the partially initialized module.
    pub fn bootstrap(
        &self,
        variant: &dyn EngineVariant,
        thread_count: usize,
    ) -> Result<Box<dyn EngineModule>, BootstrapError> {
        let mut module = variant.load().map_err(|source| BootstrapError::Load {
            variant: variant.name().to_string(),
            source,
        })?;
        module.init_runtime().map_err(BootstrapError::Runtime)?;
        module
            .init_thread_pool(thread_count)
            .map_err(BootstrapError::ThreadPool)?;
        Ok(module)
    }
}
