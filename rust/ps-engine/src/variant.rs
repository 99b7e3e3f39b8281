//! The two engine variants and the module they load into.

use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};

use ps_core::{EngineError, EngineModule, EngineVariant, GameManager, VariantKind};

use crate::game::ReferenceGame;
use crate::kernel::Kernel;

/// A loaded reference engine: runtime flag + rayon pool.
pub struct ReferenceModule {
    kind: VariantKind,
    runtime_ready: bool,
    pool: Option<Arc<ThreadPool>>,
}

impl ReferenceModule {
    pub fn new(kind: VariantKind) -> Self {
        Self {
            kind,
            runtime_ready: false,
            pool: None,
        }
    }

    pub fn kind(&self) -> VariantKind {
        self.kind
    }

    fn kernel(&self) -> Kernel {
        match self.kind {
            VariantKind::Baseline => Kernel::Scalar,
            VariantKind::Accelerated => Kernel::Lanes,
        }
    }
}

impl EngineModule for ReferenceModule {
    fn init_runtime(&mut self) -> Result<(), EngineError> {
        self.runtime_ready = true;
        Ok(())
    }

    fn init_thread_pool(&mut self, thread_count: usize) -> Result<(), EngineError> {
        if !self.runtime_ready {
            return Err(EngineError::Runtime("runtime not initialized".to_string()));
        }
        if thread_count == 0 {
            return Err(EngineError::ThreadPool("thread count must be >= 1".to_string()));
        }
        if self.pool.is_some() {
            return Err(EngineError::ThreadPool("thread pool already initialized".to_string()));
        }
        let kind = self.kind;
        let pool = ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .thread_name(move |i| format!("ps-engine-{kind}-{i}"))
            .build()
            .map_err(|e| EngineError::ThreadPool(e.to_string()))?;
        self.pool = Some(Arc::new(pool));
        Ok(())
    }

    fn new_game_manager(&self) -> Result<Box<dyn GameManager>, EngineError> {
        let pool = self
            .pool
            .clone()
            .ok_or_else(|| EngineError::Runtime("thread pool not initialized".to_string()))?;
        Ok(Box::new(ReferenceGame::new(pool, self.kernel())))
    }

    fn thread_count(&self) -> usize {
        self.pool.as_ref().map_or(0, |p| p.current_num_threads())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BaselineVariant;

impl EngineVariant for BaselineVariant {
    fn kind(&self) -> VariantKind {
        VariantKind::Baseline
    }

    fn name(&self) -> &str {
        "reference-baseline"
    }

    fn load(&self) -> Result<Box<dyn EngineModule>, EngineError> {
        Ok(Box::new(ReferenceModule::new(VariantKind::Baseline)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AcceleratedVariant;

impl EngineVariant for AcceleratedVariant {
    fn kind(&self) -> VariantKind {
        VariantKind::Accelerated
    }

    fn name(&self) -> &str {
        "reference-simd"
    }

    fn load(&self) -> Result<Box<dyn EngineModule>, EngineError> {
        Ok(Box::new(ReferenceModule::new(VariantKind::Accelerated)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_requires_runtime_first() {
        let mut m = ReferenceModule::new(VariantKind::Baseline);
        assert!(matches!(m.init_thread_pool(2), Err(EngineError::Runtime(_))));
        assert!(m.new_game_manager().is_err());
        m.init_runtime().unwrap();
        assert!(matches!(m.init_thread_pool(0), Err(EngineError::ThreadPool(_))));
        m.init_thread_pool(2).unwrap();
        assert_eq!(m.thread_count(), 2);
        assert!(m.init_thread_pool(2).is_err());
        assert!(m.new_game_manager().is_ok());
    }

    #[test]
    fn variants_report_their_kind() {
        assert_eq!(BaselineVariant.kind(), VariantKind::Baseline);
        assert_eq!(AcceleratedVariant.kind(), VariantKind::Accelerated);
        let m = AcceleratedVariant.load().unwrap();
        assert_eq!(m.thread_count(), 0);
    }
}
