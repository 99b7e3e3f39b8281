//! Scripted engine for exercising callers without the reference solver.
//!
//! Every call lands in a shared [`CallLog`]; individual stages can be told to fail.

use std::sync::{Arc, Mutex};

use ps_core::{
    CapabilityProbe, EngineError, EngineModule, EngineVariant, GameManager, ProbeError,
    SolverConfig, VariantKind,
};

pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Stage at which a scripted engine fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Load,
    Runtime,
    ThreadPool,
    Construct,
}

#[derive(Clone)]
pub struct ScriptedVariant {
    kind: VariantKind,
    fail_at: Option<FailAt>,
    log: CallLog,
}

impl ScriptedVariant {
    pub fn new(kind: VariantKind, log: CallLog) -> Self {
        Self {
            kind,
            fail_at: None,
            log,
        }
    }

    pub fn failing_at(mut self, stage: FailAt) -> Self {
        self.fail_at = Some(stage);
        self
    }

    fn record(log: &CallLog, entry: String) {
        log.lock().unwrap().push(entry);
    }
}

impl EngineVariant for ScriptedVariant {
    fn kind(&self) -> VariantKind {
        self.kind
    }

    fn name(&self) -> &str {
        match self.kind {
            VariantKind::Baseline => "scripted-baseline",
            VariantKind::Accelerated => "scripted-accelerated",
        }
    }

    fn load(&self) -> Result<Box<dyn EngineModule>, EngineError> {
        Self::record(&self.log, format!("load:{}", self.kind));
        if self.fail_at == Some(FailAt::Load) {
            return Err(EngineError::Runtime("scripted load failure".to_string()));
        }
        Ok(Box::new(ScriptedModule {
            fail_at: self.fail_at,
            log: Arc::clone(&self.log),
            threads: 0,
        }))
    }
}

struct ScriptedModule {
    fail_at: Option<FailAt>,
    log: CallLog,
    threads: usize,
}

impl EngineModule for ScriptedModule {
    fn init_runtime(&mut self) -> Result<(), EngineError> {
        ScriptedVariant::record(&self.log, "init_runtime".to_string());
        if self.fail_at == Some(FailAt::Runtime) {
            return Err(EngineError::Runtime("scripted runtime failure".to_string()));
        }
        Ok(())
    }

    fn init_thread_pool(&mut self, thread_count: usize) -> Result<(), EngineError> {
        ScriptedVariant::record(&self.log, format!("init_thread_pool:{thread_count}"));
        if self.fail_at == Some(FailAt::ThreadPool) || thread_count == 0 {
            return Err(EngineError::ThreadPool("scripted pool failure".to_string()));
        }
        self.threads = thread_count;
        Ok(())
    }

    fn new_game_manager(&self) -> Result<Box<dyn GameManager>, EngineError> {
        ScriptedVariant::record(&self.log, "new_game_manager".to_string());
        if self.fail_at == Some(FailAt::Construct) {
            return Err(EngineError::Runtime("scripted construct failure".to_string()));
        }
        Ok(Box::new(ScriptedGame {
            log: Arc::clone(&self.log),
            pot: 0.0,
            iterations: 0,
        }))
    }

    fn thread_count(&self) -> usize {
        self.threads
    }
}

struct ScriptedGame {
    log: CallLog,
    pot: f32,
    iterations: u32,
}

impl ScriptedGame {
    fn record(&self, entry: String) {
        ScriptedVariant::record(&self.log, entry);
    }
}

impl GameManager for ScriptedGame {
    fn init(&mut self, config: SolverConfig) -> Result<(), EngineError> {
        self.record("init".to_string());
        if config.board.len() < 3 {
            return Err(EngineError::InvalidBoard("scripted: board too short".to_string()));
        }
        self.pot = config.starting_pot as f32;
        self.iterations = 0;
        Ok(())
    }

    fn memory_usage(&self, enable_compression: bool) -> Result<u64, EngineError> {
        self.record(format!("memory_usage:{enable_compression}"));
        Ok(if enable_compression { 512 } else { 1024 })
    }

    fn allocate_memory(&mut self, enable_compression: bool) -> Result<(), EngineError> {
        self.record(format!("allocate_memory:{enable_compression}"));
        Ok(())
    }

    fn solve_step(&mut self, iteration: u32) -> Result<(), EngineError> {
        self.record(format!("solve_step:{iteration}"));
        self.iterations += 1;
        Ok(())
    }

    fn exploitability(&self) -> Result<f32, EngineError> {
        self.record("exploitability".to_string());
        Ok(100.0 / (self.iterations as f32 + 1.0))
    }

    fn ev(&self) -> Result<Vec<f32>, EngineError> {
        self.record("ev".to_string());
        Ok(vec![self.pot / 2.0, self.pot / 2.0])
    }

    fn finalize(&mut self) -> Result<(), EngineError> {
        self.record("finalize".to_string());
        Ok(())
    }
}

/// Probe that counts its calls and answers from a script.
pub struct CountingProbe {
    answer: Result<bool, String>,
    calls: Mutex<u32>,
}

impl CountingProbe {
    pub fn new(answer: Result<bool, String>) -> Self {
        Self {
            answer,
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

impl CapabilityProbe for CountingProbe {
    fn accelerated_supported(&self) -> Result<bool, ProbeError> {
        *self.calls.lock().unwrap() += 1;
        self.answer.clone().map_err(ProbeError)
    }
}
