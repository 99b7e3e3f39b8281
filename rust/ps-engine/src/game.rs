//! `ReferenceGame`: the reference engine's game manager.

use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPool;

use ps_core::{EngineError, GameManager, SolverConfig};

use crate::equity::{board_mask, check_range, showdown_equity};
use crate::kernel::Kernel;
use crate::storage::Storage;
use crate::tree::{self, PayoffMatrix};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Configured,
    Allocated,
    Finalized,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::Uninitialized => "uninitialized",
            Phase::Configured => "configured",
            Phase::Allocated => "allocated",
            Phase::Finalized => "finalized",
        }
    }
}

struct Prepared {
    config: SolverConfig,
    matrix: PayoffMatrix,
}

struct Buffers {
    regret_oop: Storage,
    regret_ip: Storage,
    sum_oop: Storage,
    sum_ip: Storage,
}

pub struct ReferenceGame {
    pool: Arc<ThreadPool>,
    kernel: Kernel,
    phase: Phase,
    prepared: Option<Prepared>,
    buffers: Option<Buffers>,
    /// Frozen average strategies once finalized.
    final_strategy: Option<(Vec<f32>, Vec<f32>)>,
}

impl ReferenceGame {
    pub fn new(pool: Arc<ThreadPool>, kernel: Kernel) -> Self {
        Self {
            pool,
            kernel,
            phase: Phase::Uninitialized,
            prepared: None,
            buffers: None,
            final_strategy: None,
        }
    }

    fn out_of_order(&self, op: &'static str) -> EngineError {
        EngineError::OutOfOrder {
            op,
            state: self.phase.as_str(),
        }
    }

    fn prepared(&self, op: &'static str) -> Result<&Prepared, EngineError> {
        self.prepared.as_ref().ok_or_else(|| self.out_of_order(op))
    }

    /// Current average strategies (uniform where nothing has accumulated).
    fn average_strategy(&self, op: &'static str) -> Result<(Vec<f32>, Vec<f32>), EngineError> {
        if let Some(s) = &self.final_strategy {
            return Ok(s.clone());
        }
        let b = self.buffers.as_ref().ok_or_else(|| self.out_of_order(op))?;
        Ok((normalize(&b.sum_oop.load()), normalize(&b.sum_ip.load())))
    }

    /// `(A y, A^T x)` computed on the pool.
    fn utilities(&self, m: &PayoffMatrix, x: &[f32], y: &[f32]) -> (Vec<f32>, Vec<f32>) {
        let kernel = self.kernel;
        self.pool.install(|| {
            let u_row: Vec<f32> = (0..m.rows())
                .into_par_iter()
                .map(|i| kernel.dot(m.row(i), y))
                .collect();
            let u_col: Vec<f32> = (0..m.cols())
                .into_par_iter()
                .map(|j| kernel.dot(m.col(j), x))
                .collect();
            (u_row, u_col)
        })
    }
}

/// Regret matching: positive part, normalized; uniform when nothing is positive.
fn normalize(v: &[f32]) -> Vec<f32> {
    let sum: f32 = v.iter().map(|x| x.max(0.0)).sum();
    if sum > 0.0 {
        v.iter().map(|x| x.max(0.0) / sum).collect()
    } else {
        vec![1.0 / v.len() as f32; v.len()]
    }
}

impl GameManager for ReferenceGame {
    fn init(&mut self, config: SolverConfig) -> Result<(), EngineError> {
        let mask = board_mask(&config.board)?;
        check_range("oop", &config.oop_range, mask)?;
        check_range("ip", &config.ip_range, mask)?;
        tree::check_sizes(&config)?;

        let equity = self.pool.install(|| {
            showdown_equity(&config.oop_range, &config.ip_range, &config.board, mask)
        })?;
        let matrix = tree::build(&config, equity);

        // Re-init replaces the game and drops any solving state.
        self.prepared = Some(Prepared { config, matrix });
        self.buffers = None;
        self.final_strategy = None;
        self.phase = Phase::Configured;
        Ok(())
    }

    fn memory_usage(&self, enable_compression: bool) -> Result<u64, EngineError> {
        let p = self.prepared("memory_usage")?;
        let (m, n) = (p.matrix.rows() as u64, p.matrix.cols() as u64);
        let f32_bytes = std::mem::size_of::<f32>() as u64;
        let matrix = 2 * m * n * f32_bytes;
        let ranges = (p.config.oop_range.len() + p.config.ip_range.len()) as u64 * f32_bytes;
        let solver = 2 * (m + n) * Storage::bytes_per_entry(enable_compression);
        Ok(matrix + ranges + solver)
    }

    fn allocate_memory(&mut self, enable_compression: bool) -> Result<(), EngineError> {
        if self.phase != Phase::Configured {
            return Err(self.out_of_order("allocate_memory"));
        }
        let p = self.prepared("allocate_memory")?;
        let (m, n) = (p.matrix.rows(), p.matrix.cols());
        self.buffers = Some(Buffers {
            regret_oop: Storage::zeros(m, enable_compression),
            regret_ip: Storage::zeros(n, enable_compression),
            sum_oop: Storage::zeros(m, enable_compression),
            sum_ip: Storage::zeros(n, enable_compression),
        });
        self.phase = Phase::Allocated;
        Ok(())
    }

    fn solve_step(&mut self, iteration: u32) -> Result<(), EngineError> {
        if self.phase != Phase::Allocated {
            return Err(self.out_of_order("solve_step"));
        }
        let (Some(p), Some(b)) = (self.prepared.as_ref(), self.buffers.as_ref()) else {
            return Err(self.out_of_order("solve_step"));
        };

        let mut r_oop = b.regret_oop.load();
        let mut r_ip = b.regret_ip.load();
        let x = normalize(&r_oop);
        let y = normalize(&r_ip);
        let (u_row, u_col) = self.utilities(&p.matrix, &x, &y);
        let v = self.kernel.dot(&x, &u_row);

        // OOP maximizes, IP minimizes.
        for (r, u) in r_oop.iter_mut().zip(&u_row) {
            *r = (*r + u - v).max(0.0);
        }
        for (r, u) in r_ip.iter_mut().zip(&u_col) {
            *r = (*r + v - u).max(0.0);
        }

        // Linear averaging keyed on the caller's iteration index.
        let w = iteration as f32 + 1.0;
        let mut s_oop = b.sum_oop.load();
        let mut s_ip = b.sum_ip.load();
        for (s, p) in s_oop.iter_mut().zip(&x) {
            *s += w * p;
        }
        for (s, p) in s_ip.iter_mut().zip(&y) {
            *s += w * p;
        }

        if let Some(b) = self.buffers.as_mut() {
            b.regret_oop.store(&r_oop);
            b.regret_ip.store(&r_ip);
            b.sum_oop.store(&s_oop);
            b.sum_ip.store(&s_ip);
        }
        Ok(())
    }

    /// Half the best-response gap of the average strategy, in percent of the starting pot.
    fn exploitability(&self) -> Result<f32, EngineError> {
        let p = self.prepared("exploitability")?;
        let (x, y) = self.average_strategy("exploitability")?;
        let (u_row, u_col) = self.utilities(&p.matrix, &x, &y);
        let best_oop = u_row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let best_ip = u_col.iter().copied().fold(f32::INFINITY, f32::min);
        let gap = (best_oop - best_ip).max(0.0);
        Ok(gap / 2.0 / p.config.starting_pot as f32 * 100.0)
    }

    /// `[oop_ev, ip_ev]` in chips; the two sum to the starting pot.
    fn ev(&self) -> Result<Vec<f32>, EngineError> {
        let p = self.prepared("ev")?;
        let (x, y) = self.average_strategy("ev")?;
        let (u_row, _) = self.utilities(&p.matrix, &x, &y);
        let v = self.kernel.dot(&x, &u_row);
        Ok(vec![v, p.config.starting_pot as f32 - v])
    }

    fn finalize(&mut self) -> Result<(), EngineError> {
        if self.phase != Phase::Allocated {
            return Err(self.out_of_order("finalize"));
        }
        let strategy = self.average_strategy("finalize")?;
        self.final_strategy = Some(strategy);
        self.buffers = None;
        self.phase = Phase::Finalized;
        Ok(())
    }
}
