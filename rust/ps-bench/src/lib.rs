//! Shared fixtures for the criterion benches.

use ps_core::{BetSizeSchedule, SolverConfig, NUM_HANDS};

/// Uniform ranges on `Td9d6h`, two bet sizes and one raise size.
pub fn flop_config() -> SolverConfig {
    SolverConfig {
        oop_range: vec![1.0; NUM_HANDS],
        ip_range: vec![1.0; NUM_HANDS],
        board: vec![33, 29, 18],
        starting_pot: 200,
        effective_stack: 900,
        bet_sizes: BetSizeSchedule::symmetric(&[0.33, 0.75], &[2.5]),
        add_allin_threshold: 1.5,
        force_allin_threshold: 0.15,
        adjust_last_two_bet_sizes: false,
    }
}
