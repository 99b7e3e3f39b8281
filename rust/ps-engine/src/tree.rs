//! Root betting decision of the configured street, as a payoff matrix.
//!
//! Rows are OOP lines (check, bets, all-in); columns are IP responses
//! (fold, call, raises, all-in). Facing a check, every IP response checks
//! back. Facing a raise, OOP calls. Entries are OOP's expected chips from
//! this street's pot, net of what OOP puts in.

use ps_core::{EngineError, SolverConfig, StreetSizes};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Line {
    Check,
    Bet(i64),
    AllIn(i64),
}

impl Line {
    fn amount(self) -> i64 {
        match self {
            Line::Check => 0,
            Line::Bet(a) | Line::AllIn(a) => a,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Response {
    Fold,
    Call,
    /// Raise by this fraction of the pot after calling.
    Raise(f32),
    AllIn,
}

#[derive(Debug, Clone)]
pub struct PayoffMatrix {
    pub lines: Vec<Line>,
    pub responses: Vec<Response>,
    /// `rows x cols`, row-major.
    pub by_row: Vec<f32>,
    /// Same entries, column-major.
    pub by_col: Vec<f32>,
}

impl PayoffMatrix {
    pub fn rows(&self) -> usize {
        self.lines.len()
    }

    pub fn cols(&self) -> usize {
        self.responses.len()
    }

    pub fn row(&self, i: usize) -> &[f32] {
        let n = self.cols();
        &self.by_row[i * n..(i + 1) * n]
    }

    pub fn col(&self, j: usize) -> &[f32] {
        let m = self.rows();
        &self.by_col[j * m..(j + 1) * m]
    }
}

/// Sizes for the street the board puts us on.
pub fn street_sizes<'a>(config: &'a SolverConfig) -> (&'a StreetSizes, &'a StreetSizes) {
    let s = &config.bet_sizes;
    match config.board.len() {
        3 => (&s.oop.flop, &s.ip.flop),
        4 => (&s.oop.turn, &s.ip.turn),
        _ => (&s.oop.river, &s.ip.river),
    }
}

pub fn check_sizes(config: &SolverConfig) -> Result<(), EngineError> {
    for (i, list) in config.size_lists().iter().enumerate() {
        if let Some(s) = list.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            return Err(EngineError::InvalidBetSize(format!("list {i}: {s}")));
        }
    }
    for (name, t) in [
        ("add_allin_threshold", config.add_allin_threshold),
        ("force_allin_threshold", config.force_allin_threshold),
    ] {
        if !t.is_finite() || t < 0.0 {
            return Err(EngineError::InvalidBetSize(format!("{name}: {t}")));
        }
    }
    if config.starting_pot <= 0 || config.effective_stack <= 0 {
        return Err(EngineError::InvalidStack(format!(
            "pot={} stack={}",
            config.starting_pot, config.effective_stack
        )));
    }
    Ok(())
}

/// Pot and stack widened so that pot plus both players' stacks cannot overflow.
fn chips(config: &SolverConfig) -> (i64, i64) {
    (config.starting_pot as i64, config.effective_stack as i64)
}

/// Bet `amount` into `pot` becomes all-in when the stack-to-pot ratio left
/// after a call is at or below `force_threshold`.
fn forced_allin(amount: i64, pot: i64, stack: i64, force_threshold: f64) -> bool {
    let behind = (stack - amount) as f64;
    let pot_after = (pot + 2 * amount) as f64;
    behind / pot_after <= force_threshold
}

fn oop_lines(config: &SolverConfig, sizes: &StreetSizes) -> Vec<Line> {
    let (pot, stack) = chips(config);
    let mut amounts: Vec<i64> = sizes
        .bet
        .iter()
        .map(|&f| ((f as f64 * pot as f64).round() as i64).clamp(1, stack))
        .collect();
    amounts.sort_unstable();
    amounts.dedup();

    // The two largest sizes collapse into one when they are within a tenth of the pot.
    if config.adjust_last_two_bet_sizes && amounts.len() >= 2 {
        let n = amounts.len();
        if (amounts[n - 1] - amounts[n - 2]) * 10 < pot {
            amounts.remove(n - 2);
        }
    }

    let mut lines = vec![Line::Check];
    let mut has_allin = false;
    for a in amounts {
        if a >= stack || forced_allin(a, pot, stack, config.force_allin_threshold) {
            if !has_allin {
                lines.push(Line::AllIn(stack));
                has_allin = true;
            }
        } else {
            lines.push(Line::Bet(a));
        }
    }
    if !has_allin && (stack as f64) <= config.add_allin_threshold * pot as f64 {
        lines.push(Line::AllIn(stack));
    }
    lines
}

fn ip_responses(config: &SolverConfig, sizes: &StreetSizes) -> Vec<Response> {
    let mut responses = vec![Response::Fold, Response::Call];
    let mut raises: Vec<f32> = sizes.raise.clone();
    raises.sort_by(|a, b| a.total_cmp(b));
    raises.dedup();
    responses.extend(raises.into_iter().map(Response::Raise));
    let (pot, stack) = chips(config);
    if !sizes.raise.is_empty() || (stack as f64) <= config.add_allin_threshold * pot as f64 {
        responses.push(Response::AllIn);
    }
    responses
}

fn payoff(pot: i64, stack: i64, equity: f64, force: f64, line: Line, response: Response) -> f64 {
    let a = line.amount();
    let showdown = |invested: i64| equity * (pot + 2 * invested) as f64 - invested as f64;
    if a == 0 {
        return showdown(0);
    }
    match response {
        Response::Fold => pot as f64,
        Response::Call => showdown(a),
        Response::Raise(r) => {
            let raise = (r as f64 * (pot + 2 * a) as f64).round() as i64;
            let mut to = a.saturating_add(raise);
            if to >= stack || forced_allin(to, pot, stack, force) {
                to = stack;
            }
            showdown(to.max(a))
        }
        Response::AllIn => showdown(stack),
    }
}

pub fn build(config: &SolverConfig, equity: f64) -> PayoffMatrix {
    let (oop, ip) = street_sizes(config);
    let lines = oop_lines(config, oop);
    let responses = ip_responses(config, ip);
    let (m, n) = (lines.len(), responses.len());
    let (pot, stack) = chips(config);

    let mut by_row = vec![0.0f32; m * n];
    let mut by_col = vec![0.0f32; m * n];
    for (i, &line) in lines.iter().enumerate() {
        for (j, &resp) in responses.iter().enumerate() {
            let v = payoff(
                pot,
                stack,
                equity,
                config.force_allin_threshold,
                line,
                resp,
            ) as f32;
            by_row[i * n + j] = v;
            by_col[j * m + i] = v;
        }
    }
    PayoffMatrix {
        lines,
        responses,
        by_row,
        by_col,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ps_core::{BetSizeSchedule, NUM_HANDS};

    fn config(bets: &[f32], raises: &[f32], pot: i32, stack: i32) -> SolverConfig {
        SolverConfig {
            oop_range: vec![1.0; NUM_HANDS],
            ip_range: vec![1.0; NUM_HANDS],
            board: vec![0, 5, 10],
            starting_pot: pot,
            effective_stack: stack,
            bet_sizes: BetSizeSchedule::symmetric(bets, raises),
            add_allin_threshold: 1.5,
            force_allin_threshold: 0.15,
            adjust_last_two_bet_sizes: false,
        }
    }

    #[test]
    fn deep_stacks_have_no_allin_line() {
        let m = build(&config(&[0.5, 1.0], &[], 100, 1000), 0.5);
        assert_eq!(m.lines, vec![Line::Check, Line::Bet(50), Line::Bet(100)]);
        assert_eq!(m.responses, vec![Response::Fold, Response::Call]);
    }

    #[test]
    fn shallow_stacks_force_and_add_allin() {
        // 90 into 100 leaves 10 behind a 280 pot: forced all-in.
        let m = build(&config(&[0.9], &[1.0], 100, 100), 0.5);
        assert_eq!(m.lines, vec![Line::Check, Line::AllIn(100)]);
        assert!(m.responses.contains(&Response::AllIn));
    }

    #[test]
    fn last_two_sizes_collapse_when_adjusting() {
        let mut c = config(&[0.7, 0.75], &[], 100, 1000);
        c.adjust_last_two_bet_sizes = true;
        let m = build(&c, 0.5);
        assert_eq!(m.lines, vec![Line::Check, Line::Bet(75)]);
    }

    #[test]
    fn layouts_agree() {
        let m = build(&config(&[0.33, 0.75], &[2.5], 200, 900), 0.6);
        for i in 0..m.rows() {
            for j in 0..m.cols() {
                assert_eq!(m.row(i)[j], m.col(j)[i]);
            }
        }
        // Check/check is a pure showdown of the starting pot.
        assert!((m.row(0)[0] - 120.0).abs() < 1e-4);
        // A bet that gets folded to wins the pot.
        assert_eq!(m.row(1)[0], 200.0);
    }

    #[test]
    fn huge_pot_and_stack_stay_finite() {
        let mut c = config(&[1.5], &[1.0e30], 1_000_000_000, 2_000_000_000);
        c.adjust_last_two_bet_sizes = true;
        let m = build(&c, 0.5);
        assert_eq!(m.lines.last(), Some(&Line::AllIn(2_000_000_000)));
        assert!(m.by_row.iter().all(|v| v.is_finite()));
        // Folding to a bet still pays exactly the pot.
        assert_eq!(m.row(1)[0], 1.0e9);
    }

    #[test]
    fn bad_sizes_rejected() {
        assert!(check_sizes(&config(&[0.5], &[], 100, 100)).is_ok());
        assert!(check_sizes(&config(&[-0.5], &[], 100, 100)).is_err());
        assert!(check_sizes(&config(&[f32::NAN], &[], 100, 100)).is_err());
        assert!(check_sizes(&config(&[0.5], &[], 0, 100)).is_err());
    }
}
