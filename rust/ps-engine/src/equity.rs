//! Range validation and range-vs-range showdown equity.
//!
//! Hand strength is a coarse rank proxy (pairs with the board, pocket pairs,
//! then high cards). Good enough to make ranges and boards matter.

use rayon::prelude::*;

use ps_core::cards::{rank, Combo, DECK_SIZE};
use ps_core::{EngineError, NUM_HANDS};

/// Validate a board buffer and return its card mask.
pub fn board_mask(board: &[u8]) -> Result<u64, EngineError> {
    if !(3..=ps_core::MAX_BOARD).contains(&board.len()) {
        return Err(EngineError::InvalidBoard(format!(
            "expected 3-5 cards, got {}",
            board.len()
        )));
    }
    let mut mask = 0u64;
    for &c in board {
        if c as usize >= DECK_SIZE {
            return Err(EngineError::InvalidBoard(format!("card id {c} out of range")));
        }
        if mask & (1u64 << c) != 0 {
            return Err(EngineError::InvalidBoard(format!("duplicate card id {c}")));
        }
        mask |= 1u64 << c;
    }
    Ok(mask)
}

pub fn check_range(
    player: &'static str,
    weights: &[f32],
    board_mask: u64,
) -> Result<(), EngineError> {
    if weights.len() != NUM_HANDS {
        return Err(EngineError::InvalidRange {
            player,
            msg: format!("expected {NUM_HANDS} weights, got {}", weights.len()),
        });
    }
    if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0 || **w > 1.0) {
        return Err(EngineError::InvalidRange {
            player,
            msg: format!("weight {w} outside [0, 1]"),
        });
    }
    let live: f32 = weights
        .iter()
        .enumerate()
        .filter(|(i, _)| Combo::from_index(*i).mask() & board_mask == 0)
        .map(|(_, w)| w)
        .sum();
    if live <= 0.0 {
        return Err(EngineError::InvalidRange {
            player,
            msg: "no weight left after removing board cards".to_string(),
        });
    }
    Ok(())
}

fn strength(combo: Combo, board: &[u8]) -> u32 {
    let (lo, hi) = {
        let (a, b) = (rank(combo.lo) as u32, rank(combo.hi) as u32);
        (a.min(b), a.max(b))
    };
    let matches = board
        .iter()
        .filter(|&&c| rank(c) as u32 == lo || rank(c) as u32 == hi)
        .count() as u32;
    let pocket = u32::from(lo == hi);
    (matches + pocket) * 169 + hi * 13 + lo
}

struct Live {
    mask: u64,
    weight: f32,
    strength: u32,
}

fn live_hands(weights: &[f32], board: &[u8], board_mask: u64) -> Vec<Live> {
    (0..NUM_HANDS)
        .filter_map(|i| {
            let combo = Combo::from_index(i);
            let weight = weights[i];
            if weight <= 0.0 || combo.mask() & board_mask != 0 {
                return None;
            }
            Some(Live {
                mask: combo.mask(),
                weight,
                strength: strength(combo, board),
            })
        })
        .collect()
}

/// OOP's share of the pot at showdown, in `[0, 1]`.
///
/// Must run inside the engine's pool (`ThreadPool::install`).
pub fn showdown_equity(
    oop: &[f32],
    ip: &[f32],
    board: &[u8],
    board_mask: u64,
) -> Result<f64, EngineError> {
    let oop_live = live_hands(oop, board, board_mask);
    let ip_live = live_hands(ip, board, board_mask);

    let (win, total) = oop_live
        .par_iter()
        .map(|h| {
            let mut win = 0.0f64;
            let mut total = 0.0f64;
            for g in &ip_live {
                if h.mask & g.mask != 0 {
                    continue;
                }
                let w = h.weight as f64 * g.weight as f64;
                total += w;
                win += match h.strength.cmp(&g.strength) {
                    std::cmp::Ordering::Greater => w,
                    std::cmp::Ordering::Equal => 0.5 * w,
                    std::cmp::Ordering::Less => 0.0,
                };
            }
            (win, total)
        })
        .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1));

    if total <= 0.0 {
        return Err(EngineError::InvalidRange {
            player: "oop/ip",
            msg: "ranges share no non-conflicting hand pairs".to_string(),
        });
    }
    Ok(win / total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_validation() {
        assert!(board_mask(&[0, 5, 10]).is_ok());
        assert!(board_mask(&[0, 5, 10, 20, 51]).is_ok());
        assert!(board_mask(&[0, 5]).is_err());
        assert!(board_mask(&[0, 5, 10, 11, 12, 13]).is_err());
        assert!(board_mask(&[0, 5, 52]).is_err());
        assert!(board_mask(&[7, 7, 10]).is_err());
    }

    #[test]
    fn symmetric_ranges_split_the_pot() {
        let board = [33u8, 29, 18];
        let mask = board_mask(&board).unwrap();
        let uniform = vec![1.0f32; NUM_HANDS];
        let e = showdown_equity(&uniform, &uniform, &board, mask).unwrap();
        assert!((e - 0.5).abs() < 1e-9, "{e}");
    }

    #[test]
    fn stronger_range_has_more_equity() {
        let board = [0u8, 9, 22]; // 2c 4d 7h
        let mask = board_mask(&board).unwrap();
        let uniform = vec![1.0f32; NUM_HANDS];
        let mut aces = vec![0.0f32; NUM_HANDS];
        for (i, w) in aces.iter_mut().enumerate() {
            let c = Combo::from_index(i);
            if rank(c.lo) == 12 && rank(c.hi) == 12 {
                *w = 1.0;
            }
        }
        let e = showdown_equity(&aces, &uniform, &board, mask).unwrap();
        assert!(e > 0.8, "{e}");
    }

    #[test]
    fn range_checks() {
        let mask = board_mask(&[0, 1, 2]).unwrap();
        assert!(check_range("oop", &vec![1.0; NUM_HANDS], mask).is_ok());
        assert!(check_range("oop", &vec![1.0; 10], mask).is_err());
        let mut bad = vec![1.0; NUM_HANDS];
        bad[3] = f32::NAN;
        assert!(check_range("oop", &bad, mask).is_err());
        // Only hands containing 2c (a board card).
        let mut blocked = vec![0.0; NUM_HANDS];
        blocked[Combo::new(0, 40).index()] = 1.0;
        assert!(check_range("ip", &blocked, mask).is_err());
    }
}
