//! Game configuration bound to an engine by `init`.
//!
//! The worker layer forwards this value untouched; every field is validated
//! (or not) by the engine that receives it.

use serde::{Deserialize, Serialize};

/// Size of the hole-card hand-index space: C(52, 2).
pub const NUM_HANDS: usize = 1326;

/// Flop, turn and river.
pub const MAX_BOARD: usize = 5;

/// Bet and raise sizes for one street, as fractions of the pot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreetSizes {
    #[serde(default)]
    pub bet: Vec<f32>,
    #[serde(default)]
    pub raise: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerSizes {
    #[serde(default)]
    pub flop: StreetSizes,
    #[serde(default)]
    pub turn: StreetSizes,
    #[serde(default)]
    pub river: StreetSizes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BetSizeSchedule {
    pub oop: PlayerSizes,
    pub ip: PlayerSizes,
}

impl BetSizeSchedule {
    /// The same sizes for both players on every street.
    pub fn symmetric(bet: &[f32], raise: &[f32]) -> Self {
        let street = StreetSizes {
            bet: bet.to_vec(),
            raise: raise.to_vec(),
        };
        let player = PlayerSizes {
            flop: street.clone(),
            turn: street.clone(),
            river: street,
        };
        Self {
            oop: player.clone(),
            ip: player,
        }
    }

    /// All twelve lists in engine argument order:
    /// OOP flop/turn/river (bet, raise), then IP flop/turn/river (bet, raise).
    pub fn lists(&self) -> [&[f32]; 12] {
        let (o, i) = (&self.oop, &self.ip);
        [
            &o.flop.bet,
            &o.flop.raise,
            &o.turn.bet,
            &o.turn.raise,
            &o.river.bet,
            &o.river.raise,
            &i.flop.bet,
            &i.flop.raise,
            &i.turn.bet,
            &i.turn.raise,
            &i.river.bet,
            &i.river.raise,
        ]
    }

    /// Inverse of [`BetSizeSchedule::lists`].
    pub fn from_lists(mut lists: [Vec<f32>; 12]) -> Self {
        let mut take = |i: usize| std::mem::take(&mut lists[i]);
        let mut player = |base: usize| PlayerSizes {
            flop: StreetSizes {
                bet: take(base),
                raise: take(base + 1),
            },
            turn: StreetSizes {
                bet: take(base + 2),
                raise: take(base + 3),
            },
            river: StreetSizes {
                bet: take(base + 4),
                raise: take(base + 5),
            },
        };
        let oop = player(0);
        let ip = player(6);
        Self { oop, ip }
    }
}

/// Everything needed to define one game instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Weights over the [`NUM_HANDS`] hand indices.
    pub oop_range: Vec<f32>,
    pub ip_range: Vec<f32>,
    /// Card ids (see [`crate::cards`]).
    pub board: Vec<u8>,
    pub starting_pot: i32,
    pub effective_stack: i32,
    pub bet_sizes: BetSizeSchedule,
    pub add_allin_threshold: f64,
    pub force_allin_threshold: f64,
    pub adjust_last_two_bet_sizes: bool,
}

impl SolverConfig {
    pub fn size_lists(&self) -> [&[f32]; 12] {
        self.bet_sizes.lists()
    }
}
