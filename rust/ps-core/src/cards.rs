//! Card encoding used by board buffers and the hand-index space.
//!
//! `card = 4 * rank + suit`, rank 0 (deuce) to 12 (ace), suit 0-3 (c, d, h, s).

/// A card id in `0..52`.
pub type Card = u8;

pub const DECK_SIZE: usize = 52;

#[inline]
pub fn rank(card: Card) -> u8 {
    card / 4
}

#[inline]
pub fn suit(card: Card) -> u8 {
    card % 4
}

/// Two hole cards in canonical order (`lo < hi`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Combo {
    pub lo: Card,
    pub hi: Card,
}

impl Combo {
    pub fn new(a: Card, b: Card) -> Self {
        if a < b {
            Combo { lo: a, hi: b }
        } else {
            Combo { lo: b, hi: a }
        }
    }

    /// Inverse of [`Combo::index`]: `index = hi * (hi - 1) / 2 + lo`.
    pub fn from_index(index: usize) -> Self {
        let mut hi: usize = 1;
        while (hi + 1) * hi / 2 <= index {
            hi += 1;
        }
        let lo = index - hi * (hi - 1) / 2;
        Combo {
            lo: lo as u8,
            hi: hi as u8,
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        (self.hi as usize * (self.hi as usize - 1) / 2) + self.lo as usize
    }

    #[inline]
    pub fn mask(&self) -> u64 {
        (1u64 << self.lo) | (1u64 << self.hi)
    }
}

/// Parse one card such as `"Td"`.
pub fn card_from_str(s: &str) -> Result<Card, String> {
    let mut chars = s.chars();
    let (Some(r), Some(u), None) = (chars.next(), chars.next(), chars.next()) else {
        return Err(format!("invalid card: {s:?}"));
    };
    let rank = match r {
        '2'..='9' => r as u8 - b'2',
        'T' | 't' => 8,
        'J' | 'j' => 9,
        'Q' | 'q' => 10,
        'K' | 'k' => 11,
        'A' | 'a' => 12,
        _ => return Err(format!("invalid rank: {r}")),
    };
    let suit = match u {
        'c' | 'C' => 0,
        'd' | 'D' => 1,
        'h' | 'H' => 2,
        's' | 'S' => 3,
        _ => return Err(format!("invalid suit: {u}")),
    };
    Ok(rank * 4 + suit)
}

/// Parse a run of cards like `"Td9d6h"` (whitespace ignored).
pub fn parse_cards(s: &str) -> Result<Vec<Card>, String> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.len() % 2 != 0 || !compact.is_ascii() {
        return Err(format!("invalid card string: {s:?}"));
    }
    let mut cards = Vec::with_capacity(compact.len() / 2);
    for i in (0..compact.len()).step_by(2) {
        let c = card_from_str(&compact[i..i + 2])?;
        if cards.contains(&c) {
            return Err(format!("duplicate card: {}", &compact[i..i + 2]));
        }
        cards.push(c);
    }
    Ok(cards)
}
