use serde::{Deserialize, Serialize};
use std::ops::Range;

pub const SYMBOL_COUNT: usize = 8;
pub const REEL_COUNT: usize = 3;
pub const ROW_COUNT: usize = 3;
/// Row evaluated for wins on every reel.
pub const PAYLINE_ROW: usize = 1;

/// Symbols in their fixed table order. The order matters: `false hope` wins
/// are drawn from [`Symbol::PREMIUM_AND_MID`], the upper half of this order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Symbol {
    Cherry,
    Lemon,
    Orange,
    Grape,
    Bell,
    Diamond,
    Seven,
    Star,
}

impl Symbol {
    pub const ALL: [Symbol; SYMBOL_COUNT] = [
        Symbol::Cherry,
        Symbol::Lemon,
        Symbol::Orange,
        Symbol::Grape,
        Symbol::Bell,
        Symbol::Diamond,
        Symbol::Seven,
        Symbol::Star,
    ];

    /// Index range of the premium and mid symbols (Bell, Diamond, Seven, Star).
    pub const PREMIUM_AND_MID: Range<usize> = 4..SYMBOL_COUNT;
    pub const ANY: Range<usize> = 0..SYMBOL_COUNT;

    pub fn from_index(i: u8) -> Self {
        Self::ALL[i as usize % SYMBOL_COUNT]
    }

    pub fn to_index(self) -> u8 {
        match self {
            Symbol::Cherry => 0,
            Symbol::Lemon => 1,
            Symbol::Orange => 2,
            Symbol::Grape => 3,
            Symbol::Bell => 4,
            Symbol::Diamond => 5,
            Symbol::Seven => 6,
            Symbol::Star => 7,
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            Symbol::Cherry => "🍒",
            Symbol::Lemon => "🍋",
            Symbol::Orange => "🍊",
            Symbol::Grape => "🍇",
            Symbol::Bell => "🔔",
            Symbol::Diamond => "💎",
            Symbol::Seven => "7️⃣",
            Symbol::Star => "⭐",
        }
    }
}

/// A 3x3 window indexed `[reel][row]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ReelGrid(pub [[Symbol; ROW_COUNT]; REEL_COUNT]);

impl ReelGrid {
    /// Middle row of each reel, left to right.
    pub fn payline(&self) -> [Symbol; REEL_COUNT] {
        [
            self.0[0][PAYLINE_ROW],
            self.0[1][PAYLINE_ROW],
            self.0[2][PAYLINE_ROW],
        ]
    }

    pub fn set_payline(&mut self, line: [Symbol; REEL_COUNT]) {
        for (reel, symbol) in self.0.iter_mut().zip(line) {
            reel[PAYLINE_ROW] = symbol;
        }
    }

    /// Symbol indices, reel-major, as sent over the wire.
    pub fn to_indices(&self) -> Vec<Vec<u8>> {
        self.0
            .iter()
            .map(|reel| reel.iter().map(|s| s.to_index()).collect())
            .collect()
    }

    pub fn from_indices(indices: &[Vec<u8>]) -> Option<Self> {
        if indices.len() != REEL_COUNT || indices.iter().any(|r| r.len() != ROW_COUNT) {
            return None;
        }
        let mut reels = [[Symbol::Cherry; ROW_COUNT]; REEL_COUNT];
        for (reel, column) in reels.iter_mut().zip(indices) {
            for (cell, idx) in reel.iter_mut().zip(column) {
                if *idx as usize >= SYMBOL_COUNT {
                    return None;
                }
                *cell = Symbol::from_index(*idx);
            }
        }
        Some(Self(reels))
    }
}
