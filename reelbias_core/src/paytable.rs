use crate::symbols::Symbol;
use serde::{Deserialize, Serialize};

/// Multiplier paid for any two matching payline symbols.
pub const SMALL_WIN_MULTIPLIER: f64 = 1.2;
/// Jackpot multiplier for a symbol missing from the table.
pub const FALLBACK_JACKPOT_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PaytableEntry {
    pub symbol: Symbol,
    pub payout_multiplier: f64,
}

/// Three-of-a-kind multipliers keyed by symbol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Paytable(pub Vec<PaytableEntry>);

impl Paytable {
    pub fn standard() -> Self {
        let entry = |symbol, payout_multiplier| PaytableEntry {
            symbol,
            payout_multiplier,
        };
        Self(vec![
            entry(Symbol::Diamond, 10.0),
            entry(Symbol::Seven, 8.0),
            entry(Symbol::Star, 6.0),
            entry(Symbol::Bell, 4.0),
            entry(Symbol::Grape, 3.0),
            entry(Symbol::Orange, 2.5),
            entry(Symbol::Lemon, 2.0),
            entry(Symbol::Cherry, 1.5),
        ])
    }

    pub fn jackpot_multiplier(&self, symbol: Symbol) -> f64 {
        self.0
            .iter()
            .find(|e| e.symbol == symbol)
            .map(|e| e.payout_multiplier)
            .unwrap_or(FALLBACK_JACKPOT_MULTIPLIER)
    }

    pub fn covers_all_symbols(&self) -> bool {
        Symbol::ALL
            .iter()
            .all(|s| self.0.iter().any(|e| e.symbol == *s))
    }
}

impl Default for Paytable {
    fn default() -> Self {
        Self::standard()
    }
}
