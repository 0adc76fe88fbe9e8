use crate::{
    paytable::{Paytable, SMALL_WIN_MULTIPLIER},
    symbols::{ReelGrid, Symbol},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WinClass {
    Jackpot,
    SmallWin,
    Loss,
}

impl WinClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            WinClass::Jackpot => "jackpot",
            WinClass::SmallWin => "small_win",
            WinClass::Loss => "loss",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SpinOutcome {
    pub won: bool,
    pub multiplier: f64,
    pub matched_symbol: Option<Symbol>,
    pub class: WinClass,
}

impl SpinOutcome {
    fn loss() -> Self {
        Self {
            won: false,
            multiplier: 0.0,
            matched_symbol: None,
            class: WinClass::Loss,
        }
    }
}

/// Scores the payline of `grid`. Only the middle row counts.
pub fn evaluate(grid: &ReelGrid, paytable: &Paytable) -> SpinOutcome {
    let [a, b, c] = grid.payline();
    if a == b && b == c {
        return SpinOutcome {
            won: true,
            multiplier: paytable.jackpot_multiplier(a),
            matched_symbol: Some(a),
            class: WinClass::Jackpot,
        };
    }
    if a == b || b == c || a == c {
        return SpinOutcome {
            won: true,
            multiplier: SMALL_WIN_MULTIPLIER,
            matched_symbol: None,
            class: WinClass::SmallWin,
        };
    }
    SpinOutcome::loss()
}
