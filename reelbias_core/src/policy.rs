//! Manipulation policy.
//!
//! Decides, once per spin, which grid the player will see. Rules are checked in a
//! fixed priority order and the first one that matches fires alone:
//!
//! 1. **False hope**: balance below three bets, gated by its own draw. Grants a
//!    premium/mid jackpot to keep a nearly broke player at the machine.
//! 2. **Big win prevention**: two or more wins in a row, gated by its own draw.
//!    Forces a loss.
//! 3. **Near miss**: the shared draw lands just above the base win band. Shows two
//!    matching symbols on the payline.
//! 4. **Base outcome**: the same shared draw, below the base win band, is a lucky
//!    win; anything else is a house edge loss.
//!
//! The shared draw is taken first on every spin, before any override draw.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::AlgorithmConfig,
    ledger::SessionState,
    paytable::Paytable,
    reels,
    rng::Draws,
    symbols::{ReelGrid, Symbol},
};

/// Balance multiple of the bet under which false hope may trigger.
pub const FALSE_HOPE_BET_MULTIPLE: f64 = 3.0;
/// Consecutive wins after which big win prevention may trigger.
pub const PROTECTION_WIN_STREAK: u32 = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    FalseHope,
    BigWinPrevention,
    NearMiss,
    LuckyWin,
    HouseEdge,
}

impl Rule {
    pub const ALL: [Rule; 5] = [
        Rule::FalseHope,
        Rule::BigWinPrevention,
        Rule::NearMiss,
        Rule::LuckyWin,
        Rule::HouseEdge,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Rule::FalseHope => "False Hope Activated",
            Rule::BigWinPrevention => "Big Win Prevention",
            Rule::NearMiss => "Near Miss Psychology",
            Rule::LuckyWin => "Lucky Win",
            Rule::HouseEdge => "House Edge",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManipulationDecision {
    pub grid: ReelGrid,
    pub rule: Rule,
}

pub fn decide<D: Draws + ?Sized>(
    state: &SessionState,
    bet: f64,
    config: &AlgorithmConfig,
    paytable: &Paytable,
    draws: &mut D,
) -> ManipulationDecision {
    let shared = draws.percent();
    let base_win_chance = config.base_win_chance();

    let rule = if state.balance < bet * FALSE_HOPE_BET_MULTIPLE
        && draws.percent() < config.false_hope_percent
    {
        Rule::FalseHope
    } else if state.win_streak >= PROTECTION_WIN_STREAK
        && draws.percent() < config.big_loss_protection_percent
    {
        Rule::BigWinPrevention
    } else if shared > base_win_chance
        && shared <= base_win_chance + config.near_miss_rate_percent
    {
        Rule::NearMiss
    } else if shared < base_win_chance {
        Rule::LuckyWin
    } else {
        Rule::HouseEdge
    };

    let grid = match rule {
        Rule::FalseHope => reels::forced_win(draws, Symbol::PREMIUM_AND_MID),
        Rule::LuckyWin => reels::forced_win(draws, Symbol::ANY),
        Rule::NearMiss => reels::near_miss(draws),
        Rule::BigWinPrevention | Rule::HouseEdge => reels::forced_loss(draws, paytable),
    };
    debug!(rule = rule.label(), shared, base_win_chance, bet, "manipulation decided");
    ManipulationDecision { grid, rule }
}
