use std::ops::Range;

use tracing::warn;

use crate::{
    evaluator::evaluate,
    paytable::Paytable,
    rng::Draws,
    symbols::{ReelGrid, Symbol, PAYLINE_ROW, REEL_COUNT, ROW_COUNT},
};

/// Attempts before a forced loss gives up on rejection sampling.
pub const MAX_FORCED_LOSS_ATTEMPTS: usize = 1_000;

fn random_symbol<D: Draws + ?Sized>(draws: &mut D) -> Symbol {
    Symbol::ALL[draws.pick(Symbol::ANY)]
}

/// Draws a reel top to bottom, pinning the payline cell when `payline` is set.
fn reel_with<D: Draws + ?Sized>(draws: &mut D, payline: Option<Symbol>) -> [Symbol; ROW_COUNT] {
    let mut reel = [Symbol::Cherry; ROW_COUNT];
    for (row, cell) in reel.iter_mut().enumerate() {
        *cell = match payline {
            Some(symbol) if row == PAYLINE_ROW => symbol,
            _ => random_symbol(draws),
        };
    }
    reel
}

/// Every cell drawn independently and uniformly.
pub fn unconstrained<D: Draws + ?Sized>(draws: &mut D) -> ReelGrid {
    let mut reels = [[Symbol::Cherry; ROW_COUNT]; REEL_COUNT];
    for reel in reels.iter_mut() {
        *reel = reel_with(draws, None);
    }
    ReelGrid(reels)
}

/// Grid for an animation tick. Never feeds a decision.
pub fn shuffle_frame<D: Draws + ?Sized>(draws: &mut D) -> ReelGrid {
    unconstrained(draws)
}

/// Reels 0 and 1 share a target symbol on the payline; reel 2 is left to chance,
/// so this can land on a real three-of-a-kind.
pub fn near_miss<D: Draws + ?Sized>(draws: &mut D) -> ReelGrid {
    let target = random_symbol(draws);
    ReelGrid([
        reel_with(draws, Some(target)),
        reel_with(draws, Some(target)),
        reel_with(draws, None),
    ])
}

/// Three-of-a-kind on the payline using a symbol from `range` of the table order.
pub fn forced_win<D: Draws + ?Sized>(draws: &mut D, range: Range<usize>) -> ReelGrid {
    let target = Symbol::ALL[draws.pick(range)];
    ReelGrid([
        reel_with(draws, Some(target)),
        reel_with(draws, Some(target)),
        reel_with(draws, Some(target)),
    ])
}

/// Rejection-samples a losing grid. After [`MAX_FORCED_LOSS_ATTEMPTS`] the last
/// candidate's payline is rewritten to three distinct symbols.
pub fn forced_loss<D: Draws + ?Sized>(draws: &mut D, paytable: &Paytable) -> ReelGrid {
    let mut grid = unconstrained(draws);
    for _ in 1..MAX_FORCED_LOSS_ATTEMPTS {
        if !evaluate(&grid, paytable).won {
            return grid;
        }
        grid = unconstrained(draws);
    }
    if evaluate(&grid, paytable).won {
        warn!(
            attempts = MAX_FORCED_LOSS_ATTEMPTS,
            "forced loss hit the retry limit, breaking the payline by hand"
        );
        break_payline(&mut grid);
    }
    grid
}

fn break_payline(grid: &mut ReelGrid) {
    let first = grid.payline()[0].to_index();
    grid.set_payline([
        Symbol::from_index(first),
        Symbol::from_index(first + 1),
        Symbol::from_index(first + 2),
    ]);
}
