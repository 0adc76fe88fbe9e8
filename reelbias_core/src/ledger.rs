use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{
    evaluator::{evaluate, SpinOutcome},
    paytable::Paytable,
    policy::{ManipulationDecision, Rule},
};

pub const INITIAL_BALANCE: f64 = 100_000.0;
pub const DEFAULT_BET: f64 = 1_000.0;
pub const MIN_BET: f64 = 1_000.0;
pub const BET_STEP: f64 = 1_000.0;
/// Number of resolved spins kept in the history log.
pub const HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SpinResult {
    Win,
    Loss,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    /// 1-based spin number within the session.
    pub spin: u64,
    pub bet: f64,
    pub result: SpinResult,
    /// Payout on a win, the lost stake on a loss.
    pub amount: f64,
    pub balance: f64,
    pub rule: Rule,
}

impl HistoryEntry {
    /// Signed change to the balance caused by this spin.
    pub fn net(&self) -> f64 {
        match self.result {
            SpinResult::Win => self.amount - self.bet,
            SpinResult::Loss => -self.amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    pub balance: f64,
    pub current_bet: f64,
    pub total_spins: u64,
    pub total_wins: u64,
    pub total_losses: u64,
    pub win_streak: u32,
    pub loss_streak: u32,
    pub near_miss_count: u64,
    pub history: VecDeque<HistoryEntry>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            balance: INITIAL_BALANCE,
            current_bet: DEFAULT_BET,
            total_spins: 0,
            total_wins: 0,
            total_losses: 0,
            win_streak: 0,
            loss_streak: 0,
            near_miss_count: 0,
            history: VecDeque::with_capacity(HISTORY_LIMIT),
        }
    }
}

impl SessionState {
    /// Percent of spins won, 0 before the first spin.
    pub fn win_rate(&self) -> f64 {
        if self.total_spins == 0 {
            return 0.0;
        }
        self.total_wins as f64 / self.total_spins as f64 * 100.0
    }

    pub fn profit_loss(&self) -> f64 {
        self.balance - INITIAL_BALANCE
    }

    pub fn can_cover(&self, bet: f64) -> bool {
        self.balance >= bet
    }
}

/// Owner of the session state. All mutation of [`SessionState`] goes through here.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    state: SessionState,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Scores the decision's grid and books the spin.
    pub fn resolve_spin(
        &mut self,
        bet: f64,
        decision: &ManipulationDecision,
        paytable: &Paytable,
    ) -> (SpinOutcome, HistoryEntry) {
        let outcome = evaluate(&decision.grid, paytable);
        let state = &mut self.state;
        let payout = if outcome.won { bet * outcome.multiplier } else { 0.0 };
        state.balance = state.balance - bet + payout;
        state.total_spins += 1;
        if outcome.won {
            state.total_wins += 1;
            state.win_streak += 1;
            state.loss_streak = 0;
        } else {
            state.total_losses += 1;
            state.loss_streak += 1;
            state.win_streak = 0;
        }
        if decision.rule == Rule::NearMiss {
            state.near_miss_count += 1;
        }

        let entry = HistoryEntry {
            spin: state.total_spins,
            bet,
            result: if outcome.won { SpinResult::Win } else { SpinResult::Loss },
            amount: if outcome.won { payout } else { bet },
            balance: state.balance,
            rule: decision.rule,
        };
        state.history.push_back(entry);
        while state.history.len() > HISTORY_LIMIT {
            state.history.pop_front();
        }
        (outcome, entry)
    }

    /// Restores the opening balance and clears counters and history. The bet is kept.
    pub fn reset(&mut self) {
        let current_bet = self.state.current_bet;
        self.state = SessionState {
            current_bet,
            ..SessionState::default()
        };
    }

    pub fn increase_bet(&mut self) -> f64 {
        self.set_bet(self.state.current_bet + BET_STEP)
    }

    pub fn decrease_bet(&mut self) -> f64 {
        self.set_bet(self.state.current_bet - BET_STEP)
    }

    /// Clamps `amount` into `[MIN_BET, balance]`; the minimum wins when the balance
    /// is below it. Returns the bet actually set.
    pub fn set_bet(&mut self, amount: f64) -> f64 {
        let amount = if amount.is_finite() { amount } else { MIN_BET };
        self.state.current_bet = amount.min(self.state.balance).max(MIN_BET);
        self.state.current_bet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{ReelGrid, Symbol};
    use proptest::prelude::*;

    fn decision(line: [Symbol; 3], rule: Rule) -> ManipulationDecision {
        let mut grid = ReelGrid([[Symbol::Cherry, Symbol::Lemon, Symbol::Orange]; 3]);
        grid.set_payline(line);
        ManipulationDecision { grid, rule }
    }

    fn jackpot() -> ManipulationDecision {
        decision([Symbol::Diamond; 3], Rule::LuckyWin)
    }

    fn loss() -> ManipulationDecision {
        decision([Symbol::Bell, Symbol::Star, Symbol::Seven], Rule::HouseEdge)
    }

    #[test]
    fn win_pays_multiplier_net_of_stake() {
        let mut ledger = Ledger::new();
        let (out, entry) = ledger.resolve_spin(1_000.0, &jackpot(), &Paytable::standard());
        assert!(out.won);
        assert_eq!(ledger.state().balance, 109_000.0);
        assert_eq!(entry.amount, 10_000.0);
        assert_eq!(entry.net(), 9_000.0);
        assert_eq!(entry.result, SpinResult::Win);
        assert_eq!(ledger.state().win_streak, 1);
    }

    #[test]
    fn loss_records_stake() {
        let mut ledger = Ledger::new();
        let (_, entry) = ledger.resolve_spin(1_000.0, &loss(), &Paytable::standard());
        assert_eq!(ledger.state().balance, 99_000.0);
        assert_eq!(entry.amount, 1_000.0);
        assert_eq!(entry.net(), -1_000.0);
        assert_eq!(entry.balance, 99_000.0);
        assert_eq!(entry.rule, Rule::HouseEdge);
    }

    #[test]
    fn streaks_reset_each_other() {
        let mut ledger = Ledger::new();
        let table = Paytable::standard();
        ledger.resolve_spin(1_000.0, &jackpot(), &table);
        ledger.resolve_spin(1_000.0, &jackpot(), &table);
        assert_eq!((ledger.state().win_streak, ledger.state().loss_streak), (2, 0));
        ledger.resolve_spin(1_000.0, &loss(), &table);
        assert_eq!((ledger.state().win_streak, ledger.state().loss_streak), (0, 1));
        ledger.resolve_spin(1_000.0, &jackpot(), &table);
        assert_eq!((ledger.state().win_streak, ledger.state().loss_streak), (1, 0));
    }

    #[test]
    fn near_miss_rule_bumps_counter() {
        let mut ledger = Ledger::new();
        let table = Paytable::standard();
        // a near miss that scores as a small win still counts
        ledger.resolve_spin(
            1_000.0,
            &decision([Symbol::Bell, Symbol::Bell, Symbol::Star], Rule::NearMiss),
            &table,
        );
        ledger.resolve_spin(1_000.0, &loss(), &table);
        assert_eq!(ledger.state().near_miss_count, 1);
        assert_eq!(ledger.state().total_wins, 1);
    }

    #[test]
    fn history_keeps_last_ten() {
        let mut ledger = Ledger::new();
        let table = Paytable::standard();
        for _ in 0..25 {
            ledger.resolve_spin(1_000.0, &loss(), &table);
        }
        let spins: Vec<u64> = ledger.state().history.iter().map(|e| e.spin).collect();
        assert_eq!(spins, (16..=25).collect::<Vec<_>>());
    }

    #[test]
    fn reset_restores_opening_state() {
        let mut ledger = Ledger::new();
        let table = Paytable::standard();
        ledger.set_bet(5_000.0);
        for _ in 0..4 {
            ledger.resolve_spin(5_000.0, &loss(), &table);
        }
        let near_miss = decision([Symbol::Bell, Symbol::Bell, Symbol::Star], Rule::NearMiss);
        ledger.resolve_spin(5_000.0, &near_miss, &table);
        ledger.reset();
        let state = ledger.state();
        assert_eq!(state.balance, INITIAL_BALANCE);
        assert_eq!(state.total_spins, 0);
        assert_eq!(state.total_wins + state.total_losses, 0);
        assert_eq!((state.win_streak, state.loss_streak, state.near_miss_count), (0, 0, 0));
        assert!(state.history.is_empty());
        assert_eq!(state.current_bet, 5_000.0);
    }

    #[test]
    fn bet_controls_clamp() {
        let mut ledger = Ledger::new();
        assert_eq!(ledger.decrease_bet(), MIN_BET);
        assert_eq!(ledger.increase_bet(), 2_000.0);
        assert_eq!(ledger.set_bet(1e9), INITIAL_BALANCE);
        assert_eq!(ledger.set_bet(-5.0), MIN_BET);
        assert_eq!(ledger.set_bet(f64::NAN), MIN_BET);
    }

    #[test]
    fn bet_floor_beats_tiny_balance() {
        let mut ledger = Ledger::new();
        let table = Paytable::standard();
        ledger.set_bet(INITIAL_BALANCE);
        ledger.resolve_spin(INITIAL_BALANCE - 500.0, &loss(), &table);
        assert_eq!(ledger.state().balance, 500.0);
        assert_eq!(ledger.increase_bet(), MIN_BET);
        assert!(!ledger.state().can_cover(ledger.state().current_bet));
    }

    #[test]
    fn stats_follow_totals() {
        let mut ledger = Ledger::new();
        let table = Paytable::standard();
        assert_eq!(ledger.state().win_rate(), 0.0);
        ledger.resolve_spin(1_000.0, &jackpot(), &table);
        ledger.resolve_spin(1_000.0, &loss(), &table);
        assert_eq!(ledger.state().win_rate(), 50.0);
        assert_eq!(ledger.state().profit_loss(), 8_000.0);
    }

    proptest! {
        #[test]
        fn ledger_invariants_hold(
            spins in prop::collection::vec((any::<[u8; 9]>(), 0usize..5, 1u32..5), 0..60)
        ) {
            let mut ledger = Ledger::new();
            let table = Paytable::standard();
            let mut expected = INITIAL_BALANCE;
            let mut entries = Vec::new();
            for (cells, rule, units) in &spins {
                let mut reels = [[Symbol::Cherry; 3]; 3];
                for (i, cell) in cells.iter().enumerate() {
                    reels[i / 3][i % 3] = Symbol::from_index(*cell);
                }
                let decision = ManipulationDecision { grid: ReelGrid(reels), rule: Rule::ALL[*rule] };
                let (_, entry) = ledger.resolve_spin(*units as f64 * 1_000.0, &decision, &table);
                expected += entry.net();
                entries.push(entry);

                let state = ledger.state();
                prop_assert!(state.win_streak == 0 || state.loss_streak == 0);
                prop_assert!(state.history.len() <= HISTORY_LIMIT);
            }
            let state = ledger.state();
            prop_assert_eq!(state.total_spins, spins.len() as u64);
            prop_assert_eq!(state.total_wins + state.total_losses, state.total_spins);
            prop_assert!((state.balance - expected).abs() < 1e-6);
            let tail: Vec<HistoryEntry> = entries
                .iter()
                .skip(entries.len().saturating_sub(HISTORY_LIMIT))
                .copied()
                .collect();
            prop_assert_eq!(state.history.iter().copied().collect::<Vec<_>>(), tail);
        }
    }
}
