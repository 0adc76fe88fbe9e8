use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    config::{AlgorithmConfig, AlgorithmConfigPatch, ConfigError},
    evaluator::SpinOutcome,
    ledger::{HistoryEntry, Ledger, SessionState},
    paytable::Paytable,
    policy::{self, ManipulationDecision},
    reels,
    rng::{Draws, SeededDraws},
    symbols::ReelGrid,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SpinError {
    #[error("balance {balance} cannot cover bet {bet}")]
    InsufficientBalance { balance: f64, bet: f64 },
    #[error("a spin is already in progress")]
    SpinInProgress,
    #[error("invalid bet: {0}")]
    InvalidBet(f64),
    #[error("session was reset while the spin was in flight")]
    Cancelled,
    #[error("no spin in flight")]
    NoSpinInFlight,
}

/// Proof that a spin was admitted. Consumed by [`SlotMachine::finish_spin`].
#[derive(Debug)]
pub struct SpinTicket {
    epoch: u64,
    bet: f64,
    // config in force when the spin was admitted
    config: AlgorithmConfig,
}

/// Everything the presentation layer needs after one resolved spin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpinReport {
    pub outcome: SpinOutcome,
    pub decision: ManipulationDecision,
    pub entry: HistoryEntry,
    pub session: SessionState,
}

/// One player session: ledger, bias parameters and the draw stream behind them.
///
/// A spin is split into [`begin_spin`](Self::begin_spin), any number of cosmetic
/// [`shuffle_frame`](Self::shuffle_frame) calls, and
/// [`finish_spin`](Self::finish_spin). Only one spin can be in flight, and a
/// [`reset`](Self::reset) invalidates any spin begun before it.
#[derive(Debug)]
pub struct SlotMachine<D = SeededDraws> {
    ledger: Ledger,
    config: AlgorithmConfig,
    paytable: Paytable,
    draws: D,
    // animation frames draw from their own stream so they never shift decisions
    frames: SeededDraws,
    in_flight: bool,
    epoch: u64,
}

impl<D: Draws> SlotMachine<D> {
    pub fn new(draws: D) -> Self {
        Self {
            ledger: Ledger::new(),
            config: AlgorithmConfig::default(),
            paytable: Paytable::standard(),
            draws,
            frames: SeededDraws::new("shuffle", "frames", 0),
            in_flight: false,
            epoch: 0,
        }
    }

    pub fn with_config(draws: D, config: AlgorithmConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new(draws)
        })
    }

    pub fn session(&self) -> &SessionState {
        self.ledger.state()
    }

    pub fn config(&self) -> &AlgorithmConfig {
        &self.config
    }

    pub fn is_spinning(&self) -> bool {
        self.in_flight
    }

    /// Applies a partial config update. A spin already in flight keeps the config
    /// it was admitted with.
    pub fn set_algorithm_config(
        &mut self,
        patch: &AlgorithmConfigPatch,
    ) -> Result<AlgorithmConfig, ConfigError> {
        self.config = self.config.patched(patch)?;
        info!(config = ?self.config, "algorithm config updated");
        Ok(self.config)
    }

    pub fn increase_bet(&mut self) -> f64 {
        self.ledger.increase_bet()
    }

    pub fn decrease_bet(&mut self) -> f64 {
        self.ledger.decrease_bet()
    }

    pub fn set_bet(&mut self, amount: f64) -> f64 {
        self.ledger.set_bet(amount)
    }

    pub fn begin_spin(&mut self, bet: f64) -> Result<SpinTicket, SpinError> {
        if self.in_flight {
            return Err(SpinError::SpinInProgress);
        }
        if !bet.is_finite() || bet <= 0.0 {
            return Err(SpinError::InvalidBet(bet));
        }
        let balance = self.session().balance;
        if balance < bet {
            return Err(SpinError::InsufficientBalance { balance, bet });
        }
        self.in_flight = true;
        Ok(SpinTicket {
            epoch: self.epoch,
            bet,
            config: self.config,
        })
    }

    /// Random grid for an animation tick.
    pub fn shuffle_frame(&mut self) -> ReelGrid {
        reels::shuffle_frame(&mut self.frames)
    }

    pub fn finish_spin(&mut self, ticket: SpinTicket) -> Result<SpinReport, SpinError> {
        if ticket.epoch != self.epoch {
            debug!(ticket_epoch = ticket.epoch, epoch = self.epoch, "dropping stale spin");
            return Err(SpinError::Cancelled);
        }
        if !self.in_flight {
            return Err(SpinError::NoSpinInFlight);
        }
        let decision = policy::decide(
            self.ledger.state(),
            ticket.bet,
            &ticket.config,
            &self.paytable,
            &mut self.draws,
        );
        let (outcome, entry) = self.ledger.resolve_spin(ticket.bet, &decision, &self.paytable);
        self.in_flight = false;
        debug!(
            spin = entry.spin,
            rule = decision.rule.label(),
            class = outcome.class.as_str(),
            balance = entry.balance,
            "spin resolved"
        );
        Ok(SpinReport {
            outcome,
            decision,
            entry,
            session: self.ledger.state().clone(),
        })
    }

    /// Begins and finishes a spin with no animation.
    pub fn spin(&mut self, bet: f64) -> Result<SpinReport, SpinError> {
        let ticket = self.begin_spin(bet)?;
        self.finish_spin(ticket)
    }

    pub fn reset(&mut self) {
        self.epoch += 1;
        self.in_flight = false;
        self.ledger.reset();
        info!(epoch = self.epoch, "session reset");
    }
}
