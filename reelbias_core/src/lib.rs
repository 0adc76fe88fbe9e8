pub mod config;
pub mod evaluator;
pub mod ledger;
pub mod machine;
pub mod orchestrator;
pub mod paytable;
pub mod policy;
pub mod reels;
pub mod rng;
pub mod symbols;

pub use crate::config::{AlgorithmConfig, AlgorithmConfigPatch, ConfigError, SpinTiming};
pub use crate::evaluator::{evaluate, SpinOutcome, WinClass};
pub use crate::ledger::{
    HistoryEntry, Ledger, SessionState, SpinResult, BET_STEP, DEFAULT_BET, HISTORY_LIMIT,
    INITIAL_BALANCE, MIN_BET,
};
pub use crate::machine::{SlotMachine, SpinError, SpinReport, SpinTicket};
pub use crate::orchestrator::{MachineEvent, SpinOrchestrator};
pub use crate::paytable::{Paytable, PaytableEntry, SMALL_WIN_MULTIPLIER};
pub use crate::policy::{decide, ManipulationDecision, Rule};
pub use crate::rng::{derive_floats, derive_hash_hex, Draws, ScriptedDraws, SeededDraws};
pub use crate::symbols::{ReelGrid, Symbol};
