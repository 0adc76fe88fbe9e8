use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SpinRequest {
    /// Defaults to the session's current bet.
    #[serde(default)]
    pub bet: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SpinResponse {
    pub reels: Vec<Vec<u8>>, // symbol indices, reel-major
    pub won: bool,
    pub class: String,
    pub multiplier: f64,
    pub matched_symbol: Option<u8>,
    pub rule: String,
    pub rule_label: String,
    pub entry: HistoryEntryView,
    pub session: SessionView,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HistoryEntryView {
    pub spin: u64,
    pub bet: f64,
    pub result: String,
    pub amount: f64,
    pub balance: f64,
    pub rule_label: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionView {
    pub balance: f64,
    pub current_bet: f64,
    pub total_spins: u64,
    pub total_wins: u64,
    pub total_losses: u64,
    pub win_streak: u32,
    pub loss_streak: u32,
    pub near_miss_count: u64,
    pub win_rate: f64,
    pub profit_loss: f64,
    pub spinning: bool,
    pub auto_play: bool,
    pub history: Vec<HistoryEntryView>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BetDirection {
    Up,
    Down,
}

/// Either a step in `direction` or an absolute `amount`; the engine clamps both.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct BetRequest {
    #[serde(default)]
    pub direction: Option<BetDirection>,
    #[serde(default)]
    pub amount: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BetResponse {
    pub current_bet: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AutoPlayRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AutoPlayResponse {
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ConfigView {
    pub house_edge_percent: f64,
    pub false_hope_percent: f64,
    pub big_loss_protection_percent: f64,
    pub near_miss_rate_percent: f64,
    pub base_win_chance: f64,
}

/// Partial update; omitted fields keep their value.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct AdminSetConfigRequest {
    #[serde(default)]
    pub house_edge_percent: Option<f64>,
    #[serde(default)]
    pub false_hope_percent: Option<f64>,
    #[serde(default)]
    pub big_loss_protection_percent: Option<f64>,
    #[serde(default)]
    pub near_miss_rate_percent: Option<f64>,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("spin rejected: {0}")]
    Rejected(String),
    #[error("a spin is already in progress")]
    Busy,
    #[error("unauthorized")]
    Unauthorized,
    #[error("internal server error")]
    Internal,
}
