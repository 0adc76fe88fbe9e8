use axum::http::StatusCode;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use axum_extra::TypedHeader;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use reelbias_core::{
    AlgorithmConfig, AlgorithmConfigPatch, HistoryEntry, SeededDraws, SessionState, SlotMachine,
    SpinError, SpinOrchestrator, SpinReport, SpinResult, SpinTiming,
};
use reelbias_shared::{
    AdminSetConfigRequest, ApiError, AutoPlayRequest, AutoPlayResponse, BetDirection, BetRequest,
    BetResponse, ConfigView, HistoryEntryView, SessionView, SpinRequest, SpinResponse,
};

#[derive(Clone)]
struct AppState {
    engine: SpinOrchestrator,
    api_key: String,
}

#[derive(Debug, Clone)]
struct ServerConfig {
    bind: String,
    api_key: String,
    server_seed: Option<String>,
    client_seed: String,
    timing: SpinTiming,
}

impl ServerConfig {
    fn from_env() -> Self {
        let defaults = SpinTiming::default();
        Self {
            bind: std::env::var("BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            api_key: std::env::var("API_KEY").unwrap_or_else(|_| "dev-key".into()),
            server_seed: std::env::var("REELBIAS_SEED").ok(),
            client_seed: std::env::var("REELBIAS_CLIENT_SEED")
                .unwrap_or_else(|_| "reelbias".into()),
            timing: SpinTiming {
                shuffle_tick: read_ms("REELBIAS_TICK_MS", defaults.shuffle_tick),
                shuffle_ticks: read_u32("REELBIAS_TICKS", defaults.shuffle_ticks),
                auto_replay_delay: read_ms("REELBIAS_REPLAY_MS", defaults.auto_replay_delay),
            },
        }
    }

    fn draws(&self) -> SeededDraws {
        match &self.server_seed {
            Some(seed) => SeededDraws::new(seed.clone(), self.client_seed.clone(), 0),
            None => SeededDraws::from_entropy(),
        }
    }
}

fn read_ms(key: &str, fallback: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(fallback)
}

fn read_u32(key: &str, fallback: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .unwrap_or(fallback)
}

fn entry_view(entry: &HistoryEntry) -> HistoryEntryView {
    HistoryEntryView {
        spin: entry.spin,
        bet: entry.bet,
        result: match entry.result {
            SpinResult::Win => "win".to_string(),
            SpinResult::Loss => "loss".to_string(),
        },
        amount: entry.amount,
        balance: entry.balance,
        rule_label: entry.rule.label().to_string(),
    }
}

fn session_view(session: &SessionState, spinning: bool, auto_play: bool) -> SessionView {
    SessionView {
        balance: session.balance,
        current_bet: session.current_bet,
        total_spins: session.total_spins,
        total_wins: session.total_wins,
        total_losses: session.total_losses,
        win_streak: session.win_streak,
        loss_streak: session.loss_streak,
        near_miss_count: session.near_miss_count,
        win_rate: session.win_rate(),
        profit_loss: session.profit_loss(),
        spinning,
        auto_play,
        history: session.history.iter().map(entry_view).collect(),
    }
}

fn spin_response(report: &SpinReport, auto_play: bool) -> SpinResponse {
    SpinResponse {
        reels: report.decision.grid.to_indices(),
        won: report.outcome.won,
        class: report.outcome.class.as_str().to_string(),
        multiplier: report.outcome.multiplier,
        matched_symbol: report.outcome.matched_symbol.map(|s| s.to_index()),
        rule: format!("{:?}", report.decision.rule),
        rule_label: report.decision.rule.label().to_string(),
        entry: entry_view(&report.entry),
        session: session_view(&report.session, false, auto_play),
    }
}

fn config_view(config: &AlgorithmConfig) -> ConfigView {
    ConfigView {
        house_edge_percent: config.house_edge_percent,
        false_hope_percent: config.false_hope_percent,
        big_loss_protection_percent: config.big_loss_protection_percent,
        near_miss_rate_percent: config.near_miss_rate_percent,
        base_win_chance: config.base_win_chance(),
    }
}

fn config_patch(req: &AdminSetConfigRequest) -> AlgorithmConfigPatch {
    AlgorithmConfigPatch {
        house_edge_percent: req.house_edge_percent,
        false_hope_percent: req.false_hope_percent,
        big_loss_protection_percent: req.big_loss_protection_percent,
        near_miss_rate_percent: req.near_miss_rate_percent,
    }
}

fn api_error(err: SpinError) -> ApiError {
    match err {
        SpinError::SpinInProgress => ApiError::Busy,
        SpinError::InsufficientBalance { .. } | SpinError::InvalidBet(_) => {
            ApiError::Rejected(err.to_string())
        }
        SpinError::Cancelled => ApiError::Rejected(err.to_string()),
        SpinError::NoSpinInFlight => ApiError::Internal,
    }
}

fn status(err: ApiError) -> StatusCode {
    match err {
        ApiError::Invalid(_) => StatusCode::BAD_REQUEST,
        ApiError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ApiError::Busy => StatusCode::CONFLICT,
        ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn route_state(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    let engine = &state.engine;
    Json(session_view(
        &engine.session(),
        engine.is_spinning(),
        engine.is_auto_playing(),
    ))
}

async fn route_spin(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SpinRequest>,
) -> Result<Json<SpinResponse>, StatusCode> {
    let result = match req.bet {
        Some(bet) => state.engine.spin(bet).await,
        None => state.engine.spin_current().await,
    };
    let report = result.map_err(|err| {
        info!(%err, "spin rejected");
        status(api_error(err))
    })?;
    Ok(Json(spin_response(&report, state.engine.is_auto_playing())))
}

async fn route_bet(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BetRequest>,
) -> Result<Json<BetResponse>, StatusCode> {
    let current_bet = match (req.direction, req.amount) {
        (Some(BetDirection::Up), None) => state.engine.increase_bet(),
        (Some(BetDirection::Down), None) => state.engine.decrease_bet(),
        (None, Some(amount)) => state.engine.set_bet(amount),
        _ => {
            return Err(status(ApiError::Invalid(
                "give exactly one of direction or amount".into(),
            )))
        }
    };
    Ok(Json(BetResponse { current_bet }))
}

async fn route_reset(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    state.engine.reset();
    Json(session_view(&state.engine.session(), false, false))
}

async fn route_autoplay(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AutoPlayRequest>,
) -> Json<AutoPlayResponse> {
    let enabled = state.engine.set_auto_play(req.enabled);
    Json(AutoPlayResponse { enabled })
}

async fn route_config(State(state): State<Arc<AppState>>) -> Json<ConfigView> {
    Json(config_view(&state.engine.config()))
}

async fn route_admin_set_config(
    State(state): State<Arc<AppState>>,
    TypedHeader(axum_extra::headers::Authorization(bearer)): TypedHeader<
        axum_extra::headers::Authorization<axum_extra::headers::authorization::Bearer>,
    >,
    Json(req): Json<AdminSetConfigRequest>,
) -> Result<Json<ConfigView>, StatusCode> {
    if bearer.token() != state.api_key {
        return Err(status(ApiError::Unauthorized));
    }
    let config = state
        .engine
        .set_algorithm_config(&config_patch(&req))
        .map_err(|err| {
            warn!(%err, "config update refused");
            status(ApiError::Invalid(err.to_string()))
        })?;
    Ok(Json(config_view(&config)))
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/state", get(route_state))
        .route("/spin", post(route_spin))
        .route("/bet", post(route_bet))
        .route("/reset", post(route_reset))
        .route("/autoplay", post(route_autoplay))
        .route("/config", get(route_config))
        .route("/admin/config", post(route_admin_set_config))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    let draws = config.draws();
    info!(
        server_seed_hash = %draws.server_seed_hash_hex(),
        client_seed = draws.client_seed(),
        "session seeded"
    );
    let state = Arc::new(AppState {
        engine: SpinOrchestrator::new(SlotMachine::new(draws), config.timing),
        api_key: config.api_key.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!(addr = %config.bind, "listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
