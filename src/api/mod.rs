//! HTTP transport.
//!
//! Two families of routes share one state:
//! - device routes speak the binary protocol (`application/octet-stream`
//!   in, out, and ASCII error codes on failure)
//! - facilitator and dashboard routes speak JSON
//!
//! Every route except `/login` and `/health` needs a bearer token.

mod binary;
mod extract;
mod handlers;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use chrono::Duration;
use tracing::info;

use crate::auth::{AuthGateway, StaticAuthGateway};
use crate::config::GameConfig;
use crate::game::ScenarioLibrary;
use crate::group::GroupStore;
use crate::telemetry::TelemetryIngestor;

pub use extract::{ApiError, Caller, DeviceCaller, DeviceError};
pub use types::{
    BoardRegistrationBody, BuildingTableBody, ErrorResponse, LoginBody, NextRoundBody,
    NextRoundResponse, PowerDataBody, StartGameBody, StatusResponse,
};

/// State shared by all request handlers.
pub struct AppState {
    pub groups: GroupStore,
    pub scenarios: ScenarioLibrary,
    pub ingestor: TelemetryIngestor,
    pub auth: Arc<dyn AuthGateway>,
}

impl AppState {
    /// Builds the state for `config`, authenticating against its user list.
    pub fn from_config(config: &GameConfig) -> Self {
        Self::with_auth(config, Arc::new(StaticAuthGateway::new(config.users.clone())))
    }

    /// Builds the state for `config` with an external auth gateway.
    pub fn with_auth(config: &GameConfig, auth: Arc<dyn AuthGateway>) -> Self {
        let skew = i64::try_from(config.telemetry.max_clock_skew_secs).unwrap_or(i64::MAX);
        Self {
            groups: GroupStore::new(
                config.telemetry.history_capacity,
                config.catalog(),
                config.building_consumption.clone(),
            ),
            scenarios: config.scenario_library(),
            ingestor: TelemetryIngestor::new(Duration::seconds(skew)),
            auth,
        }
    }
}

/// Builds the axum router with all API routes.
///
/// # Arguments
///
/// * `state` - Shared application state
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // devices
        .route("/register", post(binary::register))
        .route("/post_vals", post(binary::post_vals))
        .route("/post_vals_timed", post(binary::post_vals_timed))
        .route("/prod_connected", post(binary::prod_connected))
        .route("/cons_connected", post(binary::cons_connected))
        .route("/poll_binary", get(binary::poll_binary))
        .route("/building_table_binary", get(binary::building_table_binary))
        // facilitators and dashboards
        .route("/health", get(handlers::health))
        .route("/login", post(handlers::login))
        .route("/scenarios", get(handlers::scenarios))
        .route("/start_game", post(handlers::start_game))
        .route("/next_round", post(handlers::next_round))
        .route("/end_game", post(handlers::end_game))
        .route("/pollforusers", get(handlers::poll_for_users))
        .route("/statistics", get(handlers::statistics))
        .route("/statistics.csv", get(handlers::statistics_csv))
        .route(
            "/building_table",
            get(handlers::get_building_table).post(handlers::replace_building_table),
        )
        .route("/boards/register", post(handlers::register_board))
        .route("/power_data", post(handlers::power_data))
        .with_state(state)
}

/// Binds to the given address and serves the API until the process exits.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, app).await
}
