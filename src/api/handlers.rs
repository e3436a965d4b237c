//! Request handlers for the JSON endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use super::AppState;
use super::extract::{ApiError, Caller};
use super::types::{
    BoardRegistrationBody, BuildingTableBody, LoginBody, NextRoundBody, NextRoundResponse,
    PowerDataBody, StartGameBody, StatusResponse,
};
use crate::auth::Session;
use crate::board::BoardId;
use crate::error::GridError;
use crate::game::ScenarioSummary;
use crate::io::export::write_scores_csv;
use crate::protocol::ProtocolError;
use crate::stats::{self, BoardSummary, ComprehensiveStatistics, PollView};
use crate::telemetry::TelemetrySubmission;

type ApiResult<T> = Result<T, ApiError>;

/// `GET /health` → 200 `{"status": "ok"}`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `POST /login` → bearer token plus the caller's identity.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginBody>,
) -> ApiResult<Json<Session>> {
    Ok(Json(state.auth.login(&body.username, &body.password)?))
}

/// `GET /scenarios` → scenario listing (facilitators).
pub async fn scenarios(
    State(state): State<Arc<AppState>>,
    Caller(identity): Caller,
) -> ApiResult<Json<Vec<ScenarioSummary>>> {
    identity.require_facilitator()?;
    Ok(Json(state.scenarios.summaries()))
}

/// `POST /start_game {scenario_id}` → 200, 404 for unknown scenarios,
/// 409 while a game is active.
pub async fn start_game(
    State(state): State<Arc<AppState>>,
    Caller(identity): Caller,
    Json(body): Json<StartGameBody>,
) -> ApiResult<Json<StatusResponse>> {
    identity.require_facilitator()?;
    let scenario = state.scenarios.get(&body.scenario_id)?;
    let group = state.groups.get_or_create(&identity.group_id);
    let rounds = scenario.rounds.len();
    group.start_game(scenario)?;
    Ok(Json(StatusResponse::success().with_message(format!(
        "scenario {} started with {rounds} rounds",
        body.scenario_id
    ))))
}

/// `POST /next_round {expected_round?}` → the round now active, or
/// `game_finished`.
pub async fn next_round(
    State(state): State<Arc<AppState>>,
    Caller(identity): Caller,
    body: Option<Json<NextRoundBody>>,
) -> ApiResult<Json<NextRoundResponse>> {
    identity.require_facilitator()?;
    let expected = body.and_then(|Json(b)| b.expected_round);
    let group = state
        .groups
        .get(&identity.group_id)
        .ok_or(GridError::NotActive)?;
    let outcome = group.next_round(expected)?;
    Ok(Json(outcome.into()))
}

/// `POST /end_game` → 200 in every phase; the group returns to setup.
pub async fn end_game(
    State(state): State<Arc<AppState>>,
    Caller(identity): Caller,
) -> ApiResult<Json<StatusResponse>> {
    identity.require_facilitator()?;
    if let Some(group) = state.groups.get(&identity.group_id) {
        group.end_game();
    }
    Ok(Json(StatusResponse::success().with_message("game ended")))
}

/// `GET /pollforusers` → boards, game status and round details.
pub async fn poll_for_users(
    State(state): State<Arc<AppState>>,
    Caller(identity): Caller,
) -> ApiResult<Json<PollView>> {
    identity.require_facilitator()?;
    Ok(Json(stats::poll_for_group(&state.groups, &identity.group_id)))
}

/// `GET /statistics` → full histories and the score history.
pub async fn statistics(
    State(state): State<Arc<AppState>>,
    Caller(identity): Caller,
) -> ApiResult<Json<ComprehensiveStatistics>> {
    identity.require_facilitator()?;
    Ok(Json(stats::comprehensive_statistics(
        &state.groups,
        &identity.group_id,
    )))
}

/// `GET /statistics.csv` → score history as CSV.
pub async fn statistics_csv(
    State(state): State<Arc<AppState>>,
    Caller(identity): Caller,
) -> ApiResult<Response> {
    identity.require_facilitator()?;
    let report = stats::comprehensive_statistics(&state.groups, &identity.group_id);
    let mut buf = Vec::new();
    write_scores_csv(&report.score_history, &mut buf)
        .map_err(|e| GridError::Internal(format!("csv export failed: {e}")))?;
    Ok(([(CONTENT_TYPE, "text/csv; charset=utf-8")], buf).into_response())
}

/// `GET /building_table` → `{version, base_consumption}`.
pub async fn get_building_table(
    State(state): State<Arc<AppState>>,
    Caller(identity): Caller,
) -> Json<Value> {
    let table = state.groups.building_table(&identity.group_id);
    Json(json!({
        "version": table.version,
        "base_consumption": table.base_consumption,
    }))
}

/// `POST /building_table {base_consumption}` → the new version.
pub async fn replace_building_table(
    State(state): State<Arc<AppState>>,
    Caller(identity): Caller,
    Json(body): Json<BuildingTableBody>,
) -> ApiResult<Json<Value>> {
    identity.require_facilitator()?;
    if body.base_consumption.values().any(|v| *v < 0) {
        return Err(GridError::from(ProtocolError::InvalidField {
            packet: "BuildingTable",
            field: "base_consumption",
        })
        .into());
    }
    let version = state
        .groups
        .get_or_create(&identity.group_id)
        .replace_building_table(body.base_consumption);
    Ok(Json(json!({ "status": "success", "version": version })))
}

/// `POST /boards/register` → the registered board.
///
/// Boards register themselves; facilitators may register any board id of
/// their group.
pub async fn register_board(
    State(state): State<Arc<AppState>>,
    Caller(identity): Caller,
    body: Option<Json<BoardRegistrationBody>>,
) -> ApiResult<Json<BoardSummary>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let board_id = match (body.board_id, identity.user_type.is_facilitator()) {
        (Some(id), true) => BoardId(id),
        (None, true) => {
            return Err(GridError::from(ProtocolError::InvalidField {
                packet: "BoardRegistration",
                field: "board_id",
            })
            .into());
        }
        (Some(id), false) if id != identity.user_id => return Err(GridError::Forbidden.into()),
        (_, false) => identity.board_id()?,
    };
    let display_name = body.display_name.or_else(|| {
        (board_id.0 == identity.user_id)
            .then(|| identity.display_name.clone())
            .flatten()
    });
    let group = state.groups.get_or_create(&identity.group_id);
    let board = group
        .registry()
        .register(board_id, display_name, body.board_type, Utc::now());
    Ok(Json(BoardSummary::from(&board)))
}

/// `POST /power_data {production?, consumption?, timestamp?}` → 200.
pub async fn power_data(
    State(state): State<Arc<AppState>>,
    Caller(identity): Caller,
    Json(body): Json<PowerDataBody>,
) -> ApiResult<Json<StatusResponse>> {
    let board_id = identity.board_id()?;
    let timestamp = body
        .timestamp
        .map(|secs| {
            DateTime::from_timestamp(secs, 0).ok_or(GridError::Time { skew_secs: i64::MAX })
        })
        .transpose()?;
    let submission = TelemetrySubmission {
        production: body.production,
        consumption: body.consumption,
        timestamp,
    };
    let group = state
        .groups
        .get(&identity.group_id)
        .ok_or_else(|| GridError::BoardNotFound(board_id.clone()))?;
    state
        .ingestor
        .ingest(group.registry(), &board_id, submission, Utc::now())?;
    Ok(Json(StatusResponse::success()))
}
