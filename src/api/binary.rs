//! Device routes speaking the binary protocol.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use tracing::info;

use super::AppState;
use super::extract::{DeviceCaller, DeviceError};
use crate::board::BoardType;
use crate::error::GridError;
use crate::group::Group;
use crate::protocol::{
    BuildingTablePacket, ConnectedConsumption, ConnectedProduction, PollResponse, PowerData,
    ProtocolError, RegistrationRequest, RegistrationResponse, TableEntry, TimedPowerData,
};
use crate::stats;
use crate::telemetry::{ConnectionReport, TelemetrySubmission};

type DeviceResult = Result<Response, DeviceError>;

fn octets(body: Vec<u8>) -> Response {
    ([(CONTENT_TYPE, "application/octet-stream")], body).into_response()
}

/// The caller's group, which exists once any board of it has registered.
fn known_group(state: &AppState, caller: &DeviceCaller) -> Result<Arc<Group>, GridError> {
    let board_id = caller.0.board_id()?;
    state
        .groups
        .get(&caller.0.group_id)
        .ok_or(GridError::BoardNotFound(board_id))
}

/// `POST /register`: body is a `RegistrationRequest`, answer a
/// `RegistrationResponse`. The board id is the caller's user id.
pub async fn register(
    State(state): State<Arc<AppState>>,
    caller: DeviceCaller,
    body: Bytes,
) -> DeviceResult {
    let identity = &caller.0;
    let board_id = identity.board_id()?;
    let req = RegistrationRequest::decode(&body).map_err(GridError::from)?;
    let board_type = req
        .board_type
        .as_deref()
        .map(str::parse::<BoardType>)
        .transpose()
        .map_err(|_| {
            GridError::from(ProtocolError::InvalidField {
                packet: "RegistrationRequest",
                field: "board_type",
            })
        })?;
    let display_name = req.display_name.or_else(|| identity.display_name.clone());

    let group = state.groups.get_or_create(&identity.group_id);
    let board = group
        .registry()
        .register(board_id, display_name, board_type, Utc::now());
    info!(group = %board.group_id, board = %board.id, "device registered");

    let resp = RegistrationResponse::new(true, &format!("registered {}", board.id));
    Ok(octets(resp.encode()))
}

/// `POST /post_vals`: body is a `PowerData`.
pub async fn post_vals(
    State(state): State<Arc<AppState>>,
    caller: DeviceCaller,
    body: Bytes,
) -> DeviceResult {
    let packet = PowerData::decode(&body).map_err(GridError::from)?;
    let group = known_group(&state, &caller)?;
    let board_id = caller.0.board_id()?;
    state
        .ingestor
        .ingest(group.registry(), &board_id, packet.into(), Utc::now())?;
    Ok(StatusCode::OK.into_response())
}

/// `POST /post_vals_timed`: body is a `TimedPowerData`.
pub async fn post_vals_timed(
    State(state): State<Arc<AppState>>,
    caller: DeviceCaller,
    body: Bytes,
) -> DeviceResult {
    let packet = TimedPowerData::decode(&body).map_err(GridError::from)?;
    let submission = TelemetrySubmission::try_from(packet)?;
    let group = known_group(&state, &caller)?;
    let board_id = caller.0.board_id()?;
    state
        .ingestor
        .ingest(group.registry(), &board_id, submission, Utc::now())?;
    Ok(StatusCode::OK.into_response())
}

/// `POST /prod_connected`: body is a `ConnectedProduction`.
pub async fn prod_connected(
    State(state): State<Arc<AppState>>,
    caller: DeviceCaller,
    body: Bytes,
) -> DeviceResult {
    let packet = ConnectedProduction::decode(&body).map_err(GridError::from)?;
    let group = known_group(&state, &caller)?;
    let report = ConnectionReport {
        production: Some(packet.plants().to_vec()),
        consumption: None,
    };
    state.ingestor.ingest_connections(
        group.registry(),
        &caller.0.board_id()?,
        report,
        Utc::now(),
    )?;
    Ok(StatusCode::OK.into_response())
}

/// `POST /cons_connected`: body is a `ConnectedConsumption`.
pub async fn cons_connected(
    State(state): State<Arc<AppState>>,
    caller: DeviceCaller,
    body: Bytes,
) -> DeviceResult {
    let packet = ConnectedConsumption::decode(&body).map_err(GridError::from)?;
    let group = known_group(&state, &caller)?;
    let report = ConnectionReport {
        production: None,
        consumption: Some(packet.consumer_ids().to_vec()),
    };
    state.ingestor.ingest_connections(
        group.registry(),
        &caller.0.board_id()?,
        report,
        Utc::now(),
    )?;
    Ok(StatusCode::OK.into_response())
}

/// `GET /poll_binary`: coefficients of the active round as a `PollResponse`.
/// A group nobody has registered in yet answers with empty tables.
pub async fn poll_binary(State(state): State<Arc<AppState>>, caller: DeviceCaller) -> DeviceResult {
    let resp = match state.groups.get(&caller.0.group_id) {
        Some(group) => stats::poll_response(&group).map_err(GridError::from)?,
        None => PollResponse::default(),
    };
    Ok(octets(resp.encode()))
}

/// `GET /building_table_binary`: the group's base consumption table.
pub async fn building_table_binary(
    State(state): State<Arc<AppState>>,
    caller: DeviceCaller,
) -> DeviceResult {
    let table = state.groups.building_table(&caller.0.group_id);
    let entries = table
        .base_consumption
        .iter()
        .map(|(building, value)| TableEntry {
            id: building.wire_id(),
            value: *value,
        })
        .collect();
    let packet = BuildingTablePacket::new(table.version, entries).map_err(GridError::from)?;
    Ok(octets(packet.encode()))
}
