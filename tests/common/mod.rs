//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use grid_engine::auth::{UserAccount, UserType};
use grid_engine::board::{BoardId, GroupId};
use grid_engine::config::{GameConfig, GameplayRoundConfig, RoundConfig};
use grid_engine::group::{Group, GroupStore};
use grid_engine::telemetry::{TelemetryIngestor, TelemetrySubmission};

fn account(username: &str, user_type: UserType, group_id: &str) -> UserAccount {
    UserAccount {
        username: username.to_string(),
        password: username.to_string(),
        user_type,
        group_id: group_id.to_string(),
        display_name: None,
    }
}

/// Minimal preset with a second (night) round and a second group
/// (`lecturer2`, `board9` in `group2`).
pub fn two_round_config() -> GameConfig {
    let mut config = GameConfig::minimal();
    config.scenarios[0]
        .rounds
        .push(RoundConfig::Night(GameplayRoundConfig::default()));
    config.users.push(account("lecturer2", UserType::Lecturer, "group2"));
    config.users.push(account("board9", UserType::Board, "group2"));
    config
}

pub fn group_store(config: &GameConfig) -> GroupStore {
    GroupStore::new(
        config.telemetry.history_capacity,
        config.catalog(),
        config.building_consumption.clone(),
    )
}

/// Ingestor accepting device clocks within five minutes of the server.
pub fn ingestor() -> TelemetryIngestor {
    TelemetryIngestor::new(Duration::seconds(300))
}

/// Creates `group_id` in `store` and registers each board in it.
pub fn group_with_boards(store: &GroupStore, group_id: &str, boards: &[&str]) -> Arc<Group> {
    let group = store.get_or_create(&GroupId::from(group_id));
    for id in boards {
        group
            .registry()
            .register(BoardId::from(*id), None, None, Utc::now());
    }
    group
}

/// Reports `production`/`consumption` for `board` at server time.
pub fn report(group: &Group, board: &str, production: i64, consumption: i64) {
    ingestor()
        .ingest(
            group.registry(),
            &BoardId::from(board),
            TelemetrySubmission {
                production: Some(production),
                consumption: Some(consumption),
                timestamp: None,
            },
            Utc::now(),
        )
        .expect("telemetry should be accepted");
}
