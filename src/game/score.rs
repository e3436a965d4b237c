//! Tolerance-band scoring of closed rounds.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::resolver::{self, BuildingTable, GridCatalog};
use super::round::GameplayRound;
use crate::board::{BoardId, BoardRegistry, GroupId};

/// Maps a round's power balance to points.
///
/// A board whose `|balance|` is within `best_within` mW gets `best_points`;
/// within `middle_within` it gets `middle_points`; otherwise `lowest_points`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoreTable {
    pub best_within: i64,
    pub best_points: i64,
    pub middle_within: i64,
    pub middle_points: i64,
    pub lowest_points: i64,
}

impl Default for ScoreTable {
    fn default() -> Self {
        Self {
            best_within: 1,
            best_points: 10,
            middle_within: 5,
            middle_points: 5,
            lowest_points: 0,
        }
    }
}

impl ScoreTable {
    pub fn points_for(&self, balance: i64) -> i64 {
        let distance = balance.unsigned_abs();
        if distance <= self.best_within.unsigned_abs() {
            self.best_points
        } else if distance <= self.middle_within.unsigned_abs() {
            self.middle_points
        } else {
            self.lowest_points
        }
    }
}

/// Score of one board for one closed round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreRecord {
    pub group_id: GroupId,
    pub board_id: BoardId,
    pub round_index: usize,
    /// Applied production (mW).
    pub production: i64,
    /// Applied consumption (mW).
    pub consumption: i64,
    pub balance: i64,
    pub score_delta: i64,
}

/// Read-only inputs needed to close a round.
pub struct ScoringContext<'a> {
    pub catalog: &'a GridCatalog,
    pub building_table: &'a BuildingTable,
    pub table: &'a ScoreTable,
}

/// Scores every connected board for `round` and appends a record to each.
///
/// Disconnected boards are skipped and get no record. Returns the records
/// that were appended, ordered by board id.
pub fn close_round(
    registry: &BoardRegistry,
    round: &GameplayRound,
    round_index: usize,
    ctx: &ScoringContext<'_>,
) -> Vec<ScoreRecord> {
    let mut records = Vec::new();
    registry.for_each_connected(|board| {
        let applied = resolver::resolve(board, round, ctx.catalog, ctx.building_table);
        let balance = applied.balance();
        let record = ScoreRecord {
            group_id: board.group_id.clone(),
            board_id: board.id.clone(),
            round_index,
            production: applied.production,
            consumption: applied.consumption,
            balance,
            score_delta: ctx.table.points_for(balance),
        };
        debug!(board = %board.id, round_index, balance, score = record.score_delta, "round scored");
        board.scores.push(record.clone());
        records.push(record);
    });
    records
}
