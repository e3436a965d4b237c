//! Board identity and per-board state.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::history::RingBuffer;
use crate::game::score::ScoreRecord;

/// Stable key of a board within its group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardId(pub String);

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BoardId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Tenant key; every group plays its own game.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardType {
    Solar,
    Wind,
    Battery,
    #[default]
    Generic,
}

impl FromStr for BoardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solar" => Ok(Self::Solar),
            "wind" => Ok(Self::Wind),
            "battery" => Ok(Self::Battery),
            "generic" => Ok(Self::Generic),
            other => Err(format!("unknown board type \"{other}\"")),
        }
    }
}

/// One timestamped reading in milliwatts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PowerSample {
    pub at: DateTime<Utc>,
    pub value_mw: i32,
}

/// A board and everything the server knows about it.
#[derive(Debug, Clone, Serialize)]
pub struct Board {
    pub id: BoardId,
    pub group_id: GroupId,
    pub display_name: String,
    pub board_type: BoardType,
    pub connected: bool,
    /// Last reported production (mW).
    pub current_production: i32,
    /// Last reported consumption (mW).
    pub current_consumption: i32,
    /// Plant id to set point (mW); `None` until the board first reports.
    pub connected_production: Option<BTreeMap<u32, i32>>,
    /// Connected consumer ids; `None` until the board first reports.
    pub connected_consumption: Option<BTreeSet<u32>>,
    pub production_history: RingBuffer<PowerSample>,
    pub consumption_history: RingBuffer<PowerSample>,
    pub last_updated: DateTime<Utc>,
    /// Per-round score records of the current game, oldest first.
    pub scores: Vec<ScoreRecord>,
}

impl Board {
    pub fn new(
        id: BoardId,
        group_id: GroupId,
        display_name: String,
        board_type: BoardType,
        history_capacity: usize,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            group_id,
            display_name,
            board_type,
            connected: true,
            current_production: 0,
            current_consumption: 0,
            connected_production: None,
            connected_consumption: None,
            production_history: RingBuffer::with_capacity(history_capacity),
            consumption_history: RingBuffer::with_capacity(history_capacity),
            last_updated: now,
            scores: Vec::new(),
        }
    }

    /// Running sum of all score deltas in the current game.
    pub fn total_score(&self) -> i64 {
        self.scores
            .iter()
            .map(|s| s.score_delta)
            .fold(0i64, i64::saturating_add)
    }
}
