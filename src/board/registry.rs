//! Per-group board table.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use super::types::{Board, BoardId, BoardType, GroupId, PowerSample};
use crate::error::{GridError, GridResult};

/// Boards of one group.
///
/// The id map is write-locked only when a new board appears; every board sits
/// behind its own mutex so concurrent writes to different boards never contend.
pub struct BoardRegistry {
    group_id: GroupId,
    history_capacity: usize,
    boards: RwLock<HashMap<BoardId, Arc<Mutex<Board>>>>,
}

impl BoardRegistry {
    /// # Panics
    ///
    /// Panics if `history_capacity` is zero.
    pub fn new(group_id: GroupId, history_capacity: usize) -> Self {
        assert!(history_capacity > 0, "history_capacity must be > 0");
        Self {
            group_id,
            history_capacity,
            boards: RwLock::new(HashMap::new()),
        }
    }

    pub fn group_id(&self) -> &GroupId {
        &self.group_id
    }

    /// Registers `board_id`, or refreshes its identity and marks it connected
    /// if it already exists. Never creates duplicates.
    pub fn register(
        &self,
        board_id: BoardId,
        display_name: Option<String>,
        board_type: Option<BoardType>,
        now: DateTime<Utc>,
    ) -> Board {
        if let Some(handle) = self.handle(&board_id) {
            let mut board = handle.lock();
            refresh(&mut board, display_name, board_type, now);
            return board.clone();
        }

        let mut boards = self.boards.write();
        // Another registration may have won the race for the write lock.
        if let Some(handle) = boards.get(&board_id) {
            let mut board = handle.lock();
            refresh(&mut board, display_name, board_type, now);
            return board.clone();
        }

        let board = Board::new(
            board_id.clone(),
            self.group_id.clone(),
            display_name.unwrap_or_else(|| board_id.0.clone()),
            board_type.unwrap_or_default(),
            self.history_capacity,
            now,
        );
        info!(group = %self.group_id, board = %board_id, "board registered");
        boards.insert(board_id, Arc::new(Mutex::new(board.clone())));
        board
    }

    /// Stores a reading. `None` values leave the matching field untouched.
    pub fn record_telemetry(
        &self,
        board_id: &BoardId,
        production: Option<i32>,
        consumption: Option<i32>,
        at: DateTime<Utc>,
    ) -> GridResult<()> {
        self.with_board_mut(board_id, |board| {
            if let Some(value_mw) = production {
                board.current_production = value_mw;
                board.production_history.push(PowerSample { at, value_mw });
            }
            if let Some(value_mw) = consumption {
                board.current_consumption = value_mw;
                board.consumption_history.push(PowerSample { at, value_mw });
            }
            board.last_updated = at;
            board.connected = true;
        })
    }

    /// Replaces the board's connection snapshot. Each side is replaced only
    /// when supplied; a report is always a full snapshot, never a delta.
    pub fn record_connections(
        &self,
        board_id: &BoardId,
        production: Option<BTreeMap<u32, i32>>,
        consumption: Option<BTreeSet<u32>>,
        at: DateTime<Utc>,
    ) -> GridResult<()> {
        self.with_board_mut(board_id, |board| {
            if production.is_some() {
                board.connected_production = production;
            }
            if consumption.is_some() {
                board.connected_consumption = consumption;
            }
            board.last_updated = at;
            board.connected = true;
        })
    }

    /// Flips `connected` off once `now - last_updated > ttl`.
    ///
    /// Returns whether the board transitioned to disconnected.
    pub fn mark_stale_if_expired(
        &self,
        board_id: &BoardId,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> GridResult<bool> {
        self.with_board_mut(board_id, |board| expire(board, ttl, now))
    }

    /// Runs [`Self::mark_stale_if_expired`] over every board; returns how many
    /// went stale.
    pub fn sweep_stale(&self, ttl: Duration, now: DateTime<Utc>) -> usize {
        self.handles()
            .iter()
            .filter(|handle| expire(&mut handle.lock(), ttl, now))
            .count()
    }

    pub fn get(&self, board_id: &BoardId) -> GridResult<Board> {
        self.handle(board_id)
            .map(|h| h.lock().clone())
            .ok_or_else(|| GridError::BoardNotFound(board_id.clone()))
    }

    /// Clones of every board, ordered by id.
    pub fn snapshot(&self) -> Vec<Board> {
        self.handles().iter().map(|h| h.lock().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.boards.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.boards.read().is_empty()
    }

    /// Applies `f` to every connected board while holding its lock.
    pub(crate) fn for_each_connected(&self, mut f: impl FnMut(&mut Board)) {
        for handle in self.handles() {
            let mut board = handle.lock();
            if board.connected {
                f(&mut board);
            }
        }
    }

    /// Applies `f` to every board while holding its lock.
    pub(crate) fn for_each(&self, mut f: impl FnMut(&mut Board)) {
        for handle in self.handles() {
            f(&mut handle.lock());
        }
    }

    fn handle(&self, board_id: &BoardId) -> Option<Arc<Mutex<Board>>> {
        self.boards.read().get(board_id).cloned()
    }

    /// Board handles ordered by id.
    fn handles(&self) -> Vec<Arc<Mutex<Board>>> {
        let boards = self.boards.read();
        let mut ids: Vec<&BoardId> = boards.keys().collect();
        ids.sort();
        ids.into_iter().map(|id| Arc::clone(&boards[id])).collect()
    }

    fn with_board_mut<R>(&self, board_id: &BoardId, f: impl FnOnce(&mut Board) -> R) -> GridResult<R> {
        let handle = self
            .handle(board_id)
            .ok_or_else(|| GridError::BoardNotFound(board_id.clone()))?;
        let mut board = handle.lock();
        Ok(f(&mut board))
    }
}

fn refresh(
    board: &mut Board,
    display_name: Option<String>,
    board_type: Option<BoardType>,
    now: DateTime<Utc>,
) {
    if let Some(name) = display_name {
        board.display_name = name;
    }
    if let Some(kind) = board_type {
        board.board_type = kind;
    }
    board.connected = true;
    board.last_updated = now;
}

fn expire(board: &mut Board, ttl: Duration, now: DateTime<Utc>) -> bool {
    if board.connected && now - board.last_updated > ttl {
        board.connected = false;
        warn!(group = %board.group_id, board = %board.id, "board marked disconnected after liveness timeout");
        return true;
    }
    false
}
