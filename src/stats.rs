//! Read-only projections of a group's boards and game.
//!
//! Every view is built while the group's engine state is read-locked, so a
//! view never mixes boards scored for a round with a round index that has
//! not caught up yet.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::board::history::RingBuffer;
use crate::board::{Board, BoardId, BoardType, GroupId, PowerSample};
use crate::game::weather::{self, SourceOutlook};
use crate::game::{
    ActiveRound, BuildingType, CoefficientTable, EngineSnapshot, GamePhase, Period, RoundType,
    ScoreRecord, SourceType, WeatherCondition, resolver,
};
use crate::group::{Group, GroupStore};
use crate::protocol::{PollResponse, ProtocolError, TableEntry, saturate_i32};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameStatus {
    pub phase: GamePhase,
    pub game_active: bool,
    /// `-1` before the first round.
    pub current_round: i64,
    pub total_rounds: usize,
    pub scenario: Option<String>,
}

impl GameStatus {
    fn from_snapshot(s: &EngineSnapshot) -> Self {
        Self {
            phase: s.phase,
            game_active: s.phase.is_active(),
            current_round: s.phase.round_index(),
            total_rounds: s.total_rounds(),
            scenario: s.scenario.as_ref().map(|sc| sc.id.clone()),
        }
    }
}

impl Default for GameStatus {
    fn default() -> Self {
        Self::from_snapshot(&EngineSnapshot {
            phase: GamePhase::Setup,
            scenario: None,
            generation: 0,
        })
    }
}

/// Public fields of the active round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundDetails {
    pub index: usize,
    pub round_type: RoundType,
    pub round_type_code: u8,
    pub comment: String,
    pub period: Option<Period>,
    pub weather: Vec<WeatherCondition>,
    pub production_coefficients: CoefficientTable<SourceType>,
    pub consumption_modifiers: CoefficientTable<BuildingType>,
    pub slides: Vec<String>,
    pub outlook: BTreeMap<SourceType, SourceOutlook>,
}

impl From<&ActiveRound> for RoundDetails {
    fn from(active: &ActiveRound) -> Self {
        let round = &active.round;
        let round_type = round.round_type();
        let mut details = Self {
            index: active.index,
            round_type,
            round_type_code: round_type.code(),
            comment: round.comment().to_string(),
            period: None,
            weather: Vec::new(),
            production_coefficients: CoefficientTable::default(),
            consumption_modifiers: CoefficientTable::default(),
            slides: round.slides(),
            outlook: BTreeMap::new(),
        };
        if let Some(g) = round.gameplay() {
            details.period = Some(g.period);
            details.weather = g.weather.clone();
            details.production_coefficients = g.production_coefficients.clone();
            details.consumption_modifiers = g.consumption_modifiers.clone();
            details.outlook = weather::outlook(g.period, &g.weather, &g.production_coefficients);
        }
        details
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardSummary {
    pub board_id: BoardId,
    pub display_name: String,
    pub board_type: BoardType,
    pub connected: bool,
    pub current_production: i32,
    pub current_consumption: i32,
    pub last_updated: DateTime<Utc>,
    pub total_score: i64,
}

impl From<&Board> for BoardSummary {
    fn from(b: &Board) -> Self {
        Self {
            board_id: b.id.clone(),
            display_name: b.display_name.clone(),
            board_type: b.board_type,
            connected: b.connected,
            current_production: b.current_production,
            current_consumption: b.current_consumption,
            last_updated: b.last_updated,
            total_score: b.total_score(),
        }
    }
}

/// What the dashboard polls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollView {
    pub group_id: GroupId,
    pub boards: Vec<BoardSummary>,
    pub game_status: GameStatus,
    pub round_details: Option<RoundDetails>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardStatistics {
    #[serde(flatten)]
    pub summary: BoardSummary,
    pub production_history: RingBuffer<PowerSample>,
    pub consumption_history: RingBuffer<PowerSample>,
    pub average_production: Option<f64>,
    pub average_consumption: Option<f64>,
    pub scores: Vec<ScoreRecord>,
}

impl From<&Board> for BoardStatistics {
    fn from(b: &Board) -> Self {
        Self {
            summary: b.into(),
            production_history: b.production_history.clone(),
            consumption_history: b.consumption_history.clone(),
            average_production: average(&b.production_history),
            average_consumption: average(&b.consumption_history),
            scores: b.scores.clone(),
        }
    }
}

/// End-of-game report.
#[derive(Debug, Clone, Serialize)]
pub struct ComprehensiveStatistics {
    pub group_id: GroupId,
    pub game_status: GameStatus,
    pub round_details: Option<RoundDetails>,
    pub statistics: Vec<BoardStatistics>,
    /// `(board, total score)` best first; ties by board id.
    pub leaderboard: Vec<(BoardId, i64)>,
    /// Every score record, by round then board.
    pub score_history: Vec<ScoreRecord>,
}

fn average(history: &RingBuffer<PowerSample>) -> Option<f64> {
    if history.is_empty() {
        return None;
    }
    let sum: i64 = history.iter().map(|s| i64::from(s.value_mw)).sum();
    Some(sum as f64 / history.len() as f64)
}

/// Current boards, game status and round for `group_id`. Unknown groups
/// produce an empty view.
pub fn poll_for_group(store: &GroupStore, group_id: &GroupId) -> PollView {
    let Some(group) = store.get(group_id) else {
        return PollView {
            group_id: group_id.clone(),
            boards: Vec::new(),
            game_status: GameStatus::default(),
            round_details: None,
        };
    };
    group.engine().observe(|snapshot| PollView {
        group_id: group_id.clone(),
        boards: group
            .registry()
            .snapshot()
            .iter()
            .map(BoardSummary::from)
            .collect(),
        game_status: GameStatus::from_snapshot(snapshot),
        round_details: snapshot.current_round().as_ref().map(RoundDetails::from),
    })
}

/// Poll view plus full histories, averages and the score history.
pub fn comprehensive_statistics(store: &GroupStore, group_id: &GroupId) -> ComprehensiveStatistics {
    let Some(group) = store.get(group_id) else {
        return ComprehensiveStatistics {
            group_id: group_id.clone(),
            game_status: GameStatus::default(),
            round_details: None,
            statistics: Vec::new(),
            leaderboard: Vec::new(),
            score_history: Vec::new(),
        };
    };
    group.engine().observe(|snapshot| {
        let boards = group.registry().snapshot();
        let mut leaderboard: Vec<(BoardId, i64)> =
            boards.iter().map(|b| (b.id.clone(), b.total_score())).collect();
        leaderboard.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut score_history: Vec<ScoreRecord> =
            boards.iter().flat_map(|b| b.scores.iter().cloned()).collect();
        score_history.sort_by(|a, b| {
            a.round_index
                .cmp(&b.round_index)
                .then_with(|| a.board_id.cmp(&b.board_id))
        });

        ComprehensiveStatistics {
            group_id: group_id.clone(),
            game_status: GameStatus::from_snapshot(snapshot),
            round_details: snapshot.current_round().as_ref().map(RoundDetails::from),
            statistics: boards.iter().map(BoardStatistics::from).collect(),
            leaderboard,
            score_history,
        }
    })
}

/// Score records of every group, by group then round then board.
pub fn all_score_history(store: &GroupStore) -> Vec<ScoreRecord> {
    store
        .ids()
        .iter()
        .flat_map(|id| comprehensive_statistics(store, id).score_history)
        .collect()
}

/// Binary poll answer for a board of `group`.
///
/// Outside a gameplay round both tables are empty. Otherwise production
/// carries every configured source coefficient in milli-units and
/// consumption the effective per-building consumption in mW.
pub fn poll_response(group: &Group) -> Result<PollResponse, ProtocolError> {
    let buildings = group.building_table();
    group.engine().observe(|snapshot| {
        let Some(active) = snapshot.current_round() else {
            return PollResponse::new(Vec::new(), Vec::new());
        };
        let Some(round) = active.round.gameplay() else {
            return PollResponse::new(Vec::new(), Vec::new());
        };
        let production = round
            .production_coefficients
            .iter()
            .map(|(source, coeff)| TableEntry {
                id: source.wire_id(),
                value: saturate_i32((coeff * 1000.0).round() as i64),
            })
            .collect();
        let consumption = buildings
            .base_consumption
            .keys()
            .map(|&building| TableEntry {
                id: building.wire_id(),
                value: saturate_i32(resolver::effective_consumption(
                    building,
                    &round.consumption_modifiers,
                    &buildings,
                )),
            })
            .collect();
        PollResponse::new(production, consumption)
    })
}
