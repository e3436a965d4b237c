//! Per-group game state machine.
//!
//! A group's game moves through `Setup -> Started -> RoundActive(0..n) ->
//! Finished`, and back to `Setup` when the facilitator ends it. The state
//! lives behind one reader-writer lock: transitions, including the scoring
//! pass that closes a round, hold it for writing, and readers that need a
//! consistent view of rounds and scores hold it for reading.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;

use super::resolver::{BuildingTable, GridCatalog};
use super::round::Round;
use super::scenario::Scenario;
use super::score::{self, ScoringContext};
use crate::board::BoardRegistry;
use crate::error::{GridError, GridResult};

/// Where a group's game currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "phase", content = "round_index", rename_all = "snake_case")]
pub enum GamePhase {
    /// No game has been started yet.
    #[default]
    Setup,
    /// Active, waiting for the first round.
    Started,
    RoundActive(usize),
    Finished,
}

impl GamePhase {
    pub fn is_active(self) -> bool {
        matches!(self, GamePhase::Started | GamePhase::RoundActive(_))
    }

    /// Current round index; `-1` before the first round.
    pub fn round_index(self) -> i64 {
        match self {
            GamePhase::RoundActive(i) => i as i64,
            _ => -1,
        }
    }
}

/// A round together with its position in the scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRound {
    pub index: usize,
    pub round: Round,
}

/// Result of a request to advance.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundOutcome {
    /// This call advanced the game to the given round.
    Advanced(ActiveRound),
    /// Another caller advanced first; carries the round active now, if any.
    Unchanged(Option<ActiveRound>),
    /// The scenario has no rounds left.
    GameFinished,
}

/// Consistent copy of the engine state.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub phase: GamePhase,
    pub scenario: Option<Arc<Scenario>>,
    /// Bumped by every `start_game`.
    pub generation: u64,
}

impl EngineSnapshot {
    pub fn current_round(&self) -> Option<ActiveRound> {
        let GamePhase::RoundActive(index) = self.phase else {
            return None;
        };
        let round = self.scenario.as_ref()?.round(index)?.clone();
        Some(ActiveRound { index, round })
    }

    pub fn total_rounds(&self) -> usize {
        self.scenario.as_ref().map_or(0, |s| s.rounds.len())
    }
}

#[derive(Debug, Default)]
struct GameState {
    phase: GamePhase,
    scenario: Option<Arc<Scenario>>,
    generation: u64,
}

impl GameState {
    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            phase: self.phase,
            scenario: self.scenario.clone(),
            generation: self.generation,
        }
    }
}

#[derive(Debug, Default)]
pub struct ScenarioEngine {
    state: RwLock<GameState>,
}

impl ScenarioEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `scenario`, wiping every board's score history.
    ///
    /// # Errors
    ///
    /// [`GridError::AlreadyActive`] while a game is running.
    pub fn start_game(&self, scenario: Arc<Scenario>, registry: &BoardRegistry) -> GridResult<()> {
        let mut state = self.state.write();
        if state.phase.is_active() {
            return Err(GridError::AlreadyActive);
        }
        registry.for_each(|board| board.scores.clear());
        info!(
            group = %registry.group_id(),
            scenario = %scenario.id,
            rounds = scenario.rounds.len(),
            "game started"
        );
        state.phase = GamePhase::Started;
        state.scenario = Some(scenario);
        state.generation += 1;
        Ok(())
    }

    /// Closes the active round and opens the next one.
    ///
    /// `expected` is the round index the caller believes is active (`-1`
    /// before the first round). When omitted, the index observed on entry is
    /// used. If the game moved on in the meantime nothing happens and the
    /// caller gets [`RoundOutcome::Unchanged`], so concurrent requests from
    /// the same facilitator advance at most once.
    ///
    /// Gameplay rounds are scored when they close; slides are not. Closing
    /// the last round finishes the game.
    ///
    /// # Errors
    ///
    /// [`GridError::NotActive`] if no game was ever started.
    pub fn next_round(
        &self,
        expected: Option<i64>,
        registry: &BoardRegistry,
        catalog: &GridCatalog,
        buildings: &BuildingTable,
    ) -> GridResult<RoundOutcome> {
        let observed = expected.unwrap_or_else(|| self.state.read().phase.round_index());

        let mut state = self.state.write();
        let current = match state.phase {
            GamePhase::Setup => return Err(GridError::NotActive),
            GamePhase::Finished => return Ok(RoundOutcome::GameFinished),
            phase => phase.round_index(),
        };
        if observed != current {
            return Ok(RoundOutcome::Unchanged(state.snapshot().current_round()));
        }
        let Some(scenario) = state.scenario.clone() else {
            return Err(GridError::Internal("active game without a scenario".into()));
        };

        if let GamePhase::RoundActive(index) = state.phase {
            if let Some(gameplay) = scenario.round(index).and_then(Round::gameplay) {
                let ctx = ScoringContext {
                    catalog,
                    building_table: buildings,
                    table: &scenario.scoring,
                };
                let records = score::close_round(registry, gameplay, index, &ctx);
                info!(group = %registry.group_id(), round = index, scored = records.len(), "round closed");
            }
        }

        let next = usize::try_from(current + 1).unwrap_or(0);
        match scenario.round(next) {
            Some(round) => {
                state.phase = GamePhase::RoundActive(next);
                info!(
                    group = %registry.group_id(),
                    round = next,
                    round_type = round.round_type().code(),
                    "round started"
                );
                Ok(RoundOutcome::Advanced(ActiveRound {
                    index: next,
                    round: round.clone(),
                }))
            }
            None => {
                state.phase = GamePhase::Finished;
                info!(group = %registry.group_id(), scenario = %scenario.id, "game finished");
                Ok(RoundOutcome::GameFinished)
            }
        }
    }

    /// Stops any game and returns the group to `Setup`: the scenario is
    /// dropped and the round index reset. The active round is not scored and
    /// earlier scores are kept. Valid in every phase.
    pub fn end_game(&self, registry: &BoardRegistry) {
        let mut state = self.state.write();
        if state.phase != GamePhase::Setup {
            info!(group = %registry.group_id(), phase = ?state.phase, "game ended by facilitator");
        }
        state.phase = GamePhase::Setup;
        state.scenario = None;
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.state.read().snapshot()
    }

    /// Runs `f` with the state read-locked, so no transition can interleave
    /// with what `f` reads from the boards.
    pub fn observe<R>(&self, f: impl FnOnce(&EngineSnapshot) -> R) -> R {
        let state = self.state.read();
        f(&state.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{BoardId, GroupId};
    use crate::game::round::{CoefficientTable, GameplayRound, Period, SourceType};
    use crate::game::score::ScoreTable;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::sync::Barrier;
    use std::thread;

    fn day(pv: f64) -> Round {
        Round::Gameplay(GameplayRound {
            period: Period::Day,
            weather: vec![],
            production_coefficients: CoefficientTable::new(BTreeMap::from([(
                SourceType::Photovoltaic,
                pv,
            )])),
            consumption_modifiers: CoefficientTable::default(),
            comment: String::new(),
        })
    }

    fn scenario(rounds: Vec<Round>) -> Arc<Scenario> {
        Arc::new(Scenario {
            id: "s1".into(),
            name: "Test".into(),
            rounds,
            scoring: ScoreTable::default(),
        })
    }

    struct Fixture {
        engine: ScenarioEngine,
        registry: BoardRegistry,
        catalog: GridCatalog,
        buildings: BuildingTable,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                engine: ScenarioEngine::new(),
                registry: BoardRegistry::new(GroupId::from("g"), 8),
                catalog: GridCatalog::default(),
                buildings: BuildingTable::default(),
            }
        }

        fn next(&self, expected: Option<i64>) -> GridResult<RoundOutcome> {
            self.engine
                .next_round(expected, &self.registry, &self.catalog, &self.buildings)
        }
    }

    #[test]
    fn next_round_before_start_is_not_active() {
        let f = Fixture::new();
        assert_eq!(f.next(None), Err(GridError::NotActive));
    }

    #[test]
    fn end_game_from_setup_is_a_no_op() {
        let f = Fixture::new();
        f.engine.end_game(&f.registry);
        let snap = f.engine.snapshot();
        assert_eq!(snap.phase, GamePhase::Setup);
        assert!(snap.scenario.is_none());
        assert_eq!(f.next(None), Err(GridError::NotActive));
    }

    #[test]
    fn start_twice_is_rejected() {
        let f = Fixture::new();
        f.engine.start_game(scenario(vec![day(1.0)]), &f.registry).unwrap();
        assert_eq!(
            f.engine.start_game(scenario(vec![day(1.0)]), &f.registry),
            Err(GridError::AlreadyActive)
        );
        assert_eq!(f.engine.snapshot().phase.round_index(), -1);
    }

    #[test]
    fn walks_rounds_then_finishes_idempotently() {
        let f = Fixture::new();
        let slide = Round::Slide {
            file: "s.png".into(),
            comment: String::new(),
        };
        f.engine
            .start_game(scenario(vec![slide, day(1.0)]), &f.registry)
            .unwrap();

        match f.next(None).unwrap() {
            RoundOutcome::Advanced(r) => assert_eq!(r.index, 0),
            other => panic!("unexpected {other:?}"),
        }
        match f.next(None).unwrap() {
            RoundOutcome::Advanced(r) => assert_eq!(r.index, 1),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(f.next(None), Ok(RoundOutcome::GameFinished));
        assert_eq!(f.next(None), Ok(RoundOutcome::GameFinished));
        assert_eq!(f.engine.snapshot().phase, GamePhase::Finished);
    }

    #[test]
    fn closing_scores_gameplay_rounds_only() {
        let f = Fixture::new();
        let now = Utc::now();
        let id = BoardId::from("b1");
        f.registry.register(id.clone(), None, None, now);
        f.registry.record_telemetry(&id, Some(1000), Some(1000), now).unwrap();
        let slide = Round::Slide {
            file: "s.png".into(),
            comment: String::new(),
        };
        f.engine
            .start_game(scenario(vec![slide, day(1.0), day(1.0)]), &f.registry)
            .unwrap();

        f.next(None).unwrap();
        f.next(None).unwrap();
        assert!(f.registry.get(&id).unwrap().scores.is_empty());
        f.next(None).unwrap();
        assert_eq!(f.registry.get(&id).unwrap().scores.len(), 1);
        assert_eq!(f.next(None), Ok(RoundOutcome::GameFinished));

        let board = f.registry.get(&id).unwrap();
        let indices: Vec<usize> = board.scores.iter().map(|s| s.round_index).collect();
        assert_eq!(indices, vec![1, 2]);
        assert_eq!(board.total_score(), 20);
    }

    #[test]
    fn restart_clears_scores() {
        let f = Fixture::new();
        let now = Utc::now();
        let id = BoardId::from("b1");
        f.registry.register(id.clone(), None, None, now);
        f.engine.start_game(scenario(vec![day(1.0)]), &f.registry).unwrap();
        f.next(None).unwrap();
        assert_eq!(f.next(None), Ok(RoundOutcome::GameFinished));
        assert_eq!(f.registry.get(&id).unwrap().scores.len(), 1);

        f.engine.start_game(scenario(vec![day(1.0)]), &f.registry).unwrap();
        assert!(f.registry.get(&id).unwrap().scores.is_empty());
        assert_eq!(f.engine.snapshot().generation, 2);
    }

    #[test]
    fn end_game_stops_without_scoring() {
        let f = Fixture::new();
        let id = BoardId::from("b1");
        f.registry.register(id.clone(), None, None, Utc::now());
        f.engine.start_game(scenario(vec![day(1.0), day(1.0)]), &f.registry).unwrap();
        f.next(None).unwrap();
        f.engine.end_game(&f.registry);
        assert!(f.registry.get(&id).unwrap().scores.is_empty());

        let snap = f.engine.snapshot();
        assert_eq!(snap.phase, GamePhase::Setup);
        assert!(snap.scenario.is_none());
        assert_eq!(snap.phase.round_index(), -1);
        assert_eq!(f.next(None), Err(GridError::NotActive));

        // Ending twice is harmless, and a new game can start right away.
        f.engine.end_game(&f.registry);
        f.engine.start_game(scenario(vec![day(1.0)]), &f.registry).unwrap();
        assert_eq!(f.engine.snapshot().phase, GamePhase::Started);
    }

    #[test]
    fn end_game_after_finish_returns_to_setup_and_keeps_scores() {
        let f = Fixture::new();
        let id = BoardId::from("b1");
        f.registry.register(id.clone(), None, None, Utc::now());
        f.engine.start_game(scenario(vec![day(1.0)]), &f.registry).unwrap();
        f.next(None).unwrap();
        assert_eq!(f.next(None), Ok(RoundOutcome::GameFinished));

        f.engine.end_game(&f.registry);
        assert_eq!(f.engine.snapshot().phase, GamePhase::Setup);
        assert_eq!(f.next(None), Err(GridError::NotActive));
        assert_eq!(f.registry.get(&id).unwrap().scores.len(), 1);
    }

    #[test]
    fn stale_expected_index_does_not_advance() {
        let f = Fixture::new();
        f.engine.start_game(scenario(vec![day(1.0), day(1.0)]), &f.registry).unwrap();
        f.next(Some(-1)).unwrap();
        match f.next(Some(-1)).unwrap() {
            RoundOutcome::Unchanged(Some(r)) => assert_eq!(r.index, 0),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(f.engine.snapshot().phase, GamePhase::RoundActive(0));
    }

    #[test]
    fn concurrent_advance_happens_once() {
        let f = Arc::new(Fixture::new());
        let now = Utc::now();
        for i in 0..4 {
            f.registry.register(BoardId(format!("b{i}")), None, None, now);
        }
        f.engine
            .start_game(scenario(vec![day(1.0), day(1.0), day(1.0)]), &f.registry)
            .unwrap();
        f.next(None).unwrap();

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let f = Arc::clone(&f);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    f.next(Some(0)).unwrap()
                })
            })
            .collect();
        let outcomes: Vec<RoundOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let advanced = outcomes
            .iter()
            .filter(|o| matches!(o, RoundOutcome::Advanced(_)))
            .count();
        assert_eq!(advanced, 1);
        assert_eq!(f.engine.snapshot().phase, GamePhase::RoundActive(1));
        for board in f.registry.snapshot() {
            assert_eq!(board.scores.len(), 1);
        }
    }
}
