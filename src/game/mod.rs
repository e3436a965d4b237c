//! Game model: rounds, scenarios, coefficient resolution, scoring and the
//! per-group state machine.

pub mod engine;
pub mod resolver;
pub mod round;
pub mod scenario;
pub mod score;
pub mod weather;

pub use engine::{ActiveRound, EngineSnapshot, GamePhase, RoundOutcome, ScenarioEngine};
pub use resolver::{AppliedPower, BuildingTable, GridCatalog, PowerRange};
pub use round::{BuildingType, CoefficientTable, GameplayRound, Period, Round, RoundType, SourceType};
pub use scenario::{Scenario, ScenarioLibrary, ScenarioSummary};
pub use score::{ScoreRecord, ScoreTable};
pub use weather::{SourceOutlook, WeatherCondition};
