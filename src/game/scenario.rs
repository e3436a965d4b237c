//! Scripted scenarios and the library the facilitator picks them from.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use super::round::Round;
use super::score::ScoreTable;
use crate::error::{GridError, GridResult};

/// An immutable, ordered list of rounds plus the table used to score them.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub id: String,
    pub name: String,
    pub rounds: Vec<Round>,
    pub scoring: ScoreTable,
}

impl Scenario {
    pub fn round(&self, index: usize) -> Option<&Round> {
        self.rounds.get(index)
    }

    pub fn gameplay_round_count(&self) -> usize {
        self.rounds.iter().filter(|r| r.gameplay().is_some()).count()
    }
}

/// Listing entry for a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioSummary {
    pub id: String,
    pub name: String,
    pub rounds: usize,
    pub gameplay_rounds: usize,
}

impl From<&Scenario> for ScenarioSummary {
    fn from(s: &Scenario) -> Self {
        Self {
            id: s.id.clone(),
            name: s.name.clone(),
            rounds: s.rounds.len(),
            gameplay_rounds: s.gameplay_round_count(),
        }
    }
}

/// All scenarios known to the server, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ScenarioLibrary {
    scenarios: BTreeMap<String, Arc<Scenario>>,
}

impl ScenarioLibrary {
    pub fn new(scenarios: impl IntoIterator<Item = Scenario>) -> Self {
        Self {
            scenarios: scenarios
                .into_iter()
                .map(|s| (s.id.clone(), Arc::new(s)))
                .collect(),
        }
    }

    /// # Errors
    ///
    /// Returns [`GridError::UnknownScenario`] if no scenario has this id.
    pub fn get(&self, id: &str) -> GridResult<Arc<Scenario>> {
        self.scenarios
            .get(id)
            .cloned()
            .ok_or_else(|| GridError::UnknownScenario(id.to_string()))
    }

    pub fn summaries(&self) -> Vec<ScenarioSummary> {
        self.scenarios.values().map(|s| s.as_ref().into()).collect()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}
