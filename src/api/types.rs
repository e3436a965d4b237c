//! JSON request and response bodies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::board::BoardType;
use crate::game::{ActiveRound, BuildingType, CoefficientTable, RoundOutcome, SourceType};
use crate::stats::RoundDetails;

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct StartGameBody {
    pub scenario_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NextRoundBody {
    /// Round index the caller believes is active; `-1` before the first.
    #[serde(default)]
    pub expected_round: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BuildingTableBody {
    pub base_consumption: BTreeMap<BuildingType, i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BoardRegistrationBody {
    /// Only facilitators may name a board other than themselves.
    #[serde(default)]
    pub board_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub board_type: Option<BoardType>,
}

/// JSON telemetry. Values are milliwatts; omitted or `null` means absent.
#[derive(Debug, Default, Deserialize)]
pub struct PowerDataBody {
    #[serde(default)]
    pub production: Option<i64>,
    #[serde(default)]
    pub consumption: Option<i64>,
    /// Device clock as unix seconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusResponse {
    pub fn success() -> Self {
        Self {
            status: "success",
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Coefficients a board needs for the active round.
#[derive(Debug, Serialize)]
pub struct GameData {
    pub production_coefficients: CoefficientTable<SourceType>,
    pub consumption_modifiers: CoefficientTable<BuildingType>,
}

#[derive(Debug, Serialize)]
pub struct NextRoundResponse {
    /// `"success"` or `"game_finished"`.
    pub status: &'static str,
    /// Whether this request moved the game forward.
    pub advanced: bool,
    pub round: Option<usize>,
    pub round_type: Option<u8>,
    pub round_details: Option<RoundDetails>,
    pub game_data: Option<GameData>,
}

impl NextRoundResponse {
    fn for_round(active: Option<&ActiveRound>, advanced: bool) -> Self {
        let game_data = active
            .and_then(|a| a.round.gameplay())
            .map(|g| GameData {
                production_coefficients: g.production_coefficients.clone(),
                consumption_modifiers: g.consumption_modifiers.clone(),
            });
        Self {
            status: "success",
            advanced,
            round: active.map(|a| a.index),
            round_type: active.map(|a| a.round.round_type().code()),
            round_details: active.map(RoundDetails::from),
            game_data,
        }
    }
}

impl From<RoundOutcome> for NextRoundResponse {
    fn from(outcome: RoundOutcome) -> Self {
        match outcome {
            RoundOutcome::Advanced(active) => Self::for_round(Some(&active), true),
            RoundOutcome::Unchanged(active) => Self::for_round(active.as_ref(), false),
            RoundOutcome::GameFinished => Self {
                status: "game_finished",
                advanced: false,
                round: None,
                round_type: None,
                round_details: None,
                game_data: None,
            },
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameplayRound, Period, Round};

    #[test]
    fn finished_outcome_has_no_round() {
        let resp = NextRoundResponse::from(RoundOutcome::GameFinished);
        assert_eq!(resp.status, "game_finished");
        assert!(resp.round.is_none());
    }

    #[test]
    fn advanced_gameplay_round_carries_game_data() {
        let round = Round::Gameplay(GameplayRound {
            period: Period::Night,
            weather: vec![],
            production_coefficients: CoefficientTable::new(BTreeMap::from([(
                SourceType::Wind,
                0.5,
            )])),
            consumption_modifiers: CoefficientTable::default(),
            comment: String::new(),
        });
        let resp = NextRoundResponse::from(RoundOutcome::Advanced(ActiveRound { index: 3, round }));
        assert!(resp.advanced);
        assert_eq!(resp.round, Some(3));
        assert_eq!(resp.round_type, Some(2));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["game_data"]["production_coefficients"]["wind"], 0.5);
    }

    #[test]
    fn slide_round_has_no_game_data() {
        let round = Round::Slide {
            file: "x.png".into(),
            comment: String::new(),
        };
        let resp =
            NextRoundResponse::from(RoundOutcome::Unchanged(Some(ActiveRound { index: 0, round })));
        assert!(!resp.advanced);
        assert!(resp.game_data.is_none());
        assert_eq!(resp.round_type, Some(3));
    }
}
