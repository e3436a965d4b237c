//! Round definitions and coefficient tables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::weather::WeatherCondition;

/// Kind of power plant a board can connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Photovoltaic,
    Wind,
    Nuclear,
    Gas,
    Hydro,
    HydroStorage,
    Coal,
    Battery,
}

impl SourceType {
    pub const ALL: [SourceType; 8] = [
        SourceType::Photovoltaic,
        SourceType::Wind,
        SourceType::Nuclear,
        SourceType::Gas,
        SourceType::Hydro,
        SourceType::HydroStorage,
        SourceType::Coal,
        SourceType::Battery,
    ];

    /// Id used on the wire.
    pub fn wire_id(self) -> u8 {
        match self {
            SourceType::Photovoltaic => 1,
            SourceType::Wind => 2,
            SourceType::Nuclear => 3,
            SourceType::Gas => 4,
            SourceType::Hydro => 5,
            SourceType::HydroStorage => 6,
            SourceType::Coal => 7,
            SourceType::Battery => 8,
        }
    }

    pub fn from_wire_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.wire_id() == id)
    }
}

/// Kind of consumer building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingType {
    Residential,
    Commercial,
    Industrial,
    Hospital,
    School,
    DataCenter,
    Farm,
    Stadium,
}

impl BuildingType {
    pub const ALL: [BuildingType; 8] = [
        BuildingType::Residential,
        BuildingType::Commercial,
        BuildingType::Industrial,
        BuildingType::Hospital,
        BuildingType::School,
        BuildingType::DataCenter,
        BuildingType::Farm,
        BuildingType::Stadium,
    ];

    pub fn wire_id(self) -> u8 {
        match self {
            BuildingType::Residential => 1,
            BuildingType::Commercial => 2,
            BuildingType::Industrial => 3,
            BuildingType::Hospital => 4,
            BuildingType::School => 5,
            BuildingType::DataCenter => 6,
            BuildingType::Farm => 7,
            BuildingType::Stadium => 8,
        }
    }

    pub fn from_wire_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.wire_id() == id)
    }
}

/// Multipliers keyed by type. Missing keys read as 1.0: scenario authors may
/// leave rarely used types out, and such types are simply unaffected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
#[serde(bound(
    serialize = "K: Ord + Serialize",
    deserialize = "K: Ord + Deserialize<'de>"
))]
pub struct CoefficientTable<K> {
    values: BTreeMap<K, f64>,
}

impl<K> Default for CoefficientTable<K> {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Copy> CoefficientTable<K> {
    pub const DEFAULT_COEFFICIENT: f64 = 1.0;

    pub fn new(values: BTreeMap<K, f64>) -> Self {
        Self { values }
    }

    /// Coefficient for `key`, or 1.0 when the table does not mention it.
    pub fn get(&self, key: K) -> f64 {
        self.values
            .get(&key)
            .copied()
            .unwrap_or(Self::DEFAULT_COEFFICIENT)
    }

    pub fn contains(&self, key: K) -> bool {
        self.values.contains_key(&key)
    }

    /// Explicitly configured entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (K, f64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Whether a gameplay round happens by day or by night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Day,
    Night,
}

/// Numeric round type as exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundType {
    Day = 1,
    Night = 2,
    Slide = 3,
    SlideRange = 4,
}

impl RoundType {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// A played round: coefficients apply and the round is scored.
#[derive(Debug, Clone, PartialEq)]
pub struct GameplayRound {
    pub period: Period,
    pub weather: Vec<WeatherCondition>,
    pub production_coefficients: CoefficientTable<SourceType>,
    pub consumption_modifiers: CoefficientTable<BuildingType>,
    pub comment: String,
}

/// One step of a scenario.
#[derive(Debug, Clone, PartialEq)]
pub enum Round {
    Gameplay(GameplayRound),
    Slide { file: String, comment: String },
    SlideRange { files: Vec<String>, comment: String },
}

impl Round {
    pub fn round_type(&self) -> RoundType {
        match self {
            Round::Gameplay(g) => match g.period {
                Period::Day => RoundType::Day,
                Period::Night => RoundType::Night,
            },
            Round::Slide { .. } => RoundType::Slide,
            Round::SlideRange { .. } => RoundType::SlideRange,
        }
    }

    pub fn comment(&self) -> &str {
        match self {
            Round::Gameplay(g) => &g.comment,
            Round::Slide { comment, .. } | Round::SlideRange { comment, .. } => comment,
        }
    }

    pub fn gameplay(&self) -> Option<&GameplayRound> {
        match self {
            Round::Gameplay(g) => Some(g),
            _ => None,
        }
    }

    /// Slide files referenced by presentation rounds.
    pub fn slides(&self) -> Vec<String> {
        match self {
            Round::Gameplay(_) => Vec::new(),
            Round::Slide { file, .. } => vec![file.clone()],
            Round::SlideRange { files, .. } => files.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_coefficients_default_to_one() {
        let table = CoefficientTable::new(BTreeMap::from([(SourceType::Wind, 0.0)]));
        assert_eq!(table.get(SourceType::Wind), 0.0);
        assert_eq!(table.get(SourceType::Coal), 1.0);
        assert!(!table.contains(SourceType::Coal));
    }

    #[test]
    fn wire_ids_round_trip() {
        for s in SourceType::ALL {
            assert_eq!(SourceType::from_wire_id(s.wire_id()), Some(s));
        }
        for b in BuildingType::ALL {
            assert_eq!(BuildingType::from_wire_id(b.wire_id()), Some(b));
        }
        assert_eq!(SourceType::from_wire_id(0), None);
        assert_eq!(BuildingType::from_wire_id(9), None);
    }

    #[test]
    fn round_types_follow_variant() {
        let day = Round::Gameplay(GameplayRound {
            period: Period::Day,
            weather: vec![],
            production_coefficients: CoefficientTable::default(),
            consumption_modifiers: CoefficientTable::default(),
            comment: String::new(),
        });
        assert_eq!(day.round_type().code(), 1);
        let slide = Round::Slide {
            file: "intro.pdf".into(),
            comment: String::new(),
        };
        assert_eq!(slide.round_type().code(), 3);
        assert_eq!(slide.slides(), vec!["intro.pdf".to_string()]);
        let range = Round::SlideRange {
            files: vec!["a.png".into(), "b.png".into()],
            comment: String::new(),
        };
        assert_eq!(range.round_type(), RoundType::SlideRange);
        assert!(range.gameplay().is_none());
    }

    #[test]
    fn coefficient_table_serializes_as_map() {
        let table = CoefficientTable::new(BTreeMap::from([(SourceType::HydroStorage, 0.5)]));
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"{"hydro_storage":0.5}"#);
    }
}
