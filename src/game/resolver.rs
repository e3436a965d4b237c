//! Coefficient resolution: turns a board's connections and a round's
//! coefficients into applied production and consumption.
//!
//! Everything here is pure. Values are milliwatts; sums and the balance are
//! saturating `i64`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::round::{BuildingType, CoefficientTable, GameplayRound, SourceType};
use crate::board::Board;

/// Allowed output band of a source type (mW).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PowerRange {
    pub min: i32,
    pub max: i32,
}

impl PowerRange {
    pub fn clamp(&self, value: i64) -> i64 {
        value.clamp(i64::from(self.min), i64::from(self.max))
    }
}

/// Static description of the grid: which plant and consumer ids exist and of
/// which type they are.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridCatalog {
    pub plants: BTreeMap<u32, SourceType>,
    pub consumers: BTreeMap<u32, BuildingType>,
    pub source_ranges: BTreeMap<SourceType, PowerRange>,
}

/// Base consumption per building type (mW), versioned so devices can tell
/// when to re-download it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildingTable {
    pub version: u32,
    pub base_consumption: BTreeMap<BuildingType, i32>,
}

impl BuildingTable {
    pub fn new(base_consumption: BTreeMap<BuildingType, i32>) -> Self {
        Self {
            version: 1,
            base_consumption,
        }
    }

    /// Base consumption of `building`; unknown types consume nothing.
    pub fn base(&self, building: BuildingType) -> i32 {
        self.base_consumption.get(&building).copied().unwrap_or(0)
    }

    /// Replaces the table contents and bumps the version.
    pub fn replace(&mut self, base_consumption: BTreeMap<BuildingType, i32>) {
        self.base_consumption = base_consumption;
        self.version = self.version.wrapping_add(1);
    }
}

/// Resolved power of one board for one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AppliedPower {
    pub production: i64,
    pub consumption: i64,
}

impl AppliedPower {
    /// `production - consumption`, saturating; zero means a perfectly
    /// balanced grid.
    pub fn balance(&self) -> i64 {
        self.production.saturating_sub(self.consumption)
    }
}

fn scale(value: i64, coefficient: f64) -> i64 {
    (value as f64 * coefficient).round() as i64
}

/// Sum of each plant's set point times its source coefficient, clamped per
/// plant to the source's range. Plants missing from the catalog count with
/// coefficient 1.0 and no clamp.
pub fn applied_production(
    set_points: &BTreeMap<u32, i32>,
    coefficients: &CoefficientTable<SourceType>,
    catalog: &GridCatalog,
) -> i64 {
    set_points
        .iter()
        .map(|(plant_id, set_point)| {
            let value = i64::from(*set_point);
            match catalog.plants.get(plant_id) {
                Some(&source) => {
                    let scaled = scale(value, coefficients.get(source));
                    match catalog.source_ranges.get(&source) {
                        Some(range) => range.clamp(scaled),
                        None => scaled,
                    }
                }
                None => value,
            }
        })
        .fold(0i64, i64::saturating_add)
}

/// Sum of base consumption times modifier over the connected consumers.
/// Consumers missing from the catalog contribute nothing.
pub fn applied_consumption(
    consumer_ids: &BTreeSet<u32>,
    modifiers: &CoefficientTable<BuildingType>,
    catalog: &GridCatalog,
    buildings: &BuildingTable,
) -> i64 {
    consumer_ids
        .iter()
        .filter_map(|id| catalog.consumers.get(id))
        .map(|&building| effective_consumption(building, modifiers, buildings))
        .fold(0i64, i64::saturating_add)
}

/// Consumption of a single building of type `building` this round.
pub fn effective_consumption(
    building: BuildingType,
    modifiers: &CoefficientTable<BuildingType>,
    buildings: &BuildingTable,
) -> i64 {
    scale(i64::from(buildings.base(building)), modifiers.get(building))
}

/// Resolves a board for `round`.
///
/// A side the board never reported connections for falls back to the
/// board's last reported value, so telemetry-only boards still take part.
pub fn resolve(
    board: &Board,
    round: &GameplayRound,
    catalog: &GridCatalog,
    buildings: &BuildingTable,
) -> AppliedPower {
    let production = match &board.connected_production {
        Some(set_points) => {
            applied_production(set_points, &round.production_coefficients, catalog)
        }
        None => i64::from(board.current_production),
    };
    let consumption = match &board.connected_consumption {
        Some(ids) => applied_consumption(ids, &round.consumption_modifiers, catalog, buildings),
        None => i64::from(board.current_consumption),
    };
    AppliedPower {
        production,
        consumption,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{BoardId, BoardType, GroupId};
    use crate::game::round::Period;
    use crate::game::score::ScoreTable;
    use chrono::Utc;
    use rand::Rng;

    fn catalog() -> GridCatalog {
        GridCatalog {
            plants: BTreeMap::from([(1, SourceType::Photovoltaic), (2, SourceType::Coal)]),
            consumers: BTreeMap::from([(10, BuildingType::Residential), (11, BuildingType::Hospital)]),
            source_ranges: BTreeMap::from([(
                SourceType::Coal,
                PowerRange { min: 100, max: 500 },
            )]),
        }
    }

    fn round(pv: f64, coal: f64, residential: f64) -> GameplayRound {
        GameplayRound {
            period: Period::Day,
            weather: vec![],
            production_coefficients: CoefficientTable::new(BTreeMap::from([
                (SourceType::Photovoltaic, pv),
                (SourceType::Coal, coal),
            ])),
            consumption_modifiers: CoefficientTable::new(BTreeMap::from([(
                BuildingType::Residential,
                residential,
            )])),
            comment: String::new(),
        }
    }

    fn board() -> Board {
        Board::new(
            BoardId::from("b"),
            GroupId::from("g"),
            "b".into(),
            BoardType::Generic,
            2,
            Utc::now(),
        )
    }

    #[test]
    fn production_scales_and_clamps_per_plant() {
        let set_points = BTreeMap::from([(1, 400), (2, 1000)]);
        let r = round(0.5, 1.0, 1.0);
        // pv: 400 * 0.5 = 200; coal: 1000 clamped to 500
        assert_eq!(applied_production(&set_points, &r.production_coefficients, &catalog()), 700);
    }

    #[test]
    fn unknown_plant_uses_raw_set_point() {
        let set_points = BTreeMap::from([(99, 1234)]);
        let r = round(0.0, 0.0, 1.0);
        assert_eq!(applied_production(&set_points, &r.production_coefficients, &catalog()), 1234);
    }

    #[test]
    fn missing_coefficient_is_one() {
        let set_points = BTreeMap::from([(1, 300)]);
        let empty = CoefficientTable::default();
        assert_eq!(applied_production(&set_points, &empty, &catalog()), 300);
    }

    #[test]
    fn consumption_uses_building_table_and_modifiers() {
        let buildings = BuildingTable::new(BTreeMap::from([
            (BuildingType::Residential, 200),
            (BuildingType::Hospital, 350),
        ]));
        let r = round(1.0, 1.0, 1.5);
        let ids = BTreeSet::from([10, 11, 42]);
        let total = applied_consumption(&ids, &r.consumption_modifiers, &catalog(), &buildings);
        assert_eq!(total, 300 + 350);
    }

    #[test]
    fn resolve_falls_back_to_reported_values() {
        let mut b = board();
        b.current_production = 1000;
        b.current_consumption = 800;
        let applied = resolve(&b, &round(0.0, 0.0, 0.0), &catalog(), &BuildingTable::default());
        assert_eq!(applied.balance(), 200);

        b.connected_production = Some(BTreeMap::from([(1, 1000)]));
        let applied = resolve(&b, &round(0.0, 0.0, 0.0), &catalog(), &BuildingTable::default());
        assert_eq!(applied.production, 0);
        assert_eq!(applied.consumption, 800);
    }

    #[test]
    fn clamped_plants_stay_in_range() {
        let cat = catalog();
        let range = cat.source_ranges[&SourceType::Coal];
        let mut rng = rand::rng();
        for _ in 0..500 {
            let set_point: i32 = rng.random_range(-10_000..10_000);
            let coeff: f64 = rng.random_range(0.0..3.0);
            let r = round(1.0, coeff, 1.0);
            let value = applied_production(
                &BTreeMap::from([(2, set_point)]),
                &r.production_coefficients,
                &cat,
            );
            assert!(value >= i64::from(range.min) && value <= i64::from(range.max));
        }
    }

    #[test]
    fn huge_coefficients_saturate_instead_of_overflowing() {
        let cat = GridCatalog {
            plants: BTreeMap::from([(1, SourceType::Coal), (2, SourceType::Coal)]),
            ..GridCatalog::default()
        };
        let mut b = board();
        b.current_consumption = -5;
        b.connected_production = Some(BTreeMap::from([(1, i32::MAX), (2, i32::MAX)]));
        let r = round(1.0, 1e12, 1.0);

        let applied = resolve(&b, &r, &cat, &BuildingTable::default());
        assert_eq!(applied.production, i64::MAX);
        assert_eq!(applied.consumption, -5);
        assert_eq!(applied.balance(), i64::MAX);

        let negative = AppliedPower {
            production: i64::MIN,
            consumption: 1,
        };
        assert_eq!(negative.balance(), i64::MIN);
        assert_eq!(ScoreTable::default().points_for(negative.balance()), 0);
    }

    #[test]
    fn building_table_replace_bumps_version() {
        let mut t = BuildingTable::new(BTreeMap::new());
        assert_eq!(t.version, 1);
        t.replace(BTreeMap::from([(BuildingType::Farm, 90)]));
        assert_eq!(t.version, 2);
        assert_eq!(t.base(BuildingType::Farm), 90);
        assert_eq!(t.base(BuildingType::Stadium), 0);
    }
}
