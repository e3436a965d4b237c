//! Groups: independent tenants, each with its own boards and game.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tracing::info;

use crate::board::{BoardRegistry, GroupId};
use crate::error::GridResult;
use crate::game::{BuildingTable, BuildingType, GridCatalog, RoundOutcome, Scenario, ScenarioEngine};

/// Everything one group owns.
pub struct Group {
    id: GroupId,
    registry: BoardRegistry,
    engine: ScenarioEngine,
    catalog: Arc<GridCatalog>,
    building_table: RwLock<BuildingTable>,
}

impl Group {
    pub fn new(
        id: GroupId,
        history_capacity: usize,
        catalog: Arc<GridCatalog>,
        building_table: BuildingTable,
    ) -> Self {
        Self {
            registry: BoardRegistry::new(id.clone(), history_capacity),
            engine: ScenarioEngine::new(),
            id,
            catalog,
            building_table: RwLock::new(building_table),
        }
    }

    pub fn id(&self) -> &GroupId {
        &self.id
    }

    pub fn registry(&self) -> &BoardRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &ScenarioEngine {
        &self.engine
    }

    pub fn catalog(&self) -> &GridCatalog {
        &self.catalog
    }

    pub fn building_table(&self) -> BuildingTable {
        self.building_table.read().clone()
    }

    /// Replaces the base consumption table; returns the new version.
    pub fn replace_building_table(&self, base_consumption: BTreeMap<BuildingType, i32>) -> u32 {
        let mut table = self.building_table.write();
        table.replace(base_consumption);
        info!(group = %self.id, version = table.version, "building table replaced");
        table.version
    }

    pub fn start_game(&self, scenario: Arc<Scenario>) -> GridResult<()> {
        self.engine.start_game(scenario, &self.registry)
    }

    pub fn next_round(&self, expected: Option<i64>) -> GridResult<RoundOutcome> {
        let buildings = self.building_table();
        self.engine
            .next_round(expected, &self.registry, &self.catalog, &buildings)
    }

    pub fn end_game(&self) {
        self.engine.end_game(&self.registry);
    }
}

/// All groups, created on first use.
pub struct GroupStore {
    groups: RwLock<HashMap<GroupId, Arc<Group>>>,
    history_capacity: usize,
    catalog: Arc<GridCatalog>,
    base_consumption: BTreeMap<BuildingType, i32>,
}

impl GroupStore {
    pub fn new(
        history_capacity: usize,
        catalog: GridCatalog,
        base_consumption: BTreeMap<BuildingType, i32>,
    ) -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
            history_capacity,
            catalog: Arc::new(catalog),
            base_consumption,
        }
    }

    pub fn get(&self, id: &GroupId) -> Option<Arc<Group>> {
        self.groups.read().get(id).cloned()
    }

    pub fn get_or_create(&self, id: &GroupId) -> Arc<Group> {
        if let Some(group) = self.get(id) {
            return group;
        }
        let mut groups = self.groups.write();
        let group = groups.entry(id.clone()).or_insert_with(|| {
            info!(group = %id, "group created");
            Arc::new(Group::new(
                id.clone(),
                self.history_capacity,
                Arc::clone(&self.catalog),
                BuildingTable::new(self.base_consumption.clone()),
            ))
        });
        Arc::clone(group)
    }

    /// Building table of `id`, or the configured initial table for a group
    /// that does not exist yet. Never creates the group.
    pub fn building_table(&self, id: &GroupId) -> BuildingTable {
        match self.get(id) {
            Some(group) => group.building_table(),
            None => BuildingTable::new(self.base_consumption.clone()),
        }
    }

    /// Group ids in sorted order.
    pub fn ids(&self) -> Vec<GroupId> {
        let mut ids: Vec<GroupId> = self.groups.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Marks stale boards in every group; returns how many went stale.
    pub fn sweep_stale(&self, ttl: Duration, now: DateTime<Utc>) -> usize {
        let groups: Vec<Arc<Group>> = self.groups.read().values().cloned().collect();
        groups
            .iter()
            .map(|g| g.registry().sweep_stale(ttl, now))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardId;

    fn store() -> GroupStore {
        GroupStore::new(
            4,
            GridCatalog::default(),
            BTreeMap::from([(BuildingType::School, 120)]),
        )
    }

    #[test]
    fn groups_are_created_once_and_isolated() {
        let s = store();
        let a = s.get_or_create(&GroupId::from("a"));
        let again = s.get_or_create(&GroupId::from("a"));
        assert!(Arc::ptr_eq(&a, &again));

        a.registry().register(BoardId::from("b1"), None, None, Utc::now());
        let b = s.get_or_create(&GroupId::from("b"));
        assert!(b.registry().is_empty());
        assert_eq!(s.ids(), vec![GroupId::from("a"), GroupId::from("b")]);
        assert!(s.get(&GroupId::from("c")).is_none());
    }

    #[test]
    fn building_table_is_per_group() {
        let s = store();
        let a = s.get_or_create(&GroupId::from("a"));
        let b = s.get_or_create(&GroupId::from("b"));
        assert_eq!(a.building_table().base(BuildingType::School), 120);

        let version = a.replace_building_table(BTreeMap::from([(BuildingType::School, 10)]));
        assert_eq!(version, 2);
        assert_eq!(a.building_table().base(BuildingType::School), 10);
        assert_eq!(b.building_table().version, 1);
    }

    #[test]
    fn reading_the_building_table_does_not_create_groups() {
        let s = store();
        let table = s.building_table(&GroupId::from("a"));
        assert_eq!(table.version, 1);
        assert_eq!(table.base(BuildingType::School), 120);
        assert!(s.ids().is_empty());

        s.get_or_create(&GroupId::from("a"))
            .replace_building_table(BTreeMap::from([(BuildingType::School, 7)]));
        assert_eq!(s.building_table(&GroupId::from("a")).version, 2);
        assert_eq!(s.ids(), vec![GroupId::from("a")]);
    }

    #[test]
    fn sweep_covers_all_groups() {
        let s = store();
        let t0 = Utc::now();
        for g in ["a", "b"] {
            s.get_or_create(&GroupId::from(g))
                .registry()
                .register(BoardId::from("x"), None, None, t0);
        }
        assert_eq!(s.sweep_stale(Duration::seconds(10), t0 + Duration::seconds(11)), 2);
    }
}
