//! The settlement entity.
//!
//! A settlement is created by the registry and mutated in three ways: by the
//! visitor router (tourist counts, inbound visits), by direct operations
//! (name, storage, spawning toggle, search radius) and by its own transit
//! facility. Every numeric rule is delegated to `railtown_logic::capacity`
//! so the formulas are shared with anything that only needs the numbers.

use std::collections::BTreeMap;

use railtown_logic::capacity;
use railtown_logic::config::{CapacityConfig, PlacementConfig, SettlementDefaults};
use railtown_logic::geometry::BlockPos;

use crate::error::StorageError;
use crate::history::{VisitHistory, VisitHistoryRecord};
use crate::ids::{SettlementId, VisitorId};
use crate::ledger::{ResourceKind, ResourceLedger};
use crate::platform::TransitFacility;
use crate::storage::{PortAccess, SettlementStorage, StoragePort, StorageTarget};

#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub(crate) id: SettlementId,
    pub(crate) position: BlockPos,
    pub(crate) name: String,
    pub(crate) population: u32,
    pub(crate) tourist_count: u32,
    pub(crate) tourists_received_counter: u32,
    pub(crate) tourist_spawning_enabled: bool,
    pub(crate) search_radius: i32,
    pub(crate) economy: ResourceLedger,
    pub(crate) storage: SettlementStorage,
    /// Inbound visits per origin settlement, all time.
    pub(crate) visitors: BTreeMap<SettlementId, u64>,
    pub(crate) history: VisitHistory,
    pub(crate) transit: TransitFacility,
}

impl Settlement {
    pub fn new(
        id: SettlementId,
        position: BlockPos,
        name: impl Into<String>,
        defaults: &SettlementDefaults,
    ) -> Self {
        Self {
            id,
            position,
            name: name.into(),
            population: defaults.starting_population,
            tourist_count: 0,
            tourists_received_counter: 0,
            tourist_spawning_enabled: defaults.tourist_spawning_enabled,
            search_radius: capacity::clamp_search_radius(defaults.search_radius),
            economy: ResourceLedger::new(),
            storage: SettlementStorage::new(),
            visitors: BTreeMap::new(),
            history: VisitHistory::new(),
            transit: TransitFacility::new(),
        }
    }

    pub fn id(&self) -> SettlementId {
        self.id
    }

    pub fn position(&self) -> BlockPos {
        self.position
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn population(&self) -> u32 {
        self.population
    }

    /// Overwrite the population, clamping into `0..=u32::MAX`.
    ///
    /// Shrinking the population also shrinks the tourist count to the new
    /// capacity so the capacity bound keeps holding.
    pub fn set_population(&mut self, population: i64, config: &CapacityConfig) {
        self.population = population.clamp(0, i64::from(u32::MAX)) as u32;
        self.tourist_count = self.tourist_count.min(self.max_tourists(config));
    }

    pub fn tourist_count(&self) -> u32 {
        self.tourist_count
    }

    pub fn tourists_received_counter(&self) -> u32 {
        self.tourists_received_counter
    }

    pub fn tourist_spawning_enabled(&self) -> bool {
        self.tourist_spawning_enabled
    }

    pub fn set_tourist_spawning_enabled(&mut self, enabled: bool) {
        self.tourist_spawning_enabled = enabled;
    }

    pub fn search_radius(&self) -> i32 {
        self.search_radius
    }

    /// Set the search radius, clamped to `1..=100`.
    pub fn set_search_radius(&mut self, radius: i32) {
        self.search_radius = capacity::clamp_search_radius(radius);
    }

    pub fn boundary_radius(&self, config: &PlacementConfig) -> u32 {
        capacity::boundary_radius(self.population, config)
    }

    // ---------------------------------------------------------------------
    // Tourists
    // ---------------------------------------------------------------------

    pub fn max_tourists(&self, config: &CapacityConfig) -> u32 {
        capacity::max_tourists(self.population, config)
    }

    pub fn can_spawn_tourists(&self, config: &CapacityConfig) -> bool {
        capacity::can_spawn_tourists(self.tourist_spawning_enabled, self.population, config)
    }

    pub fn can_add_more_tourists(&self, config: &CapacityConfig) -> bool {
        capacity::can_add_more_tourists(
            self.tourist_spawning_enabled,
            self.population,
            self.tourist_count,
            config,
        )
    }

    /// Take one tourist slot. Returns `false` (and changes nothing) when full.
    pub fn add_tourist(&mut self, config: &CapacityConfig) -> bool {
        if !self.can_add_more_tourists(config) {
            return false;
        }
        self.tourist_count += 1;
        true
    }

    /// Release one tourist slot. Returns `false` if none were taken.
    pub fn remove_tourist(&mut self) -> bool {
        if self.tourist_count == 0 {
            return false;
        }
        self.tourist_count -= 1;
        true
    }

    /// Count one inbound visitor from `origin`. Returns `true` if the population grew.
    pub fn add_visitor(&mut self, origin: SettlementId, config: &CapacityConfig) -> bool {
        *self.visitors.entry(origin).or_insert(0) += 1;

        let outcome =
            capacity::apply_visit(self.population, self.tourists_received_counter, config);
        self.population = outcome.population;
        self.tourists_received_counter = outcome.counter;
        outcome.grew
    }

    pub fn record_visit(
        &mut self,
        origin: SettlementId,
        count: u32,
        origin_pos: Option<BlockPos>,
        now: u64,
    ) {
        self.history.record(VisitHistoryRecord {
            timestamp: now,
            origin,
            count,
            origin_pos,
        });
    }

    pub fn visitors(&self) -> &BTreeMap<SettlementId, u64> {
        &self.visitors
    }

    pub fn history(&self) -> &VisitHistory {
        &self.history
    }

    // ---------------------------------------------------------------------
    // Economy and storage
    // ---------------------------------------------------------------------

    pub fn economy(&self) -> &ResourceLedger {
        &self.economy
    }

    pub fn economy_mut(&mut self) -> &mut ResourceLedger {
        &mut self.economy
    }

    pub fn storage(&self) -> &SettlementStorage {
        &self.storage
    }

    pub fn add_to_communal_storage(
        &mut self,
        kind: &ResourceKind,
        delta: i64,
    ) -> Result<u64, StorageError> {
        self.storage.add_to_communal(kind, delta)
    }

    pub fn add_to_personal_storage(
        &mut self,
        visitor: VisitorId,
        kind: &ResourceKind,
        delta: i64,
    ) -> Result<u64, StorageError> {
        self.storage.add_to_personal(visitor, kind, delta)
    }

    /// Port that can only take stock out of `target`.
    pub fn withdraw_port(&mut self, target: StorageTarget) -> StoragePort<'_> {
        self.storage.port(target, PortAccess::WithdrawOnly)
    }

    /// Port that can both deposit into and withdraw from `target`.
    pub fn read_write_port(&mut self, target: StorageTarget) -> StoragePort<'_> {
        self.storage.port(target, PortAccess::ReadWrite)
    }

    // ---------------------------------------------------------------------
    // Transit
    // ---------------------------------------------------------------------

    pub fn transit(&self) -> &TransitFacility {
        &self.transit
    }

    pub fn transit_mut(&mut self) -> &mut TransitFacility {
        &mut self.transit
    }
}
