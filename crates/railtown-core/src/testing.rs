//! In-memory host world for tests, benchmarks and the headless harness.

use std::collections::BTreeMap;

use railtown_logic::geometry::{BlockPos, BoundingVolume};

use crate::ids::{CarrierId, VisitorId};
use crate::world::{CarrierHandle, RouterCommand, WorldQuery};

/// A world with freely placed carriers, optional unloaded regions and
/// regions where nothing can spawn.
#[derive(Debug, Clone, Default)]
pub struct FakeWorld {
    carriers: BTreeMap<CarrierId, CarrierHandle>,
    passengers: BTreeMap<VisitorId, CarrierId>,
    next_carrier: u64,
    unloaded: Vec<BoundingVolume>,
    blocked: Vec<BoundingVolume>,
}

impl FakeWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an idle carrier and return its id.
    pub fn add_carrier(&mut self, position: BlockPos, seats: u32) -> CarrierId {
        let id = CarrierId(self.next_carrier);
        self.next_carrier += 1;
        self.carriers.insert(
            id,
            CarrierHandle {
                id,
                position,
                idle: true,
                free_seats: seats,
            },
        );
        id
    }

    /// Move a carrier. Moving marks it as no longer idle.
    pub fn move_carrier(&mut self, id: CarrierId, position: BlockPos) {
        if let Some(carrier) = self.carriers.get_mut(&id) {
            carrier.position = position;
            carrier.idle = false;
        }
    }

    pub fn set_idle(&mut self, id: CarrierId, idle: bool) {
        if let Some(carrier) = self.carriers.get_mut(&id) {
            carrier.idle = idle;
        }
    }

    pub fn remove_carrier(&mut self, id: CarrierId) {
        self.carriers.remove(&id);
        self.passengers.retain(|_, carrier| *carrier != id);
    }

    pub fn carrier(&self, id: CarrierId) -> Option<&CarrierHandle> {
        self.carriers.get(&id)
    }

    pub fn passengers_of(&self, id: CarrierId) -> usize {
        self.passengers.values().filter(|c| **c == id).count()
    }

    pub fn unload(&mut self, region: BoundingVolume) {
        self.unloaded.push(region);
    }

    pub fn load_all(&mut self) {
        self.unloaded.clear();
    }

    pub fn block_spawns(&mut self, region: BoundingVolume) {
        self.blocked.push(region);
    }

    /// Carry out router commands the way a host would.
    pub fn apply(&mut self, commands: &[RouterCommand]) {
        for command in commands {
            match *command {
                RouterCommand::SpawnVisitor { .. } => {}
                RouterCommand::Mount { visitor, carrier, .. } => {
                    if let Some(handle) = self.carriers.get_mut(&carrier) {
                        handle.free_seats = handle.free_seats.saturating_sub(1);
                        self.passengers.insert(visitor, carrier);
                    }
                }
                RouterCommand::Despawn { visitor, .. } => {
                    let Some(carrier) = self.passengers.remove(&visitor) else {
                        continue;
                    };
                    if let Some(handle) = self.carriers.get_mut(&carrier) {
                        handle.free_seats += 1;
                    }
                }
            }
        }
    }
}

impl WorldQuery for FakeWorld {
    fn find_carriers_near(&self, volume: &BoundingVolume) -> Vec<CarrierHandle> {
        self.carriers
            .values()
            .filter(|c| volume.contains(&c.position))
            .copied()
            .collect()
    }

    fn is_position_loaded(&self, pos: BlockPos) -> bool {
        !self.unloaded.iter().any(|region| region.contains(&pos))
    }

    fn find_spawn_position(&self, volume: &BoundingVolume) -> Option<BlockPos> {
        let center = volume.center();
        if self.blocked.iter().any(|region| region.contains(&center)) {
            return None;
        }
        Some(center)
    }

    fn carrier_position(&self, carrier: CarrierId) -> Option<BlockPos> {
        self.carriers.get(&carrier).map(|c| c.position)
    }
}
