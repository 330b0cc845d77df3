//! Interfaces to the host world.
//!
//! The router never touches world state itself. It asks a [`WorldQuery`]
//! what is where, and hands back [`RouterCommand`]s describing what the host
//! should do to its own entities.

use railtown_logic::geometry::{BlockPos, BoundingVolume};
use serde::{Deserialize, Serialize};

use crate::ids::{CarrierId, SettlementId, VisitorId};

/// A transport carrier as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierHandle {
    pub id: CarrierId,
    pub position: BlockPos,
    /// Stopped and accepting passengers.
    pub idle: bool,
    pub free_seats: u32,
}

/// Read-only questions the engine asks the host world.
pub trait WorldQuery {
    /// Carriers currently inside `volume`.
    fn find_carriers_near(&self, volume: &BoundingVolume) -> Vec<CarrierHandle>;

    fn is_position_loaded(&self, pos: BlockPos) -> bool;

    /// A free spot inside `volume` where a visitor can stand, if there is one.
    fn find_spawn_position(&self, volume: &BoundingVolume) -> Option<BlockPos>;

    /// Where a carrier is now. `None` once the host no longer knows it.
    fn carrier_position(&self, carrier: CarrierId) -> Option<BlockPos>;
}

/// Why a visitor left the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DespawnReason {
    Arrived,
    NoCarrier,
    TransitTimeout,
    CarrierLost,
    SettlementGone,
    /// The host world is shutting down.
    Unloaded,
}

/// Side effect the host applies to its own entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouterCommand {
    SpawnVisitor {
        visitor: VisitorId,
        origin: SettlementId,
        position: BlockPos,
    },
    Mount {
        visitor: VisitorId,
        carrier: CarrierId,
        destination: SettlementId,
    },
    Despawn {
        visitor: VisitorId,
        reason: DespawnReason,
    },
}
