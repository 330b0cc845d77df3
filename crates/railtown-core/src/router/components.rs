//! Components attached to visitor entities.
//!
//! Components are pure data; the router's systems move visitors between states.

use railtown_logic::geometry::{BlockPos, BoundingVolume};
use serde::{Deserialize, Serialize};

use crate::ids::{CarrierId, PlatformId, SettlementId, VisitorId};

/// Identity and origin of a visitor. Present for the visitor's whole life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visitor {
    pub id: VisitorId,
    pub origin: SettlementId,
    /// Origin settlement position, kept for the destination's history.
    pub origin_pos: BlockPos,
    pub platform: PlatformId,
    pub spawn_pos: BlockPos,
    pub spawned_at: u64,
}

/// Lifecycle: `Spawned → AwaitingCarrier → Mounted → InTransit → Arrived`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VisitorState {
    /// Placed by the host, spawn chunk not yet confirmed loaded.
    Spawned,
    AwaitingCarrier,
    /// Seated on a carrier that has not yet left the platform.
    Mounted,
    InTransit,
    Arrived,
}

impl VisitorState {
    pub fn is_waiting(&self) -> bool {
        matches!(self, VisitorState::Spawned | VisitorState::AwaitingCarrier)
    }

    pub fn is_aboard(&self) -> bool {
        matches!(self, VisitorState::Mounted | VisitorState::InTransit)
    }
}

/// Added when a visitor mounts a carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boarding {
    pub carrier: CarrierId,
    pub destination: SettlementId,
    pub mounted_at: u64,
    /// Platform volume the carrier was found in.
    pub zone: BoundingVolume,
}

/// Added once the carrier has left the boarding zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitLeg {
    pub departed_at: u64,
}
