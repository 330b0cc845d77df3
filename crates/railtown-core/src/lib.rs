//! Railtown Core - Settlement Simulation Engine
//!
//! Settlements with a population, resource ledgers and storage, connected by
//! platforms where visitors wait for transport carriers. Visitors travel from
//! one settlement to another and every arrival nudges the destination's
//! population upward.
//!
//! # Architecture
//!
//! - **Registry**: owns the settlements of one host world, validates
//!   placement, queues change notifications and tracks snapshot flushes
//! - **Settlements**: population, tourists, storage, visit history, platforms
//! - **Router**: in-flight visitors are `hecs` entities moved through
//!   `Spawned → AwaitingCarrier → Mounted → InTransit → Arrived` by systems
//! - **Persistence**: settlements map to and from a `serde_json::Value` tag tree
//!
//! The host world is only seen through [`world::WorldQuery`]; anything the
//! host has to do is handed back as [`world::RouterCommand`]s.
//!
//! # Example
//!
//! ```rust
//! use railtown_core::prelude::*;
//! use railtown_core::testing::FakeWorld;
//!
//! let mut config = TownConfig::default();
//! config.router.spawn_interval_ticks = 1;
//! config.router.mount_interval_ticks = 1;
//! config.router.mount_offset_ticks = 0;
//!
//! let mut engine = TownEngine::new(config);
//! let home = engine.registry_mut().register(BlockPos::new(0, 64, 0), "Home").unwrap();
//! engine.registry_mut().register(BlockPos::new(200, 64, 0), "Away").unwrap();
//!
//! let platform = engine.registry_mut().add_platform(home).unwrap();
//! engine
//!     .registry_mut()
//!     .set_platform_path(home, platform, BlockPos::new(0, 64, 0), BlockPos::new(8, 64, 0))
//!     .unwrap();
//!
//! let world = FakeWorld::new();
//! let report = engine.tick(&world);
//! assert_eq!(report.spawned, 1);
//! assert_eq!(engine.registry().get(home).unwrap().tourist_count(), 1);
//! ```

pub mod engine;
pub mod error;
pub mod history;
pub mod ids;
pub mod ledger;
pub mod persistence;
pub mod platform;
pub mod registry;
pub mod router;
pub mod settlement;
pub mod storage;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod world;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::engine::{SimulationContext, TickReport, TownEngine};
    pub use crate::error::{PersistenceError, PlacementError, StorageError, TownError};
    pub use crate::ids::{CarrierId, PlatformId, SettlementId, VisitorId};
    pub use crate::ledger::{ResourceKind, ResourceLedger};
    pub use crate::registry::{SettlementRegistry, SettlementSummary, TownChange};
    pub use crate::router::{RouterStats, VisitorRouter, VisitorState};
    pub use crate::settlement::Settlement;
    pub use crate::storage::StorageTarget;
    pub use crate::world::{CarrierHandle, DespawnReason, RouterCommand, WorldQuery};
    pub use railtown_logic::config::TownConfig;
    pub use railtown_logic::geometry::{BlockPos, BoundingVolume};
}
