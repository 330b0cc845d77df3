//! Visitor router.
//!
//! In-flight visitors are entities in a private `hecs` world. Two cadences
//! drive them: [`VisitorRouter::spawn_visitors`] places new visitors on
//! usable platforms, and [`VisitorRouter::scan`] mounts waiting visitors
//! onto idle carriers, follows carriers out of the boarding zone and settles
//! arrivals at their destination.
//!
//! Moving a visitor from one settlement to another is two separate
//! single-settlement updates: the origin releases a tourist slot and the
//! destination counts a visitor. Nothing makes the pair atomic.

mod boarding;
mod components;
pub mod destination;
mod spawn;
mod transit;

pub use components::{Boarding, TransitLeg, Visitor, VisitorState};

use hecs::{Entity, World};
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use railtown_logic::config::RouterConfig;
use serde::{Deserialize, Serialize};

use crate::ids::{CarrierId, PlatformId, SettlementId, VisitorId};
use crate::registry::SettlementRegistry;
use crate::world::{DespawnReason, RouterCommand, WorldQuery};

/// Running totals since the router was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterStats {
    pub spawned: u64,
    pub mounted: u64,
    pub departed: u64,
    pub arrived: u64,
    pub discarded: u64,
}

/// One visitor as seen from outside the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorSnapshot {
    pub id: VisitorId,
    pub origin: SettlementId,
    pub platform: PlatformId,
    pub state: VisitorState,
    pub carrier: Option<CarrierId>,
    pub destination: Option<SettlementId>,
}

pub struct VisitorRouter {
    world: World,
    config: RouterConfig,
    next_visitor_id: u64,
    rng: StdRng,
    commands: Vec<RouterCommand>,
    stats: RouterStats,
}

impl VisitorRouter {
    pub fn new(config: RouterConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            world: World::new(),
            config,
            next_visitor_id: 0,
            rng,
            commands: Vec::new(),
            stats: RouterStats::default(),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    /// Visitors currently tracked, in any state.
    pub fn visitor_count(&self) -> usize {
        self.world.len() as usize
    }

    pub fn count_in_state(&self, state: VisitorState) -> usize {
        self.world
            .query::<&VisitorState>()
            .iter()
            .filter(|(_, s)| **s == state)
            .count()
    }

    /// Every tracked visitor, ordered by id.
    pub fn visitors(&self) -> Vec<VisitorSnapshot> {
        let mut out: Vec<VisitorSnapshot> = self
            .world
            .query::<(&Visitor, &VisitorState, Option<&Boarding>)>()
            .iter()
            .map(|(_, (visitor, state, boarding))| VisitorSnapshot {
                id: visitor.id,
                origin: visitor.origin,
                platform: visitor.platform,
                state: *state,
                carrier: boarding.map(|b| b.carrier),
                destination: boarding.map(|b| b.destination),
            })
            .collect();
        out.sort_by_key(|v| v.id);
        out
    }

    /// Commands for the host, oldest first.
    pub fn drain_commands(&mut self) -> Vec<RouterCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Run one carrier scan: board, advance, then settle arrivals.
    pub fn scan<Q: WorldQuery + ?Sized>(
        &mut self,
        registry: &mut SettlementRegistry,
        query: &Q,
        now: u64,
    ) {
        self.board_visitors(registry, query, now);
        self.advance_transit(registry, query, now);
        self.settle_arrivals(registry, now);
    }

    /// Drop every tracked visitor, releasing their origin slots.
    pub fn discard_all(&mut self, registry: &mut SettlementRegistry) {
        let all: Vec<(Entity, Visitor)> = self
            .world
            .query::<&Visitor>()
            .iter()
            .map(|(entity, visitor)| (entity, *visitor))
            .collect();
        for (entity, visitor) in all {
            self.discard(registry, entity, &visitor, DespawnReason::Unloaded);
        }
    }

    fn discard(
        &mut self,
        registry: &mut SettlementRegistry,
        entity: Entity,
        visitor: &Visitor,
        reason: DespawnReason,
    ) {
        self.despawn_entity(entity, visitor.id);
        release_slot(registry, visitor.origin, 1);
        self.commands.push(RouterCommand::Despawn {
            visitor: visitor.id,
            reason,
        });
        self.stats.discarded += 1;
        debug!("Discarded {} from {}: {:?}", visitor.id, visitor.origin, reason);
    }

    fn despawn_entity(&mut self, entity: Entity, visitor: VisitorId) {
        if self.world.despawn(entity).is_err() {
            debug!("{} was already untracked", visitor);
        }
    }

    fn set_state(&mut self, entity: Entity, state: VisitorState) {
        if let Ok(mut current) = self.world.get::<&mut VisitorState>(entity) {
            *current = state;
        }
    }
}

/// Give `count` tourist slots back to their origin, if it still exists.
fn release_slot(registry: &mut SettlementRegistry, origin: SettlementId, count: usize) {
    if !registry.contains(origin) {
        return;
    }
    let _ = registry.update(origin, |settlement, _| {
        for _ in 0..count {
            settlement.remove_tourist();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeWorld;
    use railtown_logic::config::TownConfig;
    use railtown_logic::geometry::{BlockPos, BoundingVolume};

    struct Scenario {
        registry: SettlementRegistry,
        router: VisitorRouter,
        world: FakeWorld,
        home: SettlementId,
        away: SettlementId,
    }

    fn scenario(tweak: impl FnOnce(&mut TownConfig)) -> Scenario {
        let mut config = TownConfig::default();
        config.settlement.starting_population = 20;
        config.router.visitors_per_spawn = 2;
        tweak(&mut config);

        let router = VisitorRouter::new(config.router.clone());
        let mut registry = SettlementRegistry::new(config);
        let home = registry.register(BlockPos::new(0, 64, 0), "Home").unwrap();
        let away = registry.register(BlockPos::new(200, 64, 0), "Away").unwrap();
        for (id, x) in [(home, 0), (away, 200)] {
            let p = registry.add_platform(id).unwrap();
            registry
                .set_platform_path(id, p, BlockPos::new(x, 64, 0), BlockPos::new(x + 8, 64, 0))
                .unwrap();
        }
        // only Home sends visitors unless a test says otherwise
        registry
            .update(away, |s, _| s.set_tourist_spawning_enabled(false))
            .unwrap();
        Scenario {
            registry,
            router,
            world: FakeWorld::new(),
            home,
            away,
        }
    }

    impl Scenario {
        fn scan(&mut self, now: u64) {
            self.router.scan(&mut self.registry, &self.world, now);
            let commands = self.router.drain_commands();
            self.world.apply(&commands);
        }

        fn tourists(&self) -> u32 {
            self.registry.get(self.home).unwrap().tourist_count()
        }
    }

    #[test]
    fn test_full_journey() {
        let mut s = scenario(|_| {});
        assert_eq!(s.router.spawn_visitors(&mut s.registry, &s.world, 0), 2);
        assert_eq!(s.tourists(), 2);
        assert_eq!(s.router.count_in_state(VisitorState::Spawned), 2);

        let carrier = s.world.add_carrier(BlockPos::new(4, 64, 0), 4);
        s.scan(1);
        assert_eq!(s.router.count_in_state(VisitorState::Mounted), 2);
        assert_eq!(s.world.passengers_of(carrier), 2);
        assert!(s.router.visitors().iter().all(|v| v.destination == Some(s.away)));

        s.world.move_carrier(carrier, BlockPos::new(100, 64, 0));
        s.scan(2);
        assert_eq!(s.router.count_in_state(VisitorState::InTransit), 2);

        s.world.move_carrier(carrier, BlockPos::new(204, 64, 0));
        s.scan(3);
        assert_eq!(s.router.visitor_count(), 0);
        assert_eq!(s.tourists(), 0);

        let away = s.registry.get(s.away).unwrap();
        assert_eq!(away.visitors().get(&s.home), Some(&2));
        assert_eq!(away.tourists_received_counter(), 2);
        let record = away.history().latest().unwrap();
        assert_eq!(record.count, 2);
        assert_eq!(record.timestamp, 3);
        assert_eq!(record.origin_pos, Some(BlockPos::new(0, 64, 0)));

        let stats = s.router.stats();
        assert_eq!((stats.spawned, stats.mounted, stats.departed, stats.arrived), (2, 2, 2, 2));
        assert_eq!(stats.discarded, 0);
        assert_eq!(s.world.passengers_of(carrier), 0);
    }

    #[test]
    fn test_spawn_rechecks_capacity_across_platforms() {
        let mut s = scenario(|c| c.router.visitors_per_spawn = 5);
        let extra = s.registry.add_platform(s.home).unwrap();
        s.registry
            .set_platform_path(s.home, extra, BlockPos::new(0, 64, 30), BlockPos::new(8, 64, 30))
            .unwrap();

        // population 20 allows two tourists
        assert_eq!(s.router.spawn_visitors(&mut s.registry, &s.world, 0), 2);
        assert_eq!(s.router.spawn_visitors(&mut s.registry, &s.world, 1), 0);
        assert_eq!(s.tourists(), 2);
    }

    #[test]
    fn test_spawn_skips_disabled_and_unloaded() {
        let mut s = scenario(|_| {});
        s.registry
            .update(s.home, |t, _| t.set_tourist_spawning_enabled(false))
            .unwrap();
        s.registry
            .update(s.away, |t, _| t.set_tourist_spawning_enabled(true))
            .unwrap();
        s.world
            .unload(BoundingVolume::around(BlockPos::new(204, 64, 0), 30));
        assert_eq!(s.router.spawn_visitors(&mut s.registry, &s.world, 0), 0);

        s.world.load_all();
        assert_eq!(s.router.spawn_visitors(&mut s.registry, &s.world, 0), 2);
        let origins: Vec<SettlementId> = s.router.visitors().iter().map(|v| v.origin).collect();
        assert_eq!(origins, vec![s.away, s.away]);
    }

    #[test]
    fn test_awaiting_timeout_releases_slot() {
        let mut s = scenario(|c| c.router.awaiting_timeout_ticks = 10);
        s.router.spawn_visitors(&mut s.registry, &s.world, 0);
        s.scan(9);
        assert_eq!(s.router.count_in_state(VisitorState::AwaitingCarrier), 2);

        s.scan(10);
        assert_eq!(s.router.visitor_count(), 0);
        assert_eq!(s.tourists(), 0);
        assert_eq!(s.router.stats().discarded, 2);
    }

    #[test]
    fn test_unloaded_spawn_stays_spawned() {
        let mut s = scenario(|_| {});
        s.router.spawn_visitors(&mut s.registry, &s.world, 0);
        s.world.unload(BoundingVolume::around(BlockPos::new(4, 64, 0), 2));
        s.world.add_carrier(BlockPos::new(4, 64, 0), 4);
        s.scan(1);
        assert_eq!(s.router.count_in_state(VisitorState::Spawned), 2);
    }

    #[test]
    fn test_carrier_seats_limit_mounting() {
        let mut s = scenario(|_| {});
        s.router.spawn_visitors(&mut s.registry, &s.world, 0);
        s.world.add_carrier(BlockPos::new(4, 64, 0), 1);
        s.scan(1);
        assert_eq!(s.router.count_in_state(VisitorState::Mounted), 1);
        assert_eq!(s.router.count_in_state(VisitorState::AwaitingCarrier), 1);
    }

    #[test]
    fn test_busy_carrier_ignored() {
        let mut s = scenario(|_| {});
        s.router.spawn_visitors(&mut s.registry, &s.world, 0);
        let carrier = s.world.add_carrier(BlockPos::new(4, 64, 0), 4);
        s.world.set_idle(carrier, false);
        s.scan(1);
        assert_eq!(s.router.count_in_state(VisitorState::Mounted), 0);
    }

    #[test]
    fn test_no_destination_keeps_waiting() {
        let mut s = scenario(|_| {});
        s.registry.remove(s.away).unwrap();
        s.router.spawn_visitors(&mut s.registry, &s.world, 0);
        s.world.add_carrier(BlockPos::new(4, 64, 0), 4);
        s.scan(1);
        assert_eq!(s.router.count_in_state(VisitorState::AwaitingCarrier), 2);
    }

    #[test]
    fn test_lost_carrier_discards() {
        let mut s = scenario(|_| {});
        s.router.spawn_visitors(&mut s.registry, &s.world, 0);
        let carrier = s.world.add_carrier(BlockPos::new(4, 64, 0), 4);
        s.scan(1);
        s.world.remove_carrier(carrier);
        s.scan(2);

        assert_eq!(s.router.visitor_count(), 0);
        assert_eq!(s.tourists(), 0);
        assert_eq!(s.router.stats().discarded, 2);
    }

    #[test]
    fn test_destination_removed_in_transit() {
        let mut s = scenario(|_| {});
        s.router.spawn_visitors(&mut s.registry, &s.world, 0);
        let carrier = s.world.add_carrier(BlockPos::new(4, 64, 0), 4);
        s.scan(1);
        s.world.move_carrier(carrier, BlockPos::new(100, 64, 0));
        s.scan(2);

        s.registry.remove(s.away).unwrap();
        s.scan(3);
        assert_eq!(s.router.visitor_count(), 0);
        assert_eq!(s.tourists(), 0);
    }

    #[test]
    fn test_transit_timeout() {
        let mut s = scenario(|c| c.router.in_transit_timeout_ticks = 50);
        s.router.spawn_visitors(&mut s.registry, &s.world, 0);
        let carrier = s.world.add_carrier(BlockPos::new(4, 64, 0), 4);
        s.scan(1);
        s.world.move_carrier(carrier, BlockPos::new(100, 64, 0));
        s.scan(2);
        s.scan(50);
        assert_eq!(s.router.count_in_state(VisitorState::InTransit), 2);
        s.scan(51);
        assert_eq!(s.router.visitor_count(), 0);
    }

    #[test]
    fn test_discard_all() {
        let mut s = scenario(|_| {});
        s.router.spawn_visitors(&mut s.registry, &s.world, 0);
        s.router.drain_commands();
        s.router.discard_all(&mut s.registry);

        assert_eq!(s.router.visitor_count(), 0);
        assert_eq!(s.tourists(), 0);
        let commands = s.router.drain_commands();
        assert_eq!(commands.len(), 2);
        assert!(commands.iter().all(|c| matches!(
            c,
            RouterCommand::Despawn {
                reason: DespawnReason::Unloaded,
                ..
            }
        )));
    }

    #[test]
    fn test_despawning_untracked_visitor_is_harmless() {
        let mut router = VisitorRouter::new(RouterConfig::default());
        let entity = router.world.spawn((VisitorState::Spawned,));
        router.despawn_entity(entity, VisitorId(0));
        router.despawn_entity(entity, VisitorId(0));
        assert_eq!(router.visitor_count(), 0);
        assert!(router.drain_commands().is_empty());
    }
}
