//! End-to-end routing through the engine tick loop against a fake host world.
//!
//! Exercises: spawn cadence → boarding → departure → arrival → growth,
//! plus world lifecycle, change notifications and flush rate limiting.

use railtown_core::prelude::*;
use railtown_core::testing::FakeWorld;
use railtown_logic::config::DestinationPolicy;

// ── Helpers ────────────────────────────────────────────────────────────

/// Every system on every tick.
fn fast_config() -> TownConfig {
    let mut config = TownConfig::default();
    config.router.spawn_interval_ticks = 1;
    config.router.mount_interval_ticks = 1;
    config.router.mount_offset_ticks = 0;
    config.settlement.starting_population = 20;
    config
}

fn add_station(engine: &mut TownEngine, id: SettlementId, x: i32) -> PlatformId {
    let registry = engine.registry_mut();
    let platform = registry.add_platform(id).unwrap();
    registry
        .set_platform_path(id, platform, BlockPos::new(x, 64, 0), BlockPos::new(x + 8, 64, 0))
        .unwrap();
    platform
}

fn tick(engine: &mut TownEngine, world: &mut FakeWorld) -> TickReport {
    let report = engine.tick(&*world);
    let commands = engine.drain_commands();
    world.apply(&commands);
    report
}

/// Shuttle one carrier between two stations until `trips` round trips are done.
fn run_shuttle(engine: &mut TownEngine, world: &mut FakeWorld, a_x: i32, b_x: i32, trips: usize) {
    let carrier = world.add_carrier(BlockPos::new(a_x + 4, 64, 0), 8);
    for _ in 0..trips {
        for x in [a_x + 4, (a_x + b_x) / 2, b_x + 4, (a_x + b_x) / 2] {
            world.move_carrier(carrier, BlockPos::new(x, 64, 0));
            world.set_idle(carrier, x == a_x + 4 || x == b_x + 4);
            tick(engine, world);
        }
    }
}

// ── Routing ────────────────────────────────────────────────────────────

#[test]
fn visitors_travel_and_grow_destination() {
    let mut engine = TownEngine::new(fast_config());
    let home = engine.registry_mut().register(BlockPos::new(0, 64, 0), "Home").unwrap();
    let away = engine.registry_mut().register(BlockPos::new(400, 64, 0), "Away").unwrap();
    add_station(&mut engine, home, 0);
    add_station(&mut engine, away, 400);
    engine
        .registry_mut()
        .update(away, |s, _| s.set_tourist_spawning_enabled(false))
        .unwrap();

    let mut world = FakeWorld::new();
    run_shuttle(&mut engine, &mut world, 0, 400, 5);

    let registry = engine.registry();
    let away_town = registry.get(away).unwrap();
    let arrived = engine.router().stats().arrived;
    assert!(arrived >= 5, "only {arrived} visitors arrived");
    assert_eq!(away_town.visitors().get(&home).copied(), Some(arrived));
    assert_eq!(u64::from(away_town.population()), 20 + arrived / 5);
    assert!(away_town.history().iter().all(|r| r.origin == home));
    assert!(registry.get(home).unwrap().tourist_count() <= 2);
}

#[test]
fn spawn_and_scan_follow_cadence() {
    let mut config = fast_config();
    config.router.spawn_interval_ticks = 10;
    config.router.spawn_offset_ticks = 3;
    config.router.mount_interval_ticks = 5;
    config.router.mount_offset_ticks = 1;
    let mut engine = TownEngine::new(config);
    let home = engine.registry_mut().register(BlockPos::new(0, 64, 0), "Home").unwrap();
    add_station(&mut engine, home, 0);

    let mut world = FakeWorld::new();
    let mut spawn_ticks = Vec::new();
    let mut scan_ticks = Vec::new();
    for _ in 0..20 {
        let report = tick(&mut engine, &mut world);
        if report.spawned > 0 {
            spawn_ticks.push(report.tick);
        }
        if report.scanned {
            scan_ticks.push(report.tick);
        }
    }
    assert_eq!(spawn_ticks, vec![3, 13]);
    assert_eq!(scan_ticks, vec![1, 6, 11, 16]);
}

#[test]
fn restricted_platform_only_reaches_allowed_destination() {
    let mut engine = TownEngine::new(fast_config());
    let home = engine.registry_mut().register(BlockPos::new(0, 64, 0), "Home").unwrap();
    let near = engine.registry_mut().register(BlockPos::new(100, 64, 0), "Near").unwrap();
    let far = engine.registry_mut().register(BlockPos::new(600, 64, 0), "Far").unwrap();
    let platform = add_station(&mut engine, home, 0);
    engine
        .registry_mut()
        .set_destination_enabled(home, platform, far, true)
        .unwrap();

    let mut world = FakeWorld::new();
    world.add_carrier(BlockPos::new(4, 64, 0), 8);
    tick(&mut engine, &mut world);

    let visitors = engine.router().visitors();
    assert!(!visitors.is_empty());
    assert!(visitors
        .iter()
        .filter(|v| v.origin == home)
        .all(|v| v.destination == Some(far)));
    assert!(visitors.iter().all(|v| v.destination != Some(near) || v.origin != home));
}

#[test]
fn random_policy_is_replayable() {
    let run = || {
        let mut config = fast_config();
        config.router.destination_policy = DestinationPolicy::Random;
        config.router.seed = 99;
        let mut engine = TownEngine::new(config);
        let home = engine.registry_mut().register(BlockPos::new(0, 64, 0), "Home").unwrap();
        for x in [200, 400, 600] {
            let id = engine.registry_mut().register(BlockPos::new(x, 64, 0), "T").unwrap();
            engine
                .registry_mut()
                .update(id, |s, _| s.set_tourist_spawning_enabled(false))
                .unwrap();
        }
        add_station(&mut engine, home, 0);

        let mut world = FakeWorld::new();
        world.add_carrier(BlockPos::new(4, 64, 0), 8);
        tick(&mut engine, &mut world);
        engine
            .router()
            .visitors()
            .iter()
            .map(|v| v.destination)
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn ghost_towns_are_cleared() {
    let mut config = fast_config();
    config.router.ghost_cleanup_interval_ticks = 4;
    let mut engine = TownEngine::new(config);
    let a = engine.registry_mut().register(BlockPos::new(0, 64, 0), "A").unwrap();
    let b = engine.registry_mut().register(BlockPos::new(200, 64, 0), "B").unwrap();

    let mut world = FakeWorld::new();
    tick(&mut engine, &mut world);
    engine
        .registry_mut()
        .update(b, |s, c| s.set_population(0, &c.capacity))
        .unwrap();
    for _ in 0..4 {
        tick(&mut engine, &mut world);
    }
    assert!(engine.registry().get(a).is_some());
    assert!(engine.registry().get(b).is_none());
}

// ── Lifecycle & notifications ──────────────────────────────────────────

#[test]
fn unload_releases_in_flight_visitors() {
    let mut config = fast_config();
    config.router.visitors_per_spawn = 2;
    let mut context = SimulationContext::new(config);
    let engine = context.on_world_load("minecraft:overworld", None).unwrap();
    let home = engine.registry_mut().register(BlockPos::new(0, 64, 0), "Home").unwrap();
    engine.registry_mut().register(BlockPos::new(300, 64, 0), "Away").unwrap();
    add_station(engine, home, 0);

    let world = FakeWorld::new();
    engine.tick(&world);
    assert_eq!(engine.registry().get(home).unwrap().tourist_count(), 2);

    let snapshot = context.on_world_unload("minecraft:overworld").unwrap();
    let engine = context
        .on_world_load("minecraft:overworld", Some(&snapshot))
        .unwrap();
    assert_eq!(engine.registry().get(home).unwrap().tourist_count(), 0);
    assert_eq!(engine.router().visitor_count(), 0);
    assert_eq!(engine.registry().get(home).unwrap().transit().len(), 1);
}

#[test]
fn restored_snapshot_lets_spawning_resume() {
    let mut config = fast_config();
    config.router.visitors_per_spawn = 2;
    let mut engine = TownEngine::new(config.clone());
    let home = engine.registry_mut().register(BlockPos::new(0, 64, 0), "Home").unwrap();
    engine.registry_mut().register(BlockPos::new(300, 64, 0), "Away").unwrap();
    add_station(&mut engine, home, 0);

    let mut world = FakeWorld::new();
    tick(&mut engine, &mut world);
    assert_eq!(engine.registry().get(home).unwrap().tourist_count(), 2);

    // Periodic flush taken while visitors are still waiting
    let snapshot = engine.snapshot();
    let mut restored = TownEngine::from_snapshot(config, &snapshot).unwrap();
    assert_eq!(restored.registry().get(home).unwrap().tourist_count(), 0);
    assert_eq!(restored.router().visitor_count(), 0);

    let report = tick(&mut restored, &mut world);
    assert_eq!(report.spawned, 2);
    assert_eq!(restored.registry().get(home).unwrap().tourist_count(), 2);
}

#[test]
fn changes_and_flushes_are_reported() {
    let mut config = fast_config();
    config.persistence.dirty_cooldown_ticks = 10;
    let mut engine = TownEngine::new(config);
    let home = engine.registry_mut().register(BlockPos::new(0, 64, 0), "Home").unwrap();
    add_station(&mut engine, home, 0);

    let changes = engine.registry_mut().drain_changes();
    assert_eq!(
        changes,
        vec![TownChange::Registered(home), TownChange::PlatformsChanged(home)]
    );

    let mut world = FakeWorld::new();
    let mut flushes = Vec::new();
    for _ in 0..25 {
        tick(&mut engine, &mut world);
        let now = engine.registry().clock();
        if engine.registry_mut().take_flush() {
            flushes.push(now);
        }
        engine.registry_mut().mark_dirty();
    }
    assert_eq!(flushes, vec![0, 10, 20]);
}
