//! Engine tick loop and per-world lifecycle.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use log::{info, warn};
use railtown_logic::cadence::Cadence;
use railtown_logic::config::{validate_config, TownConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PersistenceError;
use crate::ids::SettlementId;
use crate::persistence;
use crate::registry::SettlementRegistry;
use crate::router::VisitorRouter;
use crate::world::{RouterCommand, WorldQuery};

/// What ran during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    pub spawned: u32,
    pub scanned: bool,
    pub ghosts_removed: Vec<SettlementId>,
}

/// Settlements and in-flight visitors of one host world.
pub struct TownEngine {
    registry: SettlementRegistry,
    router: VisitorRouter,
    tick: u64,
    spawn: Cadence,
    scan: Cadence,
    ghost_cleanup: Cadence,
}

impl TownEngine {
    pub fn new(config: TownConfig) -> Self {
        for problem in validate_config(&config) {
            warn!("Config problem: {}", problem);
        }
        let router_config = &config.router;
        let spawn = Cadence::new(router_config.spawn_interval_ticks, router_config.spawn_offset_ticks);
        let scan = Cadence::new(router_config.mount_interval_ticks, router_config.mount_offset_ticks);
        let ghost_cleanup = Cadence::new(router_config.ghost_cleanup_interval_ticks, 0);
        let router = VisitorRouter::new(config.router.clone());

        Self {
            registry: SettlementRegistry::new(config),
            router,
            tick: 0,
            spawn,
            scan,
            ghost_cleanup,
        }
    }

    /// Engine restored from a registry snapshot.
    ///
    /// In-flight visitors are not part of a snapshot and the router starts
    /// empty, so every tourist slot the snapshot still holds is released.
    pub fn from_snapshot(config: TownConfig, snapshot: &Value) -> Result<Self, PersistenceError> {
        let mut engine = Self::new(config);
        persistence::load_registry(&mut engine.registry, snapshot)?;

        let released: u32 = engine
            .registry
            .settlements
            .values_mut()
            .map(|s| std::mem::take(&mut s.tourist_count))
            .sum();
        if released > 0 {
            info!("Released {} tourist slot(s) held by visitors lost with the snapshot", released);
        }
        Ok(engine)
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn registry(&self) -> &SettlementRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SettlementRegistry {
        &mut self.registry
    }

    pub fn router(&self) -> &VisitorRouter {
        &self.router
    }

    pub fn drain_commands(&mut self) -> Vec<RouterCommand> {
        self.router.drain_commands()
    }

    /// Run every system due on the current tick, then advance the counter.
    pub fn tick<Q: WorldQuery + ?Sized>(&mut self, world: &Q) -> TickReport {
        let now = self.tick;
        self.registry.set_clock(now);
        let mut report = TickReport {
            tick: now,
            ..TickReport::default()
        };

        if self.spawn.is_due(now) {
            report.spawned = self.router.spawn_visitors(&mut self.registry, world, now);
        }
        if self.scan.is_due(now) {
            self.router.scan(&mut self.registry, world, now);
            report.scanned = true;
        }
        if self.ghost_cleanup.is_due(now) {
            report.ghosts_removed = self.registry.clear_ghost_towns();
        }

        self.tick += 1;
        report
    }

    pub fn snapshot(&self) -> Value {
        persistence::registry_to_tag(&self.registry)
    }

    /// Drop in-flight visitors and return the final snapshot.
    pub fn shutdown(mut self) -> Value {
        self.router.discard_all(&mut self.registry);
        self.snapshot()
    }
}

/// Owns one engine per loaded host world, keyed by the host's world name.
pub struct SimulationContext {
    config: TownConfig,
    engines: BTreeMap<String, TownEngine>,
}

impl SimulationContext {
    pub fn new(config: TownConfig) -> Self {
        Self {
            config,
            engines: BTreeMap::new(),
        }
    }

    /// Create the engine for a world that just loaded, restoring `snapshot` if given.
    ///
    /// Loading a world that is already loaded keeps the running engine.
    pub fn on_world_load(
        &mut self,
        key: impl Into<String>,
        snapshot: Option<&Value>,
    ) -> Result<&mut TownEngine, PersistenceError> {
        match self.engines.entry(key.into()) {
            Entry::Occupied(entry) => {
                warn!("World '{}' is already loaded", entry.key());
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                let engine = match snapshot {
                    Some(tag) => TownEngine::from_snapshot(self.config.clone(), tag)?,
                    None => TownEngine::new(self.config.clone()),
                };
                info!(
                    "World '{}' loaded with {} settlement(s)",
                    entry.key(),
                    engine.registry().len()
                );
                Ok(entry.insert(engine))
            }
        }
    }

    /// Tear down a world's engine, returning its final snapshot.
    pub fn on_world_unload(&mut self, key: &str) -> Option<Value> {
        let engine = self.engines.remove(key)?;
        info!("World '{}' unloaded", key);
        Some(engine.shutdown())
    }

    pub fn engine(&self, key: &str) -> Option<&TownEngine> {
        self.engines.get(key)
    }

    pub fn engine_mut(&mut self, key: &str) -> Option<&mut TownEngine> {
        self.engines.get_mut(key)
    }

    pub fn loaded_worlds(&self) -> impl Iterator<Item = &str> {
        self.engines.keys().map(String::as_str)
    }
}
