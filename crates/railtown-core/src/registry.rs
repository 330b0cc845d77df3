//! The settlement registry.
//!
//! Owns every settlement of one host world, validates placement against
//! dynamic exclusion zones, queues change notifications for the transport
//! layer and tracks whether a snapshot flush is due.
//!
//! Placement is checked once, at registration: a settlement that later grows
//! into its neighbour's zone is never retroactively invalidated.

use std::collections::BTreeMap;

use log::{debug, info};
use railtown_logic::capacity;
use railtown_logic::config::TownConfig;
use railtown_logic::geometry::BlockPos;
use serde::{Deserialize, Serialize};

use crate::error::{PlacementError, TownError};
use crate::ids::{PlatformId, SettlementId};
use crate::platform::{Platform, TransitFacility};
use crate::settlement::Settlement;

/// Notification for whoever mirrors registry state to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TownChange {
    Registered(SettlementId),
    Removed(SettlementId),
    Updated(SettlementId),
    PlatformsChanged(SettlementId),
}

/// Rate-limited "snapshot needs flushing" flag, driven by the tick counter.
#[derive(Debug, Clone, Default)]
pub struct DirtyTracker {
    dirty: bool,
    cooldown_ticks: u64,
    last_flush: Option<u64>,
}

impl DirtyTracker {
    pub fn new(cooldown_ticks: u64) -> Self {
        Self {
            dirty: false,
            cooldown_ticks,
            last_flush: None,
        }
    }

    /// Flag state as changed. Returns `true` only for the first mark since the last flush.
    pub fn mark(&mut self) -> bool {
        let newly = !self.dirty;
        self.dirty = true;
        newly
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether a flush may happen at `now`: dirty and out of the cooldown window.
    pub fn flush_due(&self, now: u64) -> bool {
        self.dirty
            && self
                .last_flush
                .map_or(true, |last| now.saturating_sub(last) >= self.cooldown_ticks)
    }

    /// Claim the pending flush if one is due, clearing the flag.
    pub fn take_flush(&mut self, now: u64) -> bool {
        if !self.flush_due(now) {
            return false;
        }
        self.dirty = false;
        self.last_flush = Some(now);
        true
    }
}

/// Read-only digest of one settlement for overlays and lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementSummary {
    pub id: SettlementId,
    pub name: String,
    pub position: BlockPos,
    pub population: u32,
    pub tourists: u32,
    pub max_tourists: u32,
    pub boundary_radius: u32,
    pub platforms: usize,
    pub usable_platforms: usize,
}

#[derive(Debug, Clone)]
pub struct SettlementRegistry {
    pub(crate) settlements: BTreeMap<SettlementId, Settlement>,
    pub(crate) next_id: u64,
    config: TownConfig,
    clock: u64,
    dirty: DirtyTracker,
    changes: Vec<TownChange>,
}

impl SettlementRegistry {
    pub fn new(config: TownConfig) -> Self {
        let dirty = DirtyTracker::new(config.persistence.dirty_cooldown_ticks);
        Self {
            settlements: BTreeMap::new(),
            next_id: 0,
            config,
            clock: 0,
            dirty,
            changes: Vec::new(),
        }
    }

    pub fn config(&self) -> &TownConfig {
        &self.config
    }

    /// Current engine tick, used for history timestamps and flush cooldowns.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn set_clock(&mut self, now: u64) {
        self.clock = now;
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Check that a new settlement at `position` keeps clear of every existing one.
    pub fn check_placement(&self, position: BlockPos) -> Result<(), PlacementError> {
        let placement = &self.config.placement;
        let new_radius = capacity::boundary_radius(
            self.config.settlement.starting_population,
            placement,
        );

        for existing in self.settlements.values() {
            let required = capacity::required_separation(
                existing.boundary_radius(placement),
                new_radius,
                placement,
            );
            let distance = existing.position().distance(&position);
            if distance < required {
                return Err(PlacementError::TooClose {
                    existing: existing.id(),
                    distance,
                    required,
                });
            }
        }
        Ok(())
    }

    pub fn register(
        &mut self,
        position: BlockPos,
        name: impl Into<String>,
    ) -> Result<SettlementId, PlacementError> {
        self.check_placement(position)?;

        let id = SettlementId(self.next_id);
        self.next_id += 1;
        let settlement = Settlement::new(id, position, name, &self.config.settlement);
        info!("Registered {} '{}' at {}", id, settlement.name(), position);
        self.settlements.insert(id, settlement);

        self.changes.push(TownChange::Registered(id));
        self.mark_dirty();
        Ok(id)
    }

    pub fn remove(&mut self, id: SettlementId) -> Result<Settlement, TownError> {
        let settlement = self.settlements.remove(&id).ok_or(TownError::NotFound(id))?;
        info!("Removed {} '{}'", id, settlement.name());
        self.changes.push(TownChange::Removed(id));
        self.mark_dirty();
        Ok(settlement)
    }

    /// Remove every settlement whose population has dropped to zero.
    pub fn clear_ghost_towns(&mut self) -> Vec<SettlementId> {
        let ghosts: Vec<SettlementId> = self
            .settlements
            .values()
            .filter(|s| s.population() == 0)
            .map(Settlement::id)
            .collect();

        for id in &ghosts {
            self.settlements.remove(id);
            self.changes.push(TownChange::Removed(*id));
        }
        if !ghosts.is_empty() {
            info!("Cleared {} ghost settlement(s)", ghosts.len());
            self.mark_dirty();
        }
        ghosts
    }

    // ---------------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------------

    pub fn get(&self, id: SettlementId) -> Option<&Settlement> {
        self.settlements.get(&id)
    }

    /// Mutable access. Assumes the caller will change something and marks the registry dirty.
    pub fn get_mut(&mut self, id: SettlementId) -> Option<&mut Settlement> {
        if !self.settlements.contains_key(&id) {
            return None;
        }
        self.changes.push(TownChange::Updated(id));
        self.mark_dirty();
        self.settlements.get_mut(&id)
    }

    /// Run `f` against a settlement, marking it changed.
    pub fn update<R>(
        &mut self,
        id: SettlementId,
        f: impl FnOnce(&mut Settlement, &TownConfig) -> R,
    ) -> Result<R, TownError> {
        let settlement = self.settlements.get_mut(&id).ok_or(TownError::NotFound(id))?;
        let result = f(settlement, &self.config);
        self.changes.push(TownChange::Updated(id));
        self.mark_dirty();
        Ok(result)
    }

    /// All settlements in id order.
    pub fn get_all(&self) -> impl Iterator<Item = &Settlement> {
        self.settlements.values()
    }

    pub fn ids(&self) -> Vec<SettlementId> {
        self.settlements.keys().copied().collect()
    }

    pub fn contains(&self, id: SettlementId) -> bool {
        self.settlements.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.settlements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settlements.is_empty()
    }

    /// Settlement whose boundary contains `pos`, if any.
    pub fn find_at(&self, pos: BlockPos) -> Option<&Settlement> {
        let placement = &self.config.placement;
        self.settlements
            .values()
            .find(|s| s.position().distance(&pos) <= f64::from(s.boundary_radius(placement)))
    }

    // ---------------------------------------------------------------------
    // Read-only views for renderers
    // ---------------------------------------------------------------------

    pub fn platforms(&self, id: SettlementId) -> Vec<Platform> {
        self.get(id)
            .map(|s| s.transit().iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn boundary_radius(&self, id: SettlementId) -> Option<u32> {
        self.get(id).map(|s| s.boundary_radius(&self.config.placement))
    }

    pub fn summaries(&self) -> Vec<SettlementSummary> {
        self.settlements
            .values()
            .map(|s| SettlementSummary {
                id: s.id(),
                name: s.name().to_string(),
                position: s.position(),
                population: s.population(),
                tourists: s.tourist_count(),
                max_tourists: s.max_tourists(&self.config.capacity),
                boundary_radius: s.boundary_radius(&self.config.placement),
                platforms: s.transit().len(),
                usable_platforms: s.transit().usable().count(),
            })
            .collect()
    }

    // ---------------------------------------------------------------------
    // Platforms
    // ---------------------------------------------------------------------

    pub fn add_platform(&mut self, id: SettlementId) -> Result<PlatformId, TownError> {
        let limit = self.config.transit.max_platforms;
        let transit = &self.config.transit;
        let settlement = self.settlements.get_mut(&id).ok_or(TownError::NotFound(id))?;
        let platform = settlement
            .transit_mut()
            .add_platform(transit)
            .ok_or(TownError::AtCapacity {
                what: "platform list",
                limit,
            })?;
        self.platforms_changed(id);
        Ok(platform)
    }

    pub fn remove_platform(&mut self, id: SettlementId, platform: PlatformId) -> Result<(), TownError> {
        self.edit_platform(id, platform, |t| t.remove_platform(platform))
    }

    pub fn rename_platform(
        &mut self,
        id: SettlementId,
        platform: PlatformId,
        name: impl Into<String>,
    ) -> Result<(), TownError> {
        let name = name.into();
        self.edit_platform(id, platform, |t| t.rename(platform, name))
    }

    pub fn set_platform_path(
        &mut self,
        id: SettlementId,
        platform: PlatformId,
        start: BlockPos,
        end: BlockPos,
    ) -> Result<(), TownError> {
        self.edit_platform(id, platform, |t| t.set_path(platform, start, end))
    }

    pub fn reset_platform_path(&mut self, id: SettlementId, platform: PlatformId) -> Result<(), TownError> {
        self.edit_platform(id, platform, |t| t.reset_path(platform))
    }

    pub fn set_platform_enabled(
        &mut self,
        id: SettlementId,
        platform: PlatformId,
        enabled: bool,
    ) -> Result<(), TownError> {
        self.edit_platform(id, platform, |t| t.set_enabled(platform, enabled))
    }

    pub fn set_destination_enabled(
        &mut self,
        id: SettlementId,
        platform: PlatformId,
        destination: SettlementId,
        enabled: bool,
    ) -> Result<(), TownError> {
        self.edit_platform(id, platform, |t| {
            t.set_destination_enabled(platform, destination, enabled)
        })
    }

    /// Enter path creation mode. Not persisted, so the registry is not marked dirty.
    pub fn begin_path_edit(&mut self, id: SettlementId, platform: PlatformId) -> Result<(), TownError> {
        let settlement = self.settlements.get_mut(&id).ok_or(TownError::NotFound(id))?;
        if settlement.transit_mut().begin_path_edit(platform) {
            Ok(())
        } else {
            Err(TownError::PlatformNotFound {
                settlement: id,
                platform,
            })
        }
    }

    pub fn cancel_path_edit(&mut self, id: SettlementId) -> Result<(), TownError> {
        let settlement = self.settlements.get_mut(&id).ok_or(TownError::NotFound(id))?;
        settlement.transit_mut().cancel_path_edit();
        Ok(())
    }

    fn edit_platform(
        &mut self,
        id: SettlementId,
        platform: PlatformId,
        edit: impl FnOnce(&mut TransitFacility) -> bool,
    ) -> Result<(), TownError> {
        let settlement = self.settlements.get_mut(&id).ok_or(TownError::NotFound(id))?;
        if !edit(settlement.transit_mut()) {
            return Err(TownError::PlatformNotFound {
                settlement: id,
                platform,
            });
        }
        self.platforms_changed(id);
        Ok(())
    }

    fn platforms_changed(&mut self, id: SettlementId) {
        self.changes.push(TownChange::PlatformsChanged(id));
        self.mark_dirty();
    }

    // ---------------------------------------------------------------------
    // Change tracking
    // ---------------------------------------------------------------------

    /// Flag that persisted state changed. Idempotent; never does I/O.
    pub fn mark_dirty(&mut self) -> bool {
        let newly = self.dirty.mark();
        if newly {
            debug!("Registry marked dirty at tick {}", self.clock);
        }
        newly
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_dirty()
    }

    /// Claim a snapshot flush if one is due at the current clock.
    pub fn take_flush(&mut self) -> bool {
        self.dirty.take_flush(self.clock)
    }

    /// Pending change notifications, oldest first, with consecutive repeats collapsed.
    pub fn drain_changes(&mut self) -> Vec<TownChange> {
        let mut changes = std::mem::take(&mut self.changes);
        changes.dedup();
        changes
    }

    pub(crate) fn clear_state_flags(&mut self) {
        self.dirty = DirtyTracker::new(self.config.persistence.dirty_cooldown_ticks);
        self.changes.clear();
    }
}
