//! Spawn evaluation.

use log::{debug, info};
use railtown_logic::geometry::BoundingVolume;

use super::{Visitor, VisitorRouter, VisitorState};
use crate::ids::{PlatformId, VisitorId};
use crate::registry::SettlementRegistry;
use crate::world::{RouterCommand, WorldQuery};

impl VisitorRouter {
    /// Place new visitors on every usable platform of every settlement with spare capacity.
    ///
    /// Capacity is rechecked before each individual spawn, so a settlement
    /// with several platforms never overshoots its limit within one pass.
    /// Returns the number of visitors spawned.
    pub fn spawn_visitors<Q: WorldQuery + ?Sized>(
        &mut self,
        registry: &mut SettlementRegistry,
        query: &Q,
        now: u64,
    ) -> u32 {
        let mut spawned = 0;

        for id in registry.ids() {
            let Some(settlement) = registry.get(id) else {
                continue;
            };
            if !settlement.can_spawn_tourists(&registry.config().capacity) {
                continue;
            }
            let origin_pos = settlement.position();
            let radius = settlement.search_radius();
            let plan: Vec<(PlatformId, BoundingVolume)> = settlement
                .transit()
                .usable()
                .filter_map(|p| Some((p.id, p.volume(radius)?)))
                .collect();

            'platforms: for (platform, volume) in plan {
                if !query.is_position_loaded(volume.center()) {
                    debug!("{} {}: platform not loaded, skipping", id, platform);
                    continue;
                }

                for _ in 0..self.config.visitors_per_spawn {
                    let has_room = registry
                        .get(id)
                        .is_some_and(|s| s.can_add_more_tourists(&registry.config().capacity));
                    if !has_room {
                        break 'platforms;
                    }
                    let Some(spawn_pos) = query.find_spawn_position(&volume) else {
                        debug!("{} {}: no free spawn position", id, platform);
                        break;
                    };
                    if !matches!(registry.update(id, |s, c| s.add_tourist(&c.capacity)), Ok(true)) {
                        break 'platforms;
                    }

                    let visitor = Visitor {
                        id: VisitorId(self.next_visitor_id),
                        origin: id,
                        origin_pos,
                        platform,
                        spawn_pos,
                        spawned_at: now,
                    };
                    self.next_visitor_id += 1;
                    self.world.spawn((visitor, VisitorState::Spawned));
                    self.commands.push(RouterCommand::SpawnVisitor {
                        visitor: visitor.id,
                        origin: id,
                        position: spawn_pos,
                    });
                    spawned += 1;
                }
            }
        }

        if spawned > 0 {
            info!("Spawned {} visitor(s) at tick {}", spawned, now);
        }
        self.stats.spawned += u64::from(spawned);
        spawned
    }
}
