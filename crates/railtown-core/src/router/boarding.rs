//! Mounting waiting visitors onto idle carriers.

use std::collections::{BTreeMap, HashMap};

use hecs::Entity;
use log::debug;

use super::destination::choose_destination;
use super::{Boarding, Visitor, VisitorRouter, VisitorState};
use crate::ids::{CarrierId, PlatformId, SettlementId};
use crate::registry::SettlementRegistry;
use crate::world::{DespawnReason, RouterCommand, WorldQuery};

impl VisitorRouter {
    /// Promote loaded visitors to `AwaitingCarrier`, time out stale ones and
    /// seat the rest on idle carriers found in their platform's volume.
    ///
    /// Visitors board in id order and carriers fill in id order. A carrier
    /// reported near two platforms shares its free seats between them.
    pub(super) fn board_visitors<Q: WorldQuery + ?Sized>(
        &mut self,
        registry: &mut SettlementRegistry,
        query: &Q,
        now: u64,
    ) {
        let waiting: Vec<(Entity, Visitor, VisitorState)> = self
            .world
            .query::<(&Visitor, &VisitorState)>()
            .iter()
            .filter(|(_, (_, state))| state.is_waiting())
            .map(|(entity, (visitor, state))| (entity, *visitor, *state))
            .collect();

        let mut groups: BTreeMap<(SettlementId, PlatformId), Vec<(Entity, Visitor)>> = BTreeMap::new();
        for (entity, visitor, state) in waiting {
            if now.saturating_sub(visitor.spawned_at) >= self.config.awaiting_timeout_ticks {
                self.discard(registry, entity, &visitor, DespawnReason::NoCarrier);
                continue;
            }
            if !registry.contains(visitor.origin) {
                self.discard(registry, entity, &visitor, DespawnReason::SettlementGone);
                continue;
            }
            if state == VisitorState::Spawned {
                if !query.is_position_loaded(visitor.spawn_pos) {
                    continue;
                }
                self.set_state(entity, VisitorState::AwaitingCarrier);
            }
            groups
                .entry((visitor.origin, visitor.platform))
                .or_default()
                .push((entity, visitor));
        }

        let mut seats: HashMap<CarrierId, u32> = HashMap::new();
        let mut mounts: Vec<(Entity, Visitor, Boarding)> = Vec::new();

        for ((origin, platform_id), mut visitors) in groups {
            let Some(settlement) = registry.get(origin) else {
                continue;
            };
            let Some(platform) = settlement.transit().get(platform_id).filter(|p| p.is_usable()) else {
                continue;
            };
            let Some(zone) = platform.volume(settlement.search_radius()) else {
                continue;
            };

            let mut carriers = query.find_carriers_near(&zone);
            carriers.retain(|c| c.idle && c.free_seats > 0);
            carriers.sort_by_key(|c| c.id);
            if carriers.is_empty() {
                continue;
            }

            visitors.sort_by_key(|(_, v)| v.id);
            let mut carrier_iter = carriers.iter().peekable();
            for (entity, visitor) in visitors {
                let carrier = loop {
                    let Some(candidate) = carrier_iter.peek() else {
                        break None;
                    };
                    let free = seats.entry(candidate.id).or_insert(candidate.free_seats);
                    if *free > 0 {
                        break Some(candidate.id);
                    }
                    carrier_iter.next();
                };
                let Some(carrier) = carrier else {
                    break;
                };

                let policy = self.config.destination_policy;
                let Some(destination) =
                    choose_destination(registry, origin, platform, policy, &mut self.rng)
                else {
                    debug!("{} {}: no eligible destination", origin, platform_id);
                    break;
                };

                if let Some(free) = seats.get_mut(&carrier) {
                    *free -= 1;
                }
                mounts.push((
                    entity,
                    visitor,
                    Boarding {
                        carrier,
                        destination,
                        mounted_at: now,
                        zone,
                    },
                ));
            }
        }

        for (entity, visitor, boarding) in mounts {
            if self.world.insert_one(entity, boarding).is_err() {
                continue;
            }
            self.set_state(entity, VisitorState::Mounted);
            self.commands.push(RouterCommand::Mount {
                visitor: visitor.id,
                carrier: boarding.carrier,
                destination: boarding.destination,
            });
            self.stats.mounted += 1;
            debug!(
                "{} mounted {} bound for {}",
                visitor.id, boarding.carrier, boarding.destination
            );
        }
    }
}
