//! Following carriers and settling arrivals.

use std::collections::{BTreeMap, HashMap};

use hecs::Entity;
use log::info;
use railtown_logic::geometry::BoundingVolume;

use super::{release_slot, Boarding, TransitLeg, Visitor, VisitorRouter, VisitorState};
use crate::ids::SettlementId;
use crate::registry::SettlementRegistry;
use crate::world::{DespawnReason, RouterCommand, WorldQuery};

impl VisitorRouter {
    /// Move aboard visitors forward: `Mounted → InTransit` once the carrier
    /// leaves the boarding zone, `InTransit → Arrived` once it enters the
    /// destination. Lost carriers and overlong trips are discarded.
    pub(super) fn advance_transit<Q: WorldQuery + ?Sized>(
        &mut self,
        registry: &mut SettlementRegistry,
        query: &Q,
        now: u64,
    ) {
        let aboard: Vec<(Entity, Visitor, VisitorState, Boarding)> = self
            .world
            .query::<(&Visitor, &VisitorState, &Boarding)>()
            .iter()
            .filter(|(_, (_, state, _))| state.is_aboard())
            .map(|(entity, (visitor, state, boarding))| (entity, *visitor, *state, *boarding))
            .collect();

        let departure = i32::try_from(self.config.departure_distance).unwrap_or(i32::MAX);
        let mut arrival_zones: HashMap<SettlementId, Vec<BoundingVolume>> = HashMap::new();

        for (entity, visitor, state, boarding) in aboard {
            if now.saturating_sub(boarding.mounted_at) >= self.config.in_transit_timeout_ticks {
                self.discard(registry, entity, &visitor, DespawnReason::TransitTimeout);
                continue;
            }
            let Some(carrier_pos) = query.carrier_position(boarding.carrier) else {
                self.discard(registry, entity, &visitor, DespawnReason::CarrierLost);
                continue;
            };

            match state {
                VisitorState::Mounted => {
                    if boarding.zone.inflate(departure).contains(&carrier_pos) {
                        continue;
                    }
                    let _ = self.world.insert_one(entity, TransitLeg { departed_at: now });
                    self.set_state(entity, VisitorState::InTransit);
                    self.stats.departed += 1;
                }
                VisitorState::InTransit => {
                    if !registry.contains(boarding.destination) {
                        self.discard(registry, entity, &visitor, DespawnReason::SettlementGone);
                        continue;
                    }
                    let zones = arrival_zones
                        .entry(boarding.destination)
                        .or_insert_with(|| arrival_zone(registry, boarding.destination));
                    if zones.iter().any(|zone| zone.contains(&carrier_pos)) {
                        self.set_state(entity, VisitorState::Arrived);
                    }
                }
                _ => {}
            }
        }
    }

    /// Credit arrived visitors to their destinations and release them.
    ///
    /// Each visitor is one `add_visitor` call on the destination; each
    /// (destination, origin) pair arriving in the same scan is one history record.
    pub(super) fn settle_arrivals(&mut self, registry: &mut SettlementRegistry, now: u64) {
        let mut groups: BTreeMap<(SettlementId, SettlementId), Vec<(Entity, Visitor)>> =
            BTreeMap::new();
        for (entity, (visitor, state, boarding)) in self
            .world
            .query::<(&Visitor, &VisitorState, &Boarding)>()
            .iter()
        {
            if *state == VisitorState::Arrived {
                groups
                    .entry((boarding.destination, visitor.origin))
                    .or_default()
                    .push((entity, *visitor));
            }
        }

        for ((destination, origin), visitors) in groups {
            if !registry.contains(destination) {
                for (entity, visitor) in visitors {
                    self.discard(registry, entity, &visitor, DespawnReason::SettlementGone);
                }
                continue;
            }

            let count = visitors.len();
            let origin_pos = visitors.first().map(|(_, v)| v.origin_pos);
            let grew = registry
                .update(destination, |settlement, config| {
                    let mut grew = 0;
                    for _ in 0..count {
                        if settlement.add_visitor(origin, &config.capacity) {
                            grew += 1;
                        }
                    }
                    settlement.record_visit(
                        origin,
                        u32::try_from(count).unwrap_or(u32::MAX),
                        origin_pos,
                        now,
                    );
                    grew
                })
                .unwrap_or(0);
            release_slot(registry, origin, count);

            for (entity, visitor) in visitors {
                self.despawn_entity(entity, visitor.id);
                self.commands.push(RouterCommand::Despawn {
                    visitor: visitor.id,
                    reason: DespawnReason::Arrived,
                });
            }
            self.stats.arrived += count as u64;
            info!(
                "{} visitor(s) from {} arrived at {} (population +{})",
                count, origin, destination, grew
            );
        }
    }
}

/// Where a carrier counts as having reached `destination`: any usable
/// platform volume, or the area around the settlement if it has none.
fn arrival_zone(registry: &SettlementRegistry, destination: SettlementId) -> Vec<BoundingVolume> {
    let Some(settlement) = registry.get(destination) else {
        return Vec::new();
    };
    let radius = settlement.search_radius();
    let zones: Vec<BoundingVolume> = settlement
        .transit()
        .usable()
        .filter_map(|p| p.volume(radius))
        .collect();
    if zones.is_empty() {
        vec![BoundingVolume::around(settlement.position(), radius)]
    } else {
        zones
    }
}

