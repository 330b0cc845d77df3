//! Destination selection for mounting visitors.
//!
//! Eligible destinations are every other registered settlement the platform's
//! allow-list permits, in ascending id order.
//!
//! `NearestUnvisited` ranks them by how many visitors the candidate has
//! already received from this origin, then by distance, then by id, so
//! settlements never visited from here come first and equal distances break
//! toward the older settlement. `Random` picks uniformly with the router's
//! seeded rng.

use rand::Rng;
use railtown_logic::config::DestinationPolicy;

use crate::ids::SettlementId;
use crate::platform::Platform;
use crate::registry::SettlementRegistry;
use crate::settlement::Settlement;

pub fn eligible_destinations<'a>(
    registry: &'a SettlementRegistry,
    origin: SettlementId,
    platform: &Platform,
) -> Vec<&'a Settlement> {
    registry
        .get_all()
        .filter(|s| s.id() != origin && platform.allows_destination(s.id()))
        .collect()
}

pub fn choose_destination<R: Rng>(
    registry: &SettlementRegistry,
    origin: SettlementId,
    platform: &Platform,
    policy: DestinationPolicy,
    rng: &mut R,
) -> Option<SettlementId> {
    let origin_pos = registry.get(origin)?.position();
    let candidates = eligible_destinations(registry, origin, platform);
    if candidates.is_empty() {
        return None;
    }

    match policy {
        DestinationPolicy::NearestUnvisited => candidates
            .iter()
            .min_by_key(|s| {
                let visits = s.visitors().get(&origin).copied().unwrap_or(0);
                (visits, s.position().distance_squared(&origin_pos), s.id())
            })
            .map(|s| s.id()),
        DestinationPolicy::Random => {
            let index = rng.gen_range(0..candidates.len());
            Some(candidates[index].id())
        }
    }
}
