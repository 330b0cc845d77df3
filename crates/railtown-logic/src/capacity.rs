//! Tourist capacity, growth accounting and boundary radius.
//!
//! All settlement numbers that derive from population live here:
//!
//! - `max_tourists = min(population / population_per_tourist, max_pop_based, max_per_town)`
//! - a settlement spawns only with spawning enabled and at least `min_pop_for_tourists` residents
//! - every inbound visit bumps a counter; crossing the threshold adds exactly
//!   one resident and subtracts the threshold, keeping any overshoot
//! - the boundary radius grows with population up to a cap and never shrinks
//!   as population rises

use crate::config::{CapacityConfig, PlacementConfig};

/// Smallest search radius a settlement may use.
pub const MIN_SEARCH_RADIUS: i32 = 1;
/// Largest search radius a settlement may use.
pub const MAX_SEARCH_RADIUS: i32 = 100;

/// Maximum simultaneous tourists for a settlement of this population.
pub fn max_tourists(population: u32, config: &CapacityConfig) -> u32 {
    if config.population_per_tourist == 0 {
        return 0;
    }
    (population / config.population_per_tourist)
        .min(config.max_pop_based_tourists)
        .min(config.max_tourists_per_town)
}

/// Whether a settlement is allowed to send tourists at all.
pub fn can_spawn_tourists(spawning_enabled: bool, population: u32, config: &CapacityConfig) -> bool {
    spawning_enabled && population >= config.min_pop_for_tourists
}

/// Whether one more tourist fits.
pub fn can_add_more_tourists(
    spawning_enabled: bool,
    population: u32,
    tourist_count: u32,
    config: &CapacityConfig,
) -> bool {
    can_spawn_tourists(spawning_enabled, population, config)
        && tourist_count < max_tourists(population, config)
}

/// Result of accounting for one inbound visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthOutcome {
    pub population: u32,
    pub counter: u32,
    pub grew: bool,
}

/// Account for a single inbound visit.
///
/// At most one resident is added per call, however far the counter has
/// overshot the threshold. A threshold of zero or below disables growth and
/// the counter simply accumulates.
pub fn apply_visit(population: u32, counter: u32, config: &CapacityConfig) -> GrowthOutcome {
    let counter = counter.saturating_add(1);
    let threshold = config.tourists_per_population_increase;
    if threshold <= 0 || counter < threshold as u32 {
        return GrowthOutcome {
            population,
            counter,
            grew: false,
        };
    }

    GrowthOutcome {
        population: population.saturating_add(1),
        counter: counter - threshold as u32,
        grew: true,
    }
}

/// Exclusion radius, in blocks, for a settlement of this population.
pub fn boundary_radius(population: u32, config: &PlacementConfig) -> u32 {
    let growth = match config.population_per_boundary_block {
        0 => 0,
        per_block => population / per_block,
    };
    let cap = config.max_boundary_radius.max(config.base_boundary_radius);
    config.base_boundary_radius.saturating_add(growth).min(cap)
}

/// Minimum distance two settlements with these radii must keep.
pub fn required_separation(radius_a: u32, radius_b: u32, config: &PlacementConfig) -> f64 {
    let combined = f64::from(radius_a) + f64::from(radius_b);
    combined.max(f64::from(config.min_separation))
}

/// Clamp a requested search radius into the supported range.
pub fn clamp_search_radius(radius: i32) -> i32 {
    radius.clamp(MIN_SEARCH_RADIUS, MAX_SEARCH_RADIUS)
}
