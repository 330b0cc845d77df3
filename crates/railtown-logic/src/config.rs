//! Tunable constants for settlements, placement, transit and routing.
//!
//! Every number the engine consults lives in [`TownConfig`]. The struct tree
//! deserializes from JSON with every field optional, so a host only has to
//! spell out the values it wants to change:
//!
//! ```
//! use railtown_logic::config::TownConfig;
//!
//! let config = TownConfig::from_json_str(r#"{ "capacity": { "max_tourists_per_town": 4 } }"#)
//!     .unwrap();
//! assert_eq!(config.capacity.max_tourists_per_town, 4);
//! assert_eq!(config.capacity.population_per_tourist, 10);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level configuration for one simulation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TownConfig {
    pub capacity: CapacityConfig,
    pub settlement: SettlementDefaults,
    pub placement: PlacementConfig,
    pub transit: TransitConfig,
    pub router: RouterConfig,
    pub persistence: PersistenceConfig,
}

impl TownConfig {
    /// Parse a (possibly partial) JSON document into a config.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Tourist capacity and population growth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    /// Residents needed per active tourist slot.
    pub population_per_tourist: u32,
    /// Ceiling on the population-derived slot count.
    pub max_pop_based_tourists: u32,
    /// Hard ceiling per settlement regardless of population.
    pub max_tourists_per_town: u32,
    /// Settlements smaller than this never send tourists.
    pub min_pop_for_tourists: u32,
    /// Inbound visits needed for one resident. Zero or negative disables growth.
    pub tourists_per_population_increase: i32,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            population_per_tourist: 10,
            max_pop_based_tourists: 20,
            max_tourists_per_town: 15,
            min_pop_for_tourists: 5,
            tourists_per_population_increase: 5,
        }
    }
}

/// Values a freshly registered settlement starts with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementDefaults {
    pub starting_population: u32,
    pub search_radius: i32,
    pub tourist_spawning_enabled: bool,
}

impl Default for SettlementDefaults {
    fn default() -> Self {
        Self {
            starting_population: 10,
            search_radius: 20,
            tourist_spawning_enabled: true,
        }
    }
}

/// Exclusion zones checked when a settlement is registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Boundary radius of an empty settlement, in blocks.
    pub base_boundary_radius: u32,
    /// Residents per extra block of boundary radius. Zero freezes the radius at the base.
    pub population_per_boundary_block: u32,
    /// Largest boundary radius population growth can reach.
    pub max_boundary_radius: u32,
    /// Two settlements are never closer than this, whatever their radii.
    pub min_separation: u32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            base_boundary_radius: 8,
            population_per_boundary_block: 10,
            max_boundary_radius: 64,
            min_separation: 16,
        }
    }
}

/// Platform limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitConfig {
    pub max_platforms: usize,
    /// New platforms are named `"{prefix} {n}"`.
    pub platform_name_prefix: String,
}

impl Default for TransitConfig {
    fn default() -> Self {
        Self {
            max_platforms: 8,
            platform_name_prefix: "Platform".to_string(),
        }
    }
}

/// How a visitor picks where to go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationPolicy {
    /// Fewest visits received from this origin first, then nearest, then lowest id.
    #[default]
    NearestUnvisited,
    /// Uniform over eligible destinations, drawn from the seeded rng.
    Random,
}

/// Visitor router cadences and liveness limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub spawn_interval_ticks: u32,
    pub spawn_offset_ticks: u32,
    pub mount_interval_ticks: u32,
    pub mount_offset_ticks: u32,
    pub ghost_cleanup_interval_ticks: u32,
    /// Visitors placed per platform per spawn pass, capacity permitting.
    pub visitors_per_spawn: u32,
    /// Ticks a visitor may wait for a carrier before it is dropped.
    pub awaiting_timeout_ticks: u64,
    /// Ticks a mounted visitor may travel before it is dropped.
    pub in_transit_timeout_ticks: u64,
    /// Distance a carrier must cover from the boarding platform to count as departed.
    pub departure_distance: u32,
    pub destination_policy: DestinationPolicy,
    pub seed: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            spawn_interval_ticks: 200,
            spawn_offset_ticks: 0,
            mount_interval_ticks: 20,
            mount_offset_ticks: 10,
            ghost_cleanup_interval_ticks: 6000,
            visitors_per_spawn: 1,
            awaiting_timeout_ticks: 2400,
            in_transit_timeout_ticks: 24_000,
            departure_distance: 4,
            destination_policy: DestinationPolicy::default(),
            seed: 0,
        }
    }
}

/// Snapshot flush rate limiting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Minimum ticks between two "needs flush" signals.
    pub dirty_cooldown_ticks: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            dirty_cooldown_ticks: 100,
        }
    }
}

/// A config value that would make the simulation misbehave.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("population_per_tourist must be at least 1")]
    ZeroPopulationPerTourist,
    #[error("search radius {0} is outside 1..=100")]
    SearchRadiusOutOfRange(i32),
    #[error("max_boundary_radius {max} is below base_boundary_radius {base}")]
    BoundaryCapBelowBase { base: u32, max: u32 },
    #[error("{name} interval must be at least 1 tick")]
    ZeroInterval { name: &'static str },
    #[error("{name} offset {offset} is not below its interval {interval}")]
    OffsetOutsideInterval {
        name: &'static str,
        offset: u32,
        interval: u32,
    },
    #[error("platform name prefix is empty")]
    EmptyPlatformPrefix,
}

/// Check a config, returning every problem found (empty means valid).
pub fn validate_config(config: &TownConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    if config.capacity.population_per_tourist == 0 {
        errors.push(ConfigError::ZeroPopulationPerTourist);
    }

    let radius = config.settlement.search_radius;
    if !(1..=100).contains(&radius) {
        errors.push(ConfigError::SearchRadiusOutOfRange(radius));
    }

    let placement = &config.placement;
    if placement.max_boundary_radius < placement.base_boundary_radius {
        errors.push(ConfigError::BoundaryCapBelowBase {
            base: placement.base_boundary_radius,
            max: placement.max_boundary_radius,
        });
    }

    let router = &config.router;
    let schedules = [
        ("spawn", router.spawn_interval_ticks, router.spawn_offset_ticks),
        ("mount", router.mount_interval_ticks, router.mount_offset_ticks),
        ("ghost cleanup", router.ghost_cleanup_interval_ticks, 0),
    ];
    for (name, interval, offset) in schedules {
        if interval == 0 {
            errors.push(ConfigError::ZeroInterval { name });
        } else if offset >= interval {
            errors.push(ConfigError::OffsetOutsideInterval {
                name,
                offset,
                interval,
            });
        }
    }

    if config.transit.platform_name_prefix.trim().is_empty() {
        errors.push(ConfigError::EmptyPlatformPrefix);
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&TownConfig::default()).is_empty());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = TownConfig::from_json_str(
            r#"{ "router": { "destination_policy": "random", "seed": 7 } }"#,
        )
        .unwrap();
        assert_eq!(config.router.destination_policy, DestinationPolicy::Random);
        assert_eq!(config.router.seed, 7);
        assert_eq!(config.router.spawn_interval_ticks, 200);
        assert_eq!(config.capacity, CapacityConfig::default());
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(TownConfig::from_json_str("{}").unwrap(), TownConfig::default());
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = TownConfig::default();
        config.capacity.population_per_tourist = 0;
        config.settlement.search_radius = 0;
        config.router.mount_interval_ticks = 0;
        config.router.spawn_offset_ticks = 200;

        let errors = validate_config(&config);
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ConfigError::ZeroPopulationPerTourist));
        assert!(errors.contains(&ConfigError::SearchRadiusOutOfRange(0)));
        assert!(errors.contains(&ConfigError::ZeroInterval { name: "mount" }));
        assert!(errors.contains(&ConfigError::OffsetOutsideInterval {
            name: "spawn",
            offset: 200,
            interval: 200,
        }));
    }

    #[test]
    fn test_boundary_cap_below_base() {
        let mut config = TownConfig::default();
        config.placement.max_boundary_radius = 2;
        assert_eq!(
            validate_config(&config),
            vec![ConfigError::BoundaryCapBelowBase { base: 8, max: 2 }]
        );
    }
}
