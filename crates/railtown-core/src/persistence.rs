//! Save/load of settlements as a structured tag tree.
//!
//! The tag tree is a `serde_json::Value` with one camelCase node per
//! settlement. The mapping is hand-written rather than derived so that a
//! damaged node degrades field by field: anything missing falls back to an
//! empty or default value, anything malformed is logged and skipped, and the
//! rest of the load carries on.
//!
//! Snapshot root:
//!
//! ```text
//! { "version": 2, "nextSettlementId": 3, "settlements": { "0": {...}, "2": {...} } }
//! ```
//!
//! Version 1 snapshots stored a single path per settlement as
//! `pathStart`/`pathEnd`. Those are migrated into a first platform whenever a
//! node has no platforms of its own.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};

use log::{debug, info, warn};
use railtown_logic::config::TownConfig;
use railtown_logic::geometry::BlockPos;
use serde_json::{json, Map, Value};

use crate::error::PersistenceError;
use crate::history::{VisitHistory, VisitHistoryRecord};
use crate::ids::{PlatformId, SettlementId, VisitorId};
use crate::ledger::{ResourceKind, ResourceLedger};
use crate::platform::{Platform, TransitFacility};
use crate::registry::SettlementRegistry;
use crate::settlement::Settlement;
use crate::storage::SettlementStorage;

/// Snapshot format version written by this build.
pub const SNAPSHOT_VERSION: u32 = 2;

// ============================================================================
// SETTLEMENT NODES
// ============================================================================

pub fn settlement_to_tag(settlement: &Settlement) -> Value {
    let visitors: Map<String, Value> = settlement
        .visitors
        .iter()
        .map(|(origin, count)| (origin.0.to_string(), json!(count)))
        .collect();

    let history: Vec<Value> = settlement
        .history
        .iter()
        .map(|record| {
            let mut node = json!({
                "timestamp": record.timestamp,
                "originId": record.origin.0,
                "count": record.count,
            });
            if let Some(pos) = record.origin_pos {
                node["pos"] = pos_to_tag(pos);
            }
            node
        })
        .collect();

    let personal: Map<String, Value> = settlement
        .storage
        .personal
        .iter()
        .map(|(visitor, ledger)| (visitor.0.to_string(), ledger_to_tag(ledger)))
        .collect();

    let platforms: Vec<Value> = settlement.transit.iter().map(platform_to_tag).collect();

    json!({
        "id": settlement.id.0,
        "name": settlement.name,
        "position": pos_to_tag(settlement.position),
        "population": settlement.population,
        "touristCount": settlement.tourist_count,
        "touristsReceivedCounter": settlement.tourists_received_counter,
        "visitors": visitors,
        "economy": ledger_to_tag(&settlement.economy),
        "searchRadius": settlement.search_radius,
        "touristSpawningEnabled": settlement.tourist_spawning_enabled,
        "visitHistory": history,
        "communalStorage": ledger_to_tag(&settlement.storage.communal),
        "personalStorage": personal,
        "platforms": platforms,
        "nextPlatformId": settlement.transit.next_id(),
    })
}

/// Rebuild one settlement. Only `id` and `position` are required.
pub fn settlement_from_tag(tag: &Value, config: &TownConfig) -> Result<Settlement, PersistenceError> {
    let node = tag
        .as_object()
        .ok_or_else(|| PersistenceError::Malformed("settlement node is not an object".into()))?;
    let id = node
        .get("id")
        .and_then(Value::as_u64)
        .map(SettlementId)
        .ok_or_else(|| PersistenceError::Malformed("settlement node has no id".into()))?;
    let position = node
        .get("position")
        .and_then(pos_from_tag)
        .ok_or_else(|| PersistenceError::Malformed(format!("{id} has no valid position")))?;

    let reader = NodeReader { node, context: id.to_string() };
    let defaults = &config.settlement;

    let mut settlement = Settlement::new(
        id,
        position,
        reader.string("name").unwrap_or_default(),
        defaults,
    );
    settlement.population = reader.u32("population").unwrap_or(0);
    settlement.tourist_count = reader.u32("touristCount").unwrap_or(0);
    settlement.tourists_received_counter = reader.u32("touristsReceivedCounter").unwrap_or(0);
    settlement.tourist_spawning_enabled = reader
        .bool("touristSpawningEnabled")
        .unwrap_or(defaults.tourist_spawning_enabled);
    if let Some(radius) = reader.i32("searchRadius") {
        settlement.set_search_radius(radius);
    }
    let max_tourists = settlement.max_tourists(&config.capacity);
    if settlement.tourist_count > max_tourists {
        warn!(
            "{}: touristCount {} exceeds capacity {}, clamping",
            id, settlement.tourist_count, max_tourists
        );
        settlement.tourist_count = max_tourists;
    }

    settlement.visitors = reader.visitors("visitors");
    settlement.economy = reader.ledger("economy");
    settlement.history = reader.history("visitHistory");
    settlement.storage = SettlementStorage {
        communal: reader.ledger("communalStorage"),
        personal: reader.personal_storage("personalStorage"),
    };
    settlement.transit = reader.transit(config);

    Ok(settlement)
}

fn platform_to_tag(platform: &Platform) -> Value {
    let destinations: Vec<u64> = platform.enabled_destinations.iter().map(|d| d.0).collect();
    let mut node = json!({
        "id": platform.id.0,
        "name": platform.name,
        "enabled": platform.enabled,
        "destinations": destinations,
    });
    if let Some(start) = platform.start {
        node["startPos"] = pos_to_tag(start);
    }
    if let Some(end) = platform.end {
        node["endPos"] = pos_to_tag(end);
    }
    node
}

fn pos_to_tag(pos: BlockPos) -> Value {
    json!({ "x": pos.x, "y": pos.y, "z": pos.z })
}

fn pos_from_tag(tag: &Value) -> Option<BlockPos> {
    let coord = |axis: &str| {
        tag.get(axis)
            .and_then(Value::as_i64)
            .and_then(|v| i32::try_from(v).ok())
    };
    Some(BlockPos::new(coord("x")?, coord("y")?, coord("z")?))
}

fn ledger_to_tag(ledger: &ResourceLedger) -> Value {
    let map: Map<String, Value> = ledger
        .iter()
        .map(|(kind, count)| (kind.to_string(), json!(count)))
        .collect();
    Value::Object(map)
}

/// Field accessors over one settlement node that log instead of failing.
struct NodeReader<'a> {
    node: &'a Map<String, Value>,
    context: String,
}

impl<'a> NodeReader<'a> {
    fn field(&self, key: &str) -> Option<&'a Value> {
        let value = self.node.get(key);
        if value.is_none() {
            debug!("{}: no '{}' field, using default", self.context, key);
        }
        value
    }

    fn typed<T>(&self, key: &str, convert: impl FnOnce(&'a Value) -> Option<T>) -> Option<T> {
        let value = self.field(key)?;
        let converted = convert(value);
        if converted.is_none() {
            warn!("{}: ignoring malformed '{}' field: {}", self.context, key, value);
        }
        converted
    }

    fn string(&self, key: &str) -> Option<String> {
        self.typed(key, |v| v.as_str().map(str::to_string))
    }

    fn u32(&self, key: &str) -> Option<u32> {
        self.typed(key, |v| v.as_u64().and_then(|n| u32::try_from(n).ok()))
    }

    fn i32(&self, key: &str) -> Option<i32> {
        // Out-of-range radii are clamped on assignment, so saturate here.
        self.typed(key, |v| {
            v.as_i64()
                .map(|n| n.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
        })
    }

    fn bool(&self, key: &str) -> Option<bool> {
        self.typed(key, Value::as_bool)
    }

    fn object(&self, key: &str) -> Option<&'a Map<String, Value>> {
        self.typed(key, Value::as_object)
    }

    fn array(&self, key: &str) -> Option<&'a Vec<Value>> {
        self.typed(key, Value::as_array)
    }

    fn ledger(&self, key: &str) -> ResourceLedger {
        self.object(key)
            .map(|map| ledger_from_map(map, &format!("{} {}", self.context, key)))
            .unwrap_or_default()
    }

    fn visitors(&self, key: &str) -> BTreeMap<SettlementId, u64> {
        let Some(map) = self.object(key) else {
            return BTreeMap::new();
        };
        map.iter()
            .filter_map(|(origin, count)| {
                let parsed = origin.parse::<SettlementId>().ok().zip(count.as_u64());
                if parsed.is_none() {
                    warn!("{}: skipping visitor tally '{}': {}", self.context, origin, count);
                }
                parsed
            })
            .collect()
    }

    fn personal_storage(&self, key: &str) -> BTreeMap<VisitorId, ResourceLedger> {
        let Some(map) = self.object(key) else {
            return BTreeMap::new();
        };
        map.iter()
            .filter_map(|(visitor, node)| {
                let Ok(visitor_id) = visitor.parse::<VisitorId>() else {
                    warn!("{}: skipping personal storage for '{}'", self.context, visitor);
                    return None;
                };
                let ledger = match node.as_object() {
                    Some(map) => ledger_from_map(map, &format!("{} {}", self.context, visitor_id)),
                    None => ResourceLedger::new(),
                };
                (!ledger.is_empty()).then_some((visitor_id, ledger))
            })
            .collect()
    }

    fn history(&self, key: &str) -> VisitHistory {
        let Some(records) = self.array(key) else {
            return VisitHistory::new();
        };
        let parsed = records.iter().filter_map(|node| {
            let record = history_record_from_tag(node);
            if record.is_none() {
                warn!("{}: skipping malformed visit record: {}", self.context, node);
            }
            record
        });
        VisitHistory::from_newest_first(parsed)
    }

    fn transit(&self, config: &TownConfig) -> TransitFacility {
        let platforms: Vec<Platform> = self
            .array("platforms")
            .map(|nodes| {
                nodes
                    .iter()
                    .filter_map(|node| {
                        let platform = platform_from_tag(node);
                        if platform.is_none() {
                            warn!("{}: skipping malformed platform: {}", self.context, node);
                        }
                        platform
                    })
                    .collect()
            })
            .unwrap_or_default();

        let next_id = self.node.get("nextPlatformId").and_then(Value::as_u64);
        let next_id = next_id.and_then(|n| u32::try_from(n).ok());

        if platforms.is_empty() {
            if let Some(legacy) = self.legacy_platform(config) {
                info!("{}: migrated legacy path into '{}'", self.context, legacy.name);
                return TransitFacility::from_platforms(vec![legacy], next_id);
            }
        }
        TransitFacility::from_platforms(platforms, next_id)
    }

    /// Platform 0 synthesized from the version 1 `pathStart`/`pathEnd` fields.
    fn legacy_platform(&self, config: &TownConfig) -> Option<Platform> {
        let start = self.node.get("pathStart").and_then(pos_from_tag);
        let end = self.node.get("pathEnd").and_then(pos_from_tag);
        if start.is_none() && end.is_none() {
            return None;
        }
        let name = format!("{} 1", config.transit.platform_name_prefix);
        let mut platform = Platform::new(PlatformId(0), name);
        platform.start = start;
        platform.end = end;
        Some(platform)
    }
}

fn ledger_from_map(map: &Map<String, Value>, context: &str) -> ResourceLedger {
    let mut ledger = ResourceLedger::new();
    for (key, count) in map {
        let Some(kind) = ResourceKind::parse(key) else {
            warn!("{context}: skipping unknown resource '{key}'");
            continue;
        };
        let Some(count) = count.as_u64() else {
            warn!("{context}: skipping '{key}' with non-count value {count}");
            continue;
        };
        ledger.add(kind, count);
    }
    ledger
}

fn history_record_from_tag(tag: &Value) -> Option<VisitHistoryRecord> {
    Some(VisitHistoryRecord {
        timestamp: tag.get("timestamp")?.as_u64()?,
        origin: SettlementId(tag.get("originId")?.as_u64()?),
        count: u32::try_from(tag.get("count")?.as_u64()?).ok()?,
        origin_pos: tag.get("pos").and_then(pos_from_tag),
    })
}

fn platform_from_tag(tag: &Value) -> Option<Platform> {
    let id = PlatformId(u32::try_from(tag.get("id")?.as_u64()?).ok()?);
    let name = tag.get("name").and_then(Value::as_str).unwrap_or_default();
    let mut platform = Platform::new(id, name);
    platform.enabled = tag.get("enabled").and_then(Value::as_bool).unwrap_or(true);
    platform.start = tag.get("startPos").and_then(pos_from_tag);
    platform.end = tag.get("endPos").and_then(pos_from_tag);
    let mut destinations = BTreeSet::new();
    for entry in tag.get("destinations").and_then(Value::as_array).into_iter().flatten() {
        match entry.as_u64() {
            Some(destination) => {
                destinations.insert(SettlementId(destination));
            }
            None => warn!("{}: skipping malformed destination {}", id, entry),
        }
    }
    platform.enabled_destinations = destinations;
    Some(platform)
}

// ============================================================================
// REGISTRY SNAPSHOTS
// ============================================================================

pub fn registry_to_tag(registry: &SettlementRegistry) -> Value {
    let settlements: Map<String, Value> = registry
        .settlements
        .iter()
        .map(|(id, settlement)| (id.0.to_string(), settlement_to_tag(settlement)))
        .collect();
    json!({
        "version": SNAPSHOT_VERSION,
        "nextSettlementId": registry.next_id,
        "settlements": settlements,
    })
}

/// Replace the registry's contents with a snapshot.
///
/// Nodes that cannot be read are logged and dropped; the version check is the
/// only thing that aborts the load, and it leaves the registry untouched.
pub fn load_registry(registry: &mut SettlementRegistry, tag: &Value) -> Result<(), PersistenceError> {
    let root = tag
        .as_object()
        .ok_or_else(|| PersistenceError::Malformed("snapshot root is not an object".into()))?;

    let version = root.get("version").and_then(Value::as_u64).unwrap_or(1);
    let version = u32::try_from(version).unwrap_or(u32::MAX);
    if version > SNAPSHOT_VERSION {
        return Err(PersistenceError::VersionMismatch {
            supported: SNAPSHOT_VERSION,
            found: version,
        });
    }

    let mut settlements = BTreeMap::new();
    if let Some(nodes) = root.get("settlements").and_then(Value::as_object) {
        for (key, node) in nodes {
            let settlement = match settlement_from_tag(node, registry.config()) {
                Ok(s) => s,
                Err(e) => {
                    warn!("Skipping settlement '{}': {}", key, e);
                    continue;
                }
            };
            if key.parse::<u64>().ok() != Some(settlement.id.0) {
                warn!("Settlement key '{}' does not match {}", key, settlement.id);
            }
            if settlements.contains_key(&settlement.id) {
                warn!("Skipping duplicate {}", settlement.id);
                continue;
            }
            settlements.insert(settlement.id, settlement);
        }
    }

    let stored_next = root.get("nextSettlementId").and_then(Value::as_u64).unwrap_or(0);
    let seen_next = settlements.keys().next_back().map_or(0, |id| id.0 + 1);

    registry.settlements = settlements;
    registry.next_id = stored_next.max(seen_next);
    registry.clear_state_flags();
    info!(
        "Loaded {} settlement(s) from version {} snapshot",
        registry.len(),
        version
    );
    Ok(())
}

/// Write a registry snapshot as JSON text.
pub fn save_to_writer<W: Write>(registry: &SettlementRegistry, writer: W) -> Result<(), PersistenceError> {
    serde_json::to_writer_pretty(writer, &registry_to_tag(registry))?;
    Ok(())
}

/// Read a registry snapshot from JSON text.
pub fn load_from_reader<R: Read>(
    registry: &mut SettlementRegistry,
    reader: R,
) -> Result<(), PersistenceError> {
    let tag: Value = serde_json::from_reader(reader)?;
    load_registry(registry, &tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TownConfig {
        TownConfig::default()
    }

    fn populated() -> Settlement {
        let config = config();
        let mut s = Settlement::new(SettlementId(3), BlockPos::new(10, 64, -20), "Brookfield", &config.settlement);
        s.tourist_count = 1;
        s.tourists_received_counter = 4;
        s.set_search_radius(35);
        s.set_tourist_spawning_enabled(false);
        s.visitors.insert(SettlementId(1), 12);

        let wheat = ResourceKind::parse("wheat").unwrap();
        let gear = ResourceKind::parse("create:cogwheel").unwrap();
        s.economy.add(wheat.clone(), 40);
        s.add_to_communal_storage(&gear, 6).unwrap();
        s.add_to_personal_storage(VisitorId(77), &wheat, 2).unwrap();

        s.record_visit(SettlementId(1), 2, Some(BlockPos::new(1, 2, 3)), 100);
        s.record_visit(SettlementId(2), 1, None, 140);

        let p = s.transit.add_platform(&config.transit).unwrap();
        s.transit.set_path(p, BlockPos::new(0, 64, 0), BlockPos::new(12, 64, 0));
        s.transit.set_destination_enabled(p, SettlementId(1), true);
        let q = s.transit.add_platform(&config.transit).unwrap();
        s.transit.set_enabled(q, false);
        s.transit.add_platform(&config.transit);
        s.transit.remove_platform(PlatformId(2));
        s
    }

    #[test]
    fn test_settlement_round_trip() {
        let original = populated();
        let tag = settlement_to_tag(&original);
        let loaded = settlement_from_tag(&tag, &config()).unwrap();
        assert_eq!(loaded, original);
        assert_eq!(loaded.transit().next_id(), 3);
    }

    #[test]
    fn test_empty_settlement_round_trip() {
        let config = config();
        let original = Settlement::new(SettlementId(0), BlockPos::ORIGIN, "", &config.settlement);
        let tag = settlement_to_tag(&original);
        assert_eq!(tag["economy"], json!({}));
        assert_eq!(settlement_from_tag(&tag, &config).unwrap(), original);
    }

    #[test]
    fn test_missing_fields_default() {
        let tag = json!({ "id": 4, "position": { "x": 1, "y": 2, "z": 3 } });
        let s = settlement_from_tag(&tag, &config()).unwrap();
        assert_eq!(s.id(), SettlementId(4));
        assert_eq!(s.population(), 0);
        assert!(s.economy().is_empty());
        assert!(s.history().is_empty());
        assert_eq!(s.search_radius(), 20);
        assert!(s.transit().is_empty());
    }

    #[test]
    fn test_required_fields() {
        assert!(settlement_from_tag(&json!({ "position": { "x": 0, "y": 0, "z": 0 } }), &config()).is_err());
        assert!(settlement_from_tag(&json!({ "id": 1 }), &config()).is_err());
        assert!(settlement_from_tag(&json!([1, 2]), &config()).is_err());
    }

    #[test]
    fn test_unknown_resource_keys_skipped() {
        let tag = json!({
            "id": 1,
            "position": { "x": 0, "y": 0, "z": 0 },
            "economy": { "minecraft:wheat": 5, "Not A Key!": 3, "minecraft:stone": -1 },
            "communalStorage": { "a:b:c": 1, "iron_ingot": 2 },
        });
        let s = settlement_from_tag(&tag, &config()).unwrap();
        assert_eq!(s.economy().len(), 1);
        assert_eq!(s.economy().get(&ResourceKind::parse("wheat").unwrap()), 5);
        assert_eq!(s.storage().communal.total(), 2);
    }

    #[test]
    fn test_search_radius_clamped_on_load() {
        let tag = json!({ "id": 1, "position": { "x": 0, "y": 0, "z": 0 }, "searchRadius": 4000 });
        assert_eq!(settlement_from_tag(&tag, &config()).unwrap().search_radius(), 100);
    }

    #[test]
    fn test_tourist_count_clamped_on_load() {
        let tag = json!({
            "id": 1,
            "position": { "x": 0, "y": 0, "z": 0 },
            "population": 10,
            "touristCount": 50,
        });
        let s = settlement_from_tag(&tag, &config()).unwrap();
        assert_eq!(s.max_tourists(&config().capacity), 1);
        assert_eq!(s.tourist_count(), 1);
    }

    #[test]
    fn test_malformed_destinations_skipped() {
        let tag = json!({
            "id": 1,
            "position": { "x": 0, "y": 0, "z": 0 },
            "platforms": [
                { "id": 0, "name": "North", "destinations": [4, "six", -1, 7] }
            ],
        });
        let s = settlement_from_tag(&tag, &config()).unwrap();
        let platform = s.transit().get(PlatformId(0)).unwrap();
        assert_eq!(
            platform.enabled_destinations.iter().copied().collect::<Vec<_>>(),
            vec![SettlementId(4), SettlementId(7)]
        );
    }

    #[test]
    fn test_legacy_path_migrated() {
        let tag = json!({
            "id": 1,
            "position": { "x": 0, "y": 0, "z": 0 },
            "pathStart": { "x": 0, "y": 64, "z": 0 },
            "pathEnd": { "x": 9, "y": 64, "z": 0 },
        });
        let s = settlement_from_tag(&tag, &config()).unwrap();
        let platform = s.transit().get(PlatformId(0)).unwrap();
        assert_eq!(platform.name, "Platform 1");
        assert!(platform.is_usable());
        assert_eq!(platform.end, Some(BlockPos::new(9, 64, 0)));
    }

    #[test]
    fn test_legacy_path_ignored_when_platforms_exist() {
        let tag = json!({
            "id": 1,
            "position": { "x": 0, "y": 0, "z": 0 },
            "pathStart": { "x": 0, "y": 64, "z": 0 },
            "pathEnd": { "x": 9, "y": 64, "z": 0 },
            "platforms": [{ "id": 5, "name": "North", "enabled": false, "destinations": [2] }],
        });
        let s = settlement_from_tag(&tag, &config()).unwrap();
        assert_eq!(s.transit().len(), 1);
        let platform = s.transit().get(PlatformId(5)).unwrap();
        assert!(!platform.enabled);
        assert!(!platform.is_complete());
        assert!(platform.allows_destination(SettlementId(2)));
        assert!(!platform.allows_destination(SettlementId(3)));
    }

    #[test]
    fn test_registry_round_trip_through_text() {
        let mut registry = SettlementRegistry::new(config());
        let a = registry.register(BlockPos::ORIGIN, "A").unwrap();
        registry.register(BlockPos::new(200, 0, 0), "B").unwrap();
        registry.remove(a).unwrap();

        let mut buf = Vec::new();
        save_to_writer(&registry, &mut buf).unwrap();

        let mut restored = SettlementRegistry::new(config());
        load_from_reader(&mut restored, buf.as_slice()).unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.get(SettlementId(1)), registry.get(SettlementId(1)));
        assert!(!restored.is_dirty());

        // the removed id is not handed out again
        let c = restored.register(BlockPos::new(-300, 0, 0), "C").unwrap();
        assert_eq!(c, SettlementId(2));
    }

    #[test]
    fn test_newer_version_rejected() {
        let mut registry = SettlementRegistry::new(config());
        registry.register(BlockPos::ORIGIN, "A").unwrap();
        let tag = json!({ "version": SNAPSHOT_VERSION + 1, "settlements": {} });
        let err = load_registry(&mut registry, &tag).unwrap_err();
        assert!(matches!(err, PersistenceError::VersionMismatch { found, .. } if found == SNAPSHOT_VERSION + 1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_bad_nodes_do_not_abort_load() {
        let tag = json!({
            "version": 1,
            "settlements": {
                "0": { "id": 0, "position": { "x": 0, "y": 0, "z": 0 }, "population": 8 },
                "1": { "name": "no id" },
                "7": { "id": 7, "position": { "x": 90, "y": 0, "z": 0 } },
            }
        });
        let mut registry = SettlementRegistry::new(config());
        load_registry(&mut registry, &tag).unwrap();
        assert_eq!(registry.ids(), vec![SettlementId(0), SettlementId(7)]);
        let next = registry.register(BlockPos::new(500, 0, 0), "N").unwrap();
        assert_eq!(next, SettlementId(8));
    }
}
