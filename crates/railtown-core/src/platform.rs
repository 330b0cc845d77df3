//! Platforms and the per-settlement transit facility that owns them.
//!
//! A platform is a path between two block positions where visitors wait for
//! carriers. It is usable for spawning only once both endpoints are set and
//! it is enabled. Its destination allow-list is permissive when empty: no
//! entries means every other settlement is reachable.
//!
//! The facility also tracks path creation mode, a single slot naming the
//! platform whose endpoints are being edited. Starting an edit on another
//! platform replaces the slot; there is no queue.

use std::collections::BTreeSet;

use railtown_logic::config::TransitConfig;
use railtown_logic::geometry::{BlockPos, BoundingVolume};
use serde::{Deserialize, Serialize};

use crate::ids::{PlatformId, SettlementId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub id: PlatformId,
    pub name: String,
    pub enabled: bool,
    pub start: Option<BlockPos>,
    pub end: Option<BlockPos>,
    pub enabled_destinations: BTreeSet<SettlementId>,
}

impl Platform {
    pub fn new(id: PlatformId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            enabled: true,
            start: None,
            end: None,
            enabled_destinations: BTreeSet::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    pub fn is_usable(&self) -> bool {
        self.enabled && self.is_complete()
    }

    pub fn path(&self) -> Option<(BlockPos, BlockPos)> {
        Some((self.start?, self.end?))
    }

    /// Region around the path, padded by `radius`. `None` while incomplete.
    pub fn volume(&self, radius: i32) -> Option<BoundingVolume> {
        self.path()
            .map(|(start, end)| BoundingVolume::around_path(start, end, radius))
    }

    pub fn is_unrestricted(&self) -> bool {
        self.enabled_destinations.is_empty()
    }

    pub fn allows_destination(&self, destination: SettlementId) -> bool {
        self.is_unrestricted() || self.enabled_destinations.contains(&destination)
    }
}

/// All platforms of one settlement, in creation order.
#[derive(Debug, Clone, Default)]
pub struct TransitFacility {
    platforms: Vec<Platform>,
    next_id: u32,
    editing: Option<PlatformId>,
}

impl PartialEq for TransitFacility {
    // Path creation mode is transient editor state and not part of the value.
    fn eq(&self, other: &Self) -> bool {
        self.platforms == other.platforms && self.next_id == other.next_id
    }
}

impl TransitFacility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted platforms.
    ///
    /// New ids continue after both the stored counter and the highest id seen,
    /// so a snapshot with a missing or stale counter never reissues an id.
    pub fn from_platforms(platforms: Vec<Platform>, next_id: Option<u32>) -> Self {
        let seen = platforms
            .iter()
            .map(|p| p.id.0.saturating_add(1))
            .max()
            .unwrap_or(0);
        let next_id = next_id.unwrap_or(0).max(seen);
        Self {
            platforms,
            next_id,
            editing: None,
        }
    }

    /// Create an enabled platform with a default name, or `None` at the limit.
    pub fn add_platform(&mut self, config: &TransitConfig) -> Option<PlatformId> {
        if self.platforms.len() >= config.max_platforms {
            return None;
        }
        let id = PlatformId(self.next_id);
        self.next_id += 1;
        let name = format!("{} {}", config.platform_name_prefix, id.0 + 1);
        self.platforms.push(Platform::new(id, name));
        Some(id)
    }

    pub fn remove_platform(&mut self, id: PlatformId) -> bool {
        let before = self.platforms.len();
        self.platforms.retain(|p| p.id != id);
        if self.editing == Some(id) {
            self.editing = None;
        }
        self.platforms.len() != before
    }

    pub fn get(&self, id: PlatformId) -> Option<&Platform> {
        self.platforms.iter().find(|p| p.id == id)
    }

    fn get_mut(&mut self, id: PlatformId) -> Option<&mut Platform> {
        self.platforms.iter_mut().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Platform> {
        self.platforms.iter()
    }

    /// Enabled, complete platforms in creation order.
    pub fn usable(&self) -> impl Iterator<Item = &Platform> {
        self.platforms.iter().filter(|p| p.is_usable())
    }

    pub fn has_usable(&self) -> bool {
        self.platforms.iter().any(Platform::is_usable)
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    pub fn rename(&mut self, id: PlatformId, name: impl Into<String>) -> bool {
        match self.get_mut(id) {
            Some(platform) => {
                platform.name = name.into();
                true
            }
            None => false,
        }
    }

    /// Set both endpoints. Completes path creation mode if it was editing this platform.
    pub fn set_path(&mut self, id: PlatformId, start: BlockPos, end: BlockPos) -> bool {
        let Some(platform) = self.get_mut(id) else {
            return false;
        };
        platform.start = Some(start);
        platform.end = Some(end);
        if self.editing == Some(id) {
            self.editing = None;
        }
        true
    }

    /// Clear both endpoints, leaving the platform incomplete.
    pub fn reset_path(&mut self, id: PlatformId) -> bool {
        match self.get_mut(id) {
            Some(platform) => {
                platform.start = None;
                platform.end = None;
                true
            }
            None => false,
        }
    }

    pub fn set_enabled(&mut self, id: PlatformId, enabled: bool) -> bool {
        match self.get_mut(id) {
            Some(platform) => {
                platform.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn set_destination_enabled(
        &mut self,
        id: PlatformId,
        destination: SettlementId,
        enabled: bool,
    ) -> bool {
        let Some(platform) = self.get_mut(id) else {
            return false;
        };
        if enabled {
            platform.enabled_destinations.insert(destination);
        } else {
            platform.enabled_destinations.remove(&destination);
        }
        true
    }

    /// Enter path creation mode for `id`, leaving it for any other platform.
    pub fn begin_path_edit(&mut self, id: PlatformId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.editing = Some(id);
        true
    }

    pub fn cancel_path_edit(&mut self) {
        self.editing = None;
    }

    pub fn editing(&self) -> Option<PlatformId> {
        self.editing
    }

    /// Id the next platform will get.
    pub fn next_id(&self) -> u32 {
        self.next_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max: usize) -> TransitConfig {
        TransitConfig {
            max_platforms: max,
            ..TransitConfig::default()
        }
    }

    #[test]
    fn test_add_platform_until_limit() {
        let mut facility = TransitFacility::new();
        let first = facility.add_platform(&config(2)).unwrap();
        assert!(facility.add_platform(&config(2)).is_some());
        assert!(facility.add_platform(&config(2)).is_none());
        assert_eq!(facility.len(), 2);

        let platform = facility.get(first).unwrap();
        assert_eq!(platform.name, "Platform 1");
        assert!(platform.enabled);
        assert!(!platform.is_complete());
    }

    #[test]
    fn test_ids_not_reused_after_removal() {
        let mut facility = TransitFacility::new();
        let a = facility.add_platform(&config(4)).unwrap();
        assert!(facility.remove_platform(a));
        assert!(!facility.remove_platform(a));
        let b = facility.add_platform(&config(4)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_default_names_follow_ids() {
        let mut facility = TransitFacility::new();
        let first = facility.add_platform(&config(4)).unwrap();
        let second = facility.add_platform(&config(4)).unwrap();
        facility.remove_platform(first);
        let third = facility.add_platform(&config(4)).unwrap();

        let names: Vec<&str> = [second, third]
            .iter()
            .filter_map(|id| facility.get(*id))
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["Platform 2", "Platform 3"]);
    }

    #[test]
    fn test_usable_requires_complete_and_enabled() {
        let mut facility = TransitFacility::new();
        let id = facility.add_platform(&config(4)).unwrap();
        assert!(!facility.has_usable());

        facility.set_path(id, BlockPos::new(0, 64, 0), BlockPos::new(8, 64, 0));
        assert!(facility.has_usable());

        facility.set_enabled(id, false);
        assert!(!facility.has_usable());

        facility.set_enabled(id, true);
        facility.reset_path(id);
        assert!(!facility.has_usable());
        assert!(facility.get(id).unwrap().volume(5).is_none());
    }

    #[test]
    fn test_empty_allow_list_is_unrestricted() {
        let mut facility = TransitFacility::new();
        let id = facility.add_platform(&config(4)).unwrap();
        assert!(facility.get(id).unwrap().allows_destination(SettlementId(3)));

        facility.set_destination_enabled(id, SettlementId(1), true);
        let platform = facility.get(id).unwrap();
        assert!(platform.allows_destination(SettlementId(1)));
        assert!(!platform.allows_destination(SettlementId(3)));

        facility.set_destination_enabled(id, SettlementId(1), false);
        assert!(facility.get(id).unwrap().allows_destination(SettlementId(3)));
    }

    #[test]
    fn test_path_edit_is_single_slot() {
        let mut facility = TransitFacility::new();
        let a = facility.add_platform(&config(4)).unwrap();
        let b = facility.add_platform(&config(4)).unwrap();

        assert!(facility.begin_path_edit(a));
        assert!(facility.begin_path_edit(b));
        assert_eq!(facility.editing(), Some(b));

        facility.set_path(a, BlockPos::ORIGIN, BlockPos::new(1, 0, 0));
        assert_eq!(facility.editing(), Some(b));

        facility.set_path(b, BlockPos::ORIGIN, BlockPos::new(1, 0, 0));
        assert_eq!(facility.editing(), None);

        facility.begin_path_edit(a);
        facility.cancel_path_edit();
        assert_eq!(facility.editing(), None);
        assert!(!facility.begin_path_edit(PlatformId(99)));
    }

    #[test]
    fn test_removing_edited_platform_clears_edit() {
        let mut facility = TransitFacility::new();
        let a = facility.add_platform(&config(4)).unwrap();
        facility.begin_path_edit(a);
        facility.remove_platform(a);
        assert_eq!(facility.editing(), None);
    }

    #[test]
    fn test_from_platforms_continues_ids() {
        let platforms = vec![
            Platform::new(PlatformId(0), "a"),
            Platform::new(PlatformId(4), "b"),
        ];
        let mut facility = TransitFacility::from_platforms(platforms.clone(), None);
        assert_eq!(facility.add_platform(&config(8)), Some(PlatformId(5)));

        let mut facility = TransitFacility::from_platforms(platforms, Some(9));
        assert_eq!(facility.add_platform(&config(8)), Some(PlatformId(9)));
    }

    #[test]
    fn test_equality_ignores_edit_mode() {
        let mut a = TransitFacility::new();
        let id = a.add_platform(&config(4)).unwrap();
        let b = a.clone();
        a.begin_path_edit(id);
        assert_eq!(a, b);
    }
}
