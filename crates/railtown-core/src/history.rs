//! Bounded, newest-first log of inbound visits.

use std::collections::VecDeque;

use railtown_logic::geometry::BlockPos;
use serde::{Deserialize, Serialize};

use crate::ids::SettlementId;

/// Most records a settlement keeps.
pub const MAX_HISTORY: usize = 50;

/// One group of visitors arriving from the same origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitHistoryRecord {
    /// Engine tick the group arrived on.
    pub timestamp: u64,
    pub origin: SettlementId,
    pub count: u32,
    pub origin_pos: Option<BlockPos>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitHistory {
    records: VecDeque<VisitHistoryRecord>,
}

impl VisitHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from records already in newest-first order, keeping the newest [`MAX_HISTORY`].
    pub fn from_newest_first(records: impl IntoIterator<Item = VisitHistoryRecord>) -> Self {
        let records = records.into_iter().take(MAX_HISTORY).collect();
        Self { records }
    }

    pub fn record(&mut self, record: VisitHistoryRecord) {
        self.records.push_front(record);
        self.records.truncate(MAX_HISTORY);
    }

    /// Records, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &VisitHistoryRecord> {
        self.records.iter()
    }

    pub fn latest(&self) -> Option<&VisitHistoryRecord> {
        self.records.front()
    }

    pub fn has_visit_from(&self, origin: SettlementId) -> bool {
        self.records.iter().any(|r| r.origin == origin)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
