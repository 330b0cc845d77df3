//! Communal and personal storage with access ports.
//!
//! Storage is reached either through the signed-delta operations on
//! [`SettlementStorage`] or through a [`StoragePort`]. A port is opened with a
//! fixed [`PortAccess`]; the withdraw-only port is what automation pulling
//! stock out of a settlement gets, the read-write port is what the owner gets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::ids::VisitorId;
use crate::ledger::{ResourceKind, ResourceLedger};

/// What a port is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortAccess {
    WithdrawOnly,
    ReadWrite,
}

/// Which ledger a port is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageTarget {
    Communal,
    Personal(VisitorId),
}

/// Shared storage plus one private ledger per visitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementStorage {
    pub communal: ResourceLedger,
    /// Never holds an empty ledger.
    pub personal: BTreeMap<VisitorId, ResourceLedger>,
}

impl SettlementStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_to_communal(&mut self, kind: &ResourceKind, delta: i64) -> Result<u64, StorageError> {
        self.communal.apply_delta(kind, delta)
    }

    pub fn add_to_personal(
        &mut self,
        visitor: VisitorId,
        kind: &ResourceKind,
        delta: i64,
    ) -> Result<u64, StorageError> {
        let ledger = self.personal.entry(visitor).or_default();
        let result = ledger.apply_delta(kind, delta);
        if ledger.is_empty() {
            self.personal.remove(&visitor);
        }
        result
    }

    pub fn personal(&self, visitor: VisitorId) -> Option<&ResourceLedger> {
        self.personal.get(&visitor)
    }

    pub fn balance(&self, target: StorageTarget, kind: &ResourceKind) -> u64 {
        match target {
            StorageTarget::Communal => self.communal.get(kind),
            StorageTarget::Personal(visitor) => {
                self.personal.get(&visitor).map(|l| l.get(kind)).unwrap_or(0)
            }
        }
    }

    pub fn port(&mut self, target: StorageTarget, access: PortAccess) -> StoragePort<'_> {
        StoragePort {
            storage: self,
            target,
            access,
        }
    }
}

/// Access-limited view onto one ledger of a [`SettlementStorage`].
pub struct StoragePort<'a> {
    storage: &'a mut SettlementStorage,
    target: StorageTarget,
    access: PortAccess,
}

impl StoragePort<'_> {
    pub fn access(&self) -> PortAccess {
        self.access
    }

    pub fn target(&self) -> StorageTarget {
        self.target
    }

    pub fn balance(&self, kind: &ResourceKind) -> u64 {
        self.storage.balance(self.target, kind)
    }

    pub fn withdraw(&mut self, kind: &ResourceKind, amount: u64) -> Result<u64, StorageError> {
        let delta = i64::try_from(amount).unwrap_or(i64::MAX);
        self.apply(kind, -delta)
    }

    pub fn deposit(&mut self, kind: &ResourceKind, amount: u64) -> Result<u64, StorageError> {
        if self.access == PortAccess::WithdrawOnly {
            return Err(StorageError::WithdrawOnly);
        }
        let delta = i64::try_from(amount).unwrap_or(i64::MAX);
        self.apply(kind, delta)
    }

    fn apply(&mut self, kind: &ResourceKind, delta: i64) -> Result<u64, StorageError> {
        match self.target {
            StorageTarget::Communal => self.storage.add_to_communal(kind, delta),
            StorageTarget::Personal(visitor) => self.storage.add_to_personal(visitor, kind, delta),
        }
    }
}
