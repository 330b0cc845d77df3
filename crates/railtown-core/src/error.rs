//! Error types returned by the engine.
//!
//! None of these are fatal: every fallible settlement operation hands one of
//! them back and leaves state as it was before the call.

use thiserror::Error;

use crate::ids::{PlatformId, SettlementId};
use crate::ledger::ResourceKind;

/// Why a settlement could not be placed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlacementError {
    #[error("too close to {existing}: {distance:.1} blocks apart, {required:.1} required")]
    TooClose {
        existing: SettlementId,
        distance: f64,
        required: f64,
    },
}

/// Why a storage change was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("insufficient {kind}: have {available}, need {requested}")]
    InsufficientStock {
        kind: ResourceKind,
        available: u64,
        requested: u64,
    },
    #[error("this storage port only allows withdrawals")]
    WithdrawOnly,
}

/// Failures of registry-level operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TownError {
    #[error("settlement {0} not found")]
    NotFound(SettlementId),
    #[error("platform {platform} not found in {settlement}")]
    PlatformNotFound {
        settlement: SettlementId,
        platform: PlatformId,
    },
    #[error("{what} is at capacity ({limit})")]
    AtCapacity { what: &'static str, limit: usize },
    #[error(transparent)]
    Placement(#[from] PlacementError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures while reading or writing a registry snapshot.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot version mismatch: supported up to {supported}, found {found}")]
    VersionMismatch { supported: u32, found: u32 },
    #[error("malformed snapshot: {0}")]
    Malformed(String),
}
