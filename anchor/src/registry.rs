//! Write-once registry binding snapshot ids to the user/portfolio that produced them.
//!
//! Every successful [`ProofAnchorRegistry::anchor_proof`] adds exactly one record; records
//! are never replaced or removed. Reads never fail: an unknown snapshot yields
//! [`AnchorRecord::absent`].

use crate::constants::{DUPLICATE_PROOF_MSG, INVALID_SNAPSHOT_MSG};
use crate::types::{AnchorRecord, PortfolioId, SnapshotId, UserId};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The snapshot id is the zero identifier.
    #[error("{}", INVALID_SNAPSHOT_MSG)]
    InvalidKey,

    /// The snapshot id already has a record.
    #[error("{}", DUPLICATE_PROOF_MSG)]
    DuplicateKey,
}

#[derive(Debug, Default)]
pub struct ProofAnchorRegistry {
    anchors: RwLock<HashMap<SnapshotId, AnchorRecord>>,
}

impl ProofAnchorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the write preconditions without writing.
    ///
    /// Checks validity before existence, so a zero id always reports `InvalidKey`.
    pub fn check_anchorable(&self, snapshot: &SnapshotId) -> Result<(), RegistryError> {
        if snapshot.is_zero() {
            return Err(RegistryError::InvalidKey);
        }
        if self.read().contains_key(snapshot) {
            return Err(RegistryError::DuplicateKey);
        }
        Ok(())
    }

    /// Bind `snapshot` to `(user, portfolio)`.
    ///
    /// The existence check and the insert happen under one write guard.
    pub fn anchor_proof(
        &self,
        snapshot: SnapshotId,
        user: UserId,
        portfolio: PortfolioId,
    ) -> Result<(), RegistryError> {
        if snapshot.is_zero() {
            return Err(RegistryError::InvalidKey);
        }

        match self.write().entry(snapshot) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateKey),
            Entry::Vacant(slot) => {
                slot.insert(AnchorRecord::anchored(user, portfolio));
                Ok(())
            }
        }
    }

    pub fn verify_proof(&self, snapshot: &SnapshotId) -> AnchorRecord {
        self.read()
            .get(snapshot)
            .copied()
            .unwrap_or_else(AnchorRecord::absent)
    }

    /// Number of anchored snapshots.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panicking holder cannot leave a half-written record (insertion is a single map
    // operation), so a poisoned lock still guards a consistent map.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<SnapshotId, AnchorRecord>> {
        self.anchors.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SnapshotId, AnchorRecord>> {
        self.anchors.write().unwrap_or_else(PoisonError::into_inner)
    }
}
