//! Grant state.
//!
//! An append-only set of [`AclGrant`]s keyed by handle. This is the in-memory
//! form; persistent ledgers mirror it in a table with the same semantics.

use std::collections::{HashMap, HashSet};

use oblivion_core::{CiphertextHandle, Principal};

use crate::grant::AclGrant;

/// Aggregated grant state.
#[derive(Debug, Clone, Default)]
pub struct AclRegistry {
    /// handle -> principals, in the order they were granted.
    by_handle: HashMap<CiphertextHandle, Vec<Principal>>,

    /// Membership index for constant-time checks.
    index: HashSet<AclGrant>,
}

impl AclRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a grant.
    ///
    /// Idempotent: returns `true` if the grant was new, `false` if it already
    /// existed. Granting twice is never an error.
    pub fn grant(&mut self, handle: CiphertextHandle, principal: Principal) -> bool {
        if !self.index.insert(AclGrant::new(handle, principal)) {
            return false;
        }
        self.by_handle.entry(handle).or_default().push(principal);
        true
    }

    /// Check whether `principal` may request decryption of `handle`.
    pub fn is_authorized(&self, handle: &CiphertextHandle, principal: &Principal) -> bool {
        self.index.contains(&AclGrant::new(*handle, *principal))
    }

    /// Principals granted on a handle, oldest first.
    pub fn grantees(&self, handle: &CiphertextHandle) -> &[Principal] {
        self.by_handle
            .get(handle)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Total number of grants.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether no grants exist.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
