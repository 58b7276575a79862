//! ACL grant records.

use serde::{Deserialize, Serialize};

use oblivion_core::{CiphertextHandle, Principal};

/// Permission for `principal` to request decryption of `handle`.
///
/// Grants are created when a handle is written into a store and are never
/// revoked. Overwriting an item orphans the old handle's grant rather than
/// removing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AclGrant {
    /// The handle access is granted to.
    pub handle: CiphertextHandle,

    /// The principal receiving access.
    pub principal: Principal,
}

impl AclGrant {
    /// Create a new grant.
    pub const fn new(handle: CiphertextHandle, principal: Principal) -> Self {
        Self { handle, principal }
    }
}
