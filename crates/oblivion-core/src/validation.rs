//! Structural validation of names and authorizations.

use crate::authorization::{DecryptionAuthorization, MAX_VALIDITY_SECS};
use crate::error::ValidationError;

/// Maximum length of a store or item name, in bytes.
pub const MAX_NAME_LEN: usize = 256;

/// Maximum number of handles one authorization may name.
pub const MAX_HANDLES_PER_REQUEST: usize = 64;

/// Tolerated clock drift between requester and service, in seconds.
pub const MAX_CLOCK_SKEW_SECS: u64 = 300;

/// Validate a store name. Empty names are allowed.
pub fn validate_store_name(name: &str) -> Result<(), ValidationError> {
    if name.len() > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong {
            kind: "store",
            len: name.len(),
            max: MAX_NAME_LEN,
        });
    }
    Ok(())
}

/// Validate an item name. Must be non-empty.
pub fn validate_item_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyItemName);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong {
            kind: "item",
            len: name.len(),
            max: MAX_NAME_LEN,
        });
    }
    Ok(())
}

/// Check the shape of an authorization at time `now`.
///
/// This does not verify the signature or the expiry; only limits that make
/// an authorization unacceptable whoever signed it.
pub fn validate_authorization(
    auth: &DecryptionAuthorization,
    now: u64,
) -> Result<(), ValidationError> {
    let msg = &auth.message;

    if msg.handles.len() > MAX_HANDLES_PER_REQUEST {
        return Err(ValidationError::TooManyHandles {
            count: msg.handles.len(),
            max: MAX_HANDLES_PER_REQUEST,
        });
    }

    if msg.contract_scope.is_empty() {
        return Err(ValidationError::EmptyScope);
    }

    if msg.validity_secs == 0 {
        return Err(ValidationError::ZeroValidity);
    }

    if msg.validity_secs > MAX_VALIDITY_SECS {
        return Err(ValidationError::ValidityTooLong {
            secs: msg.validity_secs,
            max: MAX_VALIDITY_SECS,
        });
    }

    if msg.issued_at > now.saturating_add(MAX_CLOCK_SKEW_SECS) {
        return Err(ValidationError::IssuedInFuture {
            issued_at: msg.issued_at,
            now,
        });
    }

    Ok(())
}
