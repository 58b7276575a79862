//! Decryption request and response types.
//!
//! These are exchanged between a requester and the encryption service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use oblivion_acl::SealedEnvelope;
use oblivion_core::{CiphertextHandle, DecryptionAuthorization, Principal};

use crate::error::{Result, ServiceError};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 0;

/// Plaintext results keyed by handle.
pub type DecryptedValues = BTreeMap<CiphertextHandle, u32>;

/// A user-decryption request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptRequest {
    /// Protocol version for compatibility checking.
    pub protocol_version: u8,
    /// Principal the request is made on behalf of.
    pub requester: Principal,
    /// Handles to decrypt. Must all be named by the authorization.
    pub handles: Vec<CiphertextHandle>,
    /// The signed authorization.
    pub authorization: DecryptionAuthorization,
}

impl DecryptRequest {
    /// Request every handle the authorization names.
    pub fn for_authorization(authorization: DecryptionAuthorization) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            requester: authorization.requester(),
            handles: authorization.handles().to_vec(),
            authorization,
        }
    }
}

/// The service's answer to an accepted request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptResponse {
    /// Plaintexts sealed to the authorization's ephemeral key.
    pub envelope: SealedEnvelope,
}

/// One plaintext entry inside a sealed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct DecryptedValue {
    handle: CiphertextHandle,
    value: u32,
}

/// Encode plaintext results for sealing.
pub(crate) fn encode_values(values: &DecryptedValues) -> Result<Vec<u8>> {
    let entries: Vec<DecryptedValue> = values
        .iter()
        .map(|(handle, value)| DecryptedValue {
            handle: *handle,
            value: *value,
        })
        .collect();

    let mut buf = Vec::new();
    ciborium::into_writer(&entries, &mut buf)
        .map_err(|e| ServiceError::Encoding(e.to_string()))?;
    Ok(buf)
}

/// Decode plaintext results after opening.
pub(crate) fn decode_values(bytes: &[u8]) -> Result<DecryptedValues> {
    let entries: Vec<DecryptedValue> =
        ciborium::from_reader(bytes).map_err(|e| ServiceError::Encoding(e.to_string()))?;
    Ok(entries.into_iter().map(|e| (e.handle, e.value)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_encoding() {
        let mut values = DecryptedValues::new();
        values.insert(CiphertextHandle::from_bytes([2; 32]), 7);
        values.insert(CiphertextHandle::from_bytes([1; 32]), u32::MAX);

        let bytes = encode_values(&values).unwrap();
        assert_eq!(decode_values(&bytes).unwrap(), values);
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        assert!(matches!(
            decode_values(&[0xff, 0x00]),
            Err(ServiceError::Encoding(_))
        ));
    }
}
