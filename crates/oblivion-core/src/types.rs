//! Strong type definitions for Oblivion.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{Blake3Hash, Ed25519PublicKey};
use crate::error::CoreError;

const PRINCIPAL_CONTEXT: &str = "oblivion 2024 principal address v1";
const CONTRACT_CONTEXT: &str = "oblivion 2024 contract id v1";

/// Decode a hex string (with or without a `0x` prefix) into a fixed array.
pub(crate) fn decode_fixed_hex<const N: usize>(s: &str) -> Result<[u8; N], CoreError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s)?;
    bytes
        .try_into()
        .map_err(|_| CoreError::InvalidHex(format!("expected {} bytes", N)))
}

/// An address-like identity: the unit of ownership and authorization.
///
/// Derived from the last 20 bytes of a domain-separated Blake3 hash of the
/// principal's Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Principal(pub [u8; 20]);

impl Principal {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Derive the principal controlled by an identity key.
    pub fn from_public_key(key: &Ed25519PublicKey) -> Self {
        let digest = Blake3Hash::derive(PRINCIPAL_CONTEXT, key.as_bytes());
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&digest.0[12..]);
        Self(arr)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Convert to `0x`-prefixed hex string.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex string, `0x` prefix optional.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        Ok(Self(decode_fixed_hex(s)?))
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", &self.to_hex()[..10])
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Identifier of the contract scope a ciphertext is registered under.
///
/// Every store registry has one; the encryption service binds input proofs
/// and decryption authorizations to it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractId(pub [u8; 20]);

impl ContractId {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Derive a contract identifier from a human-readable label.
    pub fn derive(label: &str) -> Self {
        let digest = Blake3Hash::derive(CONTRACT_CONTEXT, label.as_bytes());
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&digest.0[..20]);
        Self(arr)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Convert to `0x`-prefixed hex string.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex string, `0x` prefix optional.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        Ok(Self(decode_fixed_hex(s)?))
    }
}

impl fmt::Debug for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContractId({})", &self.to_hex()[..10])
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// An opaque, fixed-width reference to a ciphertext held by the encryption
/// service.
///
/// Handles carry no arithmetic meaning. Code outside the encryption service
/// compares them for equality and nothing else.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CiphertextHandle(pub [u8; 32]);

impl CiphertextHandle {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to `0x`-prefixed hex string.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex string, `0x` prefix optional.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        Ok(Self(decode_fixed_hex(s)?))
    }
}

impl fmt::Debug for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", &self.to_hex()[..18])
    }
}

impl fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<&[u8]> for CiphertextHandle {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

/// Attestation that a submitted handle was produced for a specific
/// `(submitter, scope)` pair. Opaque to everything but the encryption service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputProof(pub Bytes);

impl InputProof {
    /// Wrap raw proof bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to `0x`-prefixed hex string.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }

    /// Parse from hex string, `0x` prefix optional.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        Ok(Self(Bytes::from(hex::decode(s)?)))
    }

    /// Length of the proof in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the proof is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for InputProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InputProof({} bytes)", self.0.len())
    }
}

/// A freshly encrypted value ready for submission: the raw handle and the
/// proof that accompanies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput {
    /// The raw ciphertext handle.
    pub handle: CiphertextHandle,
    /// Proof binding the handle to its submitter and scope.
    pub proof: InputProof,
}
