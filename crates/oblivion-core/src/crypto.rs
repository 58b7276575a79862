//! Identity keys and hashing.
//!
//! A principal's long-term identity is an Ed25519 keypair; its [`Principal`]
//! address is a hash of the public half. All hashing goes through Blake3,
//! usually keyed by a context string so digests from different purposes never
//! collide.

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;
use crate::types::Principal;

fn short_hex(bytes: &[u8]) -> String {
    hex::encode(&bytes[..8])
}

/// A Blake3 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blake3Hash(pub [u8; 32]);

impl Blake3Hash {
    /// Plain Blake3 over `data`.
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Blake3 in key-derivation mode under `context`.
    pub fn derive(context: &str, data: &[u8]) -> Self {
        Self(blake3::derive_key(context, data))
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blake3Hash({}..)", short_hex(&self.0))
    }
}

/// The public half of an identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ed25519PublicKey(pub [u8; 32]);

impl Ed25519PublicKey {
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The address this key signs for.
    pub fn principal(&self) -> Principal {
        Principal::from_public_key(self)
    }

    /// Check `signature` over `message`.
    ///
    /// Uses strict verification, so malleated signatures and small-order
    /// keys are refused.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CoreError> {
        let key = VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        key.verify_strict(message, &Signature::from_bytes(&signature.0))
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519PublicKey({}..)", short_hex(&self.0))
    }
}

/// A detached Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature(pub [u8; 64]);

impl Ed25519Signature {
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Signature({}..)", short_hex(&self.0))
    }
}

// serde derives stop at 32-element arrays. Encode as a byte string and accept
// either a byte string or a plain sequence back (JSON only has the latter).
impl Serialize for Ed25519Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

struct SignatureBytes;

impl<'de> Visitor<'de> for SignatureBytes {
    type Value = Ed25519Signature;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a 64-byte ed25519 signature")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        <[u8; 64]>::try_from(v)
            .map(Ed25519Signature)
            .map_err(|_| E::invalid_length(v.len(), &self))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut out = [0u8; 64];
        let mut filled = 0;
        while let Some(byte) = seq.next_element::<u8>()? {
            if filled == out.len() {
                return Err(de::Error::invalid_length(filled + 1, &self));
            }
            out[filled] = byte;
            filled += 1;
        }
        if filled != out.len() {
            return Err(de::Error::invalid_length(filled, &self));
        }
        Ok(Ed25519Signature(out))
    }
}

impl<'de> Deserialize<'de> for Ed25519Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_bytes(SignatureBytes)
    }
}

/// A principal's signing identity.
#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// A fresh random identity.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    /// The identity whose secret scalar is derived from `seed`.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing.verifying_key().to_bytes())
    }

    pub fn principal(&self) -> Principal {
        self.public_key().principal()
    }

    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing.sign(message).to_bytes())
    }
}

// Never print the secret.
impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Keypair").field(&self.principal()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_binds_message() {
        let alice = Keypair::generate();
        let signature = alice.sign(b"create store");

        assert!(alice.public_key().verify(b"create store", &signature).is_ok());
        assert!(matches!(
            alice.public_key().verify(b"rename store", &signature),
            Err(CoreError::InvalidSignature)
        ));
    }

    #[test]
    fn test_signature_binds_signer() {
        let alice = Keypair::from_seed(&[1; 32]);
        let bob = Keypair::from_seed(&[2; 32]);
        let signature = alice.sign(b"msg");

        assert!(bob.public_key().verify(b"msg", &signature).is_err());
    }

    #[test]
    fn test_same_seed_same_principal() {
        let a = Keypair::from_seed(&[0x42; 32]);
        let b = Keypair::from_seed(&[0x42; 32]);
        assert_eq!(a.principal(), b.principal());
        assert_ne!(a.principal(), Keypair::from_seed(&[0x43; 32]).principal());
    }

    #[test]
    fn test_derive_depends_on_context() {
        let owner = Blake3Hash::derive("oblivion test owner", b"data");
        let scope = Blake3Hash::derive("oblivion test scope", b"data");
        assert_ne!(owner, scope);
        assert_ne!(owner, Blake3Hash::hash(b"data"));
    }

    #[test]
    fn test_keypair_debug_hides_secret() {
        let keypair = Keypair::from_seed(&[0xee; 32]);
        let printed = format!("{:?}", keypair);
        assert!(printed.starts_with("Keypair("));
        assert!(!printed.contains(&hex::encode([0xee; 32])));
    }

    #[test]
    fn test_signature_encodings() {
        let signature = Keypair::generate().sign(b"payload");

        let mut cbor = Vec::new();
        ciborium::into_writer(&signature, &mut cbor).unwrap();
        let back: Ed25519Signature = ciborium::from_reader(cbor.as_slice()).unwrap();
        assert_eq!(back, signature);

        let json = serde_json::to_string(&signature).unwrap();
        let back: Ed25519Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, signature);

        let short = serde_json::to_string(&vec![0u8; 63]).unwrap();
        assert!(serde_json::from_str::<Ed25519Signature>(&short).is_err());
    }
}
