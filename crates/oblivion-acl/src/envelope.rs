//! Ciphertext containers.
//!
//! [`EncryptedPayload`] holds a value at rest under a key the service already
//! has, bound to the handle it belongs to. [`SealedEnvelope`] carries a
//! decryption result to one requester: it names the service's ephemeral key
//! so only the holder of the matching requester secret can derive the
//! transit key.

use serde::{Deserialize, Serialize};

use crate::crypto::{EncryptionKey, EncryptionNonce, EphemeralKeyPair, X25519PublicKey};
use crate::error::{AclError, Result};

/// AEAD in use. Stored with every payload so the format can change later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EncryptionFormat {
    /// ChaCha20-Poly1305, 256-bit key, 96-bit random nonce.
    ChaCha20Poly1305 = 1,
}

/// Ciphertext plus what is needed to decrypt it, given the key and the
/// associated data it was bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub format: EncryptionFormat,
    pub nonce: EncryptionNonce,
    /// Ciphertext with the authentication tag appended.
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// Encrypt `plaintext` and bind it to `aad`.
    pub fn encrypt(plaintext: &[u8], key: &EncryptionKey, aad: &[u8]) -> Result<Self> {
        let (nonce, ciphertext) = key.encrypt(plaintext, aad)?;
        Ok(Self {
            format: EncryptionFormat::ChaCha20Poly1305,
            nonce,
            ciphertext,
        })
    }

    /// Decrypt. `aad` must be what the payload was encrypted with.
    pub fn decrypt(&self, key: &EncryptionKey, aad: &[u8]) -> Result<Vec<u8>> {
        match self.format {
            EncryptionFormat::ChaCha20Poly1305 => key.decrypt(&self.nonce, &self.ciphertext, aad),
        }
    }

    /// Encode as CBOR, the form the vault stores.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| AclError::Encoding(e.to_string()))?;
        Ok(buf)
    }

    /// Decode from CBOR.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| AclError::Encoding(e.to_string()))
    }
}

/// A payload sealed to a requester's ephemeral X25519 key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedEnvelope {
    /// The sealing side's ephemeral public key.
    pub sender_public: X25519PublicKey,
    pub payload: EncryptedPayload,
}

impl SealedEnvelope {
    /// Seal `plaintext` to `recipient`, bound to `context`.
    ///
    /// The envelope only opens with the same `context`; the service passes
    /// the authorization digest, so a response cannot be replayed against a
    /// different request.
    pub fn seal(plaintext: &[u8], recipient: &X25519PublicKey, context: &[u8]) -> Result<Self> {
        let ephemeral = EphemeralKeyPair::generate();
        let sender_public = ephemeral.public_key();

        let key = ephemeral.agree_as_sender(recipient)?.transit_key();
        let payload = EncryptedPayload::encrypt(plaintext, &key, context)?;

        Ok(Self {
            sender_public,
            payload,
        })
    }

    /// Open with the requester's ephemeral secret, which this spends.
    pub fn open(&self, recipient: EphemeralKeyPair, context: &[u8]) -> Result<Vec<u8>> {
        let key = recipient.agree_as_recipient(&self.sender_public)?.transit_key();
        self.payload.decrypt(&key, context)
    }
}
