//! Key agreement and authenticated encryption.
//!
//! ChaCha20-Poly1305 with associated data for everything encrypted, X25519
//! for agreeing one-shot transit keys, Blake3 for deriving keys.

use std::fmt;

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey};

use crate::error::{AclError, Result};

const TRANSIT_KEY_CONTEXT: &str = "oblivion 2024 transit key v1";

/// An X25519 public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct X25519PublicKey(pub [u8; 32]);

impl X25519PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Result of one X25519 agreement between a sealing and an opening party.
pub struct SharedKey {
    secret: [u8; 32],
    sender: X25519PublicKey,
    recipient: X25519PublicKey,
}

impl SharedKey {
    /// The symmetric key for the envelope this agreement protects.
    ///
    /// Both public halves are hashed in, so the key belongs to exactly this
    /// pair of ephemeral keys.
    pub fn transit_key(&self) -> EncryptionKey {
        let mut hasher = blake3::Hasher::new_derive_key(TRANSIT_KEY_CONTEXT);
        hasher.update(&self.secret);
        hasher.update(&self.sender.0);
        hasher.update(&self.recipient.0);
        EncryptionKey(*hasher.finalize().as_bytes())
    }
}

/// A 256-bit ChaCha20-Poly1305 key.
#[derive(Clone)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    /// Generate a random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Derive a key from secret seed material under a context string.
    pub fn derive(context: &str, seed: &[u8]) -> Self {
        Self(blake3::derive_key(context, seed))
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.0))
    }

    /// Encrypt under a fresh random nonce, authenticating `aad` alongside.
    pub fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<(EncryptionNonce, Vec<u8>)> {
        let nonce = EncryptionNonce::generate();
        let ciphertext = self
            .cipher()
            .encrypt(
                Nonce::from_slice(&nonce.0),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|e| AclError::Seal(e.to_string()))?;
        Ok((nonce, ciphertext))
    }

    /// Decrypt. Fails unless the key, nonce and `aad` all match.
    pub fn decrypt(
        &self,
        nonce: &EncryptionNonce,
        ciphertext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>> {
        self.cipher()
            .decrypt(
                Nonce::from_slice(&nonce.0),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| AclError::Open)
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// A 96-bit ChaCha20-Poly1305 nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionNonce(pub [u8; 12]);

impl EncryptionNonce {
    fn generate() -> Self {
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}

/// Single-use X25519 keypair.
///
/// A requester makes one per decrypt attempt and the service makes one per
/// response. Agreeing consumes the secret.
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: X25519PublicKey,
}

impl EphemeralKeyPair {
    /// Generate a keypair.
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(rand::thread_rng());
        let public = X25519PublicKey(*PublicKey::from(&secret).as_bytes());
        Self { secret, public }
    }

    /// The public half.
    pub fn public_key(&self) -> X25519PublicKey {
        self.public
    }

    /// Agree as the sealing side, with this keypair as sender.
    pub fn agree_as_sender(self, recipient: &X25519PublicKey) -> Result<SharedKey> {
        let sender = self.public;
        let secret = self.agree(recipient)?;
        Ok(SharedKey {
            secret,
            sender,
            recipient: *recipient,
        })
    }

    /// Agree as the opening side, with this keypair as recipient.
    pub fn agree_as_recipient(self, sender: &X25519PublicKey) -> Result<SharedKey> {
        let recipient = self.public;
        let secret = self.agree(sender)?;
        Ok(SharedKey {
            secret,
            sender: *sender,
            recipient,
        })
    }

    fn agree(self, peer: &X25519PublicKey) -> Result<[u8; 32]> {
        let shared = self.secret.diffie_hellman(&PublicKey::from(peer.0));
        if !shared.was_contributory() {
            return Err(AclError::WeakKeyAgreement);
        }
        Ok(*shared.as_bytes())
    }
}

impl fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EphemeralKeyPair({:?})", self.public)
    }
}
