//! User-decryption session state machine.
//!
//! A session walks one decryption attempt through its states:
//!
//! ```text
//! Idle -> KeypairGenerated -> MessageComposed -> Signed -> Submitted -> Decrypted
//!                                                                   \-> Rejected
//! ```
//!
//! Each attempt uses a fresh ephemeral keypair; the secret never leaves the
//! session and is spent opening the response.

use oblivion_acl::{EphemeralKeyPair, X25519PublicKey};
use oblivion_core::{
    AuthorizationMessage, CiphertextHandle, ContractId, DecryptionAuthorization, Keypair,
    TypedDataDomain,
};
use tracing::debug;

use crate::error::{DenialReason, Result, ServiceError};
use crate::messages::{decode_values, DecryptRequest, DecryptedValues};
use crate::service::EncryptionService;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing done yet.
    Idle,
    /// An ephemeral keypair exists.
    KeypairGenerated,
    /// The authorization message is composed but unsigned.
    MessageComposed,
    /// The authorization is signed and ready to submit.
    Signed,
    /// The request reached the service and a response is being opened.
    Submitted,
    /// The service refused. Terminal.
    Rejected(DenialReason),
    /// Plaintexts were recovered. Terminal.
    Decrypted,
}

impl SessionState {
    /// Whether no further step is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected(_) | Self::Decrypted)
    }
}

/// One user-decryption attempt.
pub struct UserDecryptSession {
    state: SessionState,
    domain: TypedDataDomain,
    ephemeral: Option<EphemeralKeyPair>,
    message: Option<AuthorizationMessage>,
    authorization: Option<DecryptionAuthorization>,
}

impl UserDecryptSession {
    /// Start a session against a service domain.
    pub fn new(domain: TypedDataDomain) -> Self {
        Self {
            state: SessionState::Idle,
            domain,
            ephemeral: None,
            message: None,
            authorization: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The signed authorization, once there is one.
    pub fn authorization(&self) -> Option<&DecryptionAuthorization> {
        self.authorization.as_ref()
    }

    fn ensure_state(&self, expected: SessionState) -> Result<()> {
        if self.state != expected {
            return Err(ServiceError::OutOfOrder {
                expected,
                found: self.state,
            });
        }
        Ok(())
    }

    /// Generate the ephemeral keypair the response will be sealed to.
    pub fn generate_keypair(&mut self) -> Result<X25519PublicKey> {
        self.ensure_state(SessionState::Idle)?;

        let ephemeral = EphemeralKeyPair::generate();
        let public = ephemeral.public_key();
        self.ephemeral = Some(ephemeral);
        self.state = SessionState::KeypairGenerated;
        Ok(public)
    }

    /// Compose the authorization message.
    pub fn compose(
        &mut self,
        handles: impl IntoIterator<Item = CiphertextHandle>,
        contract_scope: impl IntoIterator<Item = ContractId>,
        issued_at: u64,
        validity_secs: u64,
    ) -> Result<&AuthorizationMessage> {
        self.ensure_state(SessionState::KeypairGenerated)?;

        let public = match &self.ephemeral {
            Some(ephemeral) => ephemeral.public_key(),
            None => {
                return Err(ServiceError::OutOfOrder {
                    expected: SessionState::KeypairGenerated,
                    found: SessionState::Idle,
                })
            }
        };

        self.state = SessionState::MessageComposed;
        Ok(self.message.insert(AuthorizationMessage::new(
            public.0,
            handles,
            contract_scope,
            issued_at,
            validity_secs,
        )))
    }

    /// Sign the composed message with the long-term identity key.
    pub fn sign(&mut self, identity: &Keypair) -> Result<&DecryptionAuthorization> {
        self.ensure_state(SessionState::MessageComposed)?;

        let message = self.message.clone().ok_or(ServiceError::OutOfOrder {
            expected: SessionState::MessageComposed,
            found: SessionState::KeypairGenerated,
        })?;

        let authorization = message.sign(identity, &self.domain)?;
        self.message = None;
        self.state = SessionState::Signed;
        Ok(self.authorization.insert(authorization))
    }

    /// Submit the signed authorization and open the response.
    ///
    /// A denial moves the session to `Rejected`, as does a response that does
    /// not open or decode. Any other failure before the service answers
    /// leaves it `Signed`.
    pub async fn submit<S>(&mut self, service: &S) -> Result<DecryptedValues>
    where
        S: EncryptionService + ?Sized,
    {
        self.ensure_state(SessionState::Signed)?;

        let authorization = self.authorization.clone().ok_or(ServiceError::OutOfOrder {
            expected: SessionState::Signed,
            found: SessionState::MessageComposed,
        })?;
        let digest = authorization.digest(&self.domain)?;
        let request = DecryptRequest::for_authorization(authorization);

        let response = match service.decrypt(&request).await {
            Ok(response) => response,
            Err(ServiceError::Denied(reason)) => {
                self.state = SessionState::Rejected(reason);
                return Err(ServiceError::Denied(reason));
            }
            Err(e) => return Err(e),
        };

        self.state = SessionState::Submitted;
        let ephemeral = self.ephemeral.take().ok_or(ServiceError::OutOfOrder {
            expected: SessionState::Signed,
            found: SessionState::Submitted,
        })?;

        let values = match response
            .envelope
            .open(ephemeral, digest.as_bytes())
            .map_err(ServiceError::from)
            .and_then(|plaintext| decode_values(&plaintext))
        {
            Ok(values) => values,
            Err(e) => {
                self.state = SessionState::Rejected(DenialReason::Malformed);
                return Err(e);
            }
        };

        debug!(handles = values.len(), "decryption session complete");
        self.state = SessionState::Decrypted;
        Ok(values)
    }
}

impl std::fmt::Debug for UserDecryptSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDecryptSession")
            .field("state", &self.state)
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}
