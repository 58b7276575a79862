//! Registry and client configuration.

use oblivion_core::{ContractId, DEFAULT_VALIDITY_SECS};

use crate::retry::RetryPolicy;

/// Label the default contract scope is derived from.
pub const DEFAULT_SCOPE_LABEL: &str = "oblivion-store";

/// Configuration for a registry and the clients that talk to it.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Contract scope handles are registered and authorized under.
    pub scope: ContractId,
    /// Validity window for new decryption authorizations, in seconds.
    pub validity_secs: u64,
    /// Retry policy for client calls to the encryption service.
    pub retry: RetryPolicy,
}

impl RegistryConfig {
    /// Configuration for a named deployment.
    pub fn with_scope_label(label: &str) -> Self {
        Self {
            scope: ContractId::derive(label),
            ..Self::default()
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            scope: ContractId::derive(DEFAULT_SCOPE_LABEL),
            validity_secs: DEFAULT_VALIDITY_SECS,
            retry: RetryPolicy::default(),
        }
    }
}
