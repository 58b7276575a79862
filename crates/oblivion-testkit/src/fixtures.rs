//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use oblivion::{InventoryClient, RegistryConfig, RetryPolicy, StoreRegistry};
use oblivion_core::{CiphertextHandle, Keypair, ManualClock};
use oblivion_service::LocalEncryptionService;
use oblivion_store::MemoryLedger;

/// Time every fixture clock starts at.
pub const FIXTURE_NOW: u64 = 1_700_000_000;

/// Seed of the fixture encryption service.
pub const SERVICE_SEED: [u8; 32] = [0x5e; 32];

/// Encryption service used by fixtures.
pub type TestService =
    Arc<LocalEncryptionService<Arc<MemoryLedger>, Arc<MemoryLedger>, ManualClock>>;

/// Registry used by fixtures.
pub type TestRegistry = StoreRegistry<Arc<MemoryLedger>, TestService>;

/// Client used by fixtures.
pub type TestClient = InventoryClient<TestService, ManualClock>;

/// A ledger, service and registry sharing one manual clock.
pub struct TestFixture {
    pub ledger: Arc<MemoryLedger>,
    pub clock: ManualClock,
    pub service: TestService,
    pub registry: TestRegistry,
    pub config: RegistryConfig,
}

impl TestFixture {
    /// Create a fixture with the default configuration and no retries.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig {
            retry: RetryPolicy::none(),
            ..RegistryConfig::default()
        })
    }

    /// Create a fixture with a specific configuration.
    pub fn with_config(config: RegistryConfig) -> Self {
        let ledger = Arc::new(MemoryLedger::new());
        let clock = ManualClock::new(FIXTURE_NOW);
        let service = Arc::new(LocalEncryptionService::new(
            &SERVICE_SEED,
            ledger.clone(),
            ledger.clone(),
            clock.clone(),
        ));
        let registry = StoreRegistry::new(ledger.clone(), service.clone(), config.clone());

        Self {
            ledger,
            clock,
            service,
            registry,
            config,
        }
    }

    /// A client for the identity with this seed.
    pub fn client(&self, seed: [u8; 32]) -> TestClient {
        InventoryClient::new(
            Keypair::from_seed(&seed),
            self.service.clone(),
            self.clock.clone(),
            self.config.clone(),
        )
    }

    /// A client for the `index`th deterministic party.
    pub fn party(&self, index: u8) -> TestClient {
        self.client(party_seed(index))
    }

    /// The identity behind [`TestFixture::party`], for driving sessions by
    /// hand.
    pub fn party_keypair(&self, index: u8) -> Keypair {
        Keypair::from_seed(&party_seed(index))
    }

    /// Encrypt `quantity` as `client` and write it to the client's store.
    pub async fn stock(
        &self,
        client: &TestClient,
        item: &str,
        quantity: u32,
    ) -> oblivion::Result<CiphertextHandle> {
        let owner = client.principal();
        let input = client.encrypt_quantity(quantity).await?;
        self.registry
            .add_or_update_item(&owner, item, &input.handle, &input.proof)
            .await
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn party_seed(index: u8) -> [u8; 32] {
    let mut seed = [0u8; 32];
    seed[0] = index.wrapping_add(1);
    seed
}

/// Create clients for multi-party tests.
pub fn multi_party_clients(fixture: &TestFixture, count: u8) -> Vec<TestClient> {
    (0..count).map(|i| fixture.party(i)).collect()
}
