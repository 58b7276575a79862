//! Store registry behaviour end to end: ownership, upserts, grants and the
//! Alice Shop walkthrough.

use oblivion::core::ValidationError;
use oblivion::service::DenialReason;
use oblivion::OblivionError;
use oblivion_testkit::generators::{expected_inventory, item_writes, store_name};
use oblivion_testkit::TestFixture;
use proptest::prelude::*;

#[tokio::test]
async fn alice_shop_walkthrough() {
    let fixture = TestFixture::new();
    let alice = fixture.party(0);
    let a = alice.principal();
    let registry = &fixture.registry;

    registry.create_store(&a, "Alice Shop").await.unwrap();
    let view = registry.get_store(&a).await.unwrap();
    assert_eq!(view.name, "Alice Shop");
    assert!(view.item_names.is_empty());
    assert!(view.handles.is_empty());

    // apple = 7
    fixture.stock(&alice, "apple", 7).await.unwrap();
    let first = registry.get_item(&a, "apple").await.unwrap();
    let values = alice.user_decrypt(&[first]).await.unwrap();
    assert_eq!(values[&first], 7);

    // apple = 11
    fixture.stock(&alice, "apple", 11).await.unwrap();
    let second = registry.get_item(&a, "apple").await.unwrap();
    assert_ne!(first, second);
    let values = alice.user_decrypt(&[second]).await.unwrap();
    assert_eq!(values[&second], 11);

    // The orphaned handle still decrypts for its grantee.
    let values = alice.user_decrypt(&[first]).await.unwrap();
    assert_eq!(values[&first], 7);
    let view = registry.get_store(&a).await.unwrap();
    assert_eq!(view.handles, vec![second]);

    registry.rename_store(&a, "Alice Updated").await.unwrap();
    let renamed = registry.get_store(&a).await.unwrap();
    assert_eq!(renamed.name, "Alice Updated");
    assert_eq!(renamed.item_names, view.item_names);
    assert_eq!(renamed.handles, view.handles);

    let inventory = alice.decrypt_inventory(registry, &a).await.unwrap();
    assert_eq!(inventory.name, "Alice Updated");
    assert_eq!(inventory.items.len(), 1);
    assert_eq!(inventory.items[0].name, "apple");
    assert_eq!(inventory.items[0].quantity, 11);
}

#[tokio::test]
async fn has_store_flips_once() {
    let fixture = TestFixture::new();
    let bob = fixture.party(1).principal();

    assert!(!fixture.registry.has_store(&bob).await.unwrap());
    fixture.registry.create_store(&bob, "").await.unwrap();
    assert!(fixture.registry.has_store(&bob).await.unwrap());

    fixture.registry.rename_store(&bob, "Bob's").await.unwrap();
    assert!(fixture.registry.has_store(&bob).await.unwrap());
}

#[tokio::test]
async fn create_store_is_exactly_once() {
    let fixture = TestFixture::new();
    let carol = fixture.party(2).principal();

    fixture.registry.create_store(&carol, "first").await.unwrap();
    fixture.registry.rename_store(&carol, "renamed").await.unwrap();

    let err = fixture
        .registry
        .create_store(&carol, "second")
        .await
        .unwrap_err();
    assert!(matches!(err, OblivionError::AlreadyExists(p) if p == carol));
    assert_eq!(
        fixture.registry.get_store_name(&carol).await.unwrap(),
        "renamed"
    );
}

#[tokio::test]
async fn missing_store_reads_and_writes() {
    let fixture = TestFixture::new();
    let dave = fixture.party(3);
    let d = dave.principal();

    let view = fixture.registry.get_store(&d).await.unwrap();
    assert!(view.is_empty());
    assert_eq!(view.name, "");

    assert!(matches!(
        fixture.registry.rename_store(&d, "x").await,
        Err(OblivionError::NotFound(_))
    ));
    assert!(matches!(
        fixture.registry.get_item(&d, "apple").await,
        Err(OblivionError::NotFound(_))
    ));
    assert!(matches!(
        fixture.stock(&dave, "apple", 1).await,
        Err(OblivionError::NotFound(_))
    ));

    let inventory = dave.decrypt_inventory(&fixture.registry, &d).await.unwrap();
    assert!(inventory.items.is_empty());
}

#[tokio::test]
async fn missing_item_is_not_found() {
    let fixture = TestFixture::new();
    let erin = fixture.party(4).principal();
    fixture.registry.create_store(&erin, "shop").await.unwrap();

    assert!(matches!(
        fixture.registry.get_item(&erin, "nothing").await,
        Err(OblivionError::NotFound(_))
    ));
}

#[tokio::test]
async fn empty_item_name_is_rejected() {
    let fixture = TestFixture::new();
    let frank = fixture.party(5);
    fixture
        .registry
        .create_store(&frank.principal(), "shop")
        .await
        .unwrap();

    let err = fixture.stock(&frank, "", 3).await.unwrap_err();
    assert!(matches!(
        err,
        OblivionError::InvalidName(ValidationError::EmptyItemName)
    ));
}

#[tokio::test]
async fn proof_is_bound_to_submitter() {
    let fixture = TestFixture::new();
    let alice = fixture.party(0);
    let mallory = fixture.party(6);
    let m = mallory.principal();
    fixture.registry.create_store(&m, "loot").await.unwrap();

    // Mallory replays an input Alice encrypted for herself.
    let input = alice.encrypt_quantity(100).await.unwrap();
    let err = fixture
        .registry
        .add_or_update_item(&m, "stolen", &input.handle, &input.proof)
        .await
        .unwrap_err();
    assert!(matches!(err, OblivionError::InvalidProof(_)));
    assert!(fixture.registry.get_store(&m).await.unwrap().is_empty());
    assert!(fixture.registry.grantees(&input.handle).await.unwrap().is_empty());
}

#[tokio::test]
async fn writes_grant_only_the_owner() {
    let fixture = TestFixture::new();
    let alice = fixture.party(0);
    let bob = fixture.party(1);
    let a = alice.principal();
    fixture.registry.create_store(&a, "Alice Shop").await.unwrap();

    let handle = fixture.stock(&alice, "apple", 7).await.unwrap();
    assert_eq!(fixture.registry.grantees(&handle).await.unwrap(), vec![a]);
    assert!(fixture.registry.is_authorized(&handle, &a).await.unwrap());
    assert!(!fixture
        .registry
        .is_authorized(&handle, &bob.principal())
        .await
        .unwrap());

    let err = bob.decrypt_inventory(&fixture.registry, &a).await.unwrap_err();
    assert!(matches!(
        err,
        OblivionError::AuthorizationDenied(DenialReason::Unauthorized)
    ));
}

#[tokio::test]
async fn stores_are_isolated() {
    let fixture = TestFixture::new();
    let alice = fixture.party(0);
    let bob = fixture.party(1);
    fixture
        .registry
        .create_store(&alice.principal(), "A")
        .await
        .unwrap();
    fixture
        .registry
        .create_store(&bob.principal(), "B")
        .await
        .unwrap();

    fixture.stock(&alice, "apple", 1).await.unwrap();
    fixture.stock(&bob, "apple", 2).await.unwrap();

    let a = alice
        .decrypt_inventory(&fixture.registry, &alice.principal())
        .await
        .unwrap();
    let b = bob
        .decrypt_inventory(&fixture.registry, &bob.principal())
        .await
        .unwrap();
    assert_eq!(a.items[0].quantity, 1);
    assert_eq!(b.items[0].quantity, 2);
    assert_ne!(a.items[0].handle, b.items[0].handle);
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn upsert_keeps_one_line_per_name(writes in item_writes(12)) {
        let rt = runtime();
        let fixture = TestFixture::new();
        let owner = fixture.party(0);
        let p = owner.principal();

        let inventory = rt.block_on(async {
            fixture.registry.create_store(&p, "prop").await.unwrap();
            for (name, quantity) in &writes {
                fixture.stock(&owner, name, *quantity).await.unwrap();
            }
            owner.decrypt_inventory(&fixture.registry, &p).await.unwrap()
        });

        let got: Vec<(String, u32)> = inventory
            .items
            .into_iter()
            .map(|line| (line.name, line.quantity))
            .collect();
        prop_assert_eq!(got, expected_inventory(&writes));
    }

    #[test]
    fn rename_never_touches_items(names in prop::collection::vec(store_name(), 1..6)) {
        let rt = runtime();
        let fixture = TestFixture::new();
        let owner = fixture.party(0);
        let p = owner.principal();

        rt.block_on(async {
            fixture.registry.create_store(&p, "start").await.unwrap();
            fixture.stock(&owner, "apple", 7).await.unwrap();
            let before = fixture.registry.get_store(&p).await.unwrap();

            for name in &names {
                fixture.registry.rename_store(&p, name).await.unwrap();
            }

            let after = fixture.registry.get_store(&p).await.unwrap();
            assert_eq!(&after.name, names.last().unwrap());
            assert_eq!(after.item_names, before.item_names);
            assert_eq!(after.handles, before.handles);
        });
    }
}
