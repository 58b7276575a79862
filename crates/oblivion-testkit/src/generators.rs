//! Proptest generators for property-based testing.

use proptest::prelude::*;

use oblivion_core::{CiphertextHandle, Keypair, Principal};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random Principal.
pub fn principal() -> impl Strategy<Value = Principal> {
    any::<[u8; 20]>().prop_map(Principal::from_bytes)
}

/// Generate a random CiphertextHandle.
pub fn handle() -> impl Strategy<Value = CiphertextHandle> {
    any::<[u8; 32]>().prop_map(CiphertextHandle::from_bytes)
}

/// Generate a quantity. Biased toward the edges of the range.
pub fn quantity() -> impl Strategy<Value = u32> {
    prop_oneof![Just(0u32), Just(u32::MAX), any::<u32>()]
}

/// Generate a store name. May be empty.
pub fn store_name() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), "[A-Za-z][A-Za-z0-9 '-]{0,31}"]
}

/// Generate an item name.
pub fn item_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,23}".prop_map(String::from)
}

/// One item write: a name and the quantity written under it.
pub type ItemWrite = (String, u32);

/// Generate up to `max` item writes over a small name pool, so names repeat.
pub fn item_writes(max: usize) -> impl Strategy<Value = Vec<ItemWrite>> {
    let name = prop_oneof![
        Just("apple".to_string()),
        Just("pear".to_string()),
        Just("plum".to_string()),
        item_name(),
    ];
    prop::collection::vec((name, quantity()), 0..=max)
}

/// The inventory a sequence of writes should leave: one line per distinct
/// name, in first-write order, holding the last quantity written.
pub fn expected_inventory(writes: &[ItemWrite]) -> Vec<ItemWrite> {
    let mut lines: Vec<ItemWrite> = Vec::new();
    for (name, quantity) in writes {
        match lines.iter_mut().find(|(n, _)| n == name) {
            Some(line) => line.1 = *quantity,
            None => lines.push((name.clone(), *quantity)),
        }
    }
    lines
}
