// ==============================================
// LAYER STACKING TESTS (integration)
// ==============================================
//
// The point of the crate: policy layers compose, with the output of one
// serving as the backing store of the next. These tests exercise stacks
// that no single module covers on its own.

use std::sync::Arc;

use mapstack::builder::{BufferBuilder, LruBuilder};
use mapstack::error::Error;
use mapstack::policy::{Buffer, Cache, Lru, Sieve};
use mapstack::store::MemStore;
use mapstack::traits::Mapping;

#[test]
fn lru_cap_in_front_of_a_two_tier_buffer() {
    // "An LRU in-memory cap in front of a buffered store": the LRU bounds
    // the logical working set while the buffer splits it across tiers.
    let buffer: Buffer<u64, String, MemStore<u64, String>, MemStore<u64, String>> =
        Buffer::new(MemStore::new(), MemStore::new(), 4);
    let lru = Lru::new(8, buffer);

    for key in 0..12u64 {
        lru.put(key, format!("v{key}")).unwrap();
    }

    // The cap holds: at most 8 keys survive end to end.
    assert_eq!(lru.len(), 8);
    let survivors = lru.keys().unwrap();
    assert_eq!(survivors.len(), 8);
    for key in survivors {
        assert_eq!(lru.get(&key).unwrap(), format!("v{key}"));
    }

    // The buffer below kept its own budget too.
    assert!(lru.child().fast().total_weight() <= 4);
    assert_eq!(lru.child().len(), 8);
}

#[test]
fn cache_fronting_a_buffer_keeps_hot_reads_off_the_tiers() {
    let buffer: Buffer<u64, String, MemStore<u64, String>, MemStore<u64, String>> =
        Buffer::new(MemStore::new(), MemStore::new(), 2);
    for key in 0..6u64 {
        buffer.put(key, format!("v{key}")).unwrap();
    }

    let cache = Cache::new(buffer, MemStore::new(), false);

    // First read falls through to the buffer (possibly promoting), second
    // is served by the fronting store without touching the tiers.
    assert_eq!(cache.get(&0).unwrap(), "v0");
    let snapshot = cache.data().metrics();
    assert_eq!(cache.get(&0).unwrap(), "v0");
    assert_eq!(cache.data().metrics(), snapshot);

    // A write invalidates the front and lands in the buffer.
    cache.put(0, "fresh".to_string()).unwrap();
    assert_eq!(cache.get(&0).unwrap(), "fresh");
}

#[test]
fn sieve_routing_to_independent_lru_budgets() {
    // Size-class routing: small keys get a large-entry budget, large keys
    // a tight one, each enforced independently.
    let small: Lru<u64, Vec<u8>, MemStore<u64, Vec<u8>>> = Lru::new(8, MemStore::new());
    let large: Lru<u64, Vec<u8>, MemStore<u64, Vec<u8>>> = Lru::new(2, MemStore::new());
    let sieve = Sieve::try_new(
        vec![("small", small), ("large", large)],
        (|key: &u64| if *key < 1000 { "small" } else { "large" }) as fn(&u64) -> &'static str,
    )
    .unwrap();

    for key in 0..6u64 {
        sieve.put(key, vec![0u8; 8]).unwrap();
    }
    for key in 1000..1006u64 {
        sieve.put(key, vec![0u8; 1024]).unwrap();
    }

    assert_eq!(sieve.child(&"small").unwrap().len(), 6);
    assert_eq!(sieve.child(&"large").unwrap().len(), 2);
    assert_eq!(sieve.len(), 8);
}

#[test]
fn weighted_lru_with_demotion_callbacks_over_a_sieve() {
    // Demotions from a weighted LRU land in a sieve that splits the
    // overflow by key parity.
    let even: MemStore<u64, Vec<u8>> = MemStore::new();
    let odd: MemStore<u64, Vec<u8>> = MemStore::new();
    let overflow = Arc::new(
        Sieve::try_new(
            vec![("even", even), ("odd", odd)],
            (|key: &u64| if key % 2 == 0 { "even" } else { "odd" }) as fn(&u64) -> &'static str,
        )
        .unwrap(),
    );

    let sink = Arc::clone(&overflow);
    let lru = LruBuilder::new(64, MemStore::new())
        .weight(|_: &u64, value: &Vec<u8>| value.len() as u64)
        .on_evict(move |key: &u64, value: &Vec<u8>| sink.put(*key, value.clone()))
        .build();

    for key in 0..8u64 {
        lru.put(key, vec![0u8; 16]).unwrap();
    }

    // 8 * 16 = 128 bytes against a budget of 64: half the keys spilled.
    assert_eq!(lru.total_weight(), 64);
    assert_eq!(overflow.len(), 4);
    for key in overflow.keys().unwrap() {
        assert!(!lru.contains(&key).unwrap());
    }
}

#[test]
fn buffer_of_buffers_forms_three_tiers() {
    // fast -> warm -> cold by stacking a buffer as the slow side of
    // another buffer.
    let warm_cold: Buffer<u64, String, MemStore<u64, String>, MemStore<u64, String>> =
        Buffer::new(MemStore::new(), MemStore::new(), 4);
    let stack = BufferBuilder::new(MemStore::new(), warm_cold, 2).build();

    for key in 0..10u64 {
        stack.put(key, format!("v{key}")).unwrap();
    }

    assert_eq!(stack.len(), 10);
    assert_eq!(stack.fast().len(), 2);
    // The inner buffer spread the remaining eight across its own tiers.
    assert_eq!(stack.slow().len(), 8);
    assert_eq!(stack.slow().fast().len(), 4);
    assert_eq!(stack.slow().slow().len(), 4);

    // A deep key is still reachable and gets promoted through the stack.
    let deep = stack.slow().slow().keys().unwrap()[0];
    assert_eq!(stack.get(&deep).unwrap(), format!("v{deep}"));
    assert!(stack.fast().contains(&deep).unwrap());
}

#[test]
fn closing_a_layer_leaves_the_stack_below_usable() {
    let store: Arc<MemStore<u64, String>> = Arc::new(MemStore::new());
    let lru = Lru::new(16, Arc::clone(&store));
    lru.put(1, "one".to_string()).unwrap();

    lru.close().unwrap();
    assert_eq!(lru.get(&1), Err(Error::AlreadyClosed));

    // The store is referenced, not owned-for-lifecycle.
    assert_eq!(store.get(&1).unwrap(), "one");
    store.close().unwrap();
}
