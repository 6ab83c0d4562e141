// ==============================================
// MAPPING CONTRACT TESTS (integration)
// ==============================================
//
// Every component advertises the same Mapping contract; these tests run
// one behavioral suite against each of them so a layer cannot drift from
// the leaves it wraps.

use mapstack::error::{BulkError, Error};
use mapstack::policy::{AsyncBuffer, Buffer, Cache, Lru, Sieve};
use mapstack::store::MemStore;
use mapstack::traits::{check_mapping_invariants, Mapping};

type DynMapping = Box<dyn Mapping<u64, String>>;

fn every_component() -> Vec<(&'static str, DynMapping)> {
    let lru: Lru<u64, String, MemStore<u64, String>> = Lru::new(1024, MemStore::new());
    let buffer: Buffer<u64, String, MemStore<u64, String>, MemStore<u64, String>> =
        Buffer::new(MemStore::new(), MemStore::new(), 1024);
    let async_buffer: AsyncBuffer<u64, String, MemStore<u64, String>, MemStore<u64, String>> =
        AsyncBuffer::new(MemStore::new(), MemStore::new(), 1024);
    let sieve = Sieve::try_new(
        vec![("low", MemStore::new()), ("high", MemStore::new())],
        (|key: &u64| if *key < 100 { "low" } else { "high" }) as fn(&u64) -> &'static str,
    )
    .unwrap();
    let cache: Cache<u64, String, MemStore<u64, String>, MemStore<u64, String>> =
        Cache::new(MemStore::new(), MemStore::new(), true);

    vec![
        ("mem_store", Box::new(MemStore::new()) as DynMapping),
        ("lru", Box::new(lru)),
        ("buffer", Box::new(buffer)),
        ("async_buffer", Box::new(async_buffer)),
        ("sieve", Box::new(sieve)),
        ("cache", Box::new(cache)),
    ]
}

#[test]
fn put_then_get_round_trips() {
    for (name, map) in every_component() {
        map.put(1, "one".to_string()).unwrap();
        assert_eq!(map.get(&1).unwrap(), "one", "{name}");
        assert!(map.contains(&1).unwrap(), "{name}");
        assert_eq!(map.len(), 1, "{name}");
    }
}

#[test]
fn overwrite_is_idempotent_on_len() {
    for (name, map) in every_component() {
        map.put(7, "first".to_string()).unwrap();
        map.put(7, "second".to_string()).unwrap();
        assert_eq!(map.get(&7).unwrap(), "second", "{name}");
        assert_eq!(map.len(), 1, "{name}");
    }
}

#[test]
fn second_delete_reports_not_found() {
    for (name, map) in every_component() {
        map.put(3, "x".to_string()).unwrap();
        assert_eq!(map.remove(&3).unwrap(), "x", "{name}");
        assert!(
            matches!(map.remove(&3), Err(Error::NotFound)),
            "{name}: second delete must miss"
        );
        assert!(!map.contains(&3).unwrap(), "{name}");
    }
}

#[test]
fn get_of_absent_key_reports_not_found() {
    for (name, map) in every_component() {
        assert!(
            matches!(map.get(&99), Err(Error::NotFound)),
            "{name}: absent key must miss"
        );
    }
}

#[test]
fn contains_agrees_with_get_and_len_with_keys() {
    for (name, map) in every_component() {
        for key in 0..32u64 {
            map.put(key * 8, format!("v{key}")).unwrap();
        }
        map.remove(&0).unwrap();
        let _ = map.get(&8).unwrap();
        check_mapping_invariants(&map);
        assert_eq!(map.len(), 31, "{name}");
    }
}

#[test]
fn bulk_defaults_report_missing_subsets() {
    for (name, map) in every_component() {
        map.put(1, "a".to_string()).unwrap();
        map.put(2, "b".to_string()).unwrap();

        let found = map.get_many(&[2, 1]).unwrap();
        assert_eq!(found.len(), 2, "{name}");

        let err = map.get_many(&[1, 5, 6]).unwrap_err();
        match err {
            BulkError::NotFoundAny(missing) => assert_eq!(missing, vec![5, 6], "{name}"),
            BulkError::Op(other) => panic!("{name}: expected bulk miss, got {other}"),
        }

        map.put_many(vec![(10, "j".to_string()), (11, "k".to_string())])
            .unwrap();
        assert_eq!(map.len(), 4, "{name}");

        let err = map.remove_many(&[10, 42]).unwrap_err();
        assert!(matches!(err, BulkError::NotFoundAny(ref m) if m == &vec![42]), "{name}");
        assert!(!map.contains(&10).unwrap(), "{name}");
    }
}

#[test]
fn views_live_reflect_mutation() {
    for (name, map) in every_component() {
        map.put(1, "a".to_string()).unwrap();
        let view = mapstack::traits::KeysView::new(map.as_ref());
        assert_eq!(view.len(), 1, "{name}");

        map.put(2, "b".to_string()).unwrap();
        assert_eq!(view.len(), 2, "{name}: view must track mutation");
        assert!(view.contains(&2).unwrap(), "{name}");

        let mut keys: Vec<u64> = view.iter().unwrap().collect();
        keys.sort_unstable();
        assert_eq!(keys, vec![1, 2], "{name}");
    }
}

#[test]
fn close_is_idempotent_and_fails_later_operations() {
    for (name, map) in every_component() {
        map.put(1, "a".to_string()).unwrap();
        map.close().unwrap();
        map.close().unwrap();
        assert!(
            matches!(map.get(&1), Err(Error::AlreadyClosed)),
            "{name}: get after close must fail"
        );
        assert!(
            matches!(map.put(2, "b".to_string()), Err(Error::AlreadyClosed)),
            "{name}: put after close must fail"
        );
        assert!(
            matches!(map.keys(), Err(Error::AlreadyClosed)),
            "{name}: keys after close must fail"
        );
    }
}
