// ==============================================
// EVICTION SEMANTICS TESTS (integration)
// ==============================================
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use linkmap::builder::LinkedMapBuilder;
use linkmap::listener::MapEventListener;
use linkmap::segment::OrderMode;

/// Confirms every eviction and records which hooks fired.
#[derive(Default)]
struct RecordingListener {
    evicted: Mutex<Vec<u64>>,
    evict_calls: AtomicUsize,
    get_calls: AtomicUsize,
    put_calls: AtomicUsize,
    remove_calls: AtomicUsize,
}

impl RecordingListener {
    fn evicted_keys(&self) -> Vec<u64> {
        self.evicted.lock().unwrap().clone()
    }
}

impl MapEventListener<u64, String> for RecordingListener {
    fn on_evict(&self, key: &u64, _value: &Arc<String>) -> bool {
        self.evict_calls.fetch_add(1, Ordering::Relaxed);
        self.evicted.lock().unwrap().push(*key);
        true
    }

    fn on_get(&self, _key: &u64, value: Option<Arc<String>>) -> Option<Arc<String>> {
        self.get_calls.fetch_add(1, Ordering::Relaxed);
        value
    }

    fn on_put(
        &self,
        _key: &u64,
        _value: &Arc<String>,
        previous: Option<Arc<String>>,
    ) -> Option<Arc<String>> {
        self.put_calls.fetch_add(1, Ordering::Relaxed);
        previous
    }

    fn on_remove(&self, _key: &u64, removed: Option<Arc<String>>) -> Option<Arc<String>> {
        self.remove_calls.fetch_add(1, Ordering::Relaxed);
        removed
    }
}

/// Vetoes every eviction.
#[derive(Default)]
struct AlwaysVeto {
    offers: AtomicUsize,
}

impl MapEventListener<u64, String> for AlwaysVeto {
    fn on_evict(&self, _key: &u64, _value: &Arc<String>) -> bool {
        self.offers.fetch_add(1, Ordering::Relaxed);
        false
    }

    fn on_get(&self, _key: &u64, value: Option<Arc<String>>) -> Option<Arc<String>> {
        value
    }

    fn on_put(
        &self,
        _key: &u64,
        _value: &Arc<String>,
        previous: Option<Arc<String>>,
    ) -> Option<Arc<String>> {
        previous
    }

    fn on_remove(&self, _key: &u64, removed: Option<Arc<String>>) -> Option<Arc<String>> {
        removed
    }
}

/// Finds `count` keys that all route to the same segment as key 0.
fn co_resident_keys<L>(
    map: &linkmap::map::ConcurrentLinkedMap<u64, String, L>,
    count: usize,
) -> Vec<u64>
where
    L: MapEventListener<u64, String>,
{
    let target = map.segment_index(&0);
    let keys: Vec<u64> = (0u64..100_000)
        .filter(|k| map.segment_index(k) == target)
        .take(count)
        .collect();
    assert_eq!(keys.len(), count, "not enough co-resident keys in scan range");
    keys
}

#[test]
fn access_order_refresh_steers_eviction_within_a_segment() {
    // 16 segments at 2 entries each; four keys pinned to one segment.
    let listener = Arc::new(RecordingListener::default());
    let map = LinkedMapBuilder::new(32)
        .concurrency_level(16)
        .order_mode(OrderMode::Access)
        .build::<u64, String, _>(Arc::clone(&listener))
        .unwrap();
    assert_eq!(map.segment_max_entries(), 2);

    let keys = co_resident_keys(&map, 4);
    let (a, b, c, d) = (keys[0], keys[1], keys[2], keys[3]);

    map.put(a, "a".to_string());
    map.put(b, "b".to_string());
    map.put(c, "c".to_string());
    // Third insert overflowed the segment: the oldest entry went.
    assert_eq!(listener.evicted_keys(), vec![a]);

    // Refresh b, then overflow again: c (now least-recent) goes, b stays.
    assert_eq!(map.get(&b).as_deref(), Some(&"b".to_string()));
    map.put(d, "d".to_string());

    assert_eq!(listener.evicted_keys(), vec![a, c]);
    assert!(map.get(&b).is_some());
    assert!(map.get(&d).is_some());
    assert!(map.get(&c).is_none());
    assert!(map.get(&a).is_none());
}

#[test]
fn insertion_order_evicts_in_arrival_order() {
    let listener = Arc::new(RecordingListener::default());
    let map = LinkedMapBuilder::new(8)
        .concurrency_level(1)
        .order_mode(OrderMode::Insertion)
        .build::<u64, String, _>(Arc::clone(&listener))
        .unwrap();

    for k in 0u64..12 {
        map.put(k, format!("v{k}"));
    }

    // Exactly one eviction per overflow insert, oldest first.
    assert_eq!(listener.evicted_keys(), vec![0, 1, 2, 3]);
    assert_eq!(map.len(), 8);
}

#[test]
fn reads_do_not_steer_insertion_order() {
    let listener = Arc::new(RecordingListener::default());
    let map = LinkedMapBuilder::new(2)
        .concurrency_level(1)
        .order_mode(OrderMode::Insertion)
        .build::<u64, String, _>(Arc::clone(&listener))
        .unwrap();

    map.put(1, "one".to_string());
    map.put(2, "two".to_string());
    let _ = map.get(&1);
    map.put(3, "three".to_string());

    // The read did not rescue 1 from the least-recent end.
    assert_eq!(listener.evicted_keys(), vec![1]);
}

#[test]
fn vetoed_evictions_relax_the_bound_without_dropping_entries() {
    let listener = Arc::new(AlwaysVeto::default());
    let map = LinkedMapBuilder::new(8)
        .concurrency_level(4)
        .build::<u64, String, _>(Arc::clone(&listener))
        .unwrap();

    for k in 0u64..100 {
        map.put(k, format!("v{k}"));
    }

    // Every overflow was offered, every offer vetoed, nothing was dropped.
    assert_eq!(map.len(), 100);
    assert!(listener.offers.load(Ordering::Relaxed) > 0);
    for k in 0u64..100 {
        assert!(map.get(&k).is_some(), "key {k} was silently dropped");
    }
    map.check_invariants().unwrap();
}

#[test]
fn clear_is_silent_across_all_hooks() {
    let listener = Arc::new(RecordingListener::default());
    let map = LinkedMapBuilder::new(1_000)
        .build::<u64, String, _>(Arc::clone(&listener))
        .unwrap();

    map.put_all((0u64..64).map(|k| (k, format!("v{k}"))));

    let evicts_before = listener.evict_calls.load(Ordering::Relaxed);
    let gets_before = listener.get_calls.load(Ordering::Relaxed);
    let removes_before = listener.remove_calls.load(Ordering::Relaxed);

    map.clear();

    assert!(map.is_empty());
    assert_eq!(map.len(), 0);
    assert_eq!(listener.evict_calls.load(Ordering::Relaxed), evicts_before);
    assert_eq!(listener.get_calls.load(Ordering::Relaxed), gets_before);
    assert_eq!(listener.remove_calls.load(Ordering::Relaxed), removes_before);
}

#[test]
fn removed_and_evicted_values_stay_alive_through_outside_handles() {
    let listener = Arc::new(RecordingListener::default());
    let map = LinkedMapBuilder::new(1_000)
        .build::<u64, String, _>(Arc::clone(&listener))
        .unwrap();

    let shared = Arc::new("pinned".to_string());
    map.put_arc(1, Arc::clone(&shared));

    let removed = map.remove(&1).unwrap();
    assert!(Arc::ptr_eq(&removed, &shared));
    assert_eq!(*shared, "pinned");
}
