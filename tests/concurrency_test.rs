//! Test that the registry constructs its group exactly once under contention.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use perf_bracket::measurement::SyntheticBackend;
use perf_bracket::registry::baseline_group_with;
use perf_bracket::{measure, CounterError, CounterGroup, Registry};

static CONSTRUCTIONS: AtomicUsize = AtomicUsize::new(0);

fn counted_baseline() -> Result<CounterGroup<SyntheticBackend>, CounterError> {
    CONSTRUCTIONS.fetch_add(1, Ordering::SeqCst);
    baseline_group_with(SyntheticBackend::new())
}

static REGISTRY: Registry<SyntheticBackend> = Registry::new(counted_baseline);

#[test]
fn registry_first_access_is_race_free() {
    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let group = REGISTRY.get_instance().expect("synthetic group always opens");
                group as *const _ as usize
            })
        })
        .collect();

    let addresses: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(addresses.windows(2).all(|w| w[0] == w[1]), "all callers must see one instance");
    assert_eq!(CONSTRUCTIONS.load(Ordering::SeqCst), 1);

    // baseline events added exactly once
    let group = REGISTRY.get_instance().unwrap().lock();
    assert_eq!(group.events().len(), 2);
    assert_eq!(group.backend().calls().open, 2);
}

#[test]
fn one_group_per_thread() {
    let handles: Vec<_> = (0..4u64)
        .map(|i| {
            thread::spawn(move || {
                let mut group = baseline_group_with(SyntheticBackend::new()).unwrap();
                let data: Vec<u64> = (0..1000).map(|n| n * i).collect();
                measure(&mut group, || data.iter().sum::<u64>()).unwrap().output
            })
        })
        .collect();

    let sums: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(sums, vec![0, 499_500, 999_000, 1_498_500]);
}
