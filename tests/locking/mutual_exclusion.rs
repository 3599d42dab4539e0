use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use named_locks::{InMemoryLockManager, LockManager, Timeout};

use crate::support::{init_tracing, jitter};

// ============================================================================
// Ordered counter: every increment happens inside the lock
// ============================================================================

#[test]
fn parallel_increments_stay_ordered() {
    init_tracing();
    let manager = Arc::new(InMemoryLockManager::new());
    let counter = Arc::new(AtomicUsize::new(0));
    let results = Arc::new(Mutex::new(Vec::new()));
    let iterations = 50;

    let handles: Vec<_> = (0..iterations)
        .map(|index| {
            let manager = Arc::clone(&manager);
            let counter = Arc::clone(&counter);
            let results = Arc::clone(&results);
            thread::spawn(move || {
                let owner = format!("worker-{}", index);
                manager
                    .lock("testLock", &owner, Timeout::from_millis(55_000))
                    .unwrap();

                let c = counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(jitter(index));
                results.lock().unwrap().push(c);

                manager.unlock("testLock", &owner).unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let results = results.lock().unwrap();
    assert_eq!(*results, (0..iterations).collect::<Vec<_>>());
    assert!(!manager.is_locked("testLock").unwrap());
    assert_eq!(manager.stats().acquired, iterations as u64);
    assert_eq!(manager.stats().released, iterations as u64);
}

// ============================================================================
// Stress: at most one holder per name at any instant
// ============================================================================

#[test]
fn at_most_one_holder_per_name() {
    let manager = Arc::new(InMemoryLockManager::new());
    let names = ["alpha", "beta", "gamma"];
    let inside: Arc<Vec<AtomicUsize>> =
        Arc::new(names.iter().map(|_| AtomicUsize::new(0)).collect());
    let violations = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let manager = Arc::clone(&manager);
            let inside = Arc::clone(&inside);
            let violations = Arc::clone(&violations);
            thread::spawn(move || {
                let owner = format!("thread-{}", t);
                for i in 0..200 {
                    let slot = (t + i) % names.len();
                    let name = names[slot];
                    manager.lock(name, &owner, Timeout::Never).unwrap();

                    if inside[slot].fetch_add(1, Ordering::SeqCst) != 0 {
                        violations.fetch_add(1, Ordering::SeqCst);
                    }
                    if i % 50 == 0 {
                        thread::sleep(Duration::from_micros(200));
                    }
                    inside[slot].fetch_sub(1, Ordering::SeqCst);

                    manager.unlock(name, &owner).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(violations.load(Ordering::SeqCst), 0);
    assert!(manager.snapshot().unwrap().iter().all(|s| s.owner.is_none()));
}

#[test]
fn holding_one_name_does_not_block_another() {
    let manager = InMemoryLockManager::new();
    manager.lock("L1", "A", Timeout::Never).unwrap();
    manager.lock("L2", "B", Timeout::Immediate).unwrap();
    assert_eq!(manager.get_owner("L2").unwrap().as_deref(), Some("B"));
}
