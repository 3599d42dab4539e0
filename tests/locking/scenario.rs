use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use named_locks::{InMemoryLockManager, LockManager, Timeout};

use crate::support::{init_tracing, wait_for_waiters};

// ============================================================================
// A holds, B blocks, A releases, B gets the lock within its window
// ============================================================================

#[test]
fn blocked_acquirer_gets_lock_after_release() {
    init_tracing();
    let manager = Arc::new(InMemoryLockManager::new());

    let a = manager.lock("L", "A", Timeout::from_millis(1000)).unwrap();
    assert_eq!(a.owner, "A");
    assert!(a.waited < Duration::from_millis(100));

    let started = Instant::now();
    let b = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || manager.lock("L", "B", Timeout::from_millis(1000)))
    };
    wait_for_waiters(&manager, "L", 1, Duration::from_secs(1));
    assert!(!b.is_finished());

    let unlocked = manager.unlock("L", "A").unwrap();
    assert_eq!(unlocked.owner, "A");

    let locked = b.join().unwrap().unwrap();
    assert_eq!(locked.owner, "B");
    assert!(started.elapsed() < Duration::from_millis(1000));
    assert!(locked.waited < Duration::from_millis(1000));
    assert_eq!(manager.get_owner("L").unwrap().as_deref(), Some("B"));

    manager.unlock("L", "B").unwrap();
    assert!(manager.snapshot().unwrap().is_empty());
}
