use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use named_locks::{InMemoryLockManager, LockManager, Timeout};

use crate::support::wait_for_waiters;

fn spawn_waiter(
    manager: &Arc<InMemoryLockManager>,
    order: &Arc<Mutex<Vec<String>>>,
    owner: &str,
) -> thread::JoinHandle<()> {
    let manager = Arc::clone(manager);
    let order = Arc::clone(order);
    let owner = owner.to_string();
    thread::spawn(move || {
        manager.lock("L", &owner, Timeout::from_millis(5_000)).unwrap();
        order.lock().unwrap().push(owner.clone());
        manager.unlock("L", &owner).unwrap();
    })
}

#[test]
fn waiters_are_granted_in_arrival_order() {
    let manager = Arc::new(InMemoryLockManager::new());
    let order = Arc::new(Mutex::new(Vec::new()));
    manager.lock("L", "holder", Timeout::Never).unwrap();

    let mut handles = Vec::new();
    for (queued, owner) in ["W1", "W2", "W3"].into_iter().enumerate() {
        handles.push(spawn_waiter(&manager, &order, owner));
        wait_for_waiters(&manager, "L", queued + 1, Duration::from_secs(5));
    }
    assert_eq!(manager.waiting("L").unwrap(), vec!["W1", "W2", "W3"]);

    manager.unlock("L", "holder").unwrap();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(*order.lock().unwrap(), vec!["W1", "W2", "W3"]);
}

#[test]
fn late_arrival_queues_behind_existing_waiters() {
    let manager = InMemoryLockManager::new();
    manager.lock("L", "holder", Timeout::Never).unwrap();
    let first = manager.request("L", "first", Timeout::Never).unwrap();

    // The release hands the lock straight to the queued request, so an
    // immediate request right after it finds the lock taken.
    manager.unlock("L", "holder").unwrap();
    assert_eq!(manager.get_owner("L").unwrap().as_deref(), Some("first"));
    assert!(manager.lock("L", "late", Timeout::Immediate).is_err());

    assert_eq!(first.wait().unwrap().owner, "first");
}
