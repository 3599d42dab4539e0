use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use named_locks::{InMemoryLockManager, LeaseSweeper, LockConfig, LockError, LockManager, Timeout};

use crate::support::wait_for_waiters;

#[test]
fn elapsed_lease_is_taken_over_on_next_lock() {
    let manager = InMemoryLockManager::new().with_default_lease(Duration::from_millis(20));
    manager.lock("L", "A", Timeout::Never).unwrap();
    assert!(matches!(
        manager.lock("L", "B", Timeout::Immediate),
        Err(LockError::TimedOut { .. })
    ));

    thread::sleep(Duration::from_millis(40));
    assert!(!manager.is_locked("L").unwrap());
    let locked = manager.lock("L", "B", Timeout::Immediate).unwrap();
    assert_eq!(locked.owner, "B");

    assert!(matches!(
        manager.unlock("L", "A"),
        Err(LockError::NotOwner { .. })
    ));
}

#[test]
fn sweeper_hands_expired_lock_to_waiter() {
    let manager = Arc::new(InMemoryLockManager::new());
    manager
        .lock_with_lease("L", "A", Timeout::Never, Some(Duration::from_millis(30)))
        .unwrap();

    let waiter = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || manager.lock_with_lease("L", "B", Timeout::Never, None))
    };
    wait_for_waiters(&manager, "L", 1, Duration::from_secs(5));

    let sweeper = LeaseSweeper::spawn(Arc::clone(&manager), Duration::from_millis(5));
    let locked = waiter.join().unwrap().unwrap();
    let stats = sweeper.stop();

    assert_eq!(locked.owner, "B");
    assert!(locked.expires_at.is_none());
    assert_eq!(stats.leases_expired, 1);
    assert_eq!(manager.stats().expired, 1);
    assert_eq!(manager.get_owner("L").unwrap().as_deref(), Some("B"));
}

#[test]
fn blocked_waiter_gets_lock_when_lease_elapses() {
    let manager = Arc::new(InMemoryLockManager::new().with_default_lease(Duration::from_millis(20)));
    manager.lock("L", "A", Timeout::Never).unwrap();

    let started = Instant::now();
    let waiter = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || manager.lock("L", "B", Timeout::from_millis(500)))
    };

    let locked = waiter.join().unwrap().unwrap();
    assert_eq!(locked.owner, "B");
    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(manager.waiting("L").unwrap().is_empty());
    assert_eq!(manager.stats().expired, 1);
}

#[test]
fn waiters_without_deadline_follow_each_elapsed_lease() {
    let config = LockConfig::from_json(r#"{ "defaultLeaseMs": 20 }"#).unwrap();
    let manager = Arc::new(InMemoryLockManager::from_config(&config));
    manager.lock("L", "A", Timeout::Never).unwrap();

    let b = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || manager.lock("L", "B", Timeout::Never))
    };
    wait_for_waiters(&manager, "L", 1, Duration::from_secs(5));
    let c = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || manager.lock("L", "C", Timeout::Never))
    };

    assert_eq!(b.join().unwrap().unwrap().owner, "B");
    assert_eq!(c.join().unwrap().unwrap().owner, "C");
    assert!(manager.stats().expired >= 1);
}

#[test]
fn renewal_keeps_the_hold() {
    let manager = InMemoryLockManager::new().with_default_lease(Duration::from_millis(40));
    manager.lock("L", "A", Timeout::Never).unwrap();

    for _ in 0..3 {
        thread::sleep(Duration::from_millis(15));
        manager.renew("L", "A", Duration::from_millis(40)).unwrap();
    }
    assert_eq!(manager.get_owner("L").unwrap().as_deref(), Some("A"));
    assert_eq!(manager.sweep().unwrap().leases_expired, 0);
}

#[test]
fn configured_manager_and_sweeper() {
    let config = LockConfig::from_json(r#"{ "defaultLeaseMs": 20, "sweepIntervalMs": 5 }"#).unwrap();
    let manager = Arc::new(InMemoryLockManager::from_config(&config));
    assert_eq!(manager.default_lease(), Some(Duration::from_millis(20)));

    let locked = manager.lock("L", "A", Timeout::Never).unwrap();
    assert!(locked.expires_at.is_some());

    let sweeper = LeaseSweeper::from_config(Arc::clone(&manager), &config);
    thread::sleep(Duration::from_millis(100));
    sweeper.stop();

    assert!(manager.snapshot().unwrap().is_empty());
}
