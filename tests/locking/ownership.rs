use std::time::Duration;

use named_locks::{InMemoryLockManager, LockError, LockManager, Timeout};

#[test]
fn non_owner_unlock_leaves_lock_held() {
    let manager = InMemoryLockManager::new();
    manager.lock("L", "ownerA", Timeout::Never).unwrap();

    assert_eq!(
        manager.unlock("L", "ownerB"),
        Err(LockError::NotOwner {
            name: "L".into(),
            owner: "ownerB".into(),
            holder: "ownerA".into()
        })
    );
    assert_eq!(manager.get_owner("L").unwrap().as_deref(), Some("ownerA"));
    assert!(manager.unlock("L", "ownerA").is_ok());
}

#[test]
fn owner_match_is_exact() {
    let manager = InMemoryLockManager::new();
    manager.lock("L", "node-1", Timeout::Never).unwrap();

    for impostor in ["node-", "node-1 ", "NODE-1", "node-10"] {
        assert!(matches!(
            manager.unlock("L", impostor),
            Err(LockError::NotOwner { .. })
        ));
    }
    assert_eq!(manager.stats().not_owner, 4);
}

#[test]
fn unlock_unheld_is_not_locked_and_changes_nothing() {
    let manager = InMemoryLockManager::new();
    for _ in 0..2 {
        assert_eq!(
            manager.unlock("L", "A"),
            Err(LockError::NotLocked { name: "L".into() })
        );
    }
    assert!(!manager.is_locked("L").unwrap());
    assert!(manager.snapshot().unwrap().is_empty());

    manager.lock("L", "A", Timeout::Never).unwrap();
    manager.unlock("L", "A").unwrap();
    assert!(matches!(
        manager.unlock("L", "A"),
        Err(LockError::NotLocked { .. })
    ));
}

#[test]
fn only_holder_may_renew() {
    let manager = InMemoryLockManager::new().with_default_lease(Duration::from_secs(5));
    manager.lock("L", "A", Timeout::Never).unwrap();

    assert!(matches!(
        manager.renew("L", "B", Duration::from_secs(60)),
        Err(LockError::NotOwner { .. })
    ));
    assert!(matches!(
        manager.renew("other", "A", Duration::from_secs(60)),
        Err(LockError::NotLocked { .. })
    ));
    let renewed = manager.renew("L", "A", Duration::from_secs(60)).unwrap();
    assert!(renewed.expires_at.is_some());
}
