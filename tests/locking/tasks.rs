use std::sync::{Arc, Mutex};
use std::thread;

use named_locks::{task, InMemoryLockManager, LockClient, LockError, TaskError, TaskOutput};
use serde_json::json;

use crate::support::jitter;

#[test]
fn client_threads_increment_in_order() {
    let manager = Arc::new(InMemoryLockManager::new());
    let counter = Arc::new(Mutex::new(0usize));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let manager = Arc::clone(&manager);
            let counter = Arc::clone(&counter);
            let seen = Arc::clone(&seen);
            thread::Builder::new()
                .name(format!("worker-{}", i))
                .spawn(move || {
                    let client = LockClient::new(manager.as_ref());
                    assert_eq!(client.acquire_lock("testLock", 55).unwrap(), TaskOutput::Locked);
                    let value = {
                        let mut counter = counter.lock().unwrap();
                        *counter += 1;
                        *counter
                    };
                    thread::sleep(jitter(i));
                    seen.lock().unwrap().push(value);
                    assert_eq!(client.release_lock("testLock").unwrap(), TaskOutput::Unlocked);
                })
                .unwrap()
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(*seen.lock().unwrap(), (1..=20).collect::<Vec<_>>());
}

#[test]
fn parameter_maps_drive_the_manager() {
    let manager = InMemoryLockManager::new();
    let lock = json!({ "op": "lock", "lockName": "realms", "lockOwner": "node-1", "timeout": 1000 });
    assert_eq!(task::run(&manager, lock).unwrap(), json!("locked"));

    let steal = json!({ "op": "unlock", "lockName": "realms", "lockOwner": "node-2" });
    let err = task::run(&manager, steal).unwrap_err();
    assert!(matches!(err, TaskError::Lock(LockError::NotOwner { .. })));
    assert!(err.to_string().contains("node-1"));

    let unlock = json!({ "op": "unlock", "lockName": "realms", "lockOwner": "node-1" });
    assert_eq!(task::run(&manager, unlock).unwrap(), json!("unlocked"));
}

#[cfg(feature = "emitter")]
#[test]
fn listeners_observe_lock_lifecycle() {
    use std::time::Duration;

    use named_locks::lock::events;
    use named_locks::{LockEvent, LockManager, Timeout};

    let manager = InMemoryLockManager::new();
    let released = Arc::new(Mutex::new(Vec::new()));
    {
        let released = Arc::clone(&released);
        manager
            .events()
            .on(events::RELEASED, move |event| released.lock().unwrap().push(event))
            .unwrap();
    }

    manager.lock("L", "A", Timeout::Never).unwrap();
    manager.unlock("L", "A").unwrap();
    thread::sleep(Duration::from_millis(50));

    assert_eq!(
        *released.lock().unwrap(),
        vec![LockEvent::Released {
            name: "L".into(),
            owner: "A".into()
        }]
    );
}
