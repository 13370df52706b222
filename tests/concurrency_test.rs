//! Concurrency tests for the per-file lock registry and the store.
//!
//! - Shared holders proceed together
//! - An exclusive holder waits for readers and excludes other writers
//! - Concurrent writers through the store never lose an update

mod common;

use common::TestEnv;
use inistore::{KeyRequest, LockMode};
use std::sync::{Arc, Barrier, mpsc};
use std::thread;
use std::time::Duration;

#[test]
fn test_readers_proceed_together() {
    let env = TestEnv::new();
    let path = env.file("shared.ini");
    let readers = 4;
    let barrier = Arc::new(Barrier::new(readers));

    let handles: Vec<_> = (0..readers)
        .map(|_| {
            let registry = Arc::clone(&env.registry);
            let barrier = Arc::clone(&barrier);
            let path = path.clone();
            thread::spawn(move || {
                let guard = registry.acquire(&path, LockMode::Shared).unwrap();
                // Every reader must hold its guard at the same time to get past here.
                barrier.wait();
                drop(guard);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_writer_excludes_writer() {
    let env = TestEnv::new();
    let path = env.file("exclusive.ini");
    let first = env.registry.acquire(&path, LockMode::Exclusive).unwrap();

    let (tx, rx) = mpsc::channel();
    let handle = {
        let registry = Arc::clone(&env.registry);
        let path = path.clone();
        thread::spawn(move || {
            let _second = registry.acquire(&path, LockMode::Exclusive).unwrap();
            tx.send(()).unwrap();
        })
    };

    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    drop(first);
    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    handle.join().unwrap();
}

#[test]
fn test_reader_waits_for_writer() {
    let env = TestEnv::new();
    let path = env.file("rw.ini");
    let writer = env.registry.acquire(&path, LockMode::Exclusive).unwrap();

    let (tx, rx) = mpsc::channel();
    let handle = {
        let registry = Arc::clone(&env.registry);
        let path = path.clone();
        thread::spawn(move || {
            let _reader = registry.acquire(&path, LockMode::Shared).unwrap();
            tx.send(()).unwrap();
        })
    };

    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    drop(writer);
    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    handle.join().unwrap();
}

#[test]
fn test_concurrent_store_writes_are_not_lost() {
    let env = TestEnv::new();
    let path = env.file("counter.ini");
    let threads = 8;
    let per_thread = 10;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let store = env.store();
            let path = path.clone();
            thread::spawn(move || {
                for i in 0..per_thread {
                    store
                        .write_key(&path, &format!("T{}", t), &format!("K{}", i), &i.to_string())
                        .unwrap();
                    // Readers interleave with the writers.
                    let _ = store.read_key(&path, "T0", "K0").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let store = env.store();
    let requests: Vec<_> = (0..threads)
        .flat_map(|t| {
            (0..per_thread).map(move |i| KeyRequest::new(format!("T{}", t), format!("K{}", i)))
        })
        .collect();
    let values = store.read_keys(&path, &requests).unwrap();
    assert!(values.iter().all(|v| v.is_some()));
    assert_eq!(store.section_names(&path).unwrap().len(), threads);

    // No temp files left behind.
    let leftovers: Vec<_> = std::fs::read_dir(env.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_guard_released_after_failed_operation() {
    let env = TestEnv::new();
    let path = env.write("a.ini", "[S]\nK=V\n");
    let store = env.store();

    assert!(store.write_key(&path, "S", "bad=key", "V").is_err());
    assert!(store.compact(env.file("missing.ini")).is_err());

    // Both paths can still be locked exclusively afterwards.
    drop(env.registry.acquire(&path, LockMode::Exclusive).unwrap());
    drop(
        env.registry
            .acquire(&env.file("missing.ini"), LockMode::Exclusive)
            .unwrap(),
    );
}
