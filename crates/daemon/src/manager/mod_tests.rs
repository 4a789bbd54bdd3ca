// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use super::*;

#[test]
fn batch_result_preserves_request_order() {
    let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let results = vec![
        Ok(()),
        Err(Error::not_found("instance not found: b")),
        Ok(()),
    ];
    let batch = BatchResult::from_results(&ids, results);

    assert_eq!(batch.total, 3);
    assert_eq!(batch.success, 2);
    assert_eq!(batch.failed, 1);
    let order: Vec<&str> = batch.items.iter().map(|i| i.instance_id.as_str()).collect();
    assert_eq!(order, vec!["a", "b", "c"]);
    assert!(batch.items[0].success);
    assert!(!batch.items[1].success);
    assert!(batch.items[1].error.as_deref().unwrap_or("").contains("not found"));
}

#[tokio::test]
async fn mutation_locks_serialize_per_id() {
    let locks = Arc::new(MutationLocks::new());
    let counter = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for n in 0..4 {
        let locks = Arc::clone(&locks);
        let counter = Arc::clone(&counter);
        handles.push(tokio::spawn(async move {
            let _guard = locks.acquire("same-id").await;
            counter.lock().push((n, "enter"));
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            counter.lock().push((n, "exit"));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Strict enter/exit pairing proves no two holders overlapped.
    let events = counter.lock().clone();
    for pair in events.chunks(2) {
        assert_eq!(pair[0].0, pair[1].0, "interleaved critical sections: {events:?}");
        assert_eq!(pair[0].1, "enter");
        assert_eq!(pair[1].1, "exit");
    }
}

#[tokio::test]
async fn locks_for_different_ids_run_in_parallel() {
    let locks = Arc::new(MutationLocks::new());
    let a = locks.acquire("a").await;
    // A second id must not block behind the first.
    let acquired = tokio::time::timeout(std::time::Duration::from_millis(100), locks.acquire("b"))
        .await
        .is_ok();
    assert!(acquired);
    drop(a);
}
