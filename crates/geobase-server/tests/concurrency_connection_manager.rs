//! Concurrency tests for the WebSocket ConnectionManager.
//!
//! These tests verify that concurrent connects and disconnects leave the
//! connected count consistent and never count a connection out twice.

use geobase_server::api_ws::ConnectionManager;
use std::collections::HashSet;
use std::sync::Arc;

#[tokio::test]
async fn test_concurrent_add_sessions_get_unique_ids_and_indices() {
    let cm = Arc::new(ConnectionManager::new());

    let mut handles = Vec::new();
    for _ in 0..100 {
        let cm = cm.clone();
        handles.push(tokio::spawn(async move { cm.add_session().await }));
    }

    let mut ids = HashSet::new();
    let mut indices = HashSet::new();
    for handle in handles {
        let session = handle.await.expect("task should not panic");
        ids.insert(session.id);
        indices.insert(session.index);
    }

    assert_eq!(ids.len(), 100);
    assert_eq!(indices, (0..100).collect::<HashSet<usize>>());
    assert_eq!(cm.connected().await, 100);
}

#[tokio::test]
async fn test_concurrent_remove_session_counts_out_once() {
    let cm = Arc::new(ConnectionManager::new());
    let session = cm.add_session().await;
    let other = cm.add_session().await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let cm = cm.clone();
        handles.push(tokio::spawn(async move { cm.remove_session(session.id).await }));
    }

    let mut removed = 0;
    for handle in handles {
        if handle.await.expect("task should not panic") {
            removed += 1;
        }
    }

    assert_eq!(removed, 1, "exactly one removal should win");
    assert_eq!(cm.connected().await, 1);
    assert!(cm.remove_session(other.id).await);
    assert_eq!(cm.connected().await, 0);
}

#[tokio::test]
async fn test_indices_keep_increasing_after_disconnects() {
    let cm = ConnectionManager::new();
    let first = cm.add_session().await;
    cm.remove_session(first.id).await;

    let second = cm.add_session().await;
    assert_eq!(first.index, 0);
    assert_eq!(second.index, 1);
}
