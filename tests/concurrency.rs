//! Concurrent admission tests for the inflight gate.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{stream, FutureExt, StreamExt};
use inflight_gate::admission::{Admission, AdmissionState};
use inflight_gate::store::MemoryStore;
use tokio::sync::{mpsc, watch};

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_counter_returns_to_baseline() {
    let store = Arc::new(MemoryStore::new());
    let gate = common::gate(store.clone(), 1_000);
    let key = gate.key_for("albert").unwrap();

    let tasks: Vec<_> = (0..50)
        .map(|i| {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.forward("albert", async move {
                    tokio::time::sleep(Duration::from_millis(i % 7)).await;
                    i
                })
                .await
                .unwrap()
            })
        })
        .collect();

    let mut outputs = Vec::new();
    for task in tasks {
        outputs.push(task.await.unwrap());
    }
    outputs.sort();
    assert_eq!(outputs, (0..50).collect::<Vec<u64>>());

    common::settle().await;
    assert_eq!(gate.counter().current(&key).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_saturated_provider_rejected_until_release() {
    let store = Arc::new(MemoryStore::new());
    let gate = common::gate(store.clone(), 5);

    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let (done_tx, done_rx) = watch::channel(false);

    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let gate = gate.clone();
            let started_tx = started_tx.clone();
            let mut done_rx = done_rx.clone();
            tokio::spawn(async move {
                gate.forward("albert", async move {
                    started_tx.send(()).unwrap();
                    done_rx.wait_for(|done| *done).await.unwrap();
                })
                .await
            })
        })
        .collect();

    for _ in 0..5 {
        started_rx.recv().await.unwrap();
    }

    // All five hold a slot
    assert!(!gate.should_admit("albert").await.unwrap());
    match gate.try_admit("albert").await.unwrap() {
        Admission::Rejected(decision) => {
            assert_eq!(decision.current, Some(5));
            assert_eq!(decision.threshold, 5);
        }
        Admission::Admitted(_) => panic!("sixth request must be rejected"),
    }
    // Another provider is unaffected
    assert!(gate.should_admit("mistral").await.unwrap());

    done_tx.send(true).unwrap();
    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }

    assert!(gate.should_admit("albert").await.unwrap());
    let key = gate.key_for("albert").unwrap();
    assert_eq!(gate.counter().current(&key).await.unwrap(), 0);
}

#[tokio::test]
async fn test_forward_rejection_reports_counts() {
    let store = Arc::new(MemoryStore::new());
    let gate = common::gate(store, 1);

    let held = match gate.try_admit("albert").await.unwrap() {
        Admission::Admitted(guard) => guard,
        Admission::Rejected(_) => panic!("first request must be admitted"),
    };

    let err = gate.forward("albert", async {}).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "provider albert saturated: 1 inflight, threshold 1"
    );

    assert_eq!(held.release().await, AdmissionState::Released);
}

#[tokio::test]
async fn test_stream_releases_at_end() {
    let store = Arc::new(MemoryStore::new());
    let gate = common::gate(store, 10);
    let key = gate.key_for("albert").unwrap();

    let mut guarded = gate
        .forward_stream("albert", stream::iter(vec!["a", "b", "c"]))
        .await
        .unwrap();
    assert_eq!(guarded.state(), Some(AdmissionState::Acquired));
    assert_eq!(gate.counter().current(&key).await.unwrap(), 1);

    let mut chunks = Vec::new();
    while let Some(chunk) = guarded.next().await {
        chunks.push(chunk);
    }
    assert_eq!(chunks, vec!["a", "b", "c"]);
    assert_eq!(guarded.state(), Some(AdmissionState::Released));
    assert_eq!(gate.counter().current(&key).await.unwrap(), 0);
}

#[tokio::test]
async fn test_stream_end_frees_slot_like_immediate_path() {
    let store = Arc::new(MemoryStore::new());
    let gate = common::gate(store, 1);
    let key = gate.key_for("albert").unwrap();

    gate.forward("albert", async {}).await.unwrap();
    assert_eq!(gate.counter().current(&key).await.unwrap(), 0);

    let mut guarded = gate
        .forward_stream("albert", stream::iter([1]))
        .await
        .unwrap();
    assert_eq!(guarded.next().await, Some(1));
    assert_eq!(guarded.next().await, None);

    // No settling: the release finished before the stream reported its end
    assert_eq!(gate.counter().current(&key).await.unwrap(), 0);
    assert!(gate.should_admit("albert").await.unwrap());
    assert_eq!(guarded.next().await, None);
}

#[test]
fn test_stream_end_releases_without_runtime_context() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let gate = common::gate(store, 10);
    let key = gate.key_for("albert").unwrap();

    let mut guarded = rt
        .block_on(gate.forward_stream("albert", stream::iter([1])))
        .unwrap();

    // Polled on a thread that is not inside the runtime
    assert_eq!(guarded.next().now_or_never(), Some(Some(1)));
    assert_eq!(guarded.next().now_or_never(), Some(None));
    assert_eq!(guarded.state(), Some(AdmissionState::Released));

    assert_eq!(rt.block_on(gate.counter().current(&key)).unwrap(), 0);
}

#[tokio::test]
async fn test_stream_released_on_client_disconnect() {
    let store = Arc::new(MemoryStore::new());
    let gate = common::gate(store, 10);
    let key = gate.key_for("albert").unwrap();

    let mut guarded = gate
        .forward_stream("albert", stream::iter(0..100))
        .await
        .unwrap();
    assert_eq!(guarded.next().await, Some(0));
    drop(guarded);

    common::settle().await;
    assert_eq!(gate.counter().current(&key).await.unwrap(), 0);
}

#[tokio::test]
async fn test_cancelled_work_releases_slot() {
    let store = Arc::new(MemoryStore::new());
    let gate = common::gate(store, 10);
    let key = gate.key_for("albert").unwrap();

    let forwarded = gate.forward("albert", std::future::pending::<()>());
    let timed_out = tokio::time::timeout(Duration::from_millis(20), forwarded).await;
    assert!(timed_out.is_err());

    common::settle().await;
    assert_eq!(gate.counter().current(&key).await.unwrap(), 0);
}
