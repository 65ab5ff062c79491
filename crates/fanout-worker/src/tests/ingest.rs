//! The subscription-driven ingestion loop.

use super::harness::{monitor_event, TestHarness};
use crate::error::WorkerError;
use crate::ingest::IngestLoop;
use pubsub_transport::{MemoryTransport, Topics, Transport, TransportError};
use std::time::Duration;
use telemetry_types::encode_event;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn decodes_dispatches_and_skips_malformed() {
    let TestHarness {
        records,
        objects,
        dispatcher,
        ..
    } = TestHarness::new();
    let transport = MemoryTransport::new();
    let topic = Topics::new("1").telemetry();
    let subscription = transport.subscribe(&topic).await.unwrap();

    transport
        .publish(&topic, encode_event(&monitor_event()).unwrap())
        .await
        .unwrap();
    transport.publish(&topic, b"not json".to_vec()).await.unwrap();
    transport
        .publish(
            &topic,
            br#"{"body":{"device":"d1","temperature":1,"humidity":2,"action":"Explode"}}"#.to_vec(),
        )
        .await
        .unwrap();
    transport.close();

    let mut ingest = IngestLoop::new(dispatcher);
    let result = ingest.run(subscription, CancellationToken::new()).await;

    assert!(matches!(
        result,
        Err(WorkerError::Transport(TransportError::Closed))
    ));
    assert_eq!(ingest.processed(), 1);
    assert_eq!(ingest.skipped(), 2);
    assert_eq!(records.records().len(), 1);
    assert_eq!(objects.keys().len(), 1);
}

#[tokio::test]
async fn stops_when_cancelled() {
    let dispatcher = TestHarness::new().dispatcher;
    let transport = MemoryTransport::new();
    let subscription = transport.subscribe("telemetry/1").await.unwrap();
    let cancel = CancellationToken::new();

    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            let mut ingest = IngestLoop::new(dispatcher);
            let result = ingest.run(subscription, cancel).await;
            (result, ingest.processed())
        }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let (result, processed) = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("loop should stop after cancellation")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(processed, 0);
}

#[tokio::test]
async fn closed_subscription_stops_with_error() {
    let dispatcher = TestHarness::new().dispatcher;
    let transport = MemoryTransport::new();
    let subscription = transport.subscribe("telemetry/1").await.unwrap();
    let cancel = CancellationToken::new();

    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            let mut ingest = IngestLoop::new(dispatcher);
            ingest.run(subscription, cancel).await
        }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    transport.close();

    let result = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("loop should stop once the subscription closes")
        .unwrap();
    assert!(matches!(
        result,
        Err(WorkerError::Transport(TransportError::Closed))
    ));
    assert!(!cancel.is_cancelled());
}
