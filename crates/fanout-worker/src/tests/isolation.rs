//! A misbehaving sink only affects its own outcome.

use super::harness::{monitor_event, scripted_dispatcher, Behaviour, ScriptedSink, TestHarness};
use crate::error::SinkError;
use crate::sink::SinkKind;
use std::time::{Duration, Instant};

#[tokio::test]
async fn failing_sink_does_not_cancel_siblings() {
    let harness = TestHarness::new();
    harness.objects.set_fail(true);

    let report = harness.dispatcher.dispatch(monitor_event()).await;

    let archive = report.outcome(SinkKind::Archive).unwrap();
    assert!(matches!(archive.error, Some(SinkError::Unavailable(_))));
    assert!(archive.result.is_empty());

    assert!(report.outcome(SinkKind::Metrics).unwrap().is_ok());
    assert!(report.outcome(SinkKind::Record).unwrap().is_ok());
    assert_eq!(harness.metrics.published().len(), 1);
    assert_eq!(harness.records.records().len(), 1);
    assert!(harness.objects.keys().is_empty());
}

#[tokio::test]
async fn panicking_sink_becomes_failed_outcome() {
    let sinks = vec![
        ScriptedSink::new(SinkKind::Metrics, Behaviour::Panic),
        ScriptedSink::new(SinkKind::Archive, Behaviour::Succeed("stored".into())),
    ];
    let dispatcher = scripted_dispatcher(&sinks, Duration::from_secs(1));

    let report = dispatcher.dispatch(monitor_event()).await;

    let metrics = report.outcome(SinkKind::Metrics).unwrap();
    assert!(matches!(metrics.error, Some(SinkError::Panicked(_))));
    let archive = report.outcome(SinkKind::Archive).unwrap();
    assert!(archive.is_ok());
    assert_eq!(archive.result, "stored");
}

#[tokio::test]
async fn slow_sink_times_out_without_blocking_siblings() {
    let sinks = vec![
        ScriptedSink::new(SinkKind::Metrics, Behaviour::Stall(Duration::from_secs(30))),
        ScriptedSink::new(SinkKind::Archive, Behaviour::Succeed("stored".into())),
    ];
    let dispatcher = scripted_dispatcher(&sinks, Duration::from_millis(100));

    let started = Instant::now();
    let report = dispatcher.dispatch(monitor_event()).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    let metrics = report.outcome(SinkKind::Metrics).unwrap();
    assert!(matches!(
        metrics.error,
        Some(SinkError::Timeout(d)) if d == Duration::from_millis(100)
    ));
    assert!(report.outcome(SinkKind::Archive).unwrap().is_ok());
}

#[tokio::test]
async fn failures_are_not_retried() {
    let failing = ScriptedSink::new(SinkKind::Record, Behaviour::Fail);
    let dispatcher = scripted_dispatcher(std::slice::from_ref(&failing), Duration::from_secs(1));

    let report = dispatcher.dispatch(monitor_event()).await;

    assert_eq!(report.failures().count(), 1);
    assert_eq!(failing.calls(), 1);
}
