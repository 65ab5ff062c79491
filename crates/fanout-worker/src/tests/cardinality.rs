//! Every dispatch yields exactly one outcome per registered sink.

use super::harness::{monitor_event, scripted_dispatcher, Behaviour, ScriptedSink, TestHarness};
use crate::sink::SinkKind;
use std::time::Duration;

#[tokio::test]
async fn standard_dispatch_reports_three_outcomes() {
    let harness = TestHarness::new();
    assert_eq!(harness.dispatcher.sink_count(), 3);

    let report = harness.dispatcher.dispatch(monitor_event()).await;

    assert_eq!(report.outcomes.len(), 3);
    for kind in [SinkKind::Metrics, SinkKind::Archive, SinkKind::Record] {
        assert!(report.outcome(kind).is_some(), "missing outcome for {kind}");
    }
}

#[tokio::test]
async fn cardinality_holds_when_every_backend_fails() {
    let harness = TestHarness::new();
    harness.metrics.set_fail(true);
    harness.objects.set_fail(true);
    harness.records.set_fail_writes(true);

    let report = harness.dispatcher.dispatch(monitor_event()).await;

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.failures().count(), 3);
}

#[tokio::test]
async fn cardinality_holds_for_mixed_behaviours() {
    let sinks = vec![
        ScriptedSink::new(SinkKind::Metrics, Behaviour::Succeed("ok".into())),
        ScriptedSink::new(SinkKind::Archive, Behaviour::Fail),
        ScriptedSink::new(SinkKind::Record, Behaviour::Panic),
        ScriptedSink::new(SinkKind::Record, Behaviour::Stall(Duration::from_secs(10))),
    ];
    let dispatcher = scripted_dispatcher(&sinks, Duration::from_millis(50));

    let report = dispatcher.dispatch(monitor_event()).await;

    assert_eq!(report.outcomes.len(), sinks.len());
    for sink in &sinks {
        assert_eq!(sink.calls(), 1);
    }
}

#[tokio::test]
async fn empty_sink_set_yields_no_outcomes() {
    let dispatcher = scripted_dispatcher(&[], Duration::from_secs(1));
    let report = dispatcher.dispatch(monitor_event()).await;
    assert!(report.outcomes.is_empty());
}
