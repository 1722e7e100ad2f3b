// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, FixedOffset, TimeDelta};
use hw_report::{
    Document, FailureRepr, FrameLocation, StageKind, StageOutcome, TestId, TestOutcome,
};
use hw_report_runner::{
    config::{ReportConfig, ReportPath},
    reporter::{ExtensionRegistry, ReportAggregator, StageCall, StageReport},
};
use serde_json::Value;

pub(crate) fn init_tracing() {
    // Another test may have installed a subscriber already.
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A config with reporting enabled and saving disabled.
pub(crate) fn enabled_config() -> ReportConfig {
    let mut config = ReportConfig::default();
    config.set_enabled(true).set_path(ReportPath::DoNotSave);
    config
}

pub(crate) fn started(config: ReportConfig, extensions: ExtensionRegistry) -> ReportAggregator {
    init_tracing();
    let mut aggregator = ReportAggregator::new(config, extensions);
    aggregator.start().expect("run starts");
    aggregator
}

fn stage_start() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2024-03-01T10:00:00+01:00").expect("valid timestamp")
}

pub(crate) fn stage_call(test_id: &str, stage: StageKind) -> StageCall {
    let start = stage_start();
    StageCall {
        test_id: TestId::new(test_id),
        stage,
        start,
        stop: start + TimeDelta::milliseconds(125),
    }
}

pub(crate) fn failure() -> FailureRepr {
    let mut failure =
        FailureRepr::new("def test_fail():\n>       assert False\nE       assert False");
    failure
        .set_crash(FrameLocation::new("test_foo.py", 2, "AssertionError"))
        .set_traceback([FrameLocation::new("test_foo.py", 2, "AssertionError")]);
    failure
}

/// Runs a stage the way a test engine does: collects evidence, then reports the stage.
///
/// `customize` can adjust the report before it is sent.
pub(crate) fn run_stage_with(
    aggregator: &mut ReportAggregator,
    test_id: &str,
    stage: StageKind,
    outcome: StageOutcome,
    customize: impl FnOnce(&mut StageReport),
) {
    let call = stage_call(test_id, stage);
    let evidence = aggregator.collect_evidence(&call);
    let mut report = StageReport::new(test_id, stage, outcome, call.duration());
    if outcome == StageOutcome::Failed {
        report.set_failure(failure());
    }
    report.set_evidence(evidence);
    customize(&mut report);
    aggregator.on_stage_event(report).expect("run is open");
}

pub(crate) fn run_stage(
    aggregator: &mut ReportAggregator,
    test_id: &str,
    stage: StageKind,
    outcome: StageOutcome,
) {
    run_stage_with(aggregator, test_id, stage, outcome, |_| {});
}

/// Runs all three stages of a test. Only the call stage gets `call_outcome`.
pub(crate) fn run_test(
    aggregator: &mut ReportAggregator,
    test_id: &str,
    call_outcome: StageOutcome,
) {
    aggregator.begin_test(&TestId::new(test_id));
    run_stage(aggregator, test_id, StageKind::Setup, StageOutcome::Passed);
    run_stage(aggregator, test_id, StageKind::Call, call_outcome);
    run_stage(aggregator, test_id, StageKind::Teardown, StageOutcome::Passed);
    aggregator.end_test(test_id);
}

/// Runs a test whose engine-reported outcome differs from its raw call outcome.
pub(crate) fn run_test_with_outcome(
    aggregator: &mut ReportAggregator,
    test_id: &str,
    call_outcome: StageOutcome,
    test_outcome: TestOutcome,
) {
    aggregator.begin_test(&TestId::new(test_id));
    run_stage(aggregator, test_id, StageKind::Setup, StageOutcome::Passed);
    run_stage_with(aggregator, test_id, StageKind::Call, call_outcome, |report| {
        report.set_test_outcome(test_outcome);
    });
    run_stage(aggregator, test_id, StageKind::Teardown, StageOutcome::Passed);
    aggregator.end_test(test_id);
}

/// Returns every object key that appears anywhere in `value`.
pub(crate) fn all_keys(value: &Value) -> Vec<String> {
    let mut keys = Vec::new();
    collect_keys(value, &mut keys);
    keys
}

fn collect_keys(value: &Value, keys: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                keys.push(key.clone());
                collect_keys(value, keys);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_keys(item, keys);
            }
        }
        _ => {}
    }
}

/// Returns the test record for `test_id` in a finished document.
pub(crate) fn test_record<'a>(document: &'a Document, test_id: &str) -> &'a Value {
    document["tests"]
        .as_array()
        .and_then(|tests| tests.iter().find(|test| test["nodeid"] == test_id))
        .unwrap_or_else(|| panic!("test {test_id} is in the document"))
}
