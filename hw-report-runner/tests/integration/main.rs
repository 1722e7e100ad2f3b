// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for report aggregation.
//!
//! Each test drives a [`ReportAggregator`] the way a test execution engine would, then checks
//! the finished document.

use hw_report::{
    AuxValue, LogLevel, LogRecord, StageKind, StageOutcome, TestId, TestOutcome, WarningRecord,
};
use hw_report_runner::{
    config::OmitField,
    reporter::{ExtensionRegistry, REPORT_WARNING_CATEGORY, ReportAggregator, RunFinished},
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::HashSet;
use test_case::test_case;
use test_strategy::proptest;

mod fixtures;
mod persistence;

use fixtures::*;

#[test]
fn omitted_traceback_keeps_outcome() {
    let mut config = enabled_config();
    config.add_omit(OmitField::Traceback);
    let mut aggregator = started(config, ExtensionRegistry::new());
    run_test(&mut aggregator, "test_foo.py::test_pass", StageOutcome::Passed);
    run_test(&mut aggregator, "test_foo.py::test_fail", StageOutcome::Failed);
    let document = aggregator
        .finish(RunFinished::new(2, 1, "/work"))
        .unwrap()
        .clone();

    let failing = test_record(&document, "test_foo.py::test_fail");
    assert_eq!(failing["outcome"], json!("failed"));
    assert_eq!(failing["call"]["outcome"], json!("failed"));
    assert!(failing["call"].get("traceback").is_none());
    assert!(failing["call"].get("crash").is_none());
    assert_eq!(failing["call"]["longrepr"], json!(""));

    let passing = test_record(&document, "test_foo.py::test_pass");
    assert!(passing.get("outcome").is_none());
}

#[test_case(&[OmitField::Log]; "log")]
#[test_case(&[OmitField::Streams]; "streams")]
#[test_case(&[OmitField::Traceback, OmitField::Warnings]; "traceback and warnings")]
#[test_case(
    &[OmitField::Log, OmitField::Streams, OmitField::Traceback, OmitField::Warnings];
    "everything"
)]
fn omitted_fields_never_appear(omit: &[OmitField]) {
    let mut config = enabled_config();
    for &field in omit {
        config.add_omit(field);
    }
    let mut aggregator = started(config, ExtensionRegistry::new());

    let test_id = "test_foo.py::test_noisy";
    aggregator.begin_test(&TestId::new(test_id));
    for stage in StageKind::ALL {
        aggregator.capture_output(test_id, stage, format!("{stage} out"), format!("{stage} err"));
        aggregator.capture_log(
            test_id,
            stage,
            [LogRecord::new("root", LogLevel::Info, format!("{stage} log"))],
        );
        let outcome = if stage == StageKind::Call {
            StageOutcome::Failed
        } else {
            StageOutcome::Passed
        };
        run_stage(&mut aggregator, test_id, stage, outcome);
    }
    aggregator.end_test(test_id);
    aggregator
        .record_warning(WarningRecord {
            category: "UserWarning".to_owned(),
            filename: "test_foo.py".to_owned(),
            lineno: 7,
            message: "careful".to_owned(),
            when: "runtest".to_owned(),
        })
        .unwrap();

    let document = aggregator.finish(RunFinished::new(1, 1, "/work")).unwrap();
    let keys = all_keys(&json!(document));

    let forbidden: &[(OmitField, &[&str])] = &[
        (OmitField::Log, &["log"]),
        (OmitField::Streams, &["stdout", "stderr"]),
        (OmitField::Traceback, &["traceback", "crash"]),
        (OmitField::Warnings, &["warnings"]),
    ];
    for (field, names) in forbidden {
        for name in *names {
            let present = keys.iter().any(|key| key == name);
            assert_eq!(
                present,
                !omit.contains(field),
                "key {name} present: {present}, omitted fields: {omit:?}"
            );
        }
    }

    // Other fields are unaffected.
    let call = &test_record(document, test_id)["call"];
    assert_eq!(call["outcome"], json!("failed"));
    assert!(call.get("longrepr").is_some());
    assert!(call.get("duration").is_some());
}

#[test]
fn captured_evidence_in_stage_records() {
    let mut aggregator = started(enabled_config(), ExtensionRegistry::new());
    let test_id = "test_output.py::test_fruit";
    aggregator.begin_test(&TestId::new(test_id));

    run_stage(&mut aggregator, test_id, StageKind::Setup, StageOutcome::Passed);
    aggregator.capture_output(test_id, StageKind::Call, "apple\n", "");
    let mut record = LogRecord::new("fruit", LogLevel::Warning, "bananas are low");
    record
        .set_location("/work/tests/test_output.py", 12)
        .set_func_name("test_fruit")
        .set_created(1_700_000_000.25);
    aggregator.capture_log(test_id, StageKind::Call, [record]);
    run_stage(&mut aggregator, test_id, StageKind::Call, StageOutcome::Passed);
    run_stage(&mut aggregator, test_id, StageKind::Teardown, StageOutcome::Passed);
    aggregator.end_test(test_id);

    let document = aggregator.finish(RunFinished::new(1, 0, "/work")).unwrap();
    let test = test_record(document, test_id);
    assert_eq!(test["call"]["stdout"], json!("apple\n"));
    assert!(test["call"].get("stderr").is_none(), "empty stderr is left out");
    assert!(test["setup"].get("stdout").is_none());

    let log = &test["call"]["log"][0];
    let keys: Vec<_> = log.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        [
            "name",
            "msg",
            "args",
            "levelname",
            "levelno",
            "pathname",
            "filename",
            "module",
            "lineno",
            "funcName",
            "created",
            "exc_info"
        ]
    );
    assert_eq!(log["msg"], json!("bananas are low"));
    assert_eq!(log["levelno"], json!(30));
    assert_eq!(log["module"], json!("test_output"));
    assert_eq!(test["call"]["duration"], json!(0.125));
}

#[test]
fn summary_only_document_keys() {
    let mut config = enabled_config();
    config.set_summary_only(true);
    let mut aggregator = started(config, ExtensionRegistry::new());
    run_test(&mut aggregator, "test_a", StageOutcome::Passed);
    aggregator
        .record_warning(WarningRecord {
            category: "UserWarning".to_owned(),
            filename: "test_a.py".to_owned(),
            lineno: 1,
            message: "careful".to_owned(),
            when: "collect".to_owned(),
        })
        .unwrap();

    let document = aggregator.finish(RunFinished::new(1, 0, "/work")).unwrap();
    let keys: Vec<_> = document.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        ["created", "duration", "exitcode", "root", "environment", "summary"]
    );

    // Details remain available in memory.
    let report = aggregator.report().unwrap();
    assert_eq!(report.tests.len(), 1);
    assert_eq!(report.warnings.len(), 1);
}

#[test]
fn deselected_tests_are_added_to_collected() {
    let mut aggregator = started(enabled_config(), ExtensionRegistry::new());
    for i in 0..8 {
        run_test(&mut aggregator, &format!("test_{i}"), StageOutcome::Passed);
    }
    let mut finished = RunFinished::new(8, 0, "/work");
    finished.deselected = 2;
    let document = aggregator.finish(finished).unwrap();

    assert_eq!(
        document["summary"],
        json!({"passed": 8, "total": 8, "collected": 10, "deselected": 2})
    );
}

#[test]
fn metadata_accumulates_across_stages() {
    let mut aggregator = started(enabled_config(), ExtensionRegistry::new());
    let test_id = "test_meta.py::test_accumulate";
    aggregator.begin_test(&TestId::new(test_id));

    aggregator
        .test_context_mut(test_id)
        .expect("test has begun")
        .metadata_mut()
        .insert("a".to_owned(), 1.into());
    run_stage(&mut aggregator, test_id, StageKind::Setup, StageOutcome::Passed);
    run_stage(&mut aggregator, test_id, StageKind::Call, StageOutcome::Passed);
    aggregator
        .test_context_mut(test_id)
        .expect("test is running")
        .metadata_mut()
        .insert("c".to_owned(), 3.into());
    run_stage(&mut aggregator, test_id, StageKind::Teardown, StageOutcome::Passed);
    aggregator.end_test(test_id);
    assert!(aggregator.test_context_mut(test_id).is_none());

    let document = aggregator.finish(RunFinished::new(1, 0, "/work")).unwrap();
    assert_eq!(
        test_record(document, test_id)["metadata"],
        json!({"a": 1, "c": 3})
    );
}

#[test]
fn unserializable_dut_is_dropped_with_one_warning() {
    let mut aggregator = started(enabled_config(), ExtensionRegistry::new());
    let test_id = "test_foo.py::test_dut";
    aggregator.begin_test(&TestId::new(test_id));
    {
        let context = aggregator.test_context_mut(test_id).unwrap();
        context.dut_mut().insert("x".to_owned(), "foo".into());
        context
            .dut_mut()
            .insert("a".to_owned(), AuxValue::opaque("object"));
        context
            .equipment_mut()
            .insert("scope".to_owned(), "DSO-X".into());
    }
    for stage in StageKind::ALL {
        run_stage(&mut aggregator, test_id, stage, StageOutcome::Passed);
    }
    aggregator.end_test(test_id);

    let document = aggregator.finish(RunFinished::new(1, 0, "/work")).unwrap();
    let test = test_record(document, test_id);
    assert!(test.get("DUT").is_none(), "whole category is dropped");
    assert_eq!(test["equipment"], json!({"scope": "DSO-X"}));

    let warnings = document["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0]["category"], json!(REPORT_WARNING_CATEGORY));
    assert_eq!(
        warnings[0]["message"],
        json!("DUT of test_foo.py::test_dut is not JSON-serializable.")
    );
    assert_eq!(warnings[0]["when"], json!("runtest"));
}

#[test]
fn missing_teardown_and_lost_evidence() {
    let mut aggregator = started(enabled_config(), ExtensionRegistry::new());
    let test_id = "test_crash.py::test_worker_died";
    aggregator.begin_test(&TestId::new(test_id));
    aggregator
        .test_context_mut(test_id)
        .unwrap()
        .metadata_mut()
        .insert("seeded".to_owned(), true.into());
    run_stage(&mut aggregator, test_id, StageKind::Setup, StageOutcome::Passed);

    // The worker crashed: the call stage is reported without its evidence, and teardown never
    // arrives.
    run_stage_with(
        &mut aggregator,
        test_id,
        StageKind::Call,
        StageOutcome::Failed,
        |report| {
            report.evidence = None;
        },
    );
    run_test(&mut aggregator, "test_crash.py::test_after", StageOutcome::Passed);

    let document = aggregator.finish(RunFinished::new(2, 1, "/work")).unwrap();
    let test = test_record(document, test_id);
    assert!(test.get("setup").is_some());
    assert_eq!(test["call"]["outcome"], json!("failed"));
    assert!(test.get("teardown").is_none());
    assert_eq!(test["outcome"], json!("failed"));
    assert_eq!(test["metadata"], json!({"seeded": true}), "kept from setup");

    assert_eq!(document["summary"]["total"], json!(2));
    assert_eq!(document["summary"]["failed"], json!(1));
    assert_eq!(document["summary"]["passed"], json!(1));
}

#[test]
fn engine_outcome_is_trusted() {
    let mut aggregator = started(enabled_config(), ExtensionRegistry::new());
    run_test_with_outcome(
        &mut aggregator,
        "test_x.py::test_xfail",
        StageOutcome::Failed,
        TestOutcome::Xfailed,
    );
    run_test_with_outcome(
        &mut aggregator,
        "test_x.py::test_xpass",
        StageOutcome::Passed,
        TestOutcome::Xpassed,
    );
    run_test(&mut aggregator, "test_x.py::test_skip", StageOutcome::Skipped);

    let document = aggregator.finish(RunFinished::new(3, 0, "/work")).unwrap();
    assert_eq!(
        test_record(document, "test_x.py::test_xfail")["outcome"],
        json!("xfailed")
    );
    assert_eq!(
        test_record(document, "test_x.py::test_xpass")["outcome"],
        json!("xpassed")
    );
    assert_eq!(
        document["summary"],
        json!({"xfailed": 1, "xpassed": 1, "skipped": 1, "total": 3, "collected": 3})
    );
}

#[test]
fn user_properties_from_teardown() {
    let mut aggregator = started(enabled_config(), ExtensionRegistry::new());
    let test_id = "test_props.py::test_record_property";
    aggregator.begin_test(&TestId::new(test_id));
    run_stage(&mut aggregator, test_id, StageKind::Setup, StageOutcome::Passed);
    run_stage(&mut aggregator, test_id, StageKind::Call, StageOutcome::Passed);
    run_stage_with(
        &mut aggregator,
        test_id,
        StageKind::Teardown,
        StageOutcome::Passed,
        |report| {
            report
                .add_user_property("foo", "bar")
                .add_user_property("foo", 2)
                .add_user_property(7, AuxValue::Null);
        },
    );
    aggregator.end_test(test_id);

    let document = aggregator.finish(RunFinished::new(1, 0, "/work")).unwrap();
    assert_eq!(
        test_record(document, test_id)["user_properties"],
        json!([{"foo": "bar"}, {"foo": 2}, {"7": null}])
    );
}

#[test]
fn tests_keep_first_seen_order() {
    let mut aggregator = started(enabled_config(), ExtensionRegistry::new());
    run_stage(&mut aggregator, "b", StageKind::Setup, StageOutcome::Passed);
    run_stage(&mut aggregator, "a", StageKind::Setup, StageOutcome::Passed);
    run_stage(&mut aggregator, "b", StageKind::Call, StageOutcome::Passed);
    run_stage(&mut aggregator, "c", StageKind::Setup, StageOutcome::Passed);
    run_stage(&mut aggregator, "a", StageKind::Call, StageOutcome::Passed);

    let document = aggregator.finish(RunFinished::new(3, 0, "/work")).unwrap();
    let ids: Vec<_> = document["tests"]
        .as_array()
        .unwrap()
        .iter()
        .map(|test| test["nodeid"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["b", "a", "c"]);
}

#[proptest(cases = 64)]
fn summary_counts_add_up(
    #[strategy(proptest::collection::vec((0..12u8, 0..6u8), 0..40))] events: Vec<(u8, u8)>,
) {
    let mut aggregator = ReportAggregator::new(enabled_config(), ExtensionRegistry::new());
    aggregator.start().unwrap();

    let mut distinct = HashSet::new();
    for (test, outcome) in &events {
        let test_id = format!("test_{test}");
        let (stage_outcome, test_outcome) = match outcome {
            0 => (StageOutcome::Passed, TestOutcome::Passed),
            1 => (StageOutcome::Failed, TestOutcome::Failed),
            2 => (StageOutcome::Skipped, TestOutcome::Skipped),
            3 => (StageOutcome::Failed, TestOutcome::Xfailed),
            4 => (StageOutcome::Passed, TestOutcome::Xpassed),
            _ => (StageOutcome::Failed, TestOutcome::Error),
        };
        run_stage_with(
            &mut aggregator,
            &test_id,
            StageKind::Call,
            stage_outcome,
            |report| {
                report.set_test_outcome(test_outcome);
            },
        );
        distinct.insert(test_id);
    }

    aggregator
        .finish(RunFinished::new(distinct.len(), 0, "/work"))
        .unwrap();
    let summary = &aggregator.report().unwrap().summary;
    assert_eq!(summary.total, distinct.len());
    assert_eq!(summary.outcomes.values().sum::<usize>(), summary.total);
    assert_eq!(summary.collected, distinct.len());
    assert_eq!(summary.deselected, None);
}
