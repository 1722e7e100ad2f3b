// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::tempdir;
use hw_report::StageOutcome;
use hw_report_runner::{
    config::{ConfigWarnings, ReportConfig, ReportPath},
    errors::ReportStateError,
    reporter::{ExtensionRegistry, ReportAggregator, RunFinished},
};
use indoc::indoc;
use maplit::btreeset;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use test_case::test_case;

#[derive(Default)]
struct CollectedWarnings {
    unknown: Vec<(Utf8PathBuf, BTreeSet<String>)>,
}

impl ConfigWarnings for CollectedWarnings {
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>) {
        self.unknown.push((config_file.to_owned(), unknown.clone()));
    }
}

fn finished_run(config: ReportConfig) -> ReportAggregator {
    let mut aggregator = started(config, ExtensionRegistry::new());
    run_test(&mut aggregator, "test_foo.py::test_pass", StageOutcome::Passed);
    run_test(&mut aggregator, "test_foo.py::test_fail", StageOutcome::Failed);
    let mut finished = RunFinished::new(2, 1, "/work");
    finished
        .environment
        .insert("Python".to_owned(), "3.12.1".into());
    aggregator.finish(finished).unwrap();
    aggregator
}

#[test]
fn write_report_saves_to_nested_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reports/nightly/run.json");

    let mut config = enabled_config();
    config.set_path(ReportPath::Save(path.clone()));
    let aggregator = finished_run(config);

    let line = aggregator
        .write_report()
        .unwrap()
        .expect("reporting is enabled");
    assert_eq!(line.message(), format!("report saved to: {path}"));

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(!contents.contains('\n'), "compact by default");
    let saved: Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(saved["tests"], aggregator.document().unwrap()["tests"]);
    assert_eq!(saved["exitcode"], json!(1));
    assert_eq!(saved["root"], json!("/work"));
    assert_eq!(saved["environment"], json!({"Python": "3.12.1"}));
    assert_eq!(
        saved["summary"],
        json!({"passed": 1, "failed": 1, "total": 2, "collected": 2})
    );
}

#[test]
fn write_report_failure_is_reported_not_raised() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "").unwrap();

    let mut config = enabled_config();
    config.set_path(ReportPath::Save(blocker.join("report.json")));
    let aggregator = finished_run(config);

    let line = aggregator.write_report().unwrap().unwrap();
    assert!(
        line.message().starts_with("could not save report: "),
        "unexpected message: {}",
        line.message()
    );
    assert!(line.should_write(0));
    // The run's exit code is untouched.
    assert_eq!(aggregator.document().unwrap()["exitcode"], json!(1));
}

#[test]
fn write_report_without_path_is_skipped() {
    let aggregator = finished_run(enabled_config());
    let line = aggregator.write_report().unwrap().unwrap();
    assert_eq!(line.message(), "report auto-save skipped");
    assert!(!line.should_write(0));
    assert!(line.should_write(1));
}

enum Target {
    Configured(&'static str),
    ExistingDir,
}

#[test_case(Target::Configured(""), "report auto-save skipped"; "empty")]
#[test_case(Target::Configured("   "), "report auto-save skipped"; "whitespace")]
#[test_case(
    Target::Configured("/"),
    "could not save report: report path `/` does not name a file";
    "root"
)]
#[test_case(Target::ExistingDir, "could not save report: "; "existing directory")]
fn write_report_with_unusable_path(target: Target, expected_prefix: &str) {
    let dir = tempdir().unwrap();
    let path = match target {
        Target::Configured(input) => ReportPath::parse(input),
        Target::ExistingDir => ReportPath::Save(dir.path().to_owned()),
    };

    let mut config = enabled_config();
    config.set_path(path);
    let aggregator = finished_run(config);

    let line = aggregator
        .write_report()
        .expect("run is finished")
        .expect("reporting is enabled");
    assert!(
        line.message().starts_with(expected_prefix),
        "unexpected message: {}",
        line.message()
    );
    assert!(dir.path().is_dir(), "an existing directory is never replaced");
}

#[test]
fn write_report_before_finish() {
    let aggregator = started(enabled_config(), ExtensionRegistry::new());
    assert_eq!(
        aggregator.write_report().unwrap_err(),
        ReportStateError::NotFinished
    );
}

#[test]
fn config_file_drives_the_run() {
    let dir = tempdir().unwrap();
    let report_path = dir.path().join("out/report.json");
    let config_path = dir.path().join("report.toml");
    std::fs::write(
        &config_path,
        format!(
            indoc! {r#"
                [report]
                enabled = true
                path = "{}"
                omit = ["traceback", "streams"]
                indent = 2
                verbosity = 1
                unknown-key = "ignored"
            "#},
            report_path
        ),
    )
    .unwrap();

    init_tracing();
    let mut warnings = CollectedWarnings::default();
    let config =
        ReportConfig::from_sources_with_warnings(Some(config_path.as_path()), &mut warnings)
            .expect("config is valid");
    assert_eq!(
        warnings.unknown,
        [(config_path.clone(), btreeset! {"report.unknown-key".to_owned()})]
    );
    assert_eq!(config.verbosity(), Some(1));

    let aggregator = finished_run(config);
    let line = aggregator.write_report().unwrap().unwrap();
    assert!(line.should_write(0));

    let contents = std::fs::read_to_string(&report_path).unwrap();
    assert!(contents.starts_with("{\n  \"created\": "), "indented: {contents}");
    let saved: Value = serde_json::from_str(&contents).unwrap();
    let failing = saved["tests"]
        .as_array()
        .unwrap()
        .iter()
        .find(|test| test["nodeid"] == "test_foo.py::test_fail")
        .unwrap();
    assert!(failing["call"].get("traceback").is_none());
    assert!(failing["call"].get("stdout").is_none());
}
