// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use chrono::{DateTime, FixedOffset};
use hw_report::{
    AuxMap, AuxValue, FailureRepr, LogRecord, StageKind, StageOutcome, TestId, TestOutcome,
};
use serde_json::{Map, Value};
use std::{fmt, time::Duration};

/// A stage that has just finished executing, before its result is reported.
///
/// Passed to the auxiliary data extension points.
#[derive(Clone, Debug)]
pub struct StageCall {
    /// The test the stage belongs to.
    pub test_id: TestId,

    /// The stage that finished.
    pub stage: StageKind,

    /// The time at which the stage started, including the offset from UTC.
    pub start: DateTime<FixedOffset>,

    /// The time at which the stage finished.
    pub stop: DateTime<FixedOffset>,
}

impl StageCall {
    /// Returns the time taken by the stage.
    ///
    /// A stop time before the start time results in a zero duration.
    pub fn duration(&self) -> Duration {
        (self.stop - self.start).to_std().unwrap_or_default()
    }
}

/// Evidence captured for a single stage, as relayed with the stage's event.
///
/// In distributed runs this payload can be lost together with the worker that produced it. The
/// aggregator then substitutes [`StageEvidence::default`].
#[derive(Clone, Debug, Default)]
pub struct StageEvidence {
    /// Captured standard output.
    pub stdout: Option<String>,

    /// Captured standard error.
    pub stderr: Option<String>,

    /// Captured log records. `None` if logs were not captured.
    pub log: Option<Vec<LogRecord>>,

    /// Metadata attached to the test so far.
    pub metadata: Option<AuxMap>,

    /// Device-under-test data attached to the test so far.
    pub dut: Option<AuxMap>,

    /// Equipment data attached to the test so far.
    pub equipment: Option<AuxMap>,
}

impl StageEvidence {
    /// Returns the auxiliary map for `category`, if any.
    pub fn aux(&self, category: AuxCategory) -> Option<&AuxMap> {
        match category {
            AuxCategory::Metadata => self.metadata.as_ref(),
            AuxCategory::Dut => self.dut.as_ref(),
            AuxCategory::Equipment => self.equipment.as_ref(),
        }
    }

    pub(crate) fn aux_mut(&mut self, category: AuxCategory) -> &mut Option<AuxMap> {
        match category {
            AuxCategory::Metadata => &mut self.metadata,
            AuxCategory::Dut => &mut self.dut,
            AuxCategory::Equipment => &mut self.equipment,
        }
    }
}

/// The result of a single stage, as reported by the test execution engine.
#[derive(Clone, Debug)]
pub struct StageReport {
    /// The test the stage belongs to.
    pub test_id: TestId,

    /// The stage this report is for.
    pub stage: StageKind,

    /// The raw outcome of the stage.
    pub outcome: StageOutcome,

    /// The engine's total outcome for the test, as of this stage.
    ///
    /// This can differ from the raw outcome: an expected failure has a failed call stage, but a
    /// test outcome of [`TestOutcome::Xfailed`].
    pub test_outcome: TestOutcome,

    /// The time taken by the stage.
    pub duration: Duration,

    /// The failure representation, present if the stage failed.
    pub failure: Option<FailureRepr>,

    /// Properties recorded by the test, in the order they were recorded.
    pub user_properties: Vec<(String, AuxValue)>,

    /// The evidence captured for the stage, or `None` if the payload was lost.
    pub evidence: Option<StageEvidence>,
}

impl StageReport {
    /// Creates a new `StageReport`.
    ///
    /// The test outcome is derived from the stage outcome the way a test engine without expected
    /// failures would: a failing setup or teardown is an error. Use
    /// [`set_test_outcome`](Self::set_test_outcome) to override it.
    pub fn new(
        test_id: impl Into<TestId>,
        stage: StageKind,
        outcome: StageOutcome,
        duration: Duration,
    ) -> Self {
        let test_outcome = match (stage, outcome) {
            (_, StageOutcome::Passed) => TestOutcome::Passed,
            (_, StageOutcome::Skipped) => TestOutcome::Skipped,
            (StageKind::Call, StageOutcome::Failed) => TestOutcome::Failed,
            (StageKind::Setup | StageKind::Teardown, StageOutcome::Failed) => TestOutcome::Error,
        };
        Self {
            test_id: test_id.into(),
            stage,
            outcome,
            test_outcome,
            duration,
            failure: None,
            user_properties: Vec::new(),
            evidence: None,
        }
    }

    /// Sets the engine's total outcome for the test.
    pub fn set_test_outcome(&mut self, test_outcome: TestOutcome) -> &mut Self {
        self.test_outcome = test_outcome;
        self
    }

    /// Sets the failure representation.
    pub fn set_failure(&mut self, failure: FailureRepr) -> &mut Self {
        self.failure = Some(failure);
        self
    }

    /// Records a user property. Keys are stringified.
    pub fn add_user_property(
        &mut self,
        key: impl fmt::Display,
        value: impl Into<AuxValue>,
    ) -> &mut Self {
        self.user_properties.push((key.to_string(), value.into()));
        self
    }

    /// Attaches the evidence captured for the stage.
    pub fn set_evidence(&mut self, evidence: StageEvidence) -> &mut Self {
        self.evidence = Some(evidence);
        self
    }
}

/// A category of auxiliary data attached to a test.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum AuxCategory {
    /// General metadata, stored under `metadata`.
    Metadata,

    /// Data describing the device under test, stored under `DUT`.
    Dut,

    /// Data describing the test equipment, stored under `equipment`.
    Equipment,
}

impl AuxCategory {
    /// All categories, in the order they are merged.
    pub const ALL: [AuxCategory; 3] = [
        AuxCategory::Metadata,
        AuxCategory::Dut,
        AuxCategory::Equipment,
    ];

    /// Returns the key this category is stored under in a test record.
    pub fn key(self) -> &'static str {
        match self {
            AuxCategory::Metadata => "metadata",
            AuxCategory::Dut => "DUT",
            AuxCategory::Equipment => "equipment",
        }
    }
}

impl fmt::Display for AuxCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuxCategory::Metadata => f.write_str("Metadata"),
            AuxCategory::Dut => f.write_str("DUT"),
            AuxCategory::Equipment => f.write_str("equipment"),
        }
    }
}

/// The end of a run, as reported by the test execution engine.
#[derive(Clone, Debug)]
pub struct RunFinished {
    /// The number of tests collected, excluding deselected tests.
    pub collected: usize,

    /// The number of tests deselected.
    pub deselected: usize,

    /// The exit code of the run.
    pub exit_code: i32,

    /// The absolute path to the root of the run.
    pub root: Utf8PathBuf,

    /// Information about the environment the run happened in.
    pub environment: Map<String, Value>,
}

impl RunFinished {
    /// Creates a new `RunFinished` with no deselected tests and an empty environment.
    pub fn new(collected: usize, exit_code: i32, root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            collected,
            deselected: 0,
            exit_code,
            root: root.into(),
            environment: Map::new(),
        }
    }
}
