// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{SerializeError, serialize::serialize_document};
use chrono::{DateTime, FixedOffset, SecondsFormat};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};
use serde_json::{Map, Value};
use std::{borrow::Borrow, collections::BTreeMap, fmt, io, time::Duration};

/// A JSON document, as emitted for a finished run.
///
/// The document is a plain JSON object so that it can be edited freely before it is persisted.
pub type Document = Map<String, Value>;

/// A stable identifier for a single test item within a run.
///
/// Identifiers are assigned by the test execution engine and are used as the merge key for all
/// events belonging to the same test.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestId(String);

impl TestId {
    /// Creates a new `TestId`.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TestId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for TestId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the three phases of executing a single test.
///
/// Stages are ordered: a test progresses through setup, call and teardown in that order.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// Fixture setup.
    Setup,

    /// The test body.
    Call,

    /// Fixture teardown.
    Teardown,
}

impl StageKind {
    /// All stages, in execution order.
    pub const ALL: [StageKind; 3] = [StageKind::Setup, StageKind::Call, StageKind::Teardown];

    /// Returns the name of this stage as it appears in the report.
    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::Setup => "setup",
            StageKind::Call => "call",
            StageKind::Teardown => "teardown",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The raw result of executing one stage, as reported by the execution engine.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageOutcome {
    /// The stage passed.
    Passed,

    /// The stage failed.
    Failed,

    /// The stage was skipped.
    Skipped,
}

impl StageOutcome {
    /// Returns the name of this outcome as it appears in the report.
    pub fn as_str(self) -> &'static str {
        match self {
            StageOutcome::Passed => "passed",
            StageOutcome::Failed => "failed",
            StageOutcome::Skipped => "skipped",
        }
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The final outcome of a test.
///
/// This is distinct from the outcome of any single stage: for example, an expected failure has a
/// failed call stage, but an outcome of [`TestOutcome::Xfailed`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestOutcome {
    /// The test passed.
    Passed,

    /// The test failed.
    Failed,

    /// The test was skipped.
    Skipped,

    /// The test failed, and was expected to fail.
    Xfailed,

    /// The test passed, but was expected to fail.
    Xpassed,

    /// The test errored during setup or teardown.
    Error,
}

impl TestOutcome {
    /// Returns the name of this outcome as it appears in the report.
    pub fn as_str(self) -> &'static str {
        match self {
            TestOutcome::Passed => "passed",
            TestOutcome::Failed => "failed",
            TestOutcome::Skipped => "skipped",
            TestOutcome::Xfailed => "xfailed",
            TestOutcome::Xpassed => "xpassed",
            TestOutcome::Error => "error",
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A location within a traceback.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FrameLocation {
    /// The path to the source file.
    pub path: String,

    /// The line number within the file.
    pub lineno: u32,

    /// A short message describing this frame.
    pub message: String,
}

impl FrameLocation {
    /// Creates a new `FrameLocation`.
    pub fn new(path: impl Into<String>, lineno: u32, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            lineno,
            message: message.into(),
        }
    }
}

/// The failure representation produced by the execution engine for a stage.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FailureRepr {
    /// The innermost frame, where the failure happened.
    pub crash: Option<FrameLocation>,

    /// All frames of the traceback, outermost first.
    pub traceback: Option<Vec<FrameLocation>>,

    /// The human-readable long failure text.
    pub longrepr: String,
}

impl FailureRepr {
    /// Creates a new `FailureRepr` with the given long failure text.
    pub fn new(longrepr: impl Into<String>) -> Self {
        Self {
            crash: None,
            traceback: None,
            longrepr: longrepr.into(),
        }
    }

    /// Sets the innermost frame.
    pub fn set_crash(&mut self, crash: FrameLocation) -> &mut Self {
        self.crash = Some(crash);
        self
    }

    /// Sets the traceback frames, outermost first.
    pub fn set_traceback(&mut self, frames: impl IntoIterator<Item = FrameLocation>) -> &mut Self {
        self.traceback = Some(frames.into_iter().collect());
        self
    }
}

/// The severity of a captured log record.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum LogLevel {
    /// Debug messages.
    Debug,

    /// Informational messages.
    Info,

    /// Warnings.
    Warning,

    /// Errors.
    Error,

    /// Critical errors.
    Critical,
}

impl LogLevel {
    /// Returns the level name, as it appears in the `levelname` field.
    pub fn name(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// Returns the numeric level, as it appears in the `levelno` field.
    pub fn number(self) -> u32 {
        match self {
            LogLevel::Debug => 10,
            LogLevel::Info => 20,
            LogLevel::Warning => 30,
            LogLevel::Error => 40,
            LogLevel::Critical => 50,
        }
    }
}

/// A single captured log record.
///
/// Records are serialized as flat maps. The message is stored already formatted, so `args` and
/// `exc_info` are always null.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    /// The name of the logger.
    pub name: String,

    /// The formatted message.
    pub msg: String,

    /// The severity of the record.
    pub level: LogLevel,

    /// The full path to the source file that emitted the record.
    pub pathname: String,

    /// The file name portion of `pathname`.
    pub filename: String,

    /// The module that emitted the record.
    pub module: String,

    /// The line number that emitted the record.
    pub lineno: u32,

    /// The function that emitted the record.
    pub func_name: String,

    /// The time at which the record was created, as seconds since the Unix epoch.
    pub created: f64,

    /// Any other fields attached to the record.
    pub extra: Map<String, Value>,
}

impl LogRecord {
    // Keys written by the structural fields. Extra fields with these names are skipped.
    const STRUCTURAL_KEYS: &'static [&'static str] = &[
        "name", "msg", "args", "levelname", "levelno", "pathname", "filename", "module", "lineno",
        "funcName", "created", "exc_info",
    ];

    /// Creates a new `LogRecord` with the given logger name, level and message.
    pub fn new(name: impl Into<String>, level: LogLevel, msg: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            msg: msg.into(),
            level,
            pathname: String::new(),
            filename: String::new(),
            module: String::new(),
            lineno: 0,
            func_name: String::new(),
            created: 0.0,
            extra: Map::new(),
        }
    }

    /// Sets the source location of the record.
    ///
    /// `filename` and `module` are derived from `pathname`.
    pub fn set_location(&mut self, pathname: impl Into<String>, lineno: u32) -> &mut Self {
        let pathname = pathname.into();
        let filename = pathname
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&pathname)
            .to_owned();
        self.module = filename
            .rsplit_once('.')
            .map_or(filename.as_str(), |(stem, _)| stem)
            .to_owned();
        self.filename = filename;
        self.pathname = pathname;
        self.lineno = lineno;
        self
    }

    /// Sets the function that emitted the record.
    pub fn set_func_name(&mut self, func_name: impl Into<String>) -> &mut Self {
        self.func_name = func_name.into();
        self
    }

    /// Sets the creation time of the record.
    pub fn set_created(&mut self, created: f64) -> &mut Self {
        self.created = created;
        self
    }

    /// Adds an extra field to the record.
    pub fn add_extra(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("msg", &self.msg)?;
        map.serialize_entry("args", &())?;
        map.serialize_entry("levelname", self.level.name())?;
        map.serialize_entry("levelno", &self.level.number())?;
        map.serialize_entry("pathname", &self.pathname)?;
        map.serialize_entry("filename", &self.filename)?;
        map.serialize_entry("module", &self.module)?;
        map.serialize_entry("lineno", &self.lineno)?;
        map.serialize_entry("funcName", &self.func_name)?;
        map.serialize_entry("created", &self.created)?;
        map.serialize_entry("exc_info", &())?;
        for (key, value) in &self.extra {
            if !Self::STRUCTURAL_KEYS.contains(&key.as_str()) {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

/// The standard JSON record for a single stage of a test.
///
/// Optional fields are only present in the report when set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StageRecord {
    /// The time taken by the stage, serialized as seconds.
    #[serde(serialize_with = "serialize_seconds")]
    pub duration: Duration,

    /// The raw outcome of the stage.
    pub outcome: StageOutcome,

    /// The innermost frame of the failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crash: Option<FrameLocation>,

    /// The traceback of the failure, outermost frame first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<Vec<FrameLocation>>,

    /// Captured standard output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,

    /// Captured standard error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,

    /// Captured log records, in emission order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<Vec<LogRecord>>,

    /// The human-readable long failure text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longrepr: Option<String>,
}

impl StageRecord {
    /// Creates a new `StageRecord` with only the outcome and duration set.
    pub fn new(outcome: StageOutcome, duration: Duration) -> Self {
        Self {
            duration,
            outcome,
            crash: None,
            traceback: None,
            stdout: None,
            stderr: None,
            log: None,
            longrepr: None,
        }
    }
}

/// The record for a single stage, either built by the engine or supplied by an extension.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StageEntry {
    /// The standard record shape.
    Standard(StageRecord),

    /// A record shape supplied by an extension, which replaces the standard one entirely.
    Custom(Map<String, Value>),
}

impl StageEntry {
    /// Returns the standard record, if this entry has the standard shape.
    pub fn as_standard(&self) -> Option<&StageRecord> {
        match self {
            StageEntry::Standard(record) => Some(record),
            StageEntry::Custom(_) => None,
        }
    }
}

/// The record for a single test item, merged across its stages.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TestRecord {
    /// The identifier of the test.
    pub nodeid: TestId,

    /// The final outcome of the test, stored only if it isn't [`TestOutcome::Passed`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TestOutcome>,

    /// The records for each stage that was reported.
    #[serde(flatten)]
    pub stages: BTreeMap<StageKind, StageEntry>,

    /// Metadata attached to the test.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,

    /// Data describing the device under test.
    #[serde(rename = "DUT", skip_serializing_if = "Option::is_none")]
    pub dut: Option<Map<String, Value>>,

    /// Data describing the test equipment used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equipment: Option<Map<String, Value>>,

    /// User properties, each as a single-key map so that keys may repeat.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_properties: Option<Vec<Map<String, Value>>>,
}

impl TestRecord {
    /// Creates a new, empty `TestRecord` for the given test.
    pub fn new(nodeid: TestId) -> Self {
        Self {
            nodeid,
            outcome: None,
            stages: BTreeMap::new(),
            metadata: None,
            dut: None,
            equipment: None,
            user_properties: None,
        }
    }

    /// Returns the final outcome of the test. Tests with no stored outcome have passed.
    pub fn final_outcome(&self) -> TestOutcome {
        self.outcome.unwrap_or(TestOutcome::Passed)
    }

    /// Returns the record for the given stage, if it was reported.
    pub fn stage(&self, stage: StageKind) -> Option<&StageEntry> {
        self.stages.get(&stage)
    }
}

/// A warning recorded during the run.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WarningRecord {
    /// The category of the warning.
    pub category: String,

    /// The file the warning was issued from.
    pub filename: String,

    /// The line the warning was issued from.
    pub lineno: u32,

    /// The warning message.
    pub message: String,

    /// The phase of the run during which the warning was issued, e.g. "collect" or "runtest".
    pub when: String,
}

/// Summary counters for a run.
///
/// Serialized as a flat map: per-outcome counts in the order outcomes were first seen, followed
/// by `total`, `collected` and (if nonzero) `deselected`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Summary {
    /// The number of tests with each final outcome.
    #[serde(flatten)]
    pub outcomes: IndexMap<TestOutcome, usize>,

    /// The number of distinct tests observed.
    pub total: usize,

    /// The number of tests collected, including deselected ones.
    pub collected: usize,

    /// The number of deselected tests, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deselected: Option<usize>,
}

impl Summary {
    /// Tallies final outcomes across `tests`.
    ///
    /// The engine excludes deselected items from its collected count, so `deselected` is added
    /// back to `collected`.
    pub fn new<'a>(
        tests: impl IntoIterator<Item = &'a TestRecord>,
        collected: usize,
        deselected: usize,
    ) -> Self {
        let mut outcomes = IndexMap::new();
        let mut total = 0;
        for test in tests {
            *outcomes.entry(test.final_outcome()).or_insert(0) += 1;
            total += 1;
        }
        Self {
            outcomes,
            total,
            collected: collected + deselected,
            deselected: (deselected > 0).then_some(deselected),
        }
    }

    /// Returns the number of tests with the given outcome.
    pub fn count(&self, outcome: TestOutcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }
}

/// The root of a run report.
#[derive(Clone, Debug)]
pub struct RunReport {
    /// The time at which the report was created.
    pub created: DateTime<FixedOffset>,

    /// The time taken by the whole run.
    pub duration: Duration,

    /// The exit code of the run.
    pub exitcode: i32,

    /// The absolute path to the root of the run.
    pub root: String,

    /// Information about the environment the run happened in.
    pub environment: Map<String, Value>,

    /// Summary counters.
    pub summary: Summary,

    /// Per-test records, in the order tests were first seen.
    pub tests: Vec<TestRecord>,

    /// Warnings recorded during the run, in emission order.
    pub warnings: Vec<WarningRecord>,
}

impl RunReport {
    /// Converts this report into a JSON document.
    ///
    /// In summary-only mode, `tests` and `warnings` are left out. `warnings` is also left out if
    /// there are none.
    pub fn to_document(&self, summary_only: bool) -> Result<Document, SerializeError> {
        let mut document = Document::new();
        document.insert(
            "created".to_owned(),
            self.created
                .to_rfc3339_opts(SecondsFormat::Micros, false)
                .into(),
        );
        document.insert(
            "duration".to_owned(),
            serde_json::to_value(self.duration.as_secs_f64())?,
        );
        document.insert("exitcode".to_owned(), self.exitcode.into());
        document.insert("root".to_owned(), self.root.clone().into());
        document.insert(
            "environment".to_owned(),
            Value::Object(self.environment.clone()),
        );
        document.insert("summary".to_owned(), serde_json::to_value(&self.summary)?);
        if !summary_only {
            document.insert("tests".to_owned(), serde_json::to_value(&self.tests)?);
            if !self.warnings.is_empty() {
                document.insert("warnings".to_owned(), serde_json::to_value(&self.warnings)?);
            }
        }
        Ok(document)
    }

    /// Serializes this report to the given writer, optionally indenting by `indent` spaces.
    pub fn serialize(
        &self,
        summary_only: bool,
        indent: Option<usize>,
        writer: impl io::Write,
    ) -> Result<(), SerializeError> {
        let document = self.to_document(summary_only)?;
        serialize_document(&document, indent, writer)
    }
}

fn serialize_seconds<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
