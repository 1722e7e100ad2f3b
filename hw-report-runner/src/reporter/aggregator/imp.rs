// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    merger::{TestContext, TestRecordMerger},
    stage::shape_stage,
};
use crate::{
    config::{OmitField, ReportConfig},
    errors::{FinishError, PersistError, ReportStateError},
    reporter::{
        displayer::SummaryLine,
        events::{AuxCategory, RunFinished, StageCall, StageEvidence, StageReport},
        extensions::ExtensionRegistry,
    },
    stopwatch::{StopwatchStart, stopwatch},
};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use camino::Utf8Path;
use hw_report::{
    AuxMap, Document, LogRecord, RunReport, StageKind, Summary, TestId, WarningRecord,
    serialize_document,
};
use std::io::Write;
use tracing::debug;

/// Aggregates the events of a test run into a [`RunReport`].
///
/// The aggregator is created at the start of a run and driven by the test execution engine:
///
/// 1. [`start`](Self::start) the run.
/// 2. For each test, [`begin_test`](Self::begin_test), then for each stage capture output and
///    logs, [`collect_evidence`](Self::collect_evidence), and report the stage with
///    [`on_stage_event`](Self::on_stage_event). Release the test with
///    [`end_test`](Self::end_test).
/// 3. [`finish`](Self::finish) the run, then [`write_report`](Self::write_report) or
///    [`persist`](Self::persist) it.
///
/// If reporting is disabled in the configuration, test and stage events are ignored.
#[derive(Debug)]
pub struct ReportAggregator {
    config: ReportConfig,
    extensions: ExtensionRegistry,
    state: RunState,
    merger: TestRecordMerger,
    warnings: Vec<WarningRecord>,
}

#[derive(Debug)]
enum RunState {
    NotStarted,
    Open { stopwatch: StopwatchStart },
    Finalized(Box<FinishedReport>),
}

#[derive(Debug)]
struct FinishedReport {
    report: RunReport,
    document: Document,
}

impl ReportAggregator {
    /// Creates a new aggregator.
    pub fn new(config: ReportConfig, extensions: ExtensionRegistry) -> Self {
        Self {
            config,
            extensions,
            state: RunState::NotStarted,
            merger: TestRecordMerger::new(),
            warnings: Vec::new(),
        }
    }

    /// Returns the configuration for this aggregator.
    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Starts the run.
    pub fn start(&mut self) -> Result<(), ReportStateError> {
        match self.state {
            RunState::NotStarted => {
                self.state = RunState::Open {
                    stopwatch: stopwatch(),
                };
                Ok(())
            }
            RunState::Open { .. } => Err(ReportStateError::AlreadyStarted),
            RunState::Finalized(_) => Err(ReportStateError::AlreadyFinished),
        }
    }

    /// Creates the context for a test that is about to run.
    pub fn begin_test(&mut self, test_id: &TestId) {
        if self.config.enabled() {
            self.merger.begin_test(test_id);
        }
    }

    /// Returns the context for a running test.
    ///
    /// Returns `None` if the test hasn't begun, has already ended, or reporting is disabled.
    pub fn test_context_mut(&mut self, test_id: &str) -> Option<&mut TestContext> {
        self.merger.context_mut(test_id)
    }

    /// Stores the output captured during a stage.
    ///
    /// Ignored if streams are omitted.
    pub fn capture_output(
        &mut self,
        test_id: &str,
        stage: StageKind,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        if self.config.is_omitted(OmitField::Streams) {
            return;
        }
        if let Some(context) = self.merger.context_mut(test_id) {
            context.set_output(stage, stdout.into(), stderr.into());
        }
    }

    /// Stores log records emitted during a stage.
    ///
    /// Ignored if logs are omitted, so that logs are not captured at all.
    pub fn capture_log(
        &mut self,
        test_id: &str,
        stage: StageKind,
        records: impl IntoIterator<Item = LogRecord>,
    ) {
        if self.config.is_omitted(OmitField::Log) {
            return;
        }
        if let Some(context) = self.merger.context_mut(test_id) {
            context.extend_log(stage, records);
        }
    }

    /// Collects the evidence for a stage that just finished.
    ///
    /// Auxiliary data contributed by extensions is merged into the test's context first. A test
    /// without a context (never begun, or already ended) gets only this stage's contributions,
    /// and no context is created for it. The returned evidence is meant to be attached to the
    /// stage's [`StageReport`].
    pub fn collect_evidence(&mut self, call: &StageCall) -> StageEvidence {
        if !self.config.enabled() {
            return StageEvidence::default();
        }

        let mut evidence = match self.merger.context_mut(call.test_id.as_str()) {
            Some(context) => {
                for category in AuxCategory::ALL {
                    for contribution in self.extensions.contributions(category, call) {
                        context.aux_mut(category).extend(contribution);
                    }
                }
                context.take_evidence(call.stage)
            }
            None => {
                let mut evidence = StageEvidence::default();
                for category in AuxCategory::ALL {
                    let mut merged = AuxMap::new();
                    for contribution in self.extensions.contributions(category, call) {
                        merged.extend(contribution);
                    }
                    if !merged.is_empty() {
                        *evidence.aux_mut(category) = Some(merged);
                    }
                }
                evidence
            }
        };
        if self.config.is_omitted(OmitField::Streams) {
            evidence.stdout = None;
            evidence.stderr = None;
        }
        if self.config.is_omitted(OmitField::Log) {
            evidence.log = None;
        }
        evidence
    }

    /// Merges a stage into the record for its test.
    ///
    /// A report whose evidence was lost is merged with empty evidence.
    pub fn on_stage_event(&mut self, report: StageReport) -> Result<(), ReportStateError> {
        self.ensure_open()?;
        if !self.config.enabled() {
            return Ok(());
        }

        let empty = StageEvidence::default();
        let evidence = report.evidence.as_ref().unwrap_or_else(|| {
            debug!(
                "no evidence for {} stage of {}, using empty evidence",
                report.stage, report.test_id
            );
            &empty
        });

        let entry = shape_stage(&report, evidence, self.config.omit(), &self.extensions);
        let warnings = self.merger.on_stage_event(&report, entry, evidence);
        for warning in warnings {
            self.push_warning(warning);
        }
        Ok(())
    }

    /// Releases the context for a test.
    ///
    /// Stage events for the test can still arrive afterwards.
    pub fn end_test(&mut self, test_id: &str) {
        self.merger.end_test(test_id);
    }

    /// Records a warning issued during the run.
    ///
    /// Ignored if warnings are omitted. Fails unless the run is open.
    pub fn record_warning(&mut self, warning: WarningRecord) -> Result<(), ReportStateError> {
        self.ensure_open()?;
        self.push_warning(warning);
        Ok(())
    }

    /// Finishes the run, producing the final report.
    ///
    /// The document is passed to the `modify_report` extension point before it is retained.
    pub fn finish(&mut self, finished: RunFinished) -> Result<&Document, FinishError> {
        let snapshot = match &self.state {
            RunState::NotStarted => return Err(ReportStateError::NotStarted.into()),
            RunState::Open { stopwatch } => stopwatch.snapshot(),
            RunState::Finalized(_) => return Err(ReportStateError::AlreadyFinished.into()),
        };

        let merger = std::mem::take(&mut self.merger);
        let summary = Summary::new(merger.records(), finished.collected, finished.deselected);
        let report = RunReport {
            created: snapshot.end_time(),
            duration: snapshot.duration,
            exitcode: finished.exit_code,
            root: finished.root.into_string(),
            environment: finished.environment,
            summary,
            tests: merger.into_records(),
            warnings: std::mem::take(&mut self.warnings),
        };

        let mut document = report.to_document(self.config.summary_only())?;
        self.extensions.modify_report(&mut document);
        debug!(
            "run finished: {} tests, exit code {}",
            report.summary.total, report.exitcode
        );

        self.state = RunState::Finalized(Box::new(FinishedReport { report, document }));
        Ok(self.document()?)
    }

    /// Returns the finished report.
    ///
    /// Unlike the document, the report always includes tests and warnings, even in summary-only
    /// mode.
    pub fn report(&self) -> Result<&RunReport, ReportStateError> {
        self.finished().map(|finished| &finished.report)
    }

    /// Returns the finished document, as it is persisted.
    pub fn document(&self) -> Result<&Document, ReportStateError> {
        self.finished().map(|finished| &finished.document)
    }

    /// Saves the finished document to `path`, creating parent directories as needed.
    ///
    /// The document is written atomically: a failed write never leaves a truncated file behind.
    pub fn persist(&self, path: &Utf8Path) -> Result<(), PersistError> {
        let document = self.document().map_err(|_| PersistError::NotFinished)?;
        if path.file_name().is_none() {
            return Err(PersistError::NoFileName {
                path: path.to_owned(),
            });
        }

        if let Some(dir) = path.parent()
            && !dir.as_str().is_empty()
        {
            std::fs::create_dir_all(dir).map_err(|error| PersistError::DirCreate {
                dir: dir.to_owned(),
                error,
            })?;
        }

        let mut contents = Vec::new();
        serialize_document(document, self.config.indent(), &mut contents).map_err(|error| {
            PersistError::Serialize {
                file: path.to_owned(),
                error,
            }
        })?;

        AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
            .write(|file| file.write_all(&contents))
            .map_err(|error| PersistError::Write {
                file: path.to_owned(),
                error,
            })?;

        debug!("wrote report to {path}");
        Ok(())
    }

    /// Saves the finished document to the configured path, and returns the line to show on the
    /// terminal.
    ///
    /// Returns `None` if reporting is disabled. Failing to save is reported through the
    /// returned line rather than as an error.
    pub fn write_report(&self) -> Result<Option<SummaryLine>, ReportStateError> {
        self.finished()?;
        if !self.config.enabled() {
            return Ok(None);
        }

        let mut line = match self.config.path().as_path() {
            Some(path) => match self.persist(path) {
                Ok(()) => SummaryLine::saved(path),
                Err(error) => SummaryLine::failed(&error),
            },
            None => SummaryLine::skipped(),
        };
        line.set_configured_verbosity(self.config.verbosity());
        Ok(Some(line))
    }

    fn ensure_open(&self) -> Result<(), ReportStateError> {
        match self.state {
            RunState::NotStarted => Err(ReportStateError::NotStarted),
            RunState::Open { .. } => Ok(()),
            RunState::Finalized(_) => Err(ReportStateError::AlreadyFinished),
        }
    }

    fn finished(&self) -> Result<&FinishedReport, ReportStateError> {
        match &self.state {
            RunState::Finalized(finished) => Ok(finished),
            RunState::NotStarted | RunState::Open { .. } => Err(ReportStateError::NotFinished),
        }
    }

    fn push_warning(&mut self, warning: WarningRecord) {
        if !self.config.is_omitted(OmitField::Warnings) {
            self.warnings.push(warning);
        }
    }
}
