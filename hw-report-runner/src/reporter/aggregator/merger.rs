// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Merges stage events into one record per test.

use crate::reporter::events::{AuxCategory, StageEvidence, StageReport};
use hw_report::{
    AuxMap, LogRecord, StageEntry, StageKind, TestId, TestOutcome, TestRecord, WarningRecord,
    is_serializable,
};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// The category of warnings produced by the aggregator.
pub const REPORT_WARNING_CATEGORY: &str = "ReportWarning";

/// Scratch state for a single test while it runs.
///
/// Fixtures seed auxiliary data through [`metadata_mut`](Self::metadata_mut) and friends, and
/// the engine captures output and logs for each stage. The context is released when the test
/// ends.
#[derive(Clone, Debug)]
pub struct TestContext {
    test_id: TestId,
    metadata: AuxMap,
    dut: AuxMap,
    equipment: AuxMap,
    captured: BTreeMap<StageKind, CapturedStage>,
}

#[derive(Clone, Debug, Default)]
struct CapturedStage {
    stdout: Option<String>,
    stderr: Option<String>,
    log: Option<Vec<LogRecord>>,
}

impl TestContext {
    fn new(test_id: TestId) -> Self {
        Self {
            test_id,
            metadata: AuxMap::new(),
            dut: AuxMap::new(),
            equipment: AuxMap::new(),
            captured: BTreeMap::new(),
        }
    }

    /// Returns the test this context belongs to.
    pub fn test_id(&self) -> &TestId {
        &self.test_id
    }

    /// Returns the metadata attached to the test so far.
    pub fn metadata_mut(&mut self) -> &mut AuxMap {
        &mut self.metadata
    }

    /// Returns the device-under-test data attached to the test so far.
    pub fn dut_mut(&mut self) -> &mut AuxMap {
        &mut self.dut
    }

    /// Returns the equipment data attached to the test so far.
    pub fn equipment_mut(&mut self) -> &mut AuxMap {
        &mut self.equipment
    }

    /// Returns the auxiliary map for `category`.
    pub fn aux_mut(&mut self, category: AuxCategory) -> &mut AuxMap {
        match category {
            AuxCategory::Metadata => &mut self.metadata,
            AuxCategory::Dut => &mut self.dut,
            AuxCategory::Equipment => &mut self.equipment,
        }
    }

    pub(crate) fn set_output(&mut self, stage: StageKind, stdout: String, stderr: String) {
        let captured = self.captured.entry(stage).or_default();
        captured.stdout = Some(stdout);
        captured.stderr = Some(stderr);
    }

    pub(crate) fn extend_log(
        &mut self,
        stage: StageKind,
        records: impl IntoIterator<Item = LogRecord>,
    ) {
        self.captured
            .entry(stage)
            .or_default()
            .log
            .get_or_insert_with(Vec::new)
            .extend(records);
    }

    /// Takes the evidence captured for `stage`, along with a snapshot of the auxiliary data.
    pub(crate) fn take_evidence(&mut self, stage: StageKind) -> StageEvidence {
        let captured = self.captured.remove(&stage).unwrap_or_default();
        let mut evidence = StageEvidence {
            stdout: captured.stdout,
            stderr: captured.stderr,
            log: captured.log,
            ..Default::default()
        };
        for category in AuxCategory::ALL {
            let map = self.aux_mut(category);
            if !map.is_empty() {
                *evidence.aux_mut(category) = Some(map.clone());
            }
        }
        evidence
    }
}

/// Owns one record per test, in the order tests were first seen.
#[derive(Debug, Default)]
pub(crate) struct TestRecordMerger {
    records: IndexMap<TestId, TestRecord>,
    contexts: HashMap<TestId, TestContext>,
    // Categories that failed validation stay dropped until the test ends.
    dropped: HashSet<(TestId, AuxCategory)>,
}

impl TestRecordMerger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn begin_test(&mut self, test_id: &TestId) -> &mut TestContext {
        self.contexts
            .entry(test_id.clone())
            .or_insert_with(|| TestContext::new(test_id.clone()))
    }

    pub(crate) fn context_mut(&mut self, test_id: &str) -> Option<&mut TestContext> {
        self.contexts.get_mut(test_id)
    }

    pub(crate) fn end_test(&mut self, test_id: &str) -> Option<TestContext> {
        self.dropped.retain(|(id, _)| id.as_str() != test_id);
        self.contexts.remove(test_id)
    }

    /// Merges one stage event into the record for its test, creating the record if necessary.
    ///
    /// Returns the warnings produced while validating auxiliary data.
    pub(crate) fn on_stage_event(
        &mut self,
        report: &StageReport,
        entry: StageEntry,
        evidence: &StageEvidence,
    ) -> Vec<WarningRecord> {
        let test_id = &report.test_id;
        let record = self
            .records
            .entry(test_id.clone())
            .or_insert_with(|| TestRecord::new(test_id.clone()));
        let mut warnings = Vec::new();

        for category in AuxCategory::ALL {
            let Some(contribution) = evidence.aux(category).filter(|map| !map.is_empty()) else {
                continue;
            };
            if self.dropped.contains(&(test_id.clone(), category)) {
                continue;
            }

            let slot = aux_slot(record, category);
            match to_json_map(contribution) {
                Some(map) => slot.get_or_insert_with(Map::new).extend(map),
                None => {
                    *slot = None;
                    self.dropped.insert((test_id.clone(), category));
                    warnings.push(unserializable_warning(
                        format!("{category} of {test_id} is not JSON-serializable."),
                        line!(),
                    ));
                }
            }
        }

        if report.stage == StageKind::Teardown && !report.user_properties.is_empty() {
            let properties: Vec<AuxMap> = report
                .user_properties
                .iter()
                .map(|(key, value)| AuxMap::from_iter([(key.clone(), value.clone())]))
                .collect();
            match to_json_list(&properties) {
                Some(properties) => record.user_properties = Some(properties),
                None => warnings.push(unserializable_warning(
                    format!("User properties of {test_id} are not JSON-serializable."),
                    line!(),
                )),
            }
        }

        debug!(
            "recorded {} stage of {test_id} (outcome: {})",
            report.stage, report.outcome
        );
        record.stages.insert(report.stage, entry);
        Self::finalize_outcome(record, report.test_outcome);

        warnings
    }

    /// Stores the engine's total outcome for a test, unless it passed.
    ///
    /// A passing stage never clears an outcome stored by an earlier stage.
    fn finalize_outcome(record: &mut TestRecord, outcome: TestOutcome) {
        if outcome != TestOutcome::Passed {
            record.outcome = Some(outcome);
        }
    }

    pub(crate) fn records(&self) -> impl ExactSizeIterator<Item = &TestRecord> {
        self.records.values()
    }

    pub(crate) fn into_records(self) -> Vec<TestRecord> {
        self.records.into_values().collect()
    }
}

fn aux_slot(record: &mut TestRecord, category: AuxCategory) -> &mut Option<Map<String, Value>> {
    match category {
        AuxCategory::Metadata => &mut record.metadata,
        AuxCategory::Dut => &mut record.dut,
        AuxCategory::Equipment => &mut record.equipment,
    }
}

fn to_json_map(map: &AuxMap) -> Option<Map<String, Value>> {
    match to_json(map)? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn to_json_list(properties: &[AuxMap]) -> Option<Vec<Map<String, Value>>> {
    match to_json(properties)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Option<Value> {
    if !is_serializable(value) {
        return None;
    }
    serde_json::to_value(value).ok()
}

fn unserializable_warning(message: String, lineno: u32) -> WarningRecord {
    warn!("{message}");
    WarningRecord {
        category: REPORT_WARNING_CATEGORY.to_owned(),
        filename: file!().to_owned(),
        lineno,
        message,
        when: "runtest".to_owned(),
    }
}
