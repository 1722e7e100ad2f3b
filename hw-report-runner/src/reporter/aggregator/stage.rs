// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builds the record for a single stage.

use crate::{
    config::{OmitField, OmitSet},
    reporter::{
        events::{StageEvidence, StageReport},
        extensions::ExtensionRegistry,
    },
};
use hw_report::{StageEntry, StageRecord};

/// Returns the entry for a stage: the first shape supplied by an extension, or the standard
/// record otherwise.
pub(crate) fn shape_stage(
    report: &StageReport,
    evidence: &StageEvidence,
    omit: &OmitSet,
    extensions: &ExtensionRegistry,
) -> StageEntry {
    match extensions.shape_stage_record(report, evidence) {
        Some(custom) => StageEntry::Custom(custom),
        None => StageEntry::Standard(build_stage_record(report, evidence, omit)),
    }
}

/// Builds the standard record for a stage.
pub(crate) fn build_stage_record(
    report: &StageReport,
    evidence: &StageEvidence,
    omit: &OmitSet,
) -> StageRecord {
    let mut record = StageRecord::new(report.outcome, report.duration);

    if !omit.contains(OmitField::Streams) {
        record.stdout = non_empty(evidence.stdout.as_deref());
        record.stderr = non_empty(evidence.stderr.as_deref());
    }

    if !omit.contains(OmitField::Log) {
        record.log = evidence.log.clone();
    }

    if let Some(failure) = &report.failure {
        if omit.contains(OmitField::Traceback) {
            // The key is kept, with the text left out.
            record.longrepr = Some(String::new());
        } else {
            record.crash = failure.crash.clone();
            record.traceback = failure.traceback.clone();
            record.longrepr = Some(failure.longrepr.clone());
        }
    }

    record
}

fn non_empty(text: Option<&str>) -> Option<String> {
    text.filter(|text| !text.is_empty()).map(str::to_owned)
}
