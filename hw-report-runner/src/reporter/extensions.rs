// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extension points for external code to contribute to a report.

use super::events::{AuxCategory, StageCall, StageEvidence, StageReport};
use debug_ignore::DebugIgnore;
use hw_report::{AuxMap, Document};
use serde_json::{Map, Value};

/// Code that contributes to or reshapes a report.
///
/// Every method has a default implementation that contributes nothing, so implementors only
/// override the extension points they need. Extensions are called in the order they were
/// registered with an [`ExtensionRegistry`].
pub trait ReportExtension {
    /// Returns a record that replaces the standard record for a stage.
    ///
    /// The first extension to return `Some` wins. Later extensions aren't consulted for that
    /// stage, and the standard record isn't built.
    fn shape_stage_record(
        &self,
        report: &StageReport,
        evidence: &StageEvidence,
    ) -> Option<Map<String, Value>> {
        let _ = (report, evidence);
        None
    }

    /// Returns metadata to attach to the test.
    ///
    /// Contributions from all extensions are shallow-merged, with later keys overwriting
    /// earlier ones.
    fn contribute_metadata(&self, call: &StageCall) -> Option<AuxMap> {
        let _ = call;
        None
    }

    /// Returns data describing the device under test. Merged like
    /// [`contribute_metadata`](Self::contribute_metadata).
    fn contribute_dut(&self, call: &StageCall) -> Option<AuxMap> {
        let _ = call;
        None
    }

    /// Returns data describing the test equipment. Merged like
    /// [`contribute_metadata`](Self::contribute_metadata).
    fn contribute_equipment(&self, call: &StageCall) -> Option<AuxMap> {
        let _ = call;
        None
    }

    /// Edits the finished document before it is retained and persisted.
    ///
    /// The document isn't validated again afterwards, so any edit is allowed, including
    /// removing fields that are otherwise always present.
    fn modify_report(&self, document: &mut Document) {
        let _ = document;
    }
}

/// An ordered list of [`ReportExtension`]s.
#[derive(Debug, Default)]
pub struct ExtensionRegistry {
    extensions: DebugIgnore<Vec<Box<dyn ReportExtension>>>,
}

impl ExtensionRegistry {
    /// Creates a new, empty `ExtensionRegistry`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an extension. It is called after all previously registered extensions.
    pub fn register(&mut self, extension: impl ReportExtension + 'static) -> &mut Self {
        self.extensions.push(Box::new(extension));
        self
    }

    /// Returns the number of registered extensions.
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Returns true if no extensions are registered.
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub(crate) fn shape_stage_record(
        &self,
        report: &StageReport,
        evidence: &StageEvidence,
    ) -> Option<Map<String, Value>> {
        self.extensions
            .iter()
            .find_map(|extension| extension.shape_stage_record(report, evidence))
    }

    /// Returns the non-empty contributions to `category`, in registration order.
    pub(crate) fn contributions<'a>(
        &'a self,
        category: AuxCategory,
        call: &'a StageCall,
    ) -> impl Iterator<Item = AuxMap> + 'a {
        self.extensions
            .iter()
            .filter_map(move |extension| match category {
                AuxCategory::Metadata => extension.contribute_metadata(call),
                AuxCategory::Dut => extension.contribute_dut(call),
                AuxCategory::Equipment => extension.contribute_equipment(call),
            })
            .filter(|contribution| !contribution.is_empty())
    }

    pub(crate) fn modify_report(&self, document: &mut Document) {
        for extension in self.extensions.iter() {
            extension.modify_report(document);
        }
    }
}
