// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::OmitFieldParseError;
use serde::{Deserialize, Deserializer, de::Error as _};
use std::{collections::BTreeSet, fmt, str::FromStr};

/// A category of evidence that can be left out of the report.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum OmitField {
    /// Captured log records. Omitting logs suppresses their capture.
    Log,

    /// Tracebacks and crash locations of failing stages.
    Traceback,

    /// Captured standard output and standard error.
    Streams,

    /// Warnings recorded during the run.
    Warnings,
}

impl OmitField {
    /// String representations of all known variants.
    pub fn variants() -> &'static [&'static str] {
        &["log", "traceback", "streams", "warnings"]
    }

    /// Returns the name of this field.
    pub fn as_str(self) -> &'static str {
        match self {
            OmitField::Log => "log",
            OmitField::Traceback => "traceback",
            OmitField::Streams => "streams",
            OmitField::Warnings => "warnings",
        }
    }
}

impl FromStr for OmitField {
    type Err = OmitFieldParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let val = match s {
            "log" => OmitField::Log,
            "traceback" => OmitField::Traceback,
            "streams" => OmitField::Streams,
            "warnings" => OmitField::Warnings,
            other => return Err(OmitFieldParseError::new(other)),
        };
        Ok(val)
    }
}

impl fmt::Display for OmitField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OmitField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// The set of evidence categories left out of the report.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct OmitSet {
    fields: BTreeSet<OmitField>,
}

impl OmitSet {
    /// Creates a new, empty `OmitSet`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `field` is omitted.
    pub fn contains(&self, field: OmitField) -> bool {
        self.fields.contains(&field)
    }

    /// Adds `field` to the set. Returns true if it wasn't already present.
    pub fn insert(&mut self, field: OmitField) -> bool {
        self.fields.insert(field)
    }

    /// Returns true if nothing is omitted.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over the omitted fields in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = OmitField> + '_ {
        self.fields.iter().copied()
    }
}

impl FromIterator<OmitField> for OmitSet {
    fn from_iter<I: IntoIterator<Item = OmitField>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl Extend<OmitField> for OmitSet {
    fn extend<I: IntoIterator<Item = OmitField>>(&mut self, iter: I) {
        self.fields.extend(iter);
    }
}
