// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Deserializer};
use std::env;

/// Where the report is saved at the end of a run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReportPath {
    /// Save the report to this path.
    Save(Utf8PathBuf),

    /// Keep the report in memory only.
    DoNotSave,
}

impl ReportPath {
    /// Parses a report path as written in configuration.
    ///
    /// An empty string, or the string "none" in any case, means the report is not saved.
    /// Otherwise environment variables and a leading `~` are expanded.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            ReportPath::DoNotSave
        } else {
            ReportPath::Save(expand_path(input))
        }
    }

    /// Returns the path to save the report to, if any.
    pub fn as_path(&self) -> Option<&Utf8Path> {
        match self {
            ReportPath::Save(path) => Some(path),
            ReportPath::DoNotSave => None,
        }
    }
}

impl<'de> Deserialize<'de> for ReportPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ReportPath::parse(&s))
    }
}

/// Expands environment variables and a leading `~` in `input`.
pub(crate) fn expand_path(input: &str) -> Utf8PathBuf {
    let expanded = expand_vars(input, |name| env::var(name).ok());
    expand_home(&expanded, || {
        home::home_dir().and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok())
    })
}

/// Expands `$NAME` and `${NAME}` references. References to unset variables are left as-is.
fn expand_vars(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(dollar) = rest.find('$') {
        out.push_str(&rest[..dollar]);
        let after = &rest[dollar + 1..];

        let (name, reference_len) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        match (name.is_empty(), lookup(name)) {
            (false, Some(value)) => out.push_str(&value),
            _ => out.push_str(&rest[dollar..dollar + 1 + reference_len]),
        }
        rest = &after[reference_len..];
    }

    out.push_str(rest);
    out
}

fn expand_home(input: &str, home_dir: impl FnOnce() -> Option<Utf8PathBuf>) -> Utf8PathBuf {
    let rest = match input.strip_prefix('~') {
        Some("") => "",
        Some(rest) if rest.starts_with(['/', '\\']) => &rest[1..],
        _ => return input.into(),
    };
    match home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => input.into(),
    }
}
