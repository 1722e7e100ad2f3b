// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{OmitField, OmitSet, ReportPath};
use crate::errors::{ConfigParseError, ConfigParseErrorKind};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::warn;

/// Trait for handling configuration warnings.
///
/// This trait allows for different warning handling strategies, such as logging warnings
/// (the default behavior) or collecting them for testing purposes.
pub trait ConfigWarnings {
    /// Handle unknown configuration keys found in a config file.
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>);
}

/// Default implementation of ConfigWarnings that logs warnings using the tracing crate.
pub struct DefaultConfigWarnings;

impl ConfigWarnings for DefaultConfigWarnings {
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>) {
        let mut unknown_str = String::new();
        if unknown.len() == 1 {
            // Print this on the same line.
            unknown_str.push_str("key: ");
            unknown_str.extend(unknown.iter().map(String::as_str));
        } else {
            unknown_str.push_str("keys:\n");
            for ignored_key in unknown {
                unknown_str.push('\n');
                unknown_str.push_str("  - ");
                unknown_str.push_str(ignored_key);
            }
        }

        warn!("in config file {config_file}, ignoring unknown configuration {unknown_str}");
    }
}

/// Configuration for report generation.
///
/// Read from the `[report]` table of a TOML file, layered over built-in defaults. Every value can
/// also be overridden programmatically, which is how command-line options are applied.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReportConfig {
    enabled: bool,
    path: ReportPath,
    omit: OmitSet,
    summary_only: bool,
    indent: Option<usize>,
    verbosity: Option<i32>,
}

impl ReportConfig {
    /// The default configuration.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// The path a report is saved to if no other path is configured.
    pub const DEFAULT_PATH: &'static str = ".report.json";

    /// Reads the report configuration, layering `config_file` (if any) over the defaults.
    ///
    /// Unknown keys are logged as warnings.
    pub fn from_sources(config_file: Option<&Utf8Path>) -> Result<Self, ConfigParseError> {
        Self::from_sources_with_warnings(config_file, &mut DefaultConfigWarnings)
    }

    /// Reads the report configuration, reporting unknown keys to `warnings`.
    pub fn from_sources_with_warnings(
        config_file: Option<&Utf8Path>,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Self, ConfigParseError> {
        let mut builder = Self::make_default_config();
        if let Some(config_file) = config_file {
            builder = builder.add_source(File::new(config_file.as_str(), FileFormat::Toml));
        }

        let (config, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(config_file.map(Utf8PathBuf::from), kind))?;

        if let Some(config_file) = config_file
            && !unknown.is_empty()
        {
            warnings.unknown_config_keys(config_file, &unknown);
        }

        Ok(config.report.into_config())
    }

    /// Returns true if report generation is enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns where the report is saved.
    pub fn path(&self) -> &ReportPath {
        &self.path
    }

    /// Returns the set of evidence categories left out of the report.
    pub fn omit(&self) -> &OmitSet {
        &self.omit
    }

    /// Returns true if `field` is left out of the report.
    pub fn is_omitted(&self, field: OmitField) -> bool {
        self.omit.contains(field)
    }

    /// Returns true if only the summary is emitted.
    pub fn summary_only(&self) -> bool {
        self.summary_only
    }

    /// Returns the indentation width for the persisted document, or `None` for a single line.
    pub fn indent(&self) -> Option<usize> {
        self.indent
    }

    /// Returns the verbosity the terminal summary line is checked against, if configured.
    pub fn verbosity(&self) -> Option<i32> {
        self.verbosity
    }

    /// Enables or disables report generation.
    pub fn set_enabled(&mut self, enabled: bool) -> &mut Self {
        self.enabled = enabled;
        self
    }

    /// Sets where the report is saved.
    pub fn set_path(&mut self, path: ReportPath) -> &mut Self {
        self.path = path;
        self
    }

    /// Leaves `field` out of the report.
    pub fn add_omit(&mut self, field: OmitField) -> &mut Self {
        self.omit.insert(field);
        self
    }

    /// Sets summary-only mode.
    pub fn set_summary_only(&mut self, summary_only: bool) -> &mut Self {
        self.summary_only = summary_only;
        self
    }

    /// Sets the indentation width.
    pub fn set_indent(&mut self, indent: Option<usize>) -> &mut Self {
        self.indent = indent;
        self
    }

    /// Sets the verbosity the terminal summary line is checked against.
    pub fn set_verbosity(&mut self, verbosity: Option<i32>) -> &mut Self {
        self.verbosity = verbosity;
        self
    }

    /// Applies the traceback display style chosen for the terminal.
    ///
    /// With the style `no`, tracebacks are left out of the report as well.
    pub fn apply_traceback_style(&mut self, style: &str) -> &mut Self {
        if style == "no" {
            self.omit.insert(OmitField::Traceback);
        }
        self
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(ReportConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: ReportConfigDeserialize = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| {
                // serde_path_to_error already tracks the key, so drop it from the config error.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: ReportPath::Save(Self::DEFAULT_PATH.into()),
            omit: OmitSet::new(),
            summary_only: false,
            indent: None,
            verbosity: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReportConfigDeserialize {
    report: ReportTableDeserialize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ReportTableDeserialize {
    enabled: bool,
    path: ReportPath,
    #[serde(default)]
    omit: OmitSet,
    summary_only: bool,
    #[serde(default)]
    indent: Option<usize>,
    #[serde(default)]
    verbosity: Option<i32>,
}

impl ReportTableDeserialize {
    fn into_config(self) -> ReportConfig {
        ReportConfig {
            enabled: self.enabled,
            path: self.path,
            omit: self.omit,
            summary_only: self.summary_only,
            indent: self.indent,
            verbosity: self.verbosity,
        }
    }
}
