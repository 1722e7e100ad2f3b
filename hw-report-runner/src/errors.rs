// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by hw-report-runner.

use crate::config::OmitField;
use camino::Utf8PathBuf;
use config::ConfigError;
use std::{error, fmt};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error(
    "failed to parse report config{}",
    .config_file.as_ref().map_or_else(String::new, |file| format!(" at `{file}`"))
)]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Option<Utf8PathBuf>,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: Option<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self { config_file, kind }
    }

    /// Returns the config file for this error, or `None` if only the default config was used.
    pub fn config_file(&self) -> Option<&Utf8PathBuf> {
        self.config_file.as_ref()
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing the config.
///
/// Returned by [`ConfigParseError::kind`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// Error returned while parsing an [`OmitField`] value from a string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized field to omit: {input}\n(known values: {})",
    OmitField::variants().join(", "),
)]
pub struct OmitFieldParseError {
    input: String,
}

impl OmitFieldParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An operation was called at the wrong point in the lifecycle of a run.
///
/// These errors indicate misuse by the embedding caller.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum ReportStateError {
    /// The run has not been started yet.
    #[error("the run has not been started")]
    NotStarted,

    /// The run was already started.
    #[error("the run has already been started")]
    AlreadyStarted,

    /// The run has not finished, so no report is available.
    #[error("no report available: the run has not finished")]
    NotFinished,

    /// The run has already finished, and the report can no longer be changed.
    #[error("the run has already finished")]
    AlreadyFinished,
}

/// An error that occurred while finishing a run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FinishError {
    /// The run was not open.
    #[error(transparent)]
    State(#[from] ReportStateError),

    /// The report could not be converted into a document.
    #[error("error building report document")]
    Serialize(#[from] hw_report::SerializeError),
}

/// An error that occurred while persisting the report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PersistError {
    /// The run has not finished, so there is no report to persist.
    #[error("no report available: the run has not finished")]
    NotFinished,

    /// The report path doesn't name a file, for example `/` or a path ending in `..`.
    #[error("report path `{path}` does not name a file")]
    NoFileName {
        /// The report path.
        path: Utf8PathBuf,
    },

    /// An error occurred while creating the directory the report goes in.
    #[error("error creating directory `{dir}`")]
    DirCreate {
        /// The directory being created.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// An error occurred while serializing the report.
    #[error("error serializing report for `{file}`")]
    Serialize {
        /// The report file.
        file: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: hw_report::SerializeError,
    },

    /// An error occurred while writing the report.
    #[error("error writing report to `{file}`")]
    Write {
        /// The report file.
        file: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: atomicwrites::Error<std::io::Error>,
    },
}

/// Displays an error along with its chain of sources on a single line.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();
        while let Some(error) = source {
            write!(f, ": {error}")?;
            source = error.source();
        }
        Ok(())
    }
}
