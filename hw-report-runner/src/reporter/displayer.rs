// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The line printed to the terminal at the end of a run.

use crate::errors::{DisplayErrorChain, PersistError};
use camino::Utf8Path;
use owo_colors::{OwoColorize, Style};
use std::io::{self, Write};
use swrite::{SWrite, swrite};

const SEPARATOR_WIDTH: usize = 80;
const SEPARATOR_TITLE: &str = "JSON report";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SummaryLineKind {
    Saved,
    Failed,
    Skipped,
}

/// The outcome of saving the report, as shown on the terminal.
#[derive(Clone, Debug)]
pub struct SummaryLine {
    kind: SummaryLineKind,
    message: String,
    min_verbosity: i32,
    configured_verbosity: Option<i32>,
    styles: Styles,
}

impl SummaryLine {
    /// The report was saved to `path`.
    pub fn saved(path: &Utf8Path) -> Self {
        Self::new(SummaryLineKind::Saved, format!("report saved to: {path}"), 0)
    }

    /// The report could not be saved.
    ///
    /// Failing to save the report never changes the exit code of the run.
    pub fn failed(error: &PersistError) -> Self {
        Self::new(
            SummaryLineKind::Failed,
            format!("could not save report: {}", DisplayErrorChain::new(error)),
            0,
        )
    }

    /// No path was configured, so the report wasn't saved.
    pub fn skipped() -> Self {
        Self::new(
            SummaryLineKind::Skipped,
            "report auto-save skipped".to_owned(),
            1,
        )
    }

    fn new(kind: SummaryLineKind, message: String, min_verbosity: i32) -> Self {
        Self {
            kind,
            message,
            min_verbosity,
            configured_verbosity: None,
            styles: Styles::default(),
        }
    }

    /// Returns the message, without styling.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the minimum verbosity at which the line is shown.
    pub fn min_verbosity(&self) -> i32 {
        self.min_verbosity
    }

    /// Sets the verbosity to check against, overriding the terminal verbosity.
    pub fn set_configured_verbosity(&mut self, verbosity: Option<i32>) -> &mut Self {
        self.configured_verbosity = verbosity;
        self
    }

    /// Colorizes the output.
    pub fn colorize(&mut self) -> &mut Self {
        self.styles.colorize();
        self
    }

    /// Returns true if the line is shown at the given terminal verbosity.
    ///
    /// A configured verbosity, if any, takes precedence over the terminal verbosity.
    pub fn should_write(&self, terminal_verbosity: i32) -> bool {
        self.min_verbosity <= self.configured_verbosity.unwrap_or(terminal_verbosity)
    }

    /// Writes a separator and the message to `writer`, if the line is shown at the given
    /// terminal verbosity.
    pub fn write_to(&self, terminal_verbosity: i32, mut writer: impl Write) -> io::Result<()> {
        if !self.should_write(terminal_verbosity) {
            return Ok(());
        }

        writeln!(writer, "{}", separator(SEPARATOR_TITLE).style(self.styles.separator))?;
        let style = match self.kind {
            SummaryLineKind::Saved => self.styles.saved,
            SummaryLineKind::Failed => self.styles.failed,
            SummaryLineKind::Skipped => self.styles.skipped,
        };
        writeln!(writer, "{}", self.message.style(style))
    }
}

fn separator(title: &str) -> String {
    let fill = SEPARATOR_WIDTH.saturating_sub(title.len() + 2);
    let left = fill / 2;
    let mut line = "-".repeat(left);
    swrite!(line, " {title} {}", "-".repeat(fill - left));
    line
}

#[derive(Clone, Debug, Default)]
struct Styles {
    separator: Style,
    saved: Style,
    failed: Style,
    skipped: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.separator = Style::new().bold();
        self.saved = Style::new().green();
        self.failed = Style::new().red().bold();
        self.skipped = Style::new().yellow();
    }
}
