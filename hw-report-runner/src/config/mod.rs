// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for report generation.
//!
//! The configuration is read from the `[report]` table of a TOML file, layered on top of the
//! defaults in `default-config.toml`. See [`ReportConfig`].

mod elements;
mod imp;

pub use elements::*;
pub use imp::*;
