// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregates stage events into a run report.

mod imp;
mod merger;
mod stage;

pub use imp::*;
pub use merger::{REPORT_WARNING_CATEGORY, TestContext};
