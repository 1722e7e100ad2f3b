// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Aggregates test lifecycle events into a hardware test run report.
//!
//! A test execution engine drives a [`ReportAggregator`](reporter::ReportAggregator) through a
//! run: it starts the run, reports each stage (setup, call and teardown) of each test along with
//! the evidence captured for that stage, and finishes the run with the final counts. The
//! aggregator merges stage records and auxiliary data into one record per test, drops auxiliary
//! data that cannot be encoded as JSON, and produces a [`hw_report::RunReport`] that can be
//! persisted to disk.
//!
//! External code can shape stage records, contribute auxiliary data and edit the finished
//! document by implementing [`ReportExtension`](reporter::ReportExtension).

pub mod config;
pub mod errors;
pub mod reporter;
mod stopwatch;
