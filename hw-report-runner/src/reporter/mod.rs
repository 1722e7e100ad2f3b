// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregate test events into a report, and display the outcome.
//!
//! The main type here is [`ReportAggregator`], which is driven by the test execution engine and
//! extended through [`ReportExtension`].

mod aggregator;
mod displayer;
mod events;
mod extensions;

pub use aggregator::*;
pub use displayer::*;
pub use events::*;
pub use extensions::*;
