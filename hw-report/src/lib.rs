// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Data model and JSON serializer for hardware test run reports.
//!
//! A [`RunReport`] describes the outcome of a whole test run: one [`TestRecord`] per test item,
//! with up to three stage records (setup, call and teardown), auxiliary maps attached by
//! fixtures and extensions, warnings, and summary counters.
//!
//! Auxiliary data is modeled as [`AuxValue`], which can hold values that are not encodable as
//! JSON. Use [`is_serializable`] to check a value before attaching it to a report.

mod errors;
mod report;
mod serialize;
mod value;

pub use errors::*;
pub use report::*;
pub use serialize::*;
pub use value::*;
