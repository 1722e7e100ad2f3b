// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration elements for report generation.

mod omit;
mod path;

pub use omit::*;
pub use path::*;
