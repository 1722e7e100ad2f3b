// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

/// An error that occurs while serializing a [`RunReport`](crate::RunReport).
///
/// Returned by [`RunReport::to_document`](crate::RunReport::to_document) and
/// [`serialize_document`](crate::serialize_document).
#[derive(Debug, Error)]
#[error("error serializing JSON report")]
pub struct SerializeError {
    #[from]
    inner: serde_json::Error,
}
