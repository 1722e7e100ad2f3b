// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialize a [`Document`] as JSON.

use crate::{Document, SerializeError};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::io;

/// Returns true if `value` can be encoded as JSON.
///
/// The value is passed through the JSON encoder, discarding the output. Any encoder error, such
/// as a map with non-string keys or an [`AuxValue`](crate::AuxValue) holding bytes or an opaque
/// object, results in `false`.
pub fn is_serializable<T: Serialize + ?Sized>(value: &T) -> bool {
    serde_json::to_writer(io::sink(), value).is_ok()
}

/// Serializes a document to the given writer.
///
/// With `indent` set to `None`, the document is written on a single line. Otherwise it is
/// pretty-printed with each level indented by `indent` spaces; an indent of 0 puts each element
/// on its own line without indentation.
pub fn serialize_document(
    document: &Document,
    indent: Option<usize>,
    writer: impl io::Write,
) -> Result<(), SerializeError> {
    match indent {
        None => serde_json::to_writer(writer, document)?,
        Some(width) => {
            let indent = vec![b' '; width];
            let mut serializer =
                Serializer::with_formatter(writer, PrettyFormatter::with_indent(&indent));
            document.serialize(&mut serializer)?;
        }
    }
    Ok(())
}
