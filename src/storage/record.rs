//! Record codec and file framing
//!
//! The store file format is:
//!
//! ```text
//! <metadata-json> ␞ <doc1-json> ␞ <doc2-json> ... ␞ <docN-json>
//! ```
//!
//! where `␞` is U+241E SYMBOL FOR RECORD SEPARATOR. Records are compact
//! JSON text. Outside of string literals the separator is never valid
//! JSON, and inside string literals the encoder writes it as the escape
//! `\u241e`, so splitting on the raw code point always yields whole
//! records. No trailing separator is written; one is tolerated on read.

use serde_json::{json, Value};

/// A schema-less document
pub type Document = Value;

/// Record separator code point
pub const RECORD_SEPARATOR: char = '\u{241E}';

/// JSON escape written in place of a separator found inside a string
const ESCAPED_SEPARATOR: &str = "\\u241e";

/// Metadata version written into new store files
pub const DEFAULT_VERSION: &str = "0.1";

/// Builds the metadata record of a new store file.
pub fn metadata_record(version: &str) -> Value {
    json!({
        "id": 0,
        "version": version,
    })
}

/// Encodes a document as one record.
pub fn encode(document: &Value) -> Result<String, serde_json::Error> {
    let text = serde_json::to_string(document)?;
    if text.contains(RECORD_SEPARATOR) {
        return Ok(text.replace(RECORD_SEPARATOR, ESCAPED_SEPARATOR));
    }
    Ok(text)
}

/// Decodes one record.
pub fn decode(text: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(text)
}

/// Frames a whole store file: metadata, then one separator-prefixed
/// record per document, in order.
pub fn frame<'a, I>(metadata: &Value, documents: I) -> Result<String, serde_json::Error>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut out = encode(metadata)?;
    for document in documents {
        out.push(RECORD_SEPARATOR);
        out.push_str(&encode(document)?);
    }
    Ok(out)
}

/// Frames a single document for appending to an existing file.
pub fn frame_append(document: &Value) -> Result<String, serde_json::Error> {
    let encoded = encode(document)?;
    let mut out = String::with_capacity(encoded.len() + RECORD_SEPARATOR.len_utf8());
    out.push(RECORD_SEPARATOR);
    out.push_str(&encoded);
    Ok(out)
}

/// Raw records of a store file, not yet decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SplitRecords<'a> {
    /// Element 0: the metadata record
    pub metadata: &'a str,
    /// Elements 1..N: the documents, in file order
    pub documents: Vec<&'a str>,
}

/// Splits file content into records.
///
/// Returns `None` for empty content: a valid store file always holds at
/// least the metadata record. A single empty element left by a trailing
/// separator is dropped.
pub(crate) fn split_records(content: &str) -> Option<SplitRecords<'_>> {
    if content.is_empty() {
        return None;
    }

    let mut parts = content.split(RECORD_SEPARATOR);
    let metadata = parts.next()?;
    let mut documents: Vec<&str> = parts.collect();

    if documents.last().is_some_and(|last| last.is_empty()) {
        documents.pop();
    }

    Some(SplitRecords {
        metadata,
        documents,
    })
}
