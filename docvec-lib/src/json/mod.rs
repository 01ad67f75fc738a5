//! Incremental JSON reading and writing
//!
//! [`StreamParser`] reads a byte stream with `serde_json` and hands
//! structural [`Event`]s to an [`EventSink`] one array element at a time.
//! [`ArrayWriter`] emits a JSON array one record at a time.

use serde::Serialize;

/// A structural event produced by [`StreamParser`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ArrayStart,
    ArrayEnd,
    ObjectStart,
    ObjectEnd,
    /// An object key
    FieldName(String),
    /// A string value, decoded
    StringValue(String),
    /// A number, boolean or null value
    Literal(Literal),
}

impl Event {
    /// Short description of the event, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ArrayStart => "an array",
            Self::ArrayEnd => "the end of an array",
            Self::ObjectStart => "an object",
            Self::ObjectEnd => "the end of an object",
            Self::FieldName(_) => "a field name",
            Self::StringValue(_) => "a string",
            Self::Literal(Literal::Null) => "null",
            Self::Literal(Literal::Bool(_)) => "a boolean",
            Self::Literal(Literal::Number(_)) => "a number",
        }
    }
}

/// A non-string JSON scalar, carried through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    /// Numbers keep their parsed representation so they round-trip exactly
    Number(serde_json::Number),
    Bool(bool),
    Null,
}

mod reader;
mod writer;

pub use reader::*;
pub use writer::*;
