//! Records: one flat JSON object at a time
//!
//! A [`Record`] keeps its fields in input order so that serializing it back
//! reproduces the original layout with only the enriched fields changed.
//! [`RecordAccumulator`] rebuilds records from [`StreamParser`](crate::json::StreamParser) events.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::embed::Embedding;
use crate::json::Literal;

/// The value of a single record field.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    TextList(Vec<String>),
    /// Number, boolean or null, passed through untouched
    Literal(Literal),
    Embedding(Embedding),
    EmbeddingList(Vec<Embedding>),
}

impl FieldValue {
    /// Short description of the value's shape, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "a string",
            Self::TextList(_) => "a list of strings",
            Self::Literal(Literal::Null) => "null",
            Self::Literal(_) => "a non-string scalar",
            Self::Embedding(_) => "an embedding",
            Self::EmbeddingList(_) => "a list of embeddings",
        }
    }
}

/// An ordered mapping from field name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Appends a field. Callers are responsible for keeping names unique.
    pub fn push(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.push((name.into(), value));
    }

    /// Replaces the value of an existing field in place, keeping its position.
    ///
    /// Returns the previous value, or `None` if the field does not exist.
    pub fn replace(&mut self, name: &str, value: FieldValue) -> Option<FieldValue> {
        self.fields
            .iter_mut()
            .find(|(key, _)| key == name)
            .map(|(_, slot)| std::mem::replace(slot, value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

mod accumulator;

pub use accumulator::*;
