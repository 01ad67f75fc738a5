//! Field enrichment
//!
//! An [`EnrichmentSpec`] names the fields to replace with embeddings and
//! whether each holds a single string or a list of strings. The [`Enricher`]
//! applies it to one record at a time.
//!
//! Field specs parse from short strings: `contents` is a scalar field,
//! `passages[]` a list field.
//!
//! ```ignore
//! let spec: EnrichmentSpec = "contents,passages[]".parse()?;
//! let mut enricher = Enricher::new(&spec, &mut embedder);
//! let record = enricher.enrich(record)?;
//! ```

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use tracing::trace;

use crate::embed::{Embedder, Embedding};
use crate::json::Literal;
use crate::record::{FieldValue, Record};
use crate::{Error, Result};

/// Whether a field holds one string or a list of strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// One string, replaced by one embedding
    Scalar,
    /// A list of strings, replaced by one embedding per element
    List,
}

impl FieldShape {
    fn expected(self) -> &'static str {
        match self {
            Self::Scalar => "a string",
            Self::List => "a list of strings",
        }
    }
}

/// A single field to enrich.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub shape: FieldShape,
}

impl FieldSpec {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape: FieldShape::Scalar,
        }
    }

    pub fn list(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape: FieldShape::List,
        }
    }
}

impl FromStr for FieldSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let spec = match s.strip_suffix("[]") {
            Some(name) => Self::list(name.trim()),
            None => Self::scalar(s),
        };
        if spec.name.is_empty() {
            return Err(Error::InvalidInput(format!("empty field name in `{s}`")));
        }
        Ok(spec)
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shape {
            FieldShape::Scalar => write!(f, "{}", self.name),
            FieldShape::List => write!(f, "{}[]", self.name),
        }
    }
}

/// The set of fields in each record that are replaced by embeddings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentSpec {
    fields: Vec<FieldSpec>,
}

impl EnrichmentSpec {
    /// Builds a spec, rejecting empty sets and repeated field names.
    pub fn new(fields: impl IntoIterator<Item = FieldSpec>) -> Result<Self> {
        let fields: Vec<FieldSpec> = fields.into_iter().collect();
        if fields.is_empty() {
            return Err(Error::InvalidInput(
                "at least one field must be enriched".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "field `{}` listed more than once",
                    field.name
                )));
            }
        }
        Ok(Self { fields })
    }

    /// Parses each string with [`FieldSpec::from_str`].
    pub fn parse<S: AsRef<str>>(specs: impl IntoIterator<Item = S>) -> Result<Self> {
        let fields = specs
            .into_iter()
            .map(|s| s.as_ref().parse())
            .collect::<Result<Vec<FieldSpec>>>()?;
        Self::new(fields)
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }
}

impl FromStr for EnrichmentSpec {
    type Err = Error;

    /// Comma-separated field specs, e.g. `contents,passages[]`.
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s.split(','))
    }
}

impl fmt::Display for EnrichmentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{field}")?;
        }
        Ok(())
    }
}

/// Replaces the fields named by an [`EnrichmentSpec`] with embeddings.
///
/// All embeddings for a record are computed before any field is replaced,
/// so a record either comes back fully enriched or not at all.
pub struct Enricher<'a, E: Embedder + ?Sized> {
    spec: &'a EnrichmentSpec,
    embedder: &'a mut E,
    calls: usize,
}

impl<'a, E: Embedder + ?Sized> Enricher<'a, E> {
    pub fn new(spec: &'a EnrichmentSpec, embedder: &'a mut E) -> Self {
        Self {
            spec,
            embedder,
            calls: 0,
        }
    }

    /// Number of texts sent to the embedder so far.
    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn enrich(&mut self, mut record: Record) -> Result<Record> {
        let spec = self.spec;
        let mut replacements = Vec::with_capacity(spec.fields().len());

        for field in spec.fields() {
            let name = field.name.as_str();
            let value = match (field.shape, record.get(name)) {
                (_, None) => return Err(Error::unsupported(name, "field is missing")),
                (_, Some(FieldValue::Literal(Literal::Null))) => {
                    return Err(Error::unsupported(name, "field is null"))
                }
                (FieldShape::Scalar, Some(FieldValue::Text(text))) => {
                    FieldValue::Embedding(self.embed_one(name, text)?)
                }
                (FieldShape::List, Some(FieldValue::TextList(items))) => {
                    FieldValue::EmbeddingList(self.embed_many(name, items)?)
                }
                (shape, Some(other)) => {
                    return Err(Error::unsupported(
                        name,
                        format!("expected {}, found {}", shape.expected(), other.kind()),
                    ))
                }
            };
            replacements.push((name, value));
        }

        for (name, value) in replacements {
            record.replace(name, value);
        }
        Ok(record)
    }

    fn embed_one(&mut self, field: &str, text: &str) -> Result<Embedding> {
        self.calls += 1;
        let embedding = self
            .embedder
            .embed(text)
            .map_err(|e| enrichment_error(field, e))?;
        self.check_embedding(field, &embedding)?;
        trace!(field, chars = text.len(), "embedded scalar field");
        Ok(embedding)
    }

    fn embed_many(&mut self, field: &str, items: &[String]) -> Result<Vec<Embedding>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        self.calls += items.len();
        let texts: Vec<&str> = items.iter().map(String::as_str).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .map_err(|e| enrichment_error(field, e))?;
        if embeddings.len() != items.len() {
            return Err(Error::Enrichment {
                field: field.to_string(),
                reason: format!(
                    "provider returned {} embeddings for {} texts",
                    embeddings.len(),
                    items.len()
                ),
            });
        }
        for embedding in &embeddings {
            self.check_embedding(field, embedding)?;
        }
        trace!(field, items = items.len(), "embedded list field");
        Ok(embeddings)
    }

    /// Vectors must match the provider's dimension and serialize as numbers.
    fn check_embedding(&self, field: &str, embedding: &Embedding) -> Result<()> {
        let expected = self.embedder.dimension();
        if embedding.len() != expected {
            return Err(Error::Enrichment {
                field: field.to_string(),
                reason: format!(
                    "embedding has {} dimensions, expected {expected}",
                    embedding.len()
                ),
            });
        }
        if let Some(index) = embedding.iter().position(|v| !v.is_finite()) {
            return Err(Error::Enrichment {
                field: field.to_string(),
                reason: format!("embedding value {index} is {}", embedding[index]),
            });
        }
        Ok(())
    }
}

fn enrichment_error(field: &str, err: Error) -> Error {
    Error::Enrichment {
        field: field.to_string(),
        reason: err.to_string(),
    }
}
