//! docvec - streaming embedding enrichment for JSON record collections
//!
//! Reads a JSON array of flat objects, replaces selected text fields with
//! embedding vectors, and writes the transformed array back out, holding
//! only one record in memory at a time.
//!
//! # Architecture
//!
//! ```text
//! bytes -> StreamParser -> RecordAccumulator -> Enricher -> ArrayWriter -> bytes
//!        (serde_json events)     (Record)          |
//!                                               Embedder
//! ```
//!
//! [`pipeline::Pipeline`] drives one file through these stages;
//! [`batch::run_batch`] applies it to a directory.
//!
//! # Example
//!
//! ```ignore
//! use docvec_lib::{embed::{ModelKind, OnnxEmbedder}, pipeline::Pipeline};
//!
//! let mut embedder = OnnxEmbedder::new(ModelKind::AllMiniLmL6V2)?;
//! let pipeline = Pipeline::new("contents".parse()?);
//!
//! let (input, output) = ("docs.json".as_ref(), "docs.vec.json".as_ref());
//! let count = pipeline.process_file(input, output, &mut embedder)?;
//! ```

pub mod batch;
pub mod embed;
pub mod enrich;
pub mod error;
pub mod json;
pub mod pipeline;
pub mod record;

pub use error::{Error, Result};
