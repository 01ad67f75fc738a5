//! Text embedding using local models
//!
//! The pipeline treats the model as a black box: a string goes in, a
//! fixed-length vector comes out. [`OnnxEmbedder`] runs sentence-transformer
//! models through the fastembed crate (ONNX runtime).
//!
//! # Models
//!
//! | Kind              | Dimensions |
//! |-------------------|------------|
//! | all-MiniLM-L6-v2  | 384        |
//! | bge-small-en-v1.5 | 384        |
//! | bge-large-en-v1.5 | 1024       |
//!
//! # Usage
//!
//! ```ignore
//! use docvec_lib::embed::{Embedder, ModelKind, OnnxEmbedder};
//!
//! let mut embedder = OnnxEmbedder::new(ModelKind::AllMiniLmL6V2)?;
//! let vector = embedder.embed("hello")?;
//! assert_eq!(vector.len(), embedder.dimension());
//! ```

use crate::Result;

/// A vector embedding - fixed size array of floats
pub type Embedding = Vec<f32>;

/// Trait for text embedding models
///
/// Instances are expensive to build and cheap to call, so one is constructed
/// per process (or per worker) and lent to every file it processes.
pub trait Embedder: Send + Sync {
    /// Embed a single text
    fn embed(&mut self, text: &str) -> Result<Embedding>;

    /// Embed several texts, returning one embedding per input in order
    ///
    /// Models that can batch should override this.
    fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<Embedding>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Returns the embedding dimension
    fn dimension(&self) -> usize;

    /// Returns the model name/identifier
    fn model_name(&self) -> &str;
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn embed(&mut self, text: &str) -> Result<Embedding> {
        (**self).embed(text)
    }

    fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<Embedding>> {
        (**self).embed_batch(texts)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

mod onnx;
pub use onnx::*;

#[cfg(test)]
pub(crate) mod testing {
    use super::{Embedder, Embedding};
    use crate::{Error, Result};

    /// Deterministic embedder: `[byte length, byte sum, first byte]`.
    pub struct StubEmbedder {
        pub calls: usize,
        pub fail_on: Option<String>,
    }

    impl StubEmbedder {
        pub fn new() -> Self {
            Self {
                calls: 0,
                fail_on: None,
            }
        }

        pub fn failing_on(text: &str) -> Self {
            Self {
                calls: 0,
                fail_on: Some(text.to_string()),
            }
        }

        pub fn vector(text: &str) -> Embedding {
            let bytes = text.as_bytes();
            vec![
                bytes.len() as f32,
                bytes.iter().map(|b| f32::from(*b)).sum(),
                bytes.first().map_or(0.0, |b| f32::from(*b)),
            ]
        }
    }

    impl Embedder for StubEmbedder {
        fn embed(&mut self, text: &str) -> Result<Embedding> {
            self.calls += 1;
            if self.fail_on.as_deref() == Some(text) {
                return Err(Error::Embedding(format!("refusing to embed {text:?}")));
            }
            Ok(Self::vector(text))
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }
}
