use std::fmt;
use std::str::FromStr;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::embed::{Embedder, Embedding};
use crate::{Error, Result};

/// Sentence-transformer models available to [`OnnxEmbedder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelKind {
    /// sentence-transformers/all-MiniLM-L6-v2
    #[default]
    AllMiniLmL6V2,
    /// BAAI/bge-small-en-v1.5
    BgeSmallEnV15,
    /// BAAI/bge-large-en-v1.5
    BgeLargeEnV15,
}

impl ModelKind {
    /// Hub identifier of the model.
    pub fn name(self) -> &'static str {
        match self {
            Self::AllMiniLmL6V2 => "sentence-transformers/all-MiniLM-L6-v2",
            Self::BgeSmallEnV15 => "BAAI/bge-small-en-v1.5",
            Self::BgeLargeEnV15 => "BAAI/bge-large-en-v1.5",
        }
    }

    pub fn dimension(self) -> usize {
        match self {
            Self::AllMiniLmL6V2 | Self::BgeSmallEnV15 => 384,
            Self::BgeLargeEnV15 => 1024,
        }
    }

    fn fastembed_model(self) -> EmbeddingModel {
        match self {
            Self::AllMiniLmL6V2 => EmbeddingModel::AllMiniLML6V2,
            Self::BgeSmallEnV15 => EmbeddingModel::BGESmallENV15,
            Self::BgeLargeEnV15 => EmbeddingModel::BGELargeENV15,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = match self {
            Self::AllMiniLmL6V2 => "all-minilm-l6-v2",
            Self::BgeSmallEnV15 => "bge-small-en-v1.5",
            Self::BgeLargeEnV15 => "bge-large-en-v1.5",
        };
        f.write_str(short)
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "all-minilm-l6-v2" | "minilm" => Ok(Self::AllMiniLmL6V2),
            "bge-small-en-v1.5" | "bge-small" => Ok(Self::BgeSmallEnV15),
            "bge-large-en-v1.5" | "bge-large" => Ok(Self::BgeLargeEnV15),
            other => Err(Error::InvalidInput(format!("unknown model `{other}`"))),
        }
    }
}

/// Local embedder running a sentence-transformer model on ONNX runtime.
///
/// Uses fastembed for inference. The default model is all-MiniLM-L6-v2,
/// producing 384-dimensional embeddings.
pub struct OnnxEmbedder {
    model: TextEmbedding,
    kind: ModelKind,
}

impl OnnxEmbedder {
    /// Create a new embedder for the given model.
    ///
    /// Downloads the model on first use.
    pub fn new(kind: ModelKind) -> Result<Self> {
        let opts = InitOptions::new(kind.fastembed_model()).with_show_download_progress(true);

        TextEmbedding::try_new(opts)
            .map(|model| Self { model, kind })
            .map_err(|e| Error::Embedding(e.to_string()))
    }
}

impl Embedder for OnnxEmbedder {
    fn model_name(&self) -> &str {
        self.kind.name()
    }

    fn dimension(&self) -> usize {
        self.kind.dimension()
    }

    fn embed(&mut self, text: &str) -> Result<Embedding> {
        self.model
            .embed(vec![text], None)
            .map_err(|e| Error::Embedding(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("model returned no embeddings".to_string()))
    }

    fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.model
            .embed(texts, None)
            .map_err(|e| Error::Embedding(e.to_string()))
    }
}
