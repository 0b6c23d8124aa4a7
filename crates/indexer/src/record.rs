use crate::stats::RunStats;
use codeintel_code_chunker::{Chunk, ChunkMetadata, ChunkStatus, Language};
use serde::Serialize;

/// Chunks of one unit with metadata, before embedding
#[derive(Debug, Clone)]
pub struct AnalyzedUnit {
    pub file_id: String,
    pub language: Language,
    pub chunks: Vec<Chunk>,
    pub stats: RunStats,
}

/// One chunk as emitted by the pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedChunk {
    #[serde(flatten)]
    pub chunk: Chunk,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,

    /// Why the chunk's domain produced no vector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_error: Option<String>,
}

impl EnrichedChunk {
    pub const fn new(chunk: Chunk) -> Self {
        Self {
            chunk,
            vector: None,
            embedding_error: None,
        }
    }

    pub const fn status(&self) -> ChunkStatus {
        self.chunk.status()
    }

    pub fn metadata(&self) -> Option<&ChunkMetadata> {
        self.chunk.metadata.as_ref()
    }

    pub fn is_embedded(&self) -> bool {
        self.chunk.status() == ChunkStatus::Embedded
    }
}

/// Ordered records of one unit plus its statistics
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub file_id: String,
    pub language: Language,
    pub records: Vec<EnrichedChunk>,
    pub stats: RunStats,
}
