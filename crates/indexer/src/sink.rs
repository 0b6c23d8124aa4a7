use crate::error::Result;
use async_trait::async_trait;
use codeintel_code_chunker::{Chunk, ChunkMetadata, Domain};
use serde::Serialize;
use std::sync::{Mutex, PoisonError};

/// Destination of embedded chunks
#[async_trait]
pub trait ChunkSink: Send + Sync {
    /// Accept one (chunk, metadata, vector) triple
    async fn accept(&self, chunk: &Chunk, metadata: &ChunkMetadata, vector: &[f32]) -> Result<()>;
}

/// What [`MemorySink`] keeps of each accepted chunk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SinkRecord {
    pub chunk_id: String,
    pub file_id: String,
    pub qualified_name: String,
    pub domain: Domain,
    pub metadata: ChunkMetadata,
    pub vector: Vec<f32>,
}

/// Collects accepted chunks in memory, in arrival order
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<SinkRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<SinkRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ChunkSink for MemorySink {
    async fn accept(&self, chunk: &Chunk, metadata: &ChunkMetadata, vector: &[f32]) -> Result<()> {
        let record = SinkRecord {
            chunk_id: chunk.id.clone(),
            file_id: chunk.file_id.clone(),
            qualified_name: chunk.qualified_name.clone(),
            domain: chunk.domain,
            metadata: metadata.clone(),
            vector: vector.to_vec(),
        };
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }
}
