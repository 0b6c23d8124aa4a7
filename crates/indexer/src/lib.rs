//! # Code Intelligence Indexer
//!
//! Orchestrates the code intelligence pipeline over source units.
//!
//! ## Pipeline
//!
//! ```text
//! SourceUnit
//!     │
//!     ├──> ChunkExtractor (tree-sitter, line-window fallback)
//!     │      └─> Chunks in source order
//!     │
//!     ├──> ModuleImportIndex (built once per unit)
//!     │
//!     ├──> MetadataExtractor (per chunk, rayon)
//!     │      └─> METADATA_EXTRACTED / METADATA_FAILED
//!     │
//!     └──> DualEmbeddingService (TEXT / CODE, batched per domain)
//!            └─> EnrichedChunk records ──> ChunkSink
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use codeintel_code_chunker::{Language, SourceUnit};
//! use codeintel_indexer::{CodeIntelPipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = CodeIntelPipeline::new(PipelineConfig::default())?;
//!     let unit = SourceUnit::new("app.py", "def main():\n    pass\n", Language::Python);
//!     let report = pipeline.process(unit).await?;
//!
//!     println!("{} chunks, {} embedded", report.stats.chunks, report.stats.embedded);
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod pipeline;
mod record;
mod scanner;
mod sink;
mod stats;

pub use config::{PipelineConfig, ENV_MAX_PARALLEL_UNITS};
pub use error::{IndexerError, Result};
pub use pipeline::CodeIntelPipeline;
pub use record::{AnalyzedUnit, EnrichedChunk, UnitReport};
pub use scanner::FileScanner;
pub use sink::{ChunkSink, MemorySink, SinkRecord};
pub use stats::RunStats;
