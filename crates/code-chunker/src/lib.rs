//! # Code Intelligence Chunker
//!
//! Structural parsing and declaration chunking for the code intelligence pipeline.
//!
//! ## Architecture
//!
//! ```text
//! SourceUnit (text + language + file id)
//!     │
//!     ├──> SourceParser (tree-sitter) ──> StructuralTree
//!     │        │
//!     │        └─> ParseError ──> LineWindows (fixed-size, non-overlapping)
//!     │
//!     └──> ChunkExtractor
//!          ├─> functions, async functions, methods, classes
//!          ├─> nested definitions as their own chunks
//!          └─> Chunk[] in source order (status PENDING)
//! ```
//!
//! Node kinds are classified through per-language [`SyntaxProfile`] tables, so the rest
//! of the pipeline only sees [`NodeKind`] and the capability queries of [`StructuralNode`].
//!
//! ## Example
//!
//! ```rust
//! use codeintel_code_chunker::{ChunkExtractor, ChunkerConfig, Language, SourceUnit};
//!
//! let extractor = ChunkExtractor::new(ChunkerConfig::default()).unwrap();
//! let unit = SourceUnit::new(
//!     "example.py",
//!     "def process(data):\n    return data.strip()\n",
//!     Language::Python,
//! );
//!
//! let outcome = extractor.chunk_unit(&unit);
//! for chunk in &outcome.chunks {
//!     println!("{} at lines {}-{}", chunk.qualified_name, chunk.span.start_line, chunk.span.end_line);
//! }
//! ```

mod chunker;
mod config;
mod error;
mod language;
mod strategy;
mod syntax;
mod tree;
mod types;

pub use chunker::{ChunkExtractor, ChunkingOutcome};
pub use config::{ChunkerConfig, ChunkingStrategy, LambdaPolicy};
pub use error::{ChunkerError, Result};
pub use language::{Domain, Language};
pub use strategy::LineWindows;
pub use syntax::SyntaxProfile;
pub use tree::{NodeKind, SourceParser, SourceSpan, SourceUnit, StructuralNode, StructuralTree};
pub use types::{Chunk, ChunkMetadata, ChunkStatus, Complexity, FacetFailure, ImportUse, Parameter};

/// Re-exported so downstream crates walk nodes with the same tree-sitter version
pub use tree_sitter;
