//! # Code Intelligence Metadata
//!
//! Structural metadata for chunks produced by `codeintel-code-chunker`.
//!
//! ```text
//! StructuralTree ──> ModuleImportIndex::build   (one traversal per unit)
//!        │                    │
//!        └──> MetadataExtractor::extract(chunk, tree, &index)
//!               ├─ signature / parameters / return type / decorators
//!               ├─ docstring
//!               ├─ complexity (cyclomatic, LOC)
//!               └─ imports used / calls made
//! ```
//!
//! Each facet is extracted on its own. A facet that hits malformed syntax (or panics)
//! falls back to its default and is recorded in [`ChunkMetadata::failed_facets`], so a
//! broken construct in one chunk never affects the rest of the chunk or its siblings.
//!
//! ## Example
//!
//! ```rust
//! use codeintel_code_chunker::{ChunkExtractor, ChunkerConfig, Language, SourceUnit};
//! use codeintel_metadata::{MetadataExtractor, ModuleImportIndex};
//!
//! let chunker = ChunkExtractor::new(ChunkerConfig::default()).unwrap();
//! let unit = SourceUnit::new("util.py", "import os\n\ndef cwd():\n    return os.getcwd()\n", Language::Python);
//! let outcome = chunker.chunk_unit(&unit);
//!
//! let tree = outcome.tree.as_ref();
//! let index = tree.map(ModuleImportIndex::build).unwrap_or_default();
//! let extractor = MetadataExtractor::from_config(chunker.config());
//! for chunk in &outcome.chunks {
//!     let metadata = extractor.extract(chunk, tree, &index).metadata;
//!     assert!(metadata.calls_made.contains("os.getcwd"));
//! }
//! ```
//!
//! [`ChunkMetadata::failed_facets`]: codeintel_code_chunker::ChunkMetadata::failed_facets

mod complexity;
mod docstring;
mod error;
mod extractor;
mod facet;
mod import_index;
mod references;
mod signature;
mod walk;

pub use complexity::{count_loc, ComplexityAnalyzer};
pub use error::{FacetExtractionError, FacetResult};
pub use extractor::{MetadataExtractor, MetadataOutcome};
pub use facet::Facet;
pub use import_index::{ImportOrigin, ModuleImportIndex};
