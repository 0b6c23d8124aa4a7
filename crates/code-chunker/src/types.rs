use crate::error::{ChunkerError, Result};
use crate::language::{Domain, Language};
use crate::tree::{NodeKind, SourceSpan};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Lifecycle of a chunk inside one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChunkStatus {
    Pending,
    MetadataExtracted,
    MetadataFailed,
    Embedded,
}

impl ChunkStatus {
    const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::MetadataExtracted | Self::MetadataFailed => 1,
            Self::Embedded => 2,
        }
    }

    /// Whether `next` is reachable in exactly one forward step
    #[must_use]
    pub const fn can_advance_to(self, next: ChunkStatus) -> bool {
        next.rank() == self.rank() + 1
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::MetadataExtracted => "METADATA_EXTRACTED",
            Self::MetadataFailed => "METADATA_FAILED",
            Self::Embedded => "EMBEDDED",
        }
    }
}

/// A semantic code chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Stable identifier derived from file, span, kind and name
    pub id: String,

    /// Source file identifier
    pub file_id: String,

    pub kind: NodeKind,

    /// Declared name (`L{start}-L{end}` for line windows)
    pub name: String,

    /// Enclosing scopes joined with the language's separator
    pub qualified_name: String,

    /// Enclosing declaration, if any
    pub parent: Option<String>,

    pub span: SourceSpan,

    /// Exact source slice of `span`
    pub text: String,

    pub language: Language,

    pub domain: Domain,

    pub is_async: bool,

    pub metadata: Option<ChunkMetadata>,

    status: ChunkStatus,
}

impl Chunk {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file_id: impl Into<String>,
        kind: NodeKind,
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        parent: Option<String>,
        span: SourceSpan,
        text: impl Into<String>,
        language: Language,
    ) -> Self {
        let file_id = file_id.into();
        let name = name.into();
        let id = chunk_id(&file_id, &span, kind, &name);
        Self {
            id,
            file_id,
            kind,
            name,
            qualified_name: qualified_name.into(),
            parent,
            span,
            text: text.into(),
            language,
            domain: language.domain(),
            is_async: false,
            metadata: None,
            status: ChunkStatus::Pending,
        }
    }

    #[must_use]
    pub const fn status(&self) -> ChunkStatus {
        self.status
    }

    /// Move the status one step forward; backward or skipping moves are rejected
    pub fn advance(&mut self, next: ChunkStatus) -> Result<()> {
        if !self.status.can_advance_to(next) {
            return Err(ChunkerError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Attach extracted metadata and record whether any facet failed
    pub fn attach_metadata(&mut self, metadata: ChunkMetadata) -> Result<()> {
        let next = if metadata.failed_facets.is_empty() {
            ChunkStatus::MetadataExtracted
        } else {
            ChunkStatus::MetadataFailed
        };
        self.advance(next)?;
        self.metadata = Some(metadata);
        Ok(())
    }

    pub fn mark_embedded(&mut self) -> Result<()> {
        self.advance(ChunkStatus::Embedded)
    }

    /// Get the number of lines in this chunk
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.span.line_count()
    }

    /// Line windows produced when structural parsing was not possible
    #[must_use]
    pub fn is_line_window(&self) -> bool {
        self.kind == NodeKind::Other
    }
}

fn chunk_id(file_id: &str, span: &SourceSpan, kind: NodeKind, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_id.as_bytes());
    hasher.update(format!(":{}:{}:{}:", span.start_byte, span.end_byte, kind.as_str()).as_bytes());
    hasher.update(name.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// One declared parameter
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub type_annotation: Option<String>,
    pub default: Option<String>,
}

impl Parameter {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder: set type annotation
    #[must_use]
    pub fn typed(mut self, type_annotation: impl Into<String>) -> Self {
        self.type_annotation = Some(type_annotation.into());
        self
    }

    /// Builder: set default value
    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Cyclomatic complexity and non-blank, non-comment line count
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Complexity {
    pub cyclomatic: u32,
    pub loc: u32,
}

impl Default for Complexity {
    fn default() -> Self {
        Self {
            cyclomatic: 1,
            loc: 0,
        }
    }
}

/// An imported name referenced by a chunk, with the module it came from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImportUse {
    pub name: String,
    pub module: String,
}

/// Metadata facet that could not be extracted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FacetFailure {
    pub facet: String,
    pub reason: String,
}

/// Structural metadata of a chunk; every field always has a value
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub signature: String,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    pub decorators: BTreeSet<String>,
    pub docstring: Option<String>,
    pub complexity: Complexity,
    pub imports_used: BTreeSet<ImportUse>,
    pub calls_made: BTreeSet<String>,
    /// Facets that fell back to their defaults
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_facets: Vec<FacetFailure>,
}

impl ChunkMetadata {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed_facets.is_empty()
    }

    /// Builder: record a failed facet
    #[must_use]
    pub fn with_failure(mut self, facet: impl Into<String>, reason: impl Into<String>) -> Self {
        self.failed_facets.push(FacetFailure {
            facet: facet.into(),
            reason: reason.into(),
        });
        self
    }
}
