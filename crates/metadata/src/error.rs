use thiserror::Error;

/// Result of extracting one metadata facet
pub type FacetResult<T> = std::result::Result<T, FacetExtractionError>;

/// Why a single facet fell back to its default
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FacetExtractionError {
    /// The facet's syntax contains ERROR or MISSING nodes
    #[error("syntax error in {0}")]
    Syntax(&'static str),

    /// The chunk span does not resolve to a declaration of the tree
    #[error("declaration not found at bytes {start}..{end}")]
    DeclarationNotFound { start: usize, end: usize },

    /// The facet extractor panicked
    #[error("extractor panicked: {0}")]
    Panicked(String),
}
