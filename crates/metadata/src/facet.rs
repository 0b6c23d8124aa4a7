use crate::error::{FacetExtractionError, FacetResult};
use codeintel_code_chunker::FacetFailure;
use std::panic::{self, AssertUnwindSafe};

/// Independently extracted metadata field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facet {
    Signature,
    Parameters,
    ReturnType,
    Decorators,
    Docstring,
    Complexity,
    ImportsUsed,
    CallsMade,
}

impl Facet {
    pub const ALL: [Facet; 8] = [
        Facet::Signature,
        Facet::Parameters,
        Facet::ReturnType,
        Facet::Decorators,
        Facet::Docstring,
        Facet::Complexity,
        Facet::ImportsUsed,
        Facet::CallsMade,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Facet::Signature => "signature",
            Facet::Parameters => "parameters",
            Facet::ReturnType => "return_type",
            Facet::Decorators => "decorators",
            Facet::Docstring => "docstring",
            Facet::Complexity => "complexity",
            Facet::ImportsUsed => "imports_used",
            Facet::CallsMade => "calls_made",
        }
    }
}

impl std::fmt::Display for Facet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run one facet extractor, turning a panic into a facet error
pub(crate) fn run_facet<T>(extract: impl FnOnce() -> FacetResult<T>) -> FacetResult<T> {
    match panic::catch_unwind(AssertUnwindSafe(extract)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(FacetExtractionError::Panicked(message))
        }
    }
}

/// Collects facet failures of one chunk
#[derive(Debug)]
pub(crate) struct FacetLog<'a> {
    chunk: &'a str,
    failures: Vec<FacetFailure>,
}

impl<'a> FacetLog<'a> {
    pub(crate) fn new(chunk: &'a str) -> Self {
        Self {
            chunk,
            failures: Vec::new(),
        }
    }

    /// Value of a facet, or its default when extraction failed
    pub(crate) fn settle<T: Default>(&mut self, facet: Facet, result: FacetResult<T>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => {
                log::warn!("Metadata facet {facet} failed for {}: {err}", self.chunk);
                self.failures.push(FacetFailure {
                    facet: facet.as_str().to_string(),
                    reason: err.to_string(),
                });
                T::default()
            }
        }
    }

    pub(crate) fn into_failures(self) -> Vec<FacetFailure> {
        self.failures
    }
}
