use crate::complexity::{count_loc, ComplexityAnalyzer};
use crate::docstring::docstring;
use crate::error::FacetExtractionError;
use crate::facet::{run_facet, Facet, FacetLog};
use crate::import_index::ModuleImportIndex;
use crate::references::{calls_made, imports_used};
use crate::signature::{decorators, parameters, return_type, signature};
use codeintel_code_chunker::{
    Chunk, ChunkMetadata, ChunkerConfig, Complexity, LambdaPolicy, StructuralNode, StructuralTree,
};

/// Metadata of one chunk plus extraction diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataOutcome {
    pub metadata: ChunkMetadata,
    /// Syntax nodes inspected for this chunk
    pub visited_nodes: usize,
}

impl MetadataOutcome {
    pub fn is_complete(&self) -> bool {
        self.metadata.is_complete()
    }
}

/// Per-chunk structural metadata with failures isolated per facet
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataExtractor {
    lambda_policy: LambdaPolicy,
    complexity: ComplexityAnalyzer,
}

impl MetadataExtractor {
    pub fn new(lambda_policy: LambdaPolicy) -> Self {
        Self {
            lambda_policy,
            complexity: ComplexityAnalyzer::new(lambda_policy),
        }
    }

    pub fn from_config(config: &ChunkerConfig) -> Self {
        Self::new(config.lambda_policy)
    }

    /// Extract every facet of `chunk`
    ///
    /// Never fails: a facet that cannot be extracted takes its default value and is
    /// listed in `failed_facets`. Imports are resolved through `index` only, the tree
    /// is never re-scanned outside the chunk span.
    pub fn extract(
        &self,
        chunk: &Chunk,
        tree: Option<&StructuralTree>,
        index: &ModuleImportIndex,
    ) -> MetadataOutcome {
        let tree = match tree {
            Some(tree) if !chunk.is_line_window() => tree,
            _ => return Self::text_only(chunk),
        };

        let label = format!("{}:{}", chunk.file_id, chunk.qualified_name);
        let Some(node) = tree.declaration_at(&chunk.span) else {
            return Self::unresolved(chunk, &label);
        };

        self.from_declaration(&node, index, &label)
    }

    /// Extract metadata and advance the chunk to METADATA_EXTRACTED / METADATA_FAILED
    ///
    /// Returns the number of syntax nodes visited.
    pub fn enrich(
        &self,
        chunk: &mut Chunk,
        tree: Option<&StructuralTree>,
        index: &ModuleImportIndex,
    ) -> codeintel_code_chunker::Result<usize> {
        let outcome = self.extract(chunk, tree, index);
        chunk.attach_metadata(outcome.metadata)?;
        Ok(outcome.visited_nodes)
    }

    fn from_declaration(
        &self,
        node: &StructuralNode<'_>,
        index: &ModuleImportIndex,
        label: &str,
    ) -> MetadataOutcome {
        let mut log = FacetLog::new(label);
        let mut visited_nodes = 0usize;

        let signature = log.settle(Facet::Signature, run_facet(|| signature(node)));
        let parameters = log.settle(Facet::Parameters, run_facet(|| parameters(node)));
        let return_type = log.settle(Facet::ReturnType, run_facet(|| return_type(node)));
        let decorators = log.settle(Facet::Decorators, run_facet(|| decorators(node)));
        let docstring = log.settle(Facet::Docstring, run_facet(|| docstring(node)));

        let complexity: Complexity = log.settle(
            Facet::Complexity,
            run_facet(|| {
                let (result, visited) = self.complexity.analyze(node);
                visited_nodes += visited;
                result
            }),
        );
        let imports_used = log.settle(
            Facet::ImportsUsed,
            run_facet(|| {
                let (result, visited) = imports_used(node, index, self.lambda_policy);
                visited_nodes += visited;
                result
            }),
        );
        let calls_made = log.settle(
            Facet::CallsMade,
            run_facet(|| {
                let (result, visited) = calls_made(node, self.lambda_policy);
                visited_nodes += visited;
                result
            }),
        );

        MetadataOutcome {
            metadata: ChunkMetadata {
                signature,
                parameters,
                return_type,
                decorators,
                docstring,
                complexity,
                imports_used,
                calls_made,
                failed_facets: log.into_failures(),
            },
            visited_nodes,
        }
    }

    /// Line windows and unparsed units: only text-derived facets apply
    fn text_only(chunk: &Chunk) -> MetadataOutcome {
        MetadataOutcome {
            metadata: ChunkMetadata {
                complexity: Complexity {
                    cyclomatic: 1,
                    loc: count_loc(&chunk.text, chunk.language),
                },
                ..ChunkMetadata::default()
            },
            visited_nodes: 0,
        }
    }

    fn unresolved(chunk: &Chunk, label: &str) -> MetadataOutcome {
        let err = FacetExtractionError::DeclarationNotFound {
            start: chunk.span.start_byte,
            end: chunk.span.end_byte,
        };
        log::warn!("Metadata extraction for {label} fell back to defaults: {err}");

        let metadata = Facet::ALL
            .iter()
            .fold(ChunkMetadata::default(), |metadata, facet| {
                metadata.with_failure(facet.as_str(), err.to_string())
            });
        MetadataOutcome {
            metadata,
            visited_nodes: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeintel_code_chunker::{
        ChunkExtractor, ChunkStatus, Language, NodeKind, SourceSpan, SourceUnit,
    };
    use pretty_assertions::assert_eq;

    fn run(source: &str, language: Language) -> Vec<(Chunk, MetadataOutcome)> {
        let extractor = ChunkExtractor::new(ChunkerConfig::default()).unwrap();
        let unit = SourceUnit::new("sample", source, language);
        let outcome = extractor.chunk_unit(&unit);
        let index = outcome
            .tree
            .as_ref()
            .map(ModuleImportIndex::build)
            .unwrap_or_default();
        let metadata = MetadataExtractor::default();
        outcome
            .chunks
            .into_iter()
            .map(|chunk| {
                let extracted = metadata.extract(&chunk, outcome.tree.as_ref(), &index);
                (chunk, extracted)
            })
            .collect()
    }

    #[test]
    fn line_windows_get_text_metadata() {
        let results = run("# Title\n\nSome prose.\n", Language::Markdown);
        assert_eq!(results.len(), 1);
        let (_, outcome) = &results[0];
        assert!(outcome.is_complete());
        assert_eq!(outcome.metadata.complexity, Complexity { cyclomatic: 1, loc: 2 });
        assert_eq!(outcome.metadata.signature, "");
    }

    #[test]
    fn unknown_span_fails_every_facet() {
        let source = "def f():\n    pass\n";
        let tree = codeintel_code_chunker::SourceParser::default()
            .parse(source, Language::Python)
            .unwrap();
        let chunk = Chunk::new(
            "sample",
            NodeKind::Function,
            "ghost",
            "ghost",
            None,
            SourceSpan {
                start_byte: 0,
                end_byte: 3,
                start_line: 1,
                end_line: 1,
            },
            "def",
            Language::Python,
        );
        let outcome =
            MetadataExtractor::default().extract(&chunk, Some(&tree), &ModuleImportIndex::empty());
        assert_eq!(outcome.metadata.failed_facets.len(), Facet::ALL.len());
        assert_eq!(outcome.metadata.complexity, Complexity::default());
    }

    #[test]
    fn enrich_advances_status() {
        let source = "def f(x):\n    return x\n";
        let extractor = ChunkExtractor::new(ChunkerConfig::default()).unwrap();
        let outcome = extractor.chunk_unit(&SourceUnit::new("a.py", source, Language::Python));
        let tree = outcome.tree.as_ref();
        let index = tree.map(ModuleImportIndex::build).unwrap_or_default();

        let mut chunk = outcome.chunks[0].clone();
        let visited = MetadataExtractor::default()
            .enrich(&mut chunk, tree, &index)
            .unwrap();
        assert!(visited > 0);
        assert_eq!(chunk.status(), ChunkStatus::MetadataExtracted);
        assert!(MetadataExtractor::default()
            .enrich(&mut chunk, tree, &index)
            .is_err());
    }
}
