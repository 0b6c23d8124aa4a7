use crate::config::{ChunkerConfig, ChunkingStrategy};
use crate::error::{ChunkerError, Result};
use crate::strategy::LineWindows;
use crate::tree::{NodeKind, SourceParser, SourceUnit, StructuralNode, StructuralTree};
use crate::types::Chunk;

const ANONYMOUS: &str = "<anonymous>";

/// Result of chunking one source unit
#[derive(Debug)]
pub struct ChunkingOutcome {
    /// Syntax tree, when parsing succeeded
    pub tree: Option<StructuralTree>,

    /// Chunks in source order; never empty
    pub chunks: Vec<Chunk>,

    /// Why structural parsing was abandoned
    pub parse_error: Option<ChunkerError>,

    /// Chunks are line windows rather than declarations
    pub fallback_used: bool,
}

/// Turns source units into declaration chunks
pub struct ChunkExtractor {
    config: ChunkerConfig,
    parser: SourceParser,
    windows: LineWindows,
}

impl ChunkExtractor {
    /// Create a new extractor with configuration
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        let parser = SourceParser::new(config.max_error_ratio);
        let windows = LineWindows::new(config.fallback_window_lines);
        Ok(Self {
            config,
            parser,
            windows,
        })
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Parse a unit structurally, honoring the configured strategy and language filter
    pub fn parse(&self, unit: &SourceUnit) -> Result<StructuralTree> {
        if self.config.strategy == ChunkingStrategy::LineCount {
            return Err(ChunkerError::parse("line-count strategy skips parsing"));
        }
        if !self.config.allows_language(unit.language.as_str()) {
            return Err(ChunkerError::unsupported_language(unit.language.as_str()));
        }
        self.parser.parse(&unit.text, unit.language)
    }

    /// Parse and chunk a unit, falling back to line windows when needed
    pub fn chunk_unit(&self, unit: &SourceUnit) -> ChunkingOutcome {
        match self.parse(unit) {
            Ok(tree) => {
                let chunks = self.extract(&tree, &unit.file_id);
                if chunks.is_empty() {
                    log::debug!(
                        "No declarations in {}, using {}-line windows",
                        unit.file_id,
                        self.config.fallback_window_lines
                    );
                    return ChunkingOutcome {
                        tree: Some(tree),
                        chunks: self.fallback(unit),
                        parse_error: None,
                        fallback_used: true,
                    };
                }
                ChunkingOutcome {
                    tree: Some(tree),
                    chunks,
                    parse_error: None,
                    fallback_used: false,
                }
            }
            Err(err) => {
                if unit.language.supports_ast()
                    && self.config.strategy == ChunkingStrategy::Semantic
                {
                    log::warn!(
                        "Structural parsing of {} failed, falling back to line windows: {err}",
                        unit.file_id
                    );
                } else {
                    log::debug!("Chunking {} by line windows: {err}", unit.file_id);
                }
                ChunkingOutcome {
                    tree: None,
                    chunks: self.fallback(unit),
                    parse_error: Some(err),
                    fallback_used: true,
                }
            }
        }
    }

    /// Declaration chunks of a parsed tree, depth-first in source order
    pub fn extract(&self, tree: &StructuralTree, file_id: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        self.visit(tree, tree.root(), &[], file_id, &mut chunks);
        log::debug!("Extracted {} declaration chunks from {file_id}", chunks.len());
        chunks
    }

    /// Fixed-size line windows
    pub fn fallback(&self, unit: &SourceUnit) -> Vec<Chunk> {
        self.windows.chunk(unit)
    }

    fn visit(
        &self,
        tree: &StructuralTree,
        node: StructuralNode<'_>,
        scope: &[String],
        file_id: &str,
        chunks: &mut Vec<Chunk>,
    ) {
        let separator = tree.language().scope_separator();

        for child in node.children() {
            let name = child.name().unwrap_or(ANONYMOUS).to_string();

            let mut path = scope.to_vec();
            if child.kind() == NodeKind::Method {
                if let Some(owner) = child.owner_name() {
                    if path.last().map(String::as_str) != Some(owner) {
                        path.push(owner.to_string());
                    }
                }
            }

            let parent = path.last().cloned();
            let qualified_name = path
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(name.as_str()))
                .collect::<Vec<_>>()
                .join(separator);

            let mut chunk = Chunk::new(
                file_id,
                child.kind(),
                name.clone(),
                qualified_name,
                parent,
                child.span(),
                child.text(),
                tree.language(),
            );
            chunk.is_async = child.is_async();
            chunks.push(chunk);

            path.push(name);
            self.visit(tree, child, &path, file_id, chunks);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;
    use pretty_assertions::assert_eq;

    fn extractor() -> ChunkExtractor {
        ChunkExtractor::new(ChunkerConfig::default()).unwrap()
    }

    #[test]
    fn test_rust_chunking() {
        let code = r#"
fn main() {
    println!("Hello");
}

struct Point {
    x: i32,
    y: i32,
}
"#;
        let unit = SourceUnit::new("test.rs", code, Language::Rust);
        let outcome = extractor().chunk_unit(&unit);
        assert!(!outcome.fallback_used);

        let summary: Vec<_> = outcome
            .chunks
            .iter()
            .map(|c| (c.kind, c.name.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![(NodeKind::Function, "main"), (NodeKind::Class, "Point")]
        );
    }

    #[test]
    fn chunk_text_is_exact_span_slice() {
        let code = "x = 1\n\nasync def fetch(url):\n    return url\n";
        let unit = SourceUnit::new("a.py", code, Language::Python);
        let outcome = extractor().chunk_unit(&unit);
        assert_eq!(outcome.chunks.len(), 1);
        let chunk = &outcome.chunks[0];
        assert_eq!(chunk.text, &code[chunk.span.start_byte..chunk.span.end_byte]);
        assert!(chunk.is_async);
        assert_eq!(chunk.span.start_line, 3);
    }

    #[test]
    fn line_count_strategy_skips_parsing() {
        let extractor = ChunkExtractor::new(ChunkerConfig::for_speed()).unwrap();
        let unit = SourceUnit::new("a.py", "def f():\n    pass\n", Language::Python);
        let outcome = extractor.chunk_unit(&unit);
        assert!(outcome.fallback_used);
        assert!(outcome.tree.is_none());
        assert_eq!(outcome.chunks[0].name, "L1-L2");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ChunkerConfig {
            fallback_window_lines: 0,
            ..ChunkerConfig::default()
        };
        assert!(ChunkExtractor::new(config).is_err());
    }
}
