use crate::error::{ChunkerError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for parsing and chunking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Chunking strategy to use
    pub strategy: ChunkingStrategy,

    /// Lines per window when falling back to line chunking
    pub fallback_window_lines: usize,

    /// How anonymous functions count toward their enclosing chunk
    pub lambda_policy: LambdaPolicy,

    /// Share of bytes covered by syntax errors above which parsing is abandoned
    pub max_error_ratio: f32,

    /// Languages to parse structurally (empty = all supported languages)
    pub supported_languages: Vec<String>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::Semantic,
            fallback_window_lines: 40,
            lambda_policy: LambdaPolicy::Fold,
            max_error_ratio: 0.5,
            supported_languages: vec![],
        }
    }
}

impl ChunkerConfig {
    /// Create config optimized for speed (line windows only)
    pub fn for_speed() -> Self {
        Self {
            strategy: ChunkingStrategy::LineCount,
            ..Default::default()
        }
    }

    /// Create config that only keeps trees with very few syntax errors
    pub fn strict() -> Self {
        Self {
            max_error_ratio: 0.1,
            ..Default::default()
        }
    }

    /// Whether `language` may be parsed structurally under this config
    pub fn allows_language(&self, language: &str) -> bool {
        self.supported_languages.is_empty()
            || self
                .supported_languages
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(language))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.fallback_window_lines == 0 {
            return Err(ChunkerError::invalid_config(
                "fallback_window_lines must be > 0",
            ));
        }

        if !(self.max_error_ratio > 0.0 && self.max_error_ratio <= 1.0) {
            return Err(ChunkerError::invalid_config(format!(
                "max_error_ratio ({}) must be within (0, 1]",
                self.max_error_ratio
            )));
        }

        Ok(())
    }
}

/// Strategy for chunking code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Declarations from the syntax tree, line windows when parsing fails
    Semantic,

    /// Fixed line windows only
    LineCount,
}

/// Treatment of lambdas / closures / arrow functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LambdaPolicy {
    /// Count their contents as part of the enclosing chunk
    #[default]
    Fold,

    /// Leave their subtrees out of the enclosing chunk's metadata
    Skip,
}
