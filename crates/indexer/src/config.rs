use crate::error::{IndexerError, Result};
use codeintel_code_chunker::ChunkerConfig;
use codeintel_embeddings::EmbeddingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_MAX_PARALLEL_UNITS: &str = "CODEINTEL_MAX_PARALLEL_UNITS";

const MAX_PARALLEL_UNITS: usize = 32;

/// Configuration of a pipeline run, usually read from `codeintel.toml`
///
/// ```toml
/// parallel_metadata = true
/// max_parallel_units = 4
///
/// [chunker]
/// fallback_window_lines = 40
///
/// [embeddings]
/// ram_budget_mb = 1024
///
/// [embeddings.code]
/// model_id = "unixcoder-base"
/// dimension = 768
/// estimated_mb = 400
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Extract chunk metadata on the rayon pool
    pub parallel_metadata: bool,

    /// Source units analyzed at the same time
    pub max_parallel_units: usize,

    pub chunker: ChunkerConfig,

    pub embeddings: EmbeddingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallel_metadata: true,
            max_parallel_units: default_parallel_units(),
            chunker: ChunkerConfig::default(),
            embeddings: EmbeddingConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Apply `CODEINTEL_*` environment overrides
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup(ENV_MAX_PARALLEL_UNITS) {
            self.max_parallel_units = parse_parallel_units(&raw, self.max_parallel_units);
        }
        self.embeddings = self.embeddings.with_overrides_from(lookup)?;
        Ok(self)
    }

    /// Startup checks of every section
    pub fn validate(&self) -> Result<()> {
        if self.max_parallel_units == 0 {
            return Err(IndexerError::InvalidConfig(
                "max_parallel_units must be > 0".to_string(),
            ));
        }
        self.chunker.validate()?;
        self.embeddings.validate()?;
        Ok(())
    }

    /// Effective configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| IndexerError::Other(e.to_string()))
    }
}

fn default_parallel_units() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    if cpus <= 4 {
        2
    } else if cpus <= 12 {
        4
    } else {
        8
    }
}

fn parse_parallel_units(raw: &str, default_value: usize) -> usize {
    let raw = raw.trim();
    if raw.is_empty() {
        return default_value;
    }
    raw.parse::<usize>()
        .unwrap_or(default_value)
        .clamp(1, MAX_PARALLEL_UNITS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeintel_code_chunker::LambdaPolicy;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert!(config.parallel_metadata);
        assert!(config.max_parallel_units >= 1);
    }

    #[test]
    fn sections_parse_from_toml() {
        let config = PipelineConfig::from_toml_str(
            r#"
parallel_metadata = false
max_parallel_units = 3

[chunker]
lambda_policy = "skip"
fallback_window_lines = 20

[embeddings]
ram_budget_mb = 2048

[embeddings.code]
model_id = "codebert-base"
dimension = 768
estimated_mb = 500
"#,
        )
        .unwrap();

        assert!(!config.parallel_metadata);
        assert_eq!(config.max_parallel_units, 3);
        assert_eq!(config.chunker.lambda_policy, LambdaPolicy::Skip);
        assert_eq!(config.chunker.fallback_window_lines, 20);
        assert_eq!(config.embeddings.ram_budget_mb, 2048);
        assert_eq!(config.embeddings.code.model_id, "codebert-base");
        assert_eq!(config.embeddings.text.model_id, "bge-base-en-v1.5");
        config.validate().unwrap();
    }

    #[test]
    fn dimension_mismatch_is_a_configuration_error() {
        let config = PipelineConfig::from_toml_str(
            r#"
[embeddings.text]
model_id = "bge-small-en-v1.5"
dimension = 384
estimated_mb = 130
"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.is_configuration(), "{err}");
    }

    #[test]
    fn effective_config_round_trips_through_toml() {
        let config = PipelineConfig::default();
        let rendered = config.to_toml_string().unwrap();
        assert!(rendered.contains("[embeddings.text]"));
        assert_eq!(PipelineConfig::from_toml_str(&rendered).unwrap(), config);
    }

    #[test]
    fn env_overrides_are_clamped() {
        let config = PipelineConfig::default()
            .with_overrides_from(|key| match key {
                ENV_MAX_PARALLEL_UNITS => Some("512".to_string()),
                "CODEINTEL_RAM_BUDGET_MB" => Some("4096".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.max_parallel_units, MAX_PARALLEL_UNITS);
        assert_eq!(config.embeddings.ram_budget_mb, 4096);

        assert_eq!(parse_parallel_units("0", 4), 1);
        assert_eq!(parse_parallel_units("junk", 4), 4);
        assert_eq!(parse_parallel_units("  ", 4), 4);
    }
}
