use crate::error::{EmbeddingError, Result};
use codeintel_code_chunker::Domain;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_EMBEDDING_MODE: &str = "CODEINTEL_EMBEDDING_MODE";
pub const ENV_MODEL_DIR: &str = "CODEINTEL_MODEL_DIR";
pub const ENV_RAM_BUDGET_MB: &str = "CODEINTEL_RAM_BUDGET_MB";
pub const ENV_LOAD_TIMEOUT_MS: &str = "CODEINTEL_MODEL_LOAD_TIMEOUT_MS";

const CACHE_DIR_NAME: &str = "codeintel";

/// Which backend produces vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingMode {
    /// Deterministic hash-seeded vectors, no model files needed
    #[default]
    Stub,
    /// ONNX Runtime models from the model directory
    Onnx,
}

impl EmbeddingMode {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stub" => Ok(Self::Stub),
            "onnx" => Ok(Self::Onnx),
            other => Err(EmbeddingError::configuration(format!(
                "Unsupported embedding mode '{other}' (expected 'stub' or 'onnx')"
            ))),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stub => "stub",
            Self::Onnx => "onnx",
        }
    }
}

/// Model settings of one domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainModelConfig {
    pub model_id: String,

    /// Declared output dimension
    pub dimension: usize,

    /// Estimated resident memory once loaded
    pub estimated_mb: u64,

    #[serde(default = "default_max_length")]
    pub max_length: usize,

    #[serde(default = "default_max_batch")]
    pub max_batch: usize,

    /// Run inference one call at a time behind the domain lock
    #[serde(default)]
    pub serialize_inference: bool,
}

const fn default_max_length() -> usize {
    512
}

const fn default_max_batch() -> usize {
    32
}

impl DomainModelConfig {
    pub fn new(model_id: impl Into<String>, dimension: usize, estimated_mb: u64) -> Self {
        Self {
            model_id: model_id.into(),
            dimension,
            estimated_mb,
            max_length: default_max_length(),
            max_batch: default_max_batch(),
            serialize_inference: false,
        }
    }

    pub fn text_default() -> Self {
        Self::new("bge-base-en-v1.5", 768, 260)
    }

    pub fn code_default() -> Self {
        Self::new("unixcoder-base", 768, 400)
    }
}

/// Configuration of the dual-domain embedding service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub mode: EmbeddingMode,

    /// Directory holding `manifest.json` and one folder per model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_dir: Option<PathBuf>,

    /// Ceiling on the estimated memory of all loaded models
    pub ram_budget_mb: u64,

    /// Upper bound on a single model load
    pub load_timeout_ms: u64,

    #[serde(default = "DomainModelConfig::text_default")]
    pub text: DomainModelConfig,

    #[serde(default = "DomainModelConfig::code_default")]
    pub code: DomainModelConfig,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: EmbeddingMode::Stub,
            model_dir: None,
            ram_budget_mb: 1024,
            load_timeout_ms: 120_000,
            text: DomainModelConfig::text_default(),
            code: DomainModelConfig::code_default(),
        }
    }
}

impl EmbeddingConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn domain(&self, domain: Domain) -> &DomainModelConfig {
        match domain {
            Domain::Text => &self.text,
            Domain::Code => &self.code,
        }
    }

    /// Shared output dimension (valid after [`validate`](Self::validate))
    pub fn dimension(&self) -> usize {
        self.text.dimension
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    /// Apply `CODEINTEL_*` environment overrides
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (environment, test fixtures)
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(mode) = lookup(ENV_EMBEDDING_MODE) {
            self.mode = EmbeddingMode::parse(&mode)?;
        }
        if let Some(dir) = lookup(ENV_MODEL_DIR) {
            self.model_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = lookup(ENV_RAM_BUDGET_MB) {
            self.ram_budget_mb = raw.trim().parse().map_err(|e| {
                EmbeddingError::configuration(format!("Invalid {ENV_RAM_BUDGET_MB} '{raw}': {e}"))
            })?;
        }
        if let Some(raw) = lookup(ENV_LOAD_TIMEOUT_MS) {
            self.load_timeout_ms = raw.trim().parse().map_err(|e| {
                EmbeddingError::configuration(format!("Invalid {ENV_LOAD_TIMEOUT_MS} '{raw}': {e}"))
            })?;
        }
        Ok(self)
    }

    /// Startup checks; every domain must declare the same dimension
    pub fn validate(&self) -> Result<()> {
        for domain in Domain::ALL {
            let model = self.domain(domain);
            if model.model_id.trim().is_empty() {
                return Err(EmbeddingError::configuration(format!(
                    "{domain} model_id must not be empty"
                )));
            }
            if model.dimension == 0 {
                return Err(EmbeddingError::configuration(format!(
                    "{domain} dimension must be greater than 0"
                )));
            }
            if model.max_batch == 0 || model.max_length == 0 {
                return Err(EmbeddingError::configuration(format!(
                    "{domain} max_batch and max_length must be greater than 0"
                )));
            }
        }

        if self.text.dimension != self.code.dimension {
            return Err(EmbeddingError::configuration(format!(
                "Embedding dimensions differ across domains: text={} ({}), code={} ({})",
                self.text.dimension, self.text.model_id, self.code.dimension, self.code.model_id
            )));
        }

        if self.ram_budget_mb == 0 {
            return Err(EmbeddingError::configuration(
                "ram_budget_mb must be greater than 0",
            ));
        }
        if self.load_timeout_ms == 0 {
            return Err(EmbeddingError::configuration(
                "load_timeout_ms must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Model directory: configured, `./models` above the working directory, or the user cache
    pub fn resolve_model_dir(&self) -> PathBuf {
        if let Some(dir) = &self.model_dir {
            return dir.clone();
        }

        if let Ok(mut dir) = std::env::current_dir() {
            loop {
                let candidate = dir.join("models");
                if candidate.join("manifest.json").exists() {
                    return candidate;
                }
                if !dir.pop() {
                    break;
                }
            }
        }

        let base = std::env::var("XDG_CACHE_HOME").map_or_else(
            |_| {
                std::env::var("HOME")
                    .map_or_else(|_| PathBuf::from("."), PathBuf::from)
                    .join(".cache")
            },
            PathBuf::from,
        );
        cache_models_dir(&base)
    }
}

fn cache_models_dir(base: &Path) -> PathBuf {
    base.join(CACHE_DIR_NAME).join("models")
}
