use codeintel_code_chunker::Domain;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbeddingError>;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model for the {domain} domain is unavailable: {reason}")]
    ModelUnavailable { domain: Domain, reason: String },

    #[error(
        "Loading the {domain} model needs ~{requested_mb}MB with {committed_mb}MB already in use; \
         RAM budget is {threshold_mb}MB"
    )]
    RamBudgetExceeded {
        domain: Domain,
        requested_mb: u64,
        committed_mb: u64,
        threshold_mb: u64,
    },

    #[error("The {domain} domain is disabled for this run: {reason}")]
    DomainDisabled { domain: Domain, reason: String },

    #[error("Loading the {domain} model timed out after {timeout_ms}ms")]
    LoadTimeout { domain: Domain, timeout_ms: u64 },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl EmbeddingError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Whether the error leaves its domain disabled for the rest of the run
    #[must_use]
    pub const fn disables_domain(&self) -> bool {
        matches!(
            self,
            Self::ModelUnavailable { .. }
                | Self::RamBudgetExceeded { .. }
                | Self::DomainDisabled { .. }
        )
    }

    /// Domain the error is about, if any
    #[must_use]
    pub const fn domain(&self) -> Option<Domain> {
        match self {
            Self::ModelUnavailable { domain, .. }
            | Self::RamBudgetExceeded { domain, .. }
            | Self::DomainDisabled { domain, .. }
            | Self::LoadTimeout { domain, .. } => Some(*domain),
            _ => None,
        }
    }
}
