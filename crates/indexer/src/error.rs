use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Chunker error: {0}")]
    ChunkerError(#[from] codeintel_code_chunker::ChunkerError),

    #[error("Embedding error: {0}")]
    EmbeddingError(#[from] codeintel_embeddings::EmbeddingError),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid project path: {0}")]
    InvalidPath(String),

    #[error("Sink rejected record: {0}")]
    Sink(String),

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    /// Configuration problems are fatal at startup, everything else is per unit
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_)
                | Self::ConfigParse(_)
                | Self::ChunkerError(codeintel_code_chunker::ChunkerError::InvalidConfig(_))
                | Self::EmbeddingError(codeintel_embeddings::EmbeddingError::Configuration(_))
        )
    }
}
