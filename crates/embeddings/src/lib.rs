//! # Code Intelligence Embeddings
//!
//! Dual-domain embedding service: one model for natural-language chunks (TEXT) and one
//! for source code (CODE), both producing vectors of the same dimension.
//!
//! ```text
//! embed(text, domain)
//!     │
//!     ├─ LOADED? ──────────────────────────────> inference (blocking pool)
//!     │
//!     └─ UNLOADED ─> per-domain load lock ─> re-check ─> RamBudget::reserve
//!                      │                                   │
//!                      │                                   └─ over budget: domain disabled
//!                      └─ detached load task (blocking pool, timeout) ─> LOADED
//! ```
//!
//! Loaded models stay resident until the service is shut down. The stub backend is the
//! default so the pipeline runs without model files; the `onnx` feature adds an ONNX
//! Runtime backend reading `models/manifest.json`.

mod backend;
mod budget;
mod config;
mod error;
mod manifest;
#[cfg(feature = "onnx")]
mod onnx;
mod registry;
mod service;

pub use backend::{cosine_similarity, EmbeddingBackend, ModelLoader, StubBackend, StubLoader};
pub use budget::{RamBudget, Reservation};
pub use config::{
    DomainModelConfig, EmbeddingConfig, EmbeddingMode, ENV_EMBEDDING_MODE, ENV_LOAD_TIMEOUT_MS,
    ENV_MODEL_DIR, ENV_RAM_BUDGET_MB,
};
pub use error::{EmbeddingError, Result};
pub use manifest::{ModelAssets, ModelsManifest};
#[cfg(feature = "onnx")]
pub use onnx::OnnxLoader;
pub use registry::ModelState;
pub use service::{DomainUsage, DualEmbeddingService, TextEmbeddingAdapter, UsageSnapshot};

pub use codeintel_code_chunker::Domain;
