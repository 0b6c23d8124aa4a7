use crate::backend::{ensure_dimension, ModelLoader, StubLoader};
use crate::budget::RamBudget;
use crate::config::{EmbeddingConfig, EmbeddingMode};
use crate::error::{EmbeddingError, Result};
use crate::registry::{DomainSlot, ModelState};
use codeintel_code_chunker::Domain;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

static GLOBAL: Lazy<RwLock<Option<Arc<DualEmbeddingService>>>> = Lazy::new(|| RwLock::new(None));

/// Embeds text with one lazily loaded model per domain under a shared RAM budget
///
/// Models are loaded on first use and then stay resident for the lifetime of the
/// service; there is no eviction. A domain whose load fails or would exceed the budget
/// is disabled and later calls for it fail fast with [`EmbeddingError::DomainDisabled`].
pub struct DualEmbeddingService {
    config: EmbeddingConfig,
    budget: Arc<RamBudget>,
    loader: Arc<dyn ModelLoader>,
    text: Arc<DomainSlot>,
    code: Arc<DomainSlot>,
}

impl std::fmt::Debug for DualEmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualEmbeddingService")
            .field("mode", &self.config.mode)
            .field("dimension", &self.config.dimension())
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}

impl DualEmbeddingService {
    /// Validate `config` and pick the loader for its mode
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        config.validate()?;
        let loader: Arc<dyn ModelLoader> = match config.mode {
            EmbeddingMode::Stub => Arc::new(StubLoader),
            EmbeddingMode::Onnx => onnx_loader(&config)?,
        };
        Self::with_loader(config, loader)
    }

    /// Use a custom loader
    pub fn with_loader(config: EmbeddingConfig, loader: Arc<dyn ModelLoader>) -> Result<Self> {
        config.validate()?;
        log::debug!(
            "Embedding service: mode {}, dim {}, budget {}MB",
            config.mode.as_str(),
            config.dimension(),
            config.ram_budget_mb
        );
        Ok(Self {
            budget: Arc::new(RamBudget::new(config.ram_budget_mb)),
            text: Arc::new(DomainSlot::new(Domain::Text, config.text.clone())),
            code: Arc::new(DomainSlot::new(Domain::Code, config.code.clone())),
            loader,
            config,
        })
    }

    pub const fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    /// Shared vector length of every domain
    pub fn dimension(&self) -> usize {
        self.config.dimension()
    }

    pub async fn embed(&self, text: &str, domain: Domain) -> Result<Vec<f32>> {
        self.embed_with_load_timeout(text, domain, self.config.load_timeout())
            .await
    }

    /// [`embed`](Self::embed) with an explicit bound on a model load it triggers
    pub async fn embed_with_load_timeout(
        &self,
        text: &str,
        domain: Domain,
        load_timeout: Duration,
    ) -> Result<Vec<f32>> {
        let mut vectors = self
            .embed_batch_with_load_timeout(vec![text.to_string()], domain, load_timeout)
            .await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::inference("Empty embedding result"))
    }

    pub async fn embed_batch(&self, texts: Vec<String>, domain: Domain) -> Result<Vec<Vec<f32>>> {
        self.embed_batch_with_load_timeout(texts, domain, self.config.load_timeout())
            .await
    }

    async fn embed_batch_with_load_timeout(
        &self,
        texts: Vec<String>,
        domain: Domain,
        load_timeout: Duration,
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let slot = self.slot(domain);
        let backend = slot.acquire(&self.loader, &self.budget, load_timeout).await?;
        let expected = texts.len();
        let vectors = slot.infer(backend, texts).await?;
        if vectors.len() != expected {
            return Err(EmbeddingError::inference(format!(
                "{domain} model returned {} vectors for {expected} texts",
                vectors.len()
            )));
        }
        for vector in &vectors {
            ensure_dimension(vector, slot.config().dimension)?;
        }
        Ok(vectors)
    }

    /// Single-domain call shape: always the TEXT domain
    pub async fn adapt(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text, Domain::Text).await
    }

    /// Load the model of `domain` without embedding anything
    pub async fn preload(&self, domain: Domain) -> Result<()> {
        self.slot(domain)
            .acquire(&self.loader, &self.budget, self.config.load_timeout())
            .await
            .map(|_| ())
    }

    pub fn state(&self, domain: Domain) -> ModelState {
        self.slot(domain).state()
    }

    /// How many times the loader ran for `domain`
    pub fn load_count(&self, domain: Domain) -> usize {
        self.slot(domain).load_count()
    }

    pub fn usage_snapshot(&self) -> UsageSnapshot {
        let domains = Domain::ALL
            .iter()
            .map(|&domain| {
                let slot = self.slot(domain);
                let state = slot.state();
                DomainUsage {
                    domain,
                    model_id: slot.config().model_id.clone(),
                    state,
                    loaded: state == ModelState::Loaded,
                    estimated_mb: slot.config().estimated_mb,
                    disabled_reason: slot.disabled_reason(),
                }
            })
            .collect();
        UsageSnapshot {
            resident_mb: self.budget.resident_mb(),
            threshold_mb: self.budget.threshold_mb(),
            dimension: self.dimension(),
            domains,
        }
    }

    /// Release every loaded model; used at process teardown
    pub fn shutdown(&self) {
        for domain in Domain::ALL {
            if let Some(mb) = self.slot(domain).unload() {
                self.budget.release_resident(mb);
                log::debug!("Released the {domain} model ({mb}MB)");
            }
        }
    }

    fn slot(&self, domain: Domain) -> &Arc<DomainSlot> {
        match domain {
            Domain::Text => &self.text,
            Domain::Code => &self.code,
        }
    }

    /// Install `service` as the process-wide instance
    pub fn install_global(service: Self) -> Result<Arc<Self>> {
        let mut global = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
        if global.is_some() {
            return Err(EmbeddingError::configuration(
                "an embedding service is already installed",
            ));
        }
        let service = Arc::new(service);
        *global = Some(Arc::clone(&service));
        Ok(service)
    }

    /// The process-wide instance, if installed
    pub fn global() -> Option<Arc<Self>> {
        GLOBAL
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove the process-wide instance and release its models
    pub fn shutdown_global() -> Option<Arc<Self>> {
        let service = GLOBAL
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        service.shutdown();
        Some(service)
    }
}

#[cfg(feature = "onnx")]
fn onnx_loader(config: &EmbeddingConfig) -> Result<Arc<dyn ModelLoader>> {
    let model_dir = config.resolve_model_dir();
    let manifest = crate::manifest::ModelsManifest::load(&model_dir)?;
    if let Some(manifest) = &manifest {
        manifest.check_dimensions(config)?;
    }
    log::debug!("ONNX models from {}", model_dir.display());
    Ok(Arc::new(crate::onnx::OnnxLoader::new(model_dir, manifest)))
}

#[cfg(not(feature = "onnx"))]
fn onnx_loader(config: &EmbeddingConfig) -> Result<Arc<dyn ModelLoader>> {
    // dimensions are checked against the manifest either way
    if let Some(manifest) = crate::manifest::ModelsManifest::load(&config.resolve_model_dir())? {
        manifest.check_dimensions(config)?;
    }
    Err(EmbeddingError::configuration(
        "embedding mode 'onnx' requires building with the `onnx` feature",
    ))
}

/// Bare-vector view of the service for single-domain callers
#[derive(Debug, Clone)]
pub struct TextEmbeddingAdapter {
    service: Arc<DualEmbeddingService>,
}

impl TextEmbeddingAdapter {
    pub const fn new(service: Arc<DualEmbeddingService>) -> Self {
        Self { service }
    }

    pub fn dimension(&self) -> usize {
        self.service.dimension()
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.service.adapt(text).await
    }
}

/// Point-in-time memory and model state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub resident_mb: u64,
    pub threshold_mb: u64,
    pub dimension: usize,
    pub domains: Vec<DomainUsage>,
}

impl UsageSnapshot {
    pub fn is_loaded(&self, domain: Domain) -> bool {
        self.domain(domain).is_some_and(|usage| usage.loaded)
    }

    pub fn domain(&self, domain: Domain) -> Option<&DomainUsage> {
        self.domains.iter().find(|usage| usage.domain == domain)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainUsage {
    pub domain: Domain,
    pub model_id: String,
    pub state: ModelState,
    pub loaded: bool,
    pub estimated_mb: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled_reason: Option<String>,
}
