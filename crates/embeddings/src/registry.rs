use crate::backend::{EmbeddingBackend, ModelLoader};
use crate::budget::RamBudget;
use crate::config::DomainModelConfig;
use crate::error::{EmbeddingError, Result};
use codeintel_code_chunker::Domain;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;

/// Observable lifecycle of a domain model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    Unloaded,
    Loading,
    Loaded,
    /// Never loaded and not retried for the rest of the run
    Disabled,
}

enum SlotState {
    Unloaded,
    Loading,
    Loaded(Arc<dyn EmbeddingBackend>),
    Disabled(String),
}

/// Model slot of one domain: state, load lock and inference lock
pub(crate) struct DomainSlot {
    domain: Domain,
    config: DomainModelConfig,
    state: RwLock<SlotState>,
    load_lock: Arc<AsyncMutex<()>>,
    inference_lock: AsyncMutex<()>,
    loads: AtomicUsize,
}

impl DomainSlot {
    pub(crate) fn new(domain: Domain, config: DomainModelConfig) -> Self {
        Self {
            domain,
            config,
            state: RwLock::new(SlotState::Unloaded),
            load_lock: Arc::new(AsyncMutex::new(())),
            inference_lock: AsyncMutex::new(()),
            loads: AtomicUsize::new(0),
        }
    }

    pub(crate) const fn config(&self) -> &DomainModelConfig {
        &self.config
    }

    pub(crate) fn state(&self) -> ModelState {
        match &*self.read() {
            SlotState::Unloaded => ModelState::Unloaded,
            SlotState::Loading => ModelState::Loading,
            SlotState::Loaded(_) => ModelState::Loaded,
            SlotState::Disabled(_) => ModelState::Disabled,
        }
    }

    pub(crate) fn disabled_reason(&self) -> Option<String> {
        match &*self.read() {
            SlotState::Disabled(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// Number of loader invocations so far
    pub(crate) fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Loaded backend, `None` while unloaded, error once disabled
    fn ready(&self) -> Result<Option<Arc<dyn EmbeddingBackend>>> {
        match &*self.read() {
            SlotState::Loaded(backend) => Ok(Some(Arc::clone(backend))),
            SlotState::Disabled(reason) => Err(EmbeddingError::DomainDisabled {
                domain: self.domain,
                reason: reason.clone(),
            }),
            SlotState::Unloaded | SlotState::Loading => Ok(None),
        }
    }

    /// Backend of this domain, loading it on first use
    ///
    /// Concurrent first callers serialize on the load lock; whoever gets it first loads,
    /// the others find the model loaded when they get the lock. The load itself runs in a
    /// detached task that keeps the lock until it finishes, so dropping the caller never
    /// leaves a half-finished load behind. `timeout` bounds the whole call, waiting on
    /// someone else's load included; a waiter that gives up leaves that load running. If it
    /// elapses during our own load the attempt is aborted, its reservation released and the
    /// domain is back to UNLOADED.
    pub(crate) async fn acquire(
        self: &Arc<Self>,
        loader: &Arc<dyn ModelLoader>,
        budget: &Arc<RamBudget>,
        timeout: Duration,
    ) -> Result<Arc<dyn EmbeddingBackend>> {
        let deadline = deadline_after(timeout);
        if let Some(backend) = self.ready()? {
            return Ok(backend);
        }

        let guard = match tokio::time::timeout_at(
            deadline,
            Arc::clone(&self.load_lock).lock_owned(),
        )
        .await
        {
            Ok(guard) => guard,
            Err(_) => {
                log::warn!(
                    "Gave up waiting for the in-flight {} model load after {}ms",
                    self.domain,
                    timeout.as_millis()
                );
                return Err(self.timed_out(timeout));
            }
        };
        if let Some(backend) = self.ready()? {
            return Ok(backend);
        }

        let reservation = match budget.reserve(self.domain, self.config.estimated_mb) {
            Ok(reservation) => reservation,
            Err(err) => {
                log::warn!("Disabling the {} domain: {err}", self.domain);
                self.set(SlotState::Disabled(err.to_string()));
                return Err(err);
            }
        };
        self.set(SlotState::Loading);

        let slot = Arc::clone(self);
        let loader = Arc::clone(loader);
        let mut task = tokio::spawn(async move {
            let _guard = guard;
            let started = Instant::now();
            let config = slot.config.clone();
            let domain = slot.domain;
            slot.loads.fetch_add(1, Ordering::SeqCst);

            let loaded = tokio::task::spawn_blocking(move || loader.load(domain, &config))
                .await
                .map_err(|e| EmbeddingError::ModelUnavailable {
                    domain,
                    reason: format!("loader task failed: {e}"),
                })
                .and_then(|result| result)
                .and_then(|backend| slot.check_backend(backend));

            match loaded {
                Ok(backend) => {
                    reservation.commit();
                    slot.set(SlotState::Loaded(Arc::clone(&backend)));
                    log::info!(
                        "Loaded {} model '{}' (dim {}, ~{}MB) in {:.2?}",
                        domain,
                        slot.config.model_id,
                        slot.config.dimension,
                        slot.config.estimated_mb,
                        started.elapsed()
                    );
                    Ok(backend)
                }
                Err(err) => {
                    let err = if matches!(err, EmbeddingError::ModelUnavailable { .. }) {
                        err
                    } else {
                        EmbeddingError::ModelUnavailable {
                            domain,
                            reason: err.to_string(),
                        }
                    };
                    log::warn!("Disabling the {domain} domain: {err}");
                    slot.set(SlotState::Disabled(err.to_string()));
                    Err(err)
                }
            }
        });

        match tokio::time::timeout_at(deadline, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => {
                let reason = format!("load task failed: {join_err}");
                self.settle_abandoned(SlotState::Disabled(reason.clone())).await;
                Err(EmbeddingError::ModelUnavailable {
                    domain: self.domain,
                    reason,
                })
            }
            Err(_) => {
                task.abort();
                match task.await {
                    // finished right at the deadline
                    Ok(result) => result,
                    Err(_) => {
                        log::warn!(
                            "Loading the {} model timed out after {}ms",
                            self.domain,
                            timeout.as_millis()
                        );
                        self.settle_abandoned(SlotState::Unloaded).await;
                        Err(self.timed_out(timeout))
                    }
                }
            }
        }
    }

    /// Run one inference call, serialized when the domain asks for it
    pub(crate) async fn infer(
        &self,
        backend: Arc<dyn EmbeddingBackend>,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>> {
        let _serial = if self.config.serialize_inference {
            Some(self.inference_lock.lock().await)
        } else {
            None
        };

        tokio::task::spawn_blocking(move || backend.embed_batch(&texts))
            .await
            .map_err(|e| EmbeddingError::inference(format!("Join error: {e}")))?
    }

    /// Drop the loaded model; returns the memory it held
    pub(crate) fn unload(&self) -> Option<u64> {
        let mut state = self.write();
        match &*state {
            SlotState::Loaded(_) => {
                *state = SlotState::Unloaded;
                Some(self.config.estimated_mb)
            }
            _ => None,
        }
    }

    fn check_backend(&self, backend: Arc<dyn EmbeddingBackend>) -> Result<Arc<dyn EmbeddingBackend>> {
        if backend.dimension() != self.config.dimension {
            return Err(EmbeddingError::ModelUnavailable {
                domain: self.domain,
                reason: format!(
                    "model '{}' produces {}-d vectors but {} were configured",
                    backend.model_id(),
                    backend.dimension(),
                    self.config.dimension
                ),
            });
        }
        Ok(backend)
    }

    fn timed_out(&self, timeout: Duration) -> EmbeddingError {
        EmbeddingError::LoadTimeout {
            domain: self.domain,
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Clear the LOADING marker of an attempt whose task no longer runs
    async fn settle_abandoned(&self, next: SlotState) {
        let _guard = self.load_lock.lock().await;
        let mut state = self.write();
        if matches!(*state, SlotState::Loading) {
            *state = next;
        }
    }

    fn set(&self, next: SlotState) {
        *self.write() = next;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SlotState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SlotState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One deadline for the whole acquire: waiting on another caller's load and loading
fn deadline_after(timeout: Duration) -> tokio::time::Instant {
    let now = tokio::time::Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(FAR_FUTURE_SECS))
}

const FAR_FUTURE_SECS: u64 = 30 * 365 * 86_400;
