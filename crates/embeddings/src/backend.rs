use crate::config::DomainModelConfig;
use crate::error::{EmbeddingError, Result};
use codeintel_code_chunker::Domain;
use std::sync::Arc;

/// A loaded model turning texts into vectors
///
/// Calls block; the service runs them on the blocking pool.
pub trait EmbeddingBackend: Send + Sync {
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Produces the backend of a domain; runs once per domain on the blocking pool
pub trait ModelLoader: Send + Sync {
    fn load(&self, domain: Domain, config: &DomainModelConfig) -> Result<Arc<dyn EmbeddingBackend>>;
}

/// Deterministic hash-seeded unit vectors
#[derive(Debug, Clone)]
pub struct StubBackend {
    model_id: String,
    dimension: usize,
}

impl StubBackend {
    pub fn new(model_id: impl Into<String>, dimension: usize) -> Self {
        Self {
            model_id: model_id.into(),
            dimension,
        }
    }
}

impl EmbeddingBackend for StubBackend {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| stub_embed(&self.model_id, text, self.dimension))
            .collect())
    }
}

/// Loader for [`StubBackend`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct StubLoader;

impl ModelLoader for StubLoader {
    fn load(&self, domain: Domain, config: &DomainModelConfig) -> Result<Arc<dyn EmbeddingBackend>> {
        log::debug!("Using stub embeddings for the {domain} domain ({})", config.model_id);
        Ok(Arc::new(StubBackend::new(
            config.model_id.clone(),
            config.dimension,
        )))
    }
}

fn stub_embed(model_id: &str, text: &str, dimension: usize) -> Vec<f32> {
    let mut state = fnv1a_64(text.as_bytes())
        ^ fnv1a_64(model_id.as_bytes()).rotate_left(17)
        ^ (dimension as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut vec = Vec::with_capacity(dimension);
    for _ in 0..dimension {
        let bits = splitmix64(&mut state);
        let high = (bits >> 32) as u32;
        let mantissa = high >> 9;
        let unit = f32::from_bits(0x3f80_0000 | mantissa) - 1.0;
        vec.push(unit.mul_add(2.0, -1.0));
    }
    normalize(&mut vec);
    vec
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

pub(crate) fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

pub(crate) const fn ensure_dimension(vec: &[f32], expected: usize) -> Result<()> {
    if vec.len() != expected {
        return Err(EmbeddingError::InvalidDimension {
            expected,
            actual: vec.len(),
        });
    }
    Ok(())
}

#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
