//! ONNX Runtime backend (CPU execution provider).

use crate::backend::{ensure_dimension, normalize, EmbeddingBackend, ModelLoader};
use crate::config::DomainModelConfig;
use crate::error::{EmbeddingError, Result};
use crate::manifest::{default_assets, ModelAssets, ModelsManifest};
use codeintel_code_chunker::Domain;
use ndarray::{Array, Axis, Ix2, Ix3};
use ort::execution_providers::{CPUExecutionProvider, ExecutionProvider};
use ort::session::{builder::GraphOptimizationLevel, Input, Session, SessionInputs};
use ort::tensor::TensorElementType;
use ort::value::{DynTensor, Tensor};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokenizers::{Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

/// Loads ONNX models from a model directory
#[derive(Debug, Clone)]
pub struct OnnxLoader {
    model_dir: PathBuf,
    manifest: Option<ModelsManifest>,
}

impl OnnxLoader {
    pub fn new(model_dir: PathBuf, manifest: Option<ModelsManifest>) -> Self {
        Self {
            model_dir,
            manifest,
        }
    }

    fn assets(&self, model_id: &str) -> Result<ModelAssets> {
        match &self.manifest {
            Some(manifest) => manifest.assets_for(&self.model_dir, model_id),
            None => Ok(default_assets(&self.model_dir, model_id, None, None)),
        }
    }
}

impl ModelLoader for OnnxLoader {
    fn load(&self, domain: Domain, config: &DomainModelConfig) -> Result<Arc<dyn EmbeddingBackend>> {
        let unavailable = |reason: String| EmbeddingError::ModelUnavailable { domain, reason };

        let assets = self.assets(&config.model_id).map_err(|e| unavailable(e.to_string()))?;
        if !assets.model_path.exists() || !assets.tokenizer_path.exists() {
            return Err(unavailable(format!(
                "model files for '{}' are missing (expected ONNX at {} and tokenizer at {})",
                config.model_id,
                assets.model_path.display(),
                assets.tokenizer_path.display(),
            )));
        }

        let backend = OrtBackend::new(config, &assets).map_err(unavailable)?;
        Ok(Arc::new(backend))
    }
}

struct OrtBackend {
    model_id: String,
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    max_length: usize,
    max_batch: usize,
    dimension: usize,
}

impl OrtBackend {
    fn new(config: &DomainModelConfig, assets: &ModelAssets) -> std::result::Result<Self, String> {
        if !tokenizers::utils::parallelism::is_parallelism_configured() {
            tokenizers::utils::parallelism::set_parallelism(false);
        }

        let mut tokenizer = Tokenizer::from_file(&assets.tokenizer_path)
            .map_err(|e| format!("Tokenizer load failed: {e}"))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..PaddingParams::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_length,
                ..TruncationParams::default()
            }))
            .map_err(|e| format!("Tokenizer truncation failed: {e}"))?;

        let cpu = CPUExecutionProvider::default();
        if !cpu.is_available().unwrap_or(false) {
            return Err("CPU execution provider is not available".to_string());
        }

        let (intra_threads, inter_threads) = default_ort_threads();
        let session = Session::builder()
            .map_err(|e| format!("{e}"))?
            .with_intra_threads(intra_threads)
            .map_err(|e| format!("Failed to set ORT intra threads: {e}"))?
            .with_inter_threads(inter_threads)
            .map_err(|e| format!("Failed to set ORT inter threads: {e}"))?
            .with_intra_op_spinning(false)
            .map_err(|e| format!("Failed to set ORT intra spinning: {e}"))?
            .with_inter_op_spinning(false)
            .map_err(|e| format!("Failed to set ORT inter spinning: {e}"))?
            .with_execution_providers([cpu.build()])
            .map_err(|e| format!("Failed to register CPU execution provider: {e}"))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| format!("Failed to set optimization level: {e}"))?
            .commit_from_file(&assets.model_path)
            .map_err(|e| format!("Failed to load ONNX model: {e}"))?;

        Ok(Self {
            model_id: config.model_id.clone(),
            session: Mutex::new(session),
            tokenizer,
            max_length: config.max_length,
            max_batch: config.max_batch,
            dimension: config.dimension,
        })
    }

    fn run_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(batch.to_vec(), true)
            .map_err(|e| EmbeddingError::inference(format!("Tokenization failed: {e}")))?;
        if encodings.is_empty() {
            return Ok(Vec::new());
        }

        let seq_len = encodings[0].len();
        if seq_len > self.max_length {
            return Err(EmbeddingError::inference(format!(
                "Tokenized length {seq_len} exceeds max_length {}",
                self.max_length
            )));
        }
        if encodings.iter().any(|e| e.len() != seq_len) {
            return Err(EmbeddingError::inference(
                "Inconsistent sequence lengths after padding",
            ));
        }
        let (ids, masks, type_ids, mask_rows) = build_flat_tensors(&encodings, seq_len);

        let shape = (batch.len(), seq_len);
        let ids_array = Array::from_shape_vec(shape, ids)
            .map_err(|e| EmbeddingError::inference(format!("IDs shape error: {e}")))?;
        let mask_array = Array::from_shape_vec(shape, masks)
            .map_err(|e| EmbeddingError::inference(format!("Mask shape error: {e}")))?;
        let type_array = Array::from_shape_vec(shape, type_ids)
            .map_err(|e| EmbeddingError::inference(format!("Types shape error: {e}")))?;
        let ids_shape = ids_array.raw_dim().into_dyn();

        let mut available: HashMap<String, DynTensor> = HashMap::new();
        available.insert("input_ids".to_string(), tensor(ids_array.into_dyn())?);
        available.insert("attention_mask".to_string(), tensor(mask_array.into_dyn())?);
        available.insert("token_type_ids".to_string(), tensor(type_array.into_dyn())?);

        let array = {
            let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);

            let mut feed: HashMap<String, DynTensor> = HashMap::new();
            for input in &session.inputs {
                let key = input.name.clone();
                if let Some(value) = available.remove(&key) {
                    feed.insert(key, value);
                } else {
                    feed.insert(key, zero_tensor(&ids_shape, input)?);
                }
            }

            let outputs = session
                .run(SessionInputs::from(feed))
                .map_err(|e| EmbeddingError::inference(format!("ONNX forward failed: {e}")))?;
            if outputs.len() == 0 {
                return Err(EmbeddingError::inference("ONNX returned no outputs"));
            }

            outputs[0]
                .try_extract_array::<f32>()
                .map_err(|e| EmbeddingError::inference(format!("Failed to decode ONNX output: {e}")))?
                .to_owned()
        };

        embeddings_from_output(array, &mask_rows, self.dimension)
    }
}

impl EmbeddingBackend for OrtBackend {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.max_batch) {
            results.extend(self.run_batch(batch)?);
        }
        Ok(results)
    }
}

fn tensor<T: ort::tensor::PrimitiveTensorElementType + std::fmt::Debug + Clone + 'static>(
    array: ndarray::ArrayD<T>,
) -> Result<DynTensor> {
    Ok(Tensor::from_array(array)
        .map_err(|e| EmbeddingError::inference(format!("{e}")))?
        .upcast())
}

fn default_ort_threads() -> (usize, usize) {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    let intra_threads = if cpus <= 4 {
        1
    } else if cpus <= 12 {
        2
    } else if cpus <= 24 {
        3
    } else {
        4
    };

    (intra_threads, 1)
}

fn embeddings_from_output(
    array: ndarray::ArrayD<f32>,
    mask_rows: &[Vec<i64>],
    expected_dimension: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut out = Vec::new();
    match array.ndim() {
        2 => {
            let embeddings = array
                .into_dimensionality::<Ix2>()
                .map_err(|e| EmbeddingError::inference(format!("Bad output shape: {e}")))?;
            out.reserve(embeddings.len_of(Axis(0)));
            for row in embeddings.outer_iter() {
                let mut emb = row.to_vec();
                ensure_dimension(&emb, expected_dimension)?;
                normalize(&mut emb);
                out.push(emb);
            }
        }
        3 => {
            let hidden = array
                .into_dimensionality::<Ix3>()
                .map_err(|e| EmbeddingError::inference(format!("Bad output shape: {e}")))?;
            out.reserve(hidden.len_of(Axis(0)));
            for (idx, sample) in hidden.outer_iter().enumerate() {
                let attn = mask_rows
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| vec![1; sample.len_of(Axis(0))]);
                let mut emb = mean_pool(sample.view(), &attn);
                ensure_dimension(&emb, expected_dimension)?;
                normalize(&mut emb);
                out.push(emb);
            }
        }
        _ => {
            return Err(EmbeddingError::inference(format!(
                "Unexpected ONNX output dims: {:?}",
                array.shape()
            )));
        }
    }
    Ok(out)
}

fn mean_pool(sample: ndarray::ArrayView2<'_, f32>, mask: &[i64]) -> Vec<f32> {
    if sample.is_empty() {
        return vec![];
    }

    let hidden = sample.len_of(Axis(1));
    let mut sum = vec![0.0f32; hidden];
    let mut count = 0.0f32;

    for (token_idx, token) in sample.outer_iter().enumerate() {
        if *mask.get(token_idx).unwrap_or(&0) == 0 {
            continue;
        }
        count += 1.0;
        for (dim, value) in token.iter().enumerate() {
            sum[dim] += value;
        }
    }

    if count > 0.0 {
        for value in &mut sum {
            *value /= count;
        }
    }
    sum
}

fn build_flat_tensors(
    encodings: &[Encoding],
    seq_len: usize,
) -> (Vec<i64>, Vec<i64>, Vec<i64>, Vec<Vec<i64>>) {
    let mut ids = Vec::with_capacity(encodings.len() * seq_len);
    let mut masks = Vec::with_capacity(encodings.len() * seq_len);
    let mut type_ids = Vec::with_capacity(encodings.len() * seq_len);
    let mut mask_rows = Vec::with_capacity(encodings.len());

    for encoding in encodings {
        let encoding_ids = encoding.get_ids();
        let encoding_masks = encoding.get_attention_mask();
        let encoding_types = encoding.get_type_ids();

        for idx in 0..seq_len {
            ids.push(i64::from(*encoding_ids.get(idx).unwrap_or(&0)));
            masks.push(i64::from(*encoding_masks.get(idx).unwrap_or(&0)));
            type_ids.push(i64::from(*encoding_types.get(idx).unwrap_or(&0)));
        }

        mask_rows.push(
            encoding_masks
                .iter()
                .take(seq_len)
                .map(|v| i64::from(*v))
                .collect(),
        );
    }

    (ids, masks, type_ids, mask_rows)
}

fn zero_tensor(shape: &ndarray::IxDyn, input: &Input) -> Result<DynTensor> {
    match &input.input_type {
        ort::value::ValueType::Tensor { ty, .. } => match ty {
            TensorElementType::Int64 => tensor(ndarray::Array::<i64, _>::zeros(shape.clone())),
            TensorElementType::Bool => tensor(ndarray::Array::from_elem(shape.clone(), false)),
            TensorElementType::Float32 => tensor(ndarray::Array::<f32, _>::zeros(shape.clone())),
            other => Err(EmbeddingError::inference(format!(
                "Cannot synthesize zeros for tensor type {other:?} (input {})",
                input.name
            ))),
        },
        other => Err(EmbeddingError::inference(format!(
            "Unsupported input type for zero init: {other:?}"
        ))),
    }
}
