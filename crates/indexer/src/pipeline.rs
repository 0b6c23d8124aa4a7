use crate::config::PipelineConfig;
use crate::error::{IndexerError, Result};
use crate::record::{AnalyzedUnit, EnrichedChunk, UnitReport};
use crate::sink::ChunkSink;
use crate::stats::RunStats;
use codeintel_code_chunker::{ChunkExtractor, ChunkStatus, Domain, SourceUnit};
use codeintel_embeddings::{DualEmbeddingService, UsageSnapshot};
use codeintel_metadata::{MetadataExtractor, ModuleImportIndex};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Parse → chunk → metadata → embed, per source unit
///
/// Cheap to clone; clones share the embedding service and the unit semaphore.
#[derive(Clone)]
pub struct CodeIntelPipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    config: PipelineConfig,
    chunker: ChunkExtractor,
    metadata: MetadataExtractor,
    embeddings: Arc<DualEmbeddingService>,
    units: Arc<Semaphore>,
}

impl std::fmt::Debug for CodeIntelPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeIntelPipeline")
            .field("config", &self.inner.config)
            .field("embeddings", &self.inner.embeddings)
            .finish()
    }
}

impl CodeIntelPipeline {
    /// Validate `config` and start an embedding service for it
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let embeddings = DualEmbeddingService::new(config.embeddings.clone())?;
        Self::with_service(config, Arc::new(embeddings))
    }

    /// Share an existing embedding service (e.g. the process-wide one)
    pub fn with_service(config: PipelineConfig, embeddings: Arc<DualEmbeddingService>) -> Result<Self> {
        config.validate()?;
        let chunker = ChunkExtractor::new(config.chunker.clone())?;
        let metadata = MetadataExtractor::from_config(&config.chunker);
        let units = Arc::new(Semaphore::new(config.max_parallel_units));
        Ok(Self {
            inner: Arc::new(PipelineInner {
                config,
                chunker,
                metadata,
                embeddings,
                units,
            }),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    pub fn embeddings(&self) -> &Arc<DualEmbeddingService> {
        &self.inner.embeddings
    }

    /// Parse, chunk and extract metadata of one unit
    ///
    /// The import index is built once from the unit's tree and shared read-only by
    /// every chunk; chunks are enriched on the rayon pool when `parallel_metadata` is set.
    pub fn analyze(&self, unit: &SourceUnit) -> AnalyzedUnit {
        let started = Instant::now();
        let mut stats = RunStats::new();
        stats.add_unit(unit.language.as_str());

        let outcome = self.inner.chunker.chunk_unit(unit);
        if outcome.fallback_used {
            stats.fallback_units += 1;
        }
        if let Some(err) = &outcome.parse_error {
            stats.add_parse_error(&unit.file_id, err);
        }

        let tree = outcome.tree.as_ref();
        let index = match tree {
            Some(tree) => {
                stats.import_index_builds += 1;
                ModuleImportIndex::build(tree)
            }
            None => ModuleImportIndex::empty(),
        };
        stats.syntax_nodes_visited += index.traversed_nodes();

        let mut chunks = outcome.chunks;
        let extractor = self.inner.metadata;
        let visited: Vec<codeintel_code_chunker::Result<usize>> =
            if self.inner.config.parallel_metadata && chunks.len() > 1 {
                chunks
                    .par_iter_mut()
                    .map(|chunk| extractor.enrich(chunk, tree, &index))
                    .collect()
            } else {
                chunks
                    .iter_mut()
                    .map(|chunk| extractor.enrich(chunk, tree, &index))
                    .collect()
            };
        for result in visited {
            match result {
                Ok(nodes) => stats.syntax_nodes_visited += nodes,
                Err(e) => log::warn!("Chunk of {} kept without metadata: {e}", unit.file_id),
            }
        }

        stats.chunks = chunks.len();
        for chunk in &chunks {
            if chunk.status() == ChunkStatus::MetadataFailed {
                stats.metadata_failures += 1;
            }
            if let Some(metadata) = &chunk.metadata {
                stats.facet_failures += metadata.failed_facets.len();
            }
        }
        stats.time_ms = elapsed_ms(started);

        log::debug!(
            "Analyzed {}: {} chunks, {} with failed facets, {} nodes visited",
            unit.file_id,
            stats.chunks,
            stats.metadata_failures,
            stats.syntax_nodes_visited
        );

        AnalyzedUnit {
            file_id: unit.file_id.clone(),
            language: unit.language,
            chunks,
            stats,
        }
    }

    /// Analyze on the blocking pool, then embed every chunk with its domain's model
    ///
    /// A domain that cannot embed does not drop its chunks: they are emitted with their
    /// metadata status and the embedding error.
    pub async fn process(&self, unit: SourceUnit) -> Result<UnitReport> {
        let started = Instant::now();
        let _permit = Arc::clone(&self.inner.units)
            .acquire_owned()
            .await
            .map_err(|e| IndexerError::Other(format!("unit semaphore closed: {e}")))?;

        let pipeline = self.clone();
        let analyzed = tokio::task::spawn_blocking(move || pipeline.analyze(&unit))
            .await
            .map_err(|e| IndexerError::Other(format!("analysis task failed: {e}")))?;

        let mut report = self.embed(analyzed).await;
        report.stats.time_ms = elapsed_ms(started);
        Ok(report)
    }

    /// Process units concurrently; results come back in input order
    pub async fn process_many(&self, units: Vec<SourceUnit>) -> Vec<Result<UnitReport>> {
        let handles: Vec<_> = units
            .into_iter()
            .map(|unit| {
                let file_id = unit.file_id.clone();
                let pipeline = self.clone();
                (file_id, tokio::spawn(async move { pipeline.process(unit).await }))
            })
            .collect();

        let mut reports = Vec::with_capacity(handles.len());
        for (file_id, handle) in handles {
            let report = match handle.await {
                Ok(report) => report,
                Err(e) => Err(IndexerError::Other(format!("processing {file_id} failed: {e}"))),
            };
            if let Err(e) = &report {
                log::warn!("Unit {file_id} failed: {e}");
            }
            reports.push(report);
        }
        reports
    }

    /// Process one unit and hand every embedded chunk to `sink`
    ///
    /// Sink errors are counted in `sink_failures`; the remaining records are still offered.
    pub async fn process_into(&self, unit: SourceUnit, sink: &dyn ChunkSink) -> Result<RunStats> {
        let report = self.process(unit).await?;
        let mut stats = report.stats;
        for record in &report.records {
            let (Some(metadata), Some(vector)) = (record.metadata(), record.vector.as_deref()) else {
                continue;
            };
            if let Err(e) = sink.accept(&record.chunk, metadata, vector).await {
                log::warn!("Sink rejected {}: {e}", record.chunk.qualified_name);
                stats.sink_failures += 1;
            }
        }
        Ok(stats)
    }

    pub fn usage_snapshot(&self) -> UsageSnapshot {
        self.inner.embeddings.usage_snapshot()
    }

    async fn embed(&self, analyzed: AnalyzedUnit) -> UnitReport {
        let AnalyzedUnit {
            file_id,
            language,
            chunks,
            mut stats,
        } = analyzed;
        let mut records: Vec<EnrichedChunk> = chunks.into_iter().map(EnrichedChunk::new).collect();

        for domain in Domain::ALL {
            let positions: Vec<usize> = records
                .iter()
                .enumerate()
                .filter(|(_, record)| record.chunk.domain == domain)
                .map(|(position, _)| position)
                .collect();
            if positions.is_empty() {
                continue;
            }

            let texts = positions
                .iter()
                .map(|&position| records[position].chunk.text.clone())
                .collect();
            match self.inner.embeddings.embed_batch(texts, domain).await {
                Ok(vectors) => {
                    for (position, vector) in positions.into_iter().zip(vectors) {
                        let record = &mut records[position];
                        match record.chunk.mark_embedded() {
                            Ok(()) => {
                                record.vector = Some(vector);
                                stats.embedded += 1;
                            }
                            Err(e) => {
                                log::warn!("{}: {e}", record.chunk.qualified_name);
                                record.embedding_error = Some(e.to_string());
                                stats.add_embedding_failures(domain, 1);
                            }
                        }
                    }
                }
                Err(e) => {
                    log::warn!("No {domain} vectors for {file_id}: {e}");
                    let reason = e.to_string();
                    stats.add_embedding_failures(domain, positions.len());
                    for position in positions {
                        records[position].embedding_error = Some(reason.clone());
                    }
                }
            }
        }

        UnitReport {
            file_id,
            language,
            records,
            stats,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
