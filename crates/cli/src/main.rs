use anyhow::{bail, Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use codeintel_code_chunker::{Language, SourceUnit};
use codeintel_embeddings::{DualEmbeddingService, EmbeddingMode, ModelsManifest};
use codeintel_indexer::{CodeIntelPipeline, FileScanner, PipelineConfig, RunStats};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "codeintel")]
#[command(about = "Chunk, annotate and embed source code", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline over files or directories, one JSON record per chunk
    Process(ProcessArgs),

    /// Validate configuration and print the effective config as TOML
    #[command(name = "check-config")]
    CheckConfig(CheckConfigArgs),
}

#[derive(Args)]
struct ProcessArgs {
    /// Files or directories to process
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Declared language of every file (default: from the extension)
    #[arg(long)]
    language: Option<String>,

    #[command(flatten)]
    config: ConfigArgs,

    /// Include embedding vectors in the output
    #[arg(long)]
    with_vectors: bool,

    /// Print the memory usage snapshot after processing
    #[arg(long)]
    usage: bool,
}

#[derive(Args)]
struct CheckConfigArgs {
    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Args)]
struct ConfigArgs {
    /// Pipeline config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the embedding backend
    #[arg(long, value_enum)]
    embed_mode: Option<EmbedMode>,

    /// Model directory (overrides CODEINTEL_MODEL_DIR)
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// RAM budget for loaded models, in MB
    #[arg(long)]
    ram_budget_mb: Option<u64>,
}

#[derive(Copy, Clone, ValueEnum)]
enum EmbedMode {
    Stub,
    Onnx,
}

impl EmbedMode {
    const fn as_mode(self) -> EmbeddingMode {
        match self {
            Self::Stub => EmbeddingMode::Stub,
            Self::Onnx => EmbeddingMode::Onnx,
        }
    }
}

impl ConfigArgs {
    /// File (or defaults), then environment, then flags
    fn resolve(&self) -> Result<PipelineConfig> {
        let config = match &self.config {
            Some(path) => PipelineConfig::load(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        let mut config = config
            .with_env_overrides()
            .context("Invalid environment override")?;

        if let Some(mode) = self.embed_mode {
            config.embeddings.mode = mode.as_mode();
        }
        if let Some(dir) = &self.model_dir {
            config.embeddings.model_dir = Some(dir.clone());
        }
        if let Some(mb) = self.ram_budget_mb {
            config.embeddings.ram_budget_mb = mb;
        }
        Ok(config)
    }
}

#[derive(Serialize)]
struct UsageLine<'a> {
    usage: &'a codeintel_embeddings::UsageSnapshot,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // ort logs every session option at info
    if !cli.verbose {
        builder.filter_module("ort", log::LevelFilter::Off);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Process(args) => run_process(args).await,
        Commands::CheckConfig(args) => run_check_config(&args),
    }
}

async fn run_process(args: ProcessArgs) -> Result<()> {
    let config = args.config.resolve()?;
    let declared = match &args.language {
        Some(tag) => match Language::from_tag(tag) {
            Language::Unknown => bail!("Unknown language '{tag}'"),
            language => Some(language),
        },
        None => None,
    };
    let units = collect_units(&args.paths, declared)?;
    if units.is_empty() {
        log::warn!("No source files found");
    }

    let service = DualEmbeddingService::new(config.embeddings.clone())
        .context("Failed to start the embedding service")?;
    let service = DualEmbeddingService::install_global(service)?;
    let pipeline = CodeIntelPipeline::with_service(config, service)?;

    let outcome = emit_reports(&pipeline, units, args.with_vectors, args.usage).await;
    if let Some(service) = DualEmbeddingService::shutdown_global() {
        log::debug!("Embedding service released ({:?})", service);
    }

    let (total, failed) = outcome?;
    if failed > 0 {
        bail!("{failed} of {total} source units failed");
    }
    Ok(())
}

/// Print every record as a JSON line; returns (units, failed units)
async fn emit_reports(
    pipeline: &CodeIntelPipeline,
    units: Vec<SourceUnit>,
    with_vectors: bool,
    usage: bool,
) -> Result<(usize, usize)> {
    let total = units.len();
    let reports = pipeline.process_many(units).await;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut stats = RunStats::new();
    let mut failed = 0usize;
    for report in reports {
        let mut report = match report {
            Ok(report) => report,
            Err(e) => {
                log::error!("{e}");
                failed += 1;
                continue;
            }
        };
        stats.merge(&report.stats);
        for record in &mut report.records {
            if !with_vectors {
                record.vector = None;
            }
            serde_json::to_writer(&mut out, record)?;
            writeln!(out)?;
        }
    }

    if usage {
        serde_json::to_writer(
            &mut out,
            &UsageLine {
                usage: &pipeline.usage_snapshot(),
            },
        )?;
        writeln!(out)?;
    }
    out.flush()?;

    log::info!(
        "Processed {} units: {} chunks, {} embedded, {} with failed metadata, {} without vectors ({}ms)",
        stats.units,
        stats.chunks,
        stats.embedded,
        stats.metadata_failures,
        stats.total_embedding_failures(),
        stats.time_ms
    );
    Ok((total, failed))
}

fn collect_units(paths: &[PathBuf], declared: Option<Language>) -> Result<Vec<SourceUnit>> {
    let mut units = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found = FileScanner::new(path)
                .scan_units()
                .with_context(|| format!("Failed to scan {}", path.display()))?;
            if let Some(language) = declared {
                for unit in &mut found {
                    unit.language = language;
                }
            }
            units.extend(found);
        } else {
            units.push(read_unit(path, declared)?);
        }
    }
    Ok(units)
}

fn read_unit(path: &Path, declared: Option<Language>) -> Result<SourceUnit> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_id = path.display().to_string();
    Ok(match declared {
        Some(language) => SourceUnit::new(file_id, text, language),
        None => SourceUnit::from_path(file_id, text),
    })
}

fn run_check_config(args: &CheckConfigArgs) -> Result<()> {
    let config = args.config.resolve()?;
    config.validate().context("Invalid configuration")?;

    let model_dir = config.embeddings.resolve_model_dir();
    if let Some(manifest) = ModelsManifest::load(&model_dir)
        .with_context(|| format!("Invalid models manifest in {}", model_dir.display()))?
    {
        manifest
            .check_dimensions(&config.embeddings)
            .context("Configured dimensions disagree with the models manifest")?;
    }

    print!("{}", config.to_toml_string()?);
    Ok(())
}
