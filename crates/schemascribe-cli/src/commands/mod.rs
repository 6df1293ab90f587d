pub mod batch;
pub mod compile;
pub mod enrich;
pub mod inspect;
pub mod tracker;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use schemascribe_core::config::{read_config, ScribeConfig};
use schemascribe_core::enrich::{Enricher, EnrichmentStrategy};
use schemascribe_core::llm::cache::default_cache_dir;
use schemascribe_core::llm::{CachingGenerator, LlmProvider, PromptTemplates};
use schemascribe_core::schema::TableSchema;
use schemascribe_core::storage::{BlobStore, LocalBlobStore};

use crate::args::LlmArgs;

pub type Generator = CachingGenerator<LlmProvider>;

/// Load schemascribe.toml if present, otherwise defaults.
pub fn load_config(dir: &Path) -> Result<ScribeConfig> {
    Ok(read_config(dir)?.unwrap_or_default())
}

/// Blob store rooted at the config directory, so relative locations in the
/// config resolve against it.
pub fn open_store(config: &ScribeConfig, config_dir: &Path) -> Arc<dyn BlobStore> {
    let root = config
        .config_dir
        .clone()
        .unwrap_or_else(|| config_dir.to_path_buf());
    Arc::new(LocalBlobStore::new(root))
}

pub fn read_schema(store: &dyn BlobStore, location: &str) -> Result<TableSchema> {
    let content = store
        .read(location)?
        .with_context(|| format!("Schema file not found: {}", location))?;
    Ok(TableSchema::from_json(&content, location)?)
}

/// Build the enricher from config with CLI overrides applied.
pub fn build_enricher(
    config: &ScribeConfig,
    store: &dyn BlobStore,
    args: &LlmArgs,
) -> Result<Enricher<Generator>> {
    let model = args.model.as_deref().or(config.llm.model.as_deref());
    let provider = LlmProvider::from_env(model)?;
    tracing::info!(
        provider = provider.provider_name(),
        model = provider.model(),
        "Using LLM provider"
    );

    let cache_dir = config
        .llm
        .cache_dir
        .as_ref()
        .map(PathBuf::from)
        .or_else(default_cache_dir);
    let generator = match cache_dir {
        Some(dir) if config.cache_enabled() && !args.no_cache => {
            let namespace = format!("{}:{}", provider.provider_name(), provider.model());
            CachingGenerator::new(provider, namespace, dir)
        }
        _ => CachingGenerator::passthrough(provider),
    };

    let chunk_size = args.chunk_size.unwrap_or_else(|| config.chunk_size());
    let max_concurrency = args.max_concurrency.unwrap_or_else(|| config.max_concurrency());
    anyhow::ensure!(chunk_size >= 1, "--chunk-size must be at least 1");
    anyhow::ensure!(max_concurrency >= 1, "--max-concurrency must be at least 1");

    let strategy = if args.sequential {
        EnrichmentStrategy::Sequential
    } else {
        match config.strategy()? {
            EnrichmentStrategy::Sequential => EnrichmentStrategy::Sequential,
            EnrichmentStrategy::Concurrent { .. } => {
                EnrichmentStrategy::Concurrent { max_concurrency }
            }
        }
    };

    let prompts_dir = args.prompts_dir.as_deref().or(config.prompts.dir.as_deref());
    let templates = match prompts_dir {
        Some(dir) => PromptTemplates::load(store, dir)
            .with_context(|| format!("Failed to load prompt templates from {}", dir))?,
        None => PromptTemplates::builtin(),
    };

    Ok(Enricher::new(Arc::new(generator))
        .with_templates(templates)
        .with_chunk_size(chunk_size)
        .with_strategy(strategy))
}

pub fn spinner(prefix: &str, message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} [{prefix}] {msg}")?);
    pb.set_prefix(prefix.to_string());
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}
