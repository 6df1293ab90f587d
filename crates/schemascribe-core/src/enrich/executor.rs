use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;
use tracing::Instrument;

use super::merge::apply_descriptions;
use crate::error::{Result, ScribeError};
use crate::ddl::escape::fit_escaped;
use crate::llm::client::TextGenerator;
use crate::llm::parse::{parse_field_response, parse_table_description, FieldDescription, ParsedChunk};
use crate::llm::prompt::PromptTemplates;
use crate::schema::chunk::{chunk_schema, Chunk, DEFAULT_CHUNK_SIZE};
use crate::schema::types::{Field, TableSchema};

/// Upper bound on any generated description, in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 1024;

/// Default number of generator calls in flight.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// How chunks are dispatched to the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentStrategy {
    Sequential,
    Concurrent { max_concurrency: usize },
}

impl Default for EnrichmentStrategy {
    fn default() -> Self {
        EnrichmentStrategy::Concurrent {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl EnrichmentStrategy {
    /// Build from the config's `strategy` string and concurrency limit.
    pub fn from_name(name: &str, max_concurrency: usize) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(EnrichmentStrategy::Sequential),
            "concurrent" => Ok(EnrichmentStrategy::Concurrent { max_concurrency }),
            other => Err(ScribeError::Config {
                message: format!(
                    "Unknown enrichment strategy '{}'. Expected 'sequential' or 'concurrent'",
                    other
                ),
            }),
        }
    }
}

/// Table-level context handed to every prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub resource: String,
    pub max_description_length: usize,
}

impl PromptContext {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            max_description_length: MAX_DESCRIPTION_LENGTH,
        }
    }
}

/// A chunk that contributed no descriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFailure {
    pub index: usize,
    pub reason: String,
}

/// What happened during one `enrich` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub chunks_total: usize,
    pub failures: Vec<ChunkFailure>,
    pub descriptions_applied: usize,
}

impl EnrichmentReport {
    pub fn chunks_failed(&self) -> usize {
        self.failures.len()
    }

    pub fn chunks_succeeded(&self) -> usize {
        self.chunks_total - self.failures.len()
    }

    /// Every chunk of a non-empty schema failed.
    pub fn no_descriptions_generated(&self) -> bool {
        self.chunks_total > 0 && self.failures.len() == self.chunks_total
    }
}

/// An enriched copy of the input plus the report. When chunks failed the
/// schema is partial: those fields are exactly as in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedSchema {
    pub schema: TableSchema,
    pub report: EnrichmentReport,
}

type ChunkOutcome = std::result::Result<Vec<FieldDescription>, String>;

/// Chunks a schema, fans the chunks out to a [`TextGenerator`] and merges
/// the descriptions back in schema order.
pub struct Enricher<G> {
    generator: Arc<G>,
    templates: Arc<PromptTemplates>,
    chunk_size: usize,
    strategy: EnrichmentStrategy,
}

impl<G: TextGenerator + 'static> Enricher<G> {
    pub fn new(generator: Arc<G>) -> Self {
        Self {
            generator,
            templates: Arc::new(PromptTemplates::builtin()),
            chunk_size: DEFAULT_CHUNK_SIZE,
            strategy: EnrichmentStrategy::default(),
        }
    }

    pub fn with_templates(mut self, templates: PromptTemplates) -> Self {
        self.templates = Arc::new(templates);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_strategy(mut self, strategy: EnrichmentStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> EnrichmentStrategy {
        self.strategy
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Enrich `schema` with field descriptions. Never fails as a whole:
    /// failed chunks are recorded in the report and keep their input fields.
    #[tracing::instrument(skip_all, fields(resource = %ctx.resource, fields = schema.len()))]
    pub async fn enrich(&self, schema: &TableSchema, ctx: &PromptContext) -> EnrichedSchema {
        let chunks = chunk_schema(schema, self.chunk_size);
        tracing::info!(
            chunks = chunks.len(),
            strategy = ?self.strategy,
            "Enriching schema"
        );

        let outcomes = match self.strategy {
            EnrichmentStrategy::Sequential => self.run_sequential(&chunks, ctx).await,
            EnrichmentStrategy::Concurrent { max_concurrency } => {
                self.run_concurrent(&chunks, ctx, max_concurrency).await
            }
        };

        let enriched = assemble(&chunks, outcomes, ctx.max_description_length);

        if enriched.report.no_descriptions_generated() {
            tracing::warn!(
                chunks = enriched.report.chunks_total,
                "No descriptions generated: every chunk failed"
            );
        } else {
            tracing::info!(
                chunks_failed = enriched.report.chunks_failed(),
                descriptions = enriched.report.descriptions_applied,
                "Enrichment finished"
            );
        }

        enriched
    }

    /// Ask for a table-level description of `ctx.resource`.
    #[tracing::instrument(skip_all, fields(resource = %ctx.resource))]
    pub async fn describe_table(&self, ctx: &PromptContext) -> Result<String> {
        let prompt = self
            .templates
            .table_prompt(&ctx.resource, ctx.max_description_length);
        let response = self.generator.generate(&prompt).await?;

        let text = parse_table_description(&response).ok_or_else(|| ScribeError::Llm {
            message: format!("Empty table description for resource '{}'", ctx.resource),
        })?;

        let description = fit_escaped(&text, ctx.max_description_length).to_string();
        tracing::info!(chars = description.chars().count(), "Table description generated");
        Ok(description)
    }

    fn chunk_prompt(&self, chunk: &Chunk, ctx: &PromptContext) -> String {
        let prompt = self.templates.fields_prompt(
            &ctx.resource,
            ctx.max_description_length,
            &chunk.to_prompt_json(),
        );
        tracing::debug!(
            chunk = chunk.index,
            prompt_chars = prompt.chars().count(),
            "Chunk prompt built"
        );
        prompt
    }

    async fn run_sequential(&self, chunks: &[Chunk], ctx: &PromptContext) -> Vec<Option<ChunkOutcome>> {
        let mut outcomes = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let prompt = self.chunk_prompt(chunk, ctx);
            let span = tracing::info_span!("chunk", chunk = chunk.index, fields = chunk.units());
            let outcome = describe_chunk(self.generator.as_ref(), &prompt)
                .instrument(span)
                .await;
            outcomes.push(Some(outcome));
        }
        outcomes
    }

    async fn run_concurrent(
        &self,
        chunks: &[Chunk],
        ctx: &PromptContext,
        max_concurrency: usize,
    ) -> Vec<Option<ChunkOutcome>> {
        // Prompts and spans are built up front; workers pull jobs in chunk
        // order from the shared queue.
        let jobs: VecDeque<ChunkJob> = chunks
            .iter()
            .map(|chunk| ChunkJob {
                index: chunk.index,
                prompt: self.chunk_prompt(chunk, ctx),
                span: tracing::info_span!("chunk", chunk = chunk.index, fields = chunk.units()),
            })
            .collect();
        let queue = Arc::new(Mutex::new(jobs));

        let workers = max_concurrency.max(1).min(chunks.len());
        let mut join_set = JoinSet::new();
        for worker in 0..workers {
            let generator = Arc::clone(&self.generator);
            let queue = Arc::clone(&queue);
            join_set.spawn(async move {
                let mut done = Vec::new();
                loop {
                    let next = match queue.lock() {
                        Ok(mut jobs) => jobs.pop_front(),
                        Err(_) => None,
                    };
                    let Some(job) = next else { break };
                    let outcome = describe_chunk(generator.as_ref(), &job.prompt)
                        .instrument(job.span)
                        .await;
                    done.push((job.index, outcome));
                }
                tracing::debug!(worker, chunks = done.len(), "Worker drained queue");
                done
            });
        }

        // Slots are filled by chunk index, whatever order workers finish in.
        let mut outcomes: Vec<Option<ChunkOutcome>> = vec![None; chunks.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(done) => {
                    for (index, outcome) in done {
                        if let Some(slot) = outcomes.get_mut(index) {
                            *slot = Some(outcome);
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("Chunk worker did not complete: {}", e);
                }
            }
        }
        outcomes
    }
}

struct ChunkJob {
    index: usize,
    prompt: String,
    span: tracing::Span,
}

/// One generator round trip for a chunk. Failures are logged here and
/// returned as the reason string.
async fn describe_chunk<G: TextGenerator>(generator: &G, prompt: &str) -> ChunkOutcome {
    let response = match generator.generate(prompt).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Generator call failed, keeping chunk unenriched: {}", e);
            return Err(e.to_string());
        }
    };

    match parse_field_response(&response) {
        ParsedChunk::Parsed(fields) => {
            tracing::debug!(described = fields.len(), "Chunk response parsed");
            Ok(fields)
        }
        ParsedChunk::Unparsable(reason) => {
            tracing::warn!("Unparsable chunk response, keeping chunk unenriched: {}", reason);
            Err(reason)
        }
    }
}

/// Concatenate chunk results in index order onto copies of the input fields.
fn assemble(
    chunks: &[Chunk],
    outcomes: Vec<Option<ChunkOutcome>>,
    max_len: usize,
) -> EnrichedSchema {
    let mut report = EnrichmentReport {
        chunks_total: chunks.len(),
        ..Default::default()
    };
    let mut fields: Vec<Field> = Vec::with_capacity(chunks.iter().map(Chunk::units).sum());

    for (chunk, outcome) in chunks.iter().zip(outcomes) {
        match outcome {
            Some(Ok(described)) => {
                let (merged, applied) = apply_descriptions(&chunk.fields, &described, max_len);
                report.descriptions_applied += applied;
                fields.extend(merged);
            }
            Some(Err(reason)) => {
                report.failures.push(ChunkFailure {
                    index: chunk.index,
                    reason,
                });
                fields.extend(chunk.fields.iter().cloned());
            }
            None => {
                report.failures.push(ChunkFailure {
                    index: chunk.index,
                    reason: "worker task did not complete".to_string(),
                });
                fields.extend(chunk.fields.iter().cloned());
            }
        }
    }

    EnrichedSchema {
        schema: TableSchema::new(fields),
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::FieldType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Answers each field prompt by describing every field it finds in the
    /// embedded chunk as `"<name> described"`. The chunk containing
    /// `slow_field` is delayed so it finishes last.
    struct EchoGenerator {
        slow_field: Option<String>,
        fail_field: Option<String>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl EchoGenerator {
        fn new() -> Self {
            Self {
                slow_field: None,
                fail_field: None,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    fn chunk_names(prompt: &str) -> Vec<String> {
        let start = prompt.find("```json\n").map(|i| i + 8).unwrap_or(0);
        let end = prompt[start..].find("\n```").map(|i| start + i).unwrap_or(prompt.len());
        let fields: Vec<Field> = serde_json::from_str(&prompt[start..end]).unwrap_or_default();
        fields.into_iter().map(|f| f.name).collect()
    }

    impl TextGenerator for EchoGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let names = chunk_names(prompt);
            let delay = match &self.slow_field {
                Some(slow) if names.contains(slow) => 50,
                _ => 5,
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if names.is_empty() {
                return Ok("A table of things.".to_string());
            }
            if let Some(fail) = &self.fail_field {
                if names.contains(fail) {
                    return Err(ScribeError::Llm {
                        message: "boom".to_string(),
                    });
                }
            }

            let rows: Vec<serde_json::Value> = names
                .iter()
                .map(|n| serde_json::json!({"name": n, "description": format!("{} described", n)}))
                .collect();
            Ok(format!("```json\n{}\n```", serde_json::Value::Array(rows)))
        }
    }

    fn schema_of(n: usize) -> TableSchema {
        TableSchema::new(
            (0..n)
                .map(|i| Field::new(format!("f{}", i), FieldType::String))
                .collect(),
        )
    }

    fn names(schema: &TableSchema) -> Vec<&str> {
        schema.fields.iter().map(|f| f.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_order_preserved_when_first_chunk_finishes_last() {
        let mut gen = EchoGenerator::new();
        gen.slow_field = Some("f0".to_string());
        let enricher = Enricher::new(Arc::new(gen)).with_chunk_size(2);

        let schema = schema_of(7);
        let enriched = enricher.enrich(&schema, &PromptContext::new("patient")).await;

        assert_eq!(names(&enriched.schema), names(&schema));
        for field in &enriched.schema.fields {
            assert_eq!(
                field.description.as_deref(),
                Some(format!("{} described", field.name).as_str())
            );
        }
        assert_eq!(enriched.report.chunks_total, 4);
        assert_eq!(enriched.report.descriptions_applied, 7);
    }

    #[tokio::test]
    async fn test_failed_chunk_keeps_input_fields() {
        let mut gen = EchoGenerator::new();
        gen.fail_field = Some("f2".to_string());
        let enricher = Enricher::new(Arc::new(gen)).with_chunk_size(2);

        let schema = schema_of(6);
        let enriched = enricher.enrich(&schema, &PromptContext::new("patient")).await;

        assert_eq!(names(&enriched.schema), names(&schema));
        assert_eq!(enriched.report.chunks_failed(), 1);
        assert_eq!(enriched.report.failures[0].index, 1);
        assert!(enriched.schema.fields[2].description.is_none());
        assert!(enriched.schema.fields[3].description.is_none());
        assert!(enriched.schema.fields[4].has_description());
        assert!(!enriched.report.no_descriptions_generated());
    }

    #[tokio::test]
    async fn test_all_chunks_failing_reports_no_descriptions() {
        let mut gen = EchoGenerator::new();
        gen.fail_field = Some("f0".to_string());
        let enricher = Enricher::new(Arc::new(gen)).with_chunk_size(15);

        let schema = schema_of(3);
        let enriched = enricher.enrich(&schema, &PromptContext::new("patient")).await;

        assert!(enriched.report.no_descriptions_generated());
        assert_eq!(enriched.schema, schema);
    }

    #[tokio::test]
    async fn test_empty_schema_makes_no_calls() {
        let gen = Arc::new(EchoGenerator::new());
        let enricher = Enricher::new(Arc::clone(&gen));
        let enriched = enricher
            .enrich(&TableSchema::default(), &PromptContext::new("patient"))
            .await;

        assert!(enriched.schema.is_empty());
        assert_eq!(enriched.report.chunks_total, 0);
        assert!(!enriched.report.no_descriptions_generated());
        assert_eq!(gen.max_in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrency_bounded() {
        let gen = Arc::new(EchoGenerator::new());
        let enricher = Enricher::new(Arc::clone(&gen))
            .with_chunk_size(1)
            .with_strategy(EnrichmentStrategy::Concurrent { max_concurrency: 2 });

        enricher
            .enrich(&schema_of(8), &PromptContext::new("patient"))
            .await;

        let peak = gen.max_in_flight.load(Ordering::SeqCst);
        assert!(peak >= 1 && peak <= 2, "peak in flight was {}", peak);
    }

    #[tokio::test]
    async fn test_workers_capped_by_chunk_count() {
        let gen = Arc::new(EchoGenerator::new());
        let enricher = Enricher::new(Arc::clone(&gen))
            .with_chunk_size(1)
            .with_strategy(EnrichmentStrategy::Concurrent { max_concurrency: 16 });

        let enriched = enricher
            .enrich(&schema_of(3), &PromptContext::new("patient"))
            .await;

        assert!(gen.max_in_flight.load(Ordering::SeqCst) <= 3);
        assert_eq!(enriched.report.descriptions_applied, 3);
    }

    #[tokio::test]
    async fn test_single_worker_drains_every_chunk_in_order() {
        let gen = Arc::new(EchoGenerator::new());
        let enricher = Enricher::new(Arc::clone(&gen))
            .with_chunk_size(1)
            .with_strategy(EnrichmentStrategy::Concurrent { max_concurrency: 1 });

        let schema = schema_of(5);
        let enriched = enricher.enrich(&schema, &PromptContext::new("patient")).await;

        assert_eq!(gen.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(names(&enriched.schema), names(&schema));
        assert_eq!(enriched.report.descriptions_applied, 5);
    }

    #[tokio::test]
    async fn test_sequential_and_concurrent_agree() {
        let schema = schema_of(11);
        let ctx = PromptContext::new("observation");

        let sequential = Enricher::new(Arc::new(EchoGenerator::new()))
            .with_chunk_size(3)
            .with_strategy(EnrichmentStrategy::Sequential)
            .enrich(&schema, &ctx)
            .await;
        let concurrent = Enricher::new(Arc::new(EchoGenerator::new()))
            .with_chunk_size(3)
            .with_strategy(EnrichmentStrategy::Concurrent { max_concurrency: 4 })
            .enrich(&schema, &ctx)
            .await;

        assert_eq!(sequential.schema, concurrent.schema);
        assert_eq!(sequential.report, concurrent.report);
    }

    #[tokio::test]
    async fn test_describe_table() {
        let enricher = Enricher::new(Arc::new(EchoGenerator::new()));
        let description = enricher
            .describe_table(&PromptContext::new("patient"))
            .await
            .unwrap();
        assert_eq!(description, "A table of things.");
    }

    struct BackslashGenerator;

    impl TextGenerator for BackslashGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok("\\".repeat(2000))
        }
    }

    #[tokio::test]
    async fn test_table_description_bounded_after_escaping() {
        let enricher = Enricher::new(Arc::new(BackslashGenerator));
        let description = enricher
            .describe_table(&PromptContext::new("patient"))
            .await
            .unwrap();

        assert_eq!(description.chars().count(), 512);
        assert_eq!(
            crate::ddl::escape::escape_description(&description, crate::ddl::escape::Quote::Double)
                .chars()
                .count(),
            1024
        );
    }

    #[test]
    fn test_strategy_from_name() {
        assert_eq!(
            EnrichmentStrategy::from_name("Sequential", 4).unwrap(),
            EnrichmentStrategy::Sequential
        );
        assert_eq!(
            EnrichmentStrategy::from_name("concurrent", 8).unwrap(),
            EnrichmentStrategy::Concurrent { max_concurrency: 8 }
        );
        assert!(EnrichmentStrategy::from_name("parallel", 4).is_err());
    }
}
