//! End-to-end runs over the in-memory blob store with scripted generators.

use std::sync::Arc;
use std::time::Duration;

use schemascribe_core::ddl::DdlMode;
use schemascribe_core::enrich::{Enricher, EnrichmentStrategy, PromptContext};
use schemascribe_core::llm::TextGenerator;
use schemascribe_core::pipeline::{run_batch, run_table, PipelineContext};
use schemascribe_core::schema::{FileSchemaSource, TableSchema};
use schemascribe_core::storage::BlobStore;
use schemascribe_core::tracker::BatchTracker;
use schemascribe_testutil::{
    flat_schema, patient_schema, DescribingGenerator, FailingGenerator, MemoryBlobStore,
};

fn context<G: TextGenerator + 'static>(
    store: Arc<MemoryBlobStore>,
    generator: Arc<G>,
    mode: DdlMode,
) -> PipelineContext<G> {
    let store: Arc<dyn BlobStore> = store;
    PipelineContext {
        enricher: Enricher::new(generator).with_chunk_size(3),
        source: Arc::new(FileSchemaSource::new(store.clone(), "schemas")),
        store,
        project: "proj".to_string(),
        dataset: "fhir".to_string(),
        resource_prefix: "fhir_".to_string(),
        output_dir: "out".to_string(),
        mode,
    }
}

fn store_with_patient() -> Arc<MemoryBlobStore> {
    Arc::new(MemoryBlobStore::with_objects([(
        "schemas/fhir_patient.json",
        patient_schema().to_json_pretty().unwrap(),
    )]))
}

#[tokio::test]
async fn test_create_ddl_for_patient() {
    let store = store_with_patient();
    let ctx = context(store.clone(), Arc::new(DescribingGenerator::new()), DdlMode::Create);

    let outcome = run_table(&ctx, "fhir_patient").await.unwrap();
    assert_eq!(outcome.chunks_total, 3);
    assert_eq!(outcome.chunks_failed, 0);

    let ddl = store.get("out/fhir_patient.sql").unwrap();
    assert!(ddl.starts_with("CREATE OR REPLACE TABLE `proj.fhir.fhir_patient` (\n"));
    assert!(ddl.contains("id STRING OPTIONS(description='id description')"));
    assert!(ddl.contains(
        "name ARRAY<STRUCT<use STRING OPTIONS(description='use description'), \
         family STRING OPTIONS(description='family description'), \
         given ARRAY<STRING> OPTIONS(description='given description')>>"
    ));
    assert!(ddl.contains("multipleBirthInteger INT64"));
    assert!(!ddl.contains("STRUCT<>"));
    assert!(!ddl.contains("contained"));
    assert!(!ddl.contains("extension"));
    assert!(ddl.ends_with(
        "OPTIONS(description=\"Demographics and administrative information.\");"
    ));
}

#[tokio::test]
async fn test_enriched_schema_keeps_structure() {
    let store = store_with_patient();
    let ctx = context(store.clone(), Arc::new(DescribingGenerator::new()), DdlMode::Create);
    run_table(&ctx, "fhir_patient").await.unwrap();

    let enriched =
        TableSchema::from_json(&store.get("out/fhir_patient.enriched.json").unwrap(), "out")
            .unwrap();
    let original = patient_schema();

    // Enrichment never filters: empty RECORDs only disappear from the DDL.
    assert_eq!(enriched.field_count(), original.field_count());
    let names: Vec<&str> = enriched.fields.iter().map(|f| f.name.as_str()).collect();
    let expected: Vec<&str> = original.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, expected);
    assert_eq!(enriched.described_count(), enriched.field_count());
}

#[tokio::test]
async fn test_alter_ddl_for_patient() {
    let store = store_with_patient();
    let ctx = context(store.clone(), Arc::new(DescribingGenerator::new()), DdlMode::Alter);
    run_table(&ctx, "fhir_patient").await.unwrap();

    let ddl = store.get("out/fhir_patient.sql").unwrap();
    let statements: Vec<&str> = ddl.split('\n').filter(|l| l.starts_with("ALTER TABLE")).collect();
    assert_eq!(statements.len(), 2);
    assert!(ddl.contains("ALTER COLUMN id SET OPTIONS(description=\"id description\")"));
    assert!(!ddl.contains("ALTER COLUMN name "));
    assert!(!ddl.contains("ALTER COLUMN meta "));
    assert_eq!(ddl.matches("ALTER COLUMN").count(), 6);
}

#[tokio::test]
async fn test_table_description_failure_is_recoverable() {
    let store = store_with_patient();
    let generator = Arc::new(DescribingGenerator::new().without_table_description());
    let ctx = context(store.clone(), generator, DdlMode::Create);

    let outcome = run_table(&ctx, "fhir_patient").await.unwrap();
    assert!(!outcome.has_table_description);
    let ddl = store.get("out/fhir_patient.sql").unwrap();
    assert!(ddl.ends_with("\n);"));
}

#[tokio::test]
async fn test_all_chunks_failing_still_compiles() {
    let store = store_with_patient();
    let ctx = context(store.clone(), Arc::new(FailingGenerator), DdlMode::Create);

    let outcome = run_table(&ctx, "fhir_patient").await.unwrap();
    assert_eq!(outcome.chunks_failed, outcome.chunks_total);
    assert_eq!(outcome.fields_described, 0);

    let ddl = store.get("out/fhir_patient.sql").unwrap();
    assert!(!ddl.contains("OPTIONS"));
    assert!(ddl.contains("id STRING"));
}

#[tokio::test]
async fn test_order_preserved_with_slow_first_chunk() {
    let schema = flat_schema(20);
    let generator = Arc::new(
        DescribingGenerator::new()
            .delay_chunk_with("f0", Duration::from_millis(80))
            .delay_chunk_with("f10", Duration::from_millis(40)),
    );
    let enricher = Enricher::new(generator)
        .with_chunk_size(5)
        .with_strategy(EnrichmentStrategy::Concurrent { max_concurrency: 4 });

    let enriched = enricher.enrich(&schema, &PromptContext::new("patient")).await;

    for (i, field) in enriched.schema.fields.iter().enumerate() {
        assert_eq!(field.name, format!("f{}", i));
        assert_eq!(
            field.description.as_deref(),
            Some(format!("f{} description", i).as_str())
        );
    }
}

#[tokio::test]
async fn test_partial_failure_isolated_to_chunk() {
    let schema = flat_schema(9);
    let generator = Arc::new(
        DescribingGenerator::new()
            .fail_chunk_with("f3")
            .garble_chunk_with("f6"),
    );
    let enricher = Enricher::new(generator).with_chunk_size(3);

    let enriched = enricher.enrich(&schema, &PromptContext::new("patient")).await;

    assert_eq!(enriched.report.chunks_failed(), 2);
    let failed: Vec<usize> = enriched.report.failures.iter().map(|f| f.index).collect();
    assert_eq!(failed, vec![1, 2]);
    assert_eq!(enriched.schema.described_count(), 3);
    assert_eq!(enriched.schema.fields[3..], schema.fields[3..]);
}

#[tokio::test]
async fn test_strategies_agree() {
    let schema = patient_schema();
    let ctx = PromptContext::new("patient");

    let sequential = Enricher::new(Arc::new(DescribingGenerator::new()))
        .with_chunk_size(2)
        .with_strategy(EnrichmentStrategy::Sequential)
        .enrich(&schema, &ctx)
        .await;
    let concurrent = Enricher::new(Arc::new(
        DescribingGenerator::new().delay_chunk_with("id", Duration::from_millis(30)),
    ))
    .with_chunk_size(2)
    .enrich(&schema, &ctx)
    .await;

    assert_eq!(sequential.schema, concurrent.schema);
}

#[tokio::test]
async fn test_batch_resume_after_failure() {
    let store = Arc::new(MemoryBlobStore::with_objects([
        ("schemas/fhir_a.json", flat_schema(2).to_json_pretty().unwrap()),
        ("schemas/fhir_b.json", flat_schema(2).to_json_pretty().unwrap()),
    ]));
    let tables = vec!["fhir_a".to_string(), "fhir_b".to_string(), "fhir_c".to_string()];
    let tracker = BatchTracker::new(store.clone(), "out/tracker.ndjson");

    // First run: fhir_c has no schema yet.
    let generator = Arc::new(DescribingGenerator::new());
    let ctx = context(store.clone(), generator.clone(), DdlMode::Create);
    let first = run_batch(&ctx, &tables, &tracker).await.unwrap();
    assert_eq!(first.processed.len(), 2);
    assert_eq!(first.failed.len(), 1);
    assert!(!first.tracker_cleared);
    assert!(store.get("out/tracker.ndjson").is_some());

    // Second run: only fhir_c is attempted.
    store
        .write("schemas/fhir_c.json", &flat_schema(1).to_json_pretty().unwrap())
        .unwrap();
    let second_gen = Arc::new(DescribingGenerator::new());
    let ctx = context(store.clone(), second_gen.clone(), DdlMode::Create);
    let second = run_batch(&ctx, &tables, &tracker).await.unwrap();

    assert_eq!(second.skipped, vec!["fhir_a".to_string(), "fhir_b".to_string()]);
    assert_eq!(second.processed.len(), 1);
    assert!(second.is_success());
    assert!(second.tracker_cleared);
    assert!(store.get("out/tracker.ndjson").is_none());
    // One table prompt plus one chunk prompt for fhir_c.
    assert_eq!(second_gen.calls(), 2);
}
