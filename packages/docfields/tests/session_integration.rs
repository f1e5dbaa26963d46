//! Integration tests for full extraction runs.
//!
//! These tests drive `ExtractionSession` end to end through the mocks in
//! `docfields::testing`:
//! 1. Ingest a synthetic document
//! 2. Order the field set
//! 3. Retrieve, extract or compose per field
//! 4. Build, publish and serialize the results

use async_trait::async_trait;
use docfields::{
    load_field_specs,
    testing::{page_image, MockDetector, MockGenerator, MockIngestor},
    BoundingBox, CheckboxCardinality, DetectedCheckbox, ExtractionConfig, ExtractionError,
    ExtractionSession, FieldKind, FieldResult, FieldSpec, Generator, PageImage, Result,
    SummaryScope, TestScenario,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn borrower() -> FieldSpec {
    FieldSpec::new("borrower", FieldKind::KeyValue).with_description("Borrower full name")
}

#[tokio::test]
async fn test_pages_processed_in_ascending_order_and_stop_after_first_hit() {
    // Retrieval ranks page 2 first, then 1, then 3.
    let scenario = TestScenario::new()
        .with_pages(3)
        .embed_query("Borrower full name", vec![1.0, 0.0])
        .embed_page(1, vec![0.8, 0.6])
        .embed_page(2, vec![1.0, 0.0])
        .embed_page(3, vec![0.0, 1.0])
        .respond(1, "Borrower full name", r#"{"value": "Jane Doe"}"#)
        .respond(2, "Borrower full name", r#"{"value": "Someone Else"}"#)
        .respond(3, "Borrower full name", r#"{"value": "Nobody"}"#);

    let run = scenario.session().run(&[borrower()], "loan-42").await.unwrap();

    assert_eq!(scenario.generator().pages_visited("Borrower full name"), vec![1]);
    let Some(FieldResult::KeyValue(result)) = run.result("borrower") else {
        panic!("expected key-value result");
    };
    assert_eq!(result.value, "Jane Doe");
    assert_eq!(result.page_number, Some(1));
    assert_eq!(result.key, "Borrower full name");
    assert_eq!(run.page_count, 3);
}

#[tokio::test]
async fn test_multi_page_value_concatenated() {
    let scenario = TestScenario::new()
        .with_pages(3)
        .respond(1, "Property address", r#"{"value": "AB", "continue_next_page": true}"#)
        .respond(2, "Property address", r#"{"value": "CD", "continue_next_page": false}"#)
        .respond(3, "Property address", r#"{"value": "EF"}"#);

    let field = FieldSpec::new("address", FieldKind::KeyValue)
        .with_description("Property address")
        .with_pages([1, 2, 3])
        .multi_page();

    let run = scenario.session().run(&[field], "doc").await.unwrap();

    let Some(FieldResult::KeyValue(result)) = run.result("address") else {
        panic!("expected key-value result");
    };
    assert_eq!(result.value, "ABCD");
    assert_eq!(result.page_number, Some(1));
    assert_eq!(result.multipage_detail.as_ref().map(Vec::len), Some(2));
    assert_eq!(scenario.generator().pages_visited("Property address"), vec![1, 2]);
}

#[tokio::test]
async fn test_composed_summary_runs_after_dependencies() {
    let scenario = TestScenario::new()
        .with_pages(2)
        .respond(1, "Borrower full name", r#"{"value": "Jane Doe"}"#)
        .respond(
            2,
            "Loan conditions",
            r#"{"points": ["Pay on time", "Keep insurance"]}"#,
        )
        .complete("Loan overview", r#"{"summary": "Jane Doe must pay on time."}"#);

    // Declared before its dependencies on purpose
    let fields = vec![
        FieldSpec::new("overview", FieldKind::Summary)
            .with_description("Loan overview")
            .with_scope(SummaryScope::ComposedFromFields)
            .depends_on(["borrower", "conditions"]),
        borrower().with_pages([1]),
        FieldSpec::new("conditions", FieldKind::BulletPoints)
            .with_description("Loan conditions")
            .with_pages([2]),
    ];

    let run = scenario.session().run(&fields, "doc").await.unwrap();
    assert!(run.failures.is_empty());

    let order: Vec<&str> = run.registry.results().map(|r| r.field_name()).collect();
    assert_eq!(order, vec!["borrower", "conditions", "overview"]);

    let completions = scenario.generator().completions();
    assert_eq!(completions.len(), 1);
    assert!(completions[0].contains("### borrower\nJane Doe"));
    assert!(completions[0].contains("### conditions\nPay on time\nKeep insurance"));

    let Some(FieldResult::Summary(summary)) = run.result("overview") else {
        panic!("expected summary result");
    };
    assert_eq!(summary.value, "Jane Doe must pay on time.");
    assert_eq!(summary.related_fields, vec!["borrower", "conditions"]);
}

#[tokio::test]
async fn test_failed_dependency_propagates_and_independent_fields_continue() {
    let scenario = TestScenario::new()
        .with_pages(2)
        .respond(1, "Borrower full name", r#"{"value": "Jane Doe"}"#)
        .respond(2, "Loan conditions", r#"{"points": []}"#)
        .complete("Loan overview", r#"{"summary": "never used"}"#);

    let fields = vec![
        borrower().with_pages([1]),
        FieldSpec::new("conditions", FieldKind::BulletPoints)
            .with_description("Loan conditions")
            .with_pages([2]),
        FieldSpec::new("overview", FieldKind::Summary)
            .with_description("Loan overview")
            .with_scope(SummaryScope::ComposedFromFields)
            .depends_on(["conditions"]),
    ];

    let run = scenario.session().run(&fields, "doc").await.unwrap();

    assert!(run.result("borrower").is_some());
    assert!(run.result("conditions").is_none());
    assert!(run.result("overview").is_none());

    assert_eq!(run.failure("conditions").unwrap().kind, "validation");
    assert_eq!(run.failure("overview").unwrap().kind, "dependency_failed");
    assert!(scenario.generator().completions().is_empty());
}

#[tokio::test]
async fn test_empty_bullet_points_allowed_by_config() {
    let scenario = TestScenario::new()
        .with_pages(1)
        .with_config(ExtractionConfig::default().with_require_bullet_points(false))
        .respond(1, "Loan conditions", r#"{"points": []}"#);

    let field = FieldSpec::new("conditions", FieldKind::BulletPoints)
        .with_description("Loan conditions")
        .with_pages([1]);

    let run = scenario.session().run(&[field], "doc").await.unwrap();
    let Some(FieldResult::BulletPoints(result)) = run.result("conditions") else {
        panic!("expected bullet points");
    };
    assert!(result.value.is_empty());
}

#[tokio::test]
async fn test_unreadable_pages_give_empty_value() {
    let scenario = TestScenario::new()
        .with_pages(2)
        .respond(1, "Borrower full name", "Sorry, the page is blank.")
        .fail(2, "Borrower full name");

    let run = scenario
        .session()
        .run(&[borrower().with_pages([1, 2])], "doc")
        .await
        .unwrap();

    assert!(run.failures.is_empty());
    let Some(FieldResult::KeyValue(result)) = run.result("borrower") else {
        panic!("expected key-value result");
    };
    assert_eq!(result.value, "");
    assert_eq!(result.page_number, None);
}

#[tokio::test]
async fn test_checkbox_multi_with_no_selection() {
    let scenario = TestScenario::new()
        .with_pages(1)
        .respond(1, "Occupancy type", r#"{"selected_options": []}"#);

    let field = FieldSpec::new("occupancy", FieldKind::Checkbox)
        .with_description("Occupancy type")
        .with_cardinality(CheckboxCardinality::Multi)
        .with_pages([1]);

    let run = scenario.session().run(&[field], "doc").await.unwrap();
    let by_field = run.registry.by_field();
    assert_eq!(by_field["occupancy"], json!([]));
}

#[tokio::test]
async fn test_single_checkbox_flat_value_is_list() {
    let scenario = TestScenario::new()
        .with_pages(2)
        .respond(1, "Occupancy type", r#"{"selected_option": null}"#)
        .respond(2, "Loan purpose", r#"{"selected_option": "Purchase"}"#);

    let fields = vec![
        FieldSpec::new("occupancy", FieldKind::Checkbox)
            .with_description("Occupancy type")
            .with_cardinality(CheckboxCardinality::Single)
            .with_pages([1]),
        FieldSpec::new("purpose", FieldKind::Checkbox)
            .with_description("Loan purpose")
            .with_cardinality(CheckboxCardinality::Single)
            .with_pages([2]),
    ];

    let run = scenario.session().run(&fields, "doc").await.unwrap();
    let output = run.output();
    let by_field = output.by_field();
    assert_eq!(by_field["occupancy"], json!([]));
    assert_eq!(by_field["purpose"], json!(["Purchase"]));
}

#[tokio::test]
async fn test_detector_hints_reach_prompt() {
    let detector = MockDetector::new().with_detection(DetectedCheckbox {
        bounding_box: BoundingBox {
            x1: 100.0,
            y1: 220.0,
            x2: 112.0,
            y2: 232.0,
        },
        label: "Primary residence".into(),
        is_selected: true,
        confidence: 0.93,
    });
    let scenario = TestScenario::new()
        .with_pages(1)
        .with_detector(detector.clone())
        .respond(1, "Occupancy type", r#"{"selected_option": "Primary residence"}"#);

    let field = FieldSpec::new("occupancy", FieldKind::Checkbox)
        .with_description("Occupancy type")
        .with_cardinality(CheckboxCardinality::Single)
        .with_pages([1]);

    let run = scenario.session().run(&[field], "doc").await.unwrap();

    assert_eq!(detector.calls(), 1);
    let prompts: Vec<String> = scenario
        .generator()
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            docfields::testing::MockGeneratorCall::Generate { prompt, .. } => Some(prompt),
            _ => None,
        })
        .collect();
    assert!(prompts[0].contains("Primary residence at (100, 220): checked"));
    assert_eq!(run.registry.by_field()["occupancy"], json!(["Primary residence"]));
}

#[tokio::test]
async fn test_detector_failure_is_ignored() {
    let scenario = TestScenario::new()
        .with_pages(1)
        .with_detector(MockDetector::new().failing())
        .respond(1, "Occupancy type", r#"{"selected_option": "Investment"}"#);

    let field = FieldSpec::new("occupancy", FieldKind::Checkbox)
        .with_description("Occupancy type")
        .with_cardinality(CheckboxCardinality::Single)
        .with_pages([1]);

    let run = scenario.session().run(&[field], "doc").await.unwrap();
    assert_eq!(run.registry.by_field()["occupancy"], json!(["Investment"]));
}

#[tokio::test]
async fn test_whole_document_summary_scans_every_page() {
    let scenario = TestScenario::new()
        .with_pages(3)
        .respond(1, "Document summary", r#"{"summary": "Cover page.", "continue_next_page": true}"#)
        .respond(2, "Document summary", r#"{"summary": "", "continue_next_page": false}"#)
        .respond(3, "Document summary", r#"{"summary": "Signatures."}"#);

    let field = FieldSpec::new("summary", FieldKind::Summary)
        .with_description("Document summary")
        .with_scope(SummaryScope::WholeDocument)
        .multi_page();

    let run = scenario.session().run(&[field], "doc").await.unwrap();

    // Page 2 is empty, so it neither contributes nor stops the loop
    assert_eq!(scenario.generator().pages_visited("Document summary"), vec![1, 2, 3]);
    let Some(FieldResult::Summary(summary)) = run.result("summary") else {
        panic!("expected summary result");
    };
    assert_eq!(summary.value, "Cover page.\nSignatures.");
    assert_eq!(summary.page_range.map(|r| (r.start, r.end)), Some((1, 3)));
}

#[tokio::test]
async fn test_top_k_override_limits_candidates() {
    let scenario = TestScenario::new()
        .with_pages(4)
        .embed_query("Fee table", vec![1.0, 0.0])
        .embed_page(1, vec![0.0, 1.0])
        .embed_page(2, vec![0.1, 1.0])
        .embed_page(3, vec![1.0, 0.2])
        .embed_page(4, vec![1.0, 0.1])
        .respond(
            3,
            "Fee table",
            r#"{"columns": ["Fee", "Amount"], "rows": [["Origination", "500"]],
                "continue_next_page": true}"#,
        )
        .respond(4, "Fee table", r#"{"rows": [["Appraisal", "350"]]}"#);

    let field = FieldSpec::new("fees", FieldKind::Table)
        .with_description("Fee table")
        .with_extra("top_k", json!(2))
        .multi_page();

    let run = scenario.session().run(&[field], "doc").await.unwrap();

    assert_eq!(scenario.generator().pages_visited("Fee table"), vec![3, 4]);
    let Some(FieldResult::Table(table)) = run.result("fees") else {
        panic!("expected table result");
    };
    assert_eq!(table.columns, vec!["Fee", "Amount"]);
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.page_numbers, vec![3, 4]);
}

#[tokio::test]
async fn test_cycle_is_fatal() {
    let scenario = TestScenario::new().with_pages(1);
    let fields = vec![
        FieldSpec::new("a", FieldKind::Summary)
            .with_scope(SummaryScope::ComposedFromFields)
            .depends_on(["b"]),
        FieldSpec::new("b", FieldKind::Summary)
            .with_scope(SummaryScope::ComposedFromFields)
            .depends_on(["a"]),
    ];

    let err = scenario.session().run(&fields, "doc").await.unwrap_err();
    assert!(matches!(err, ExtractionError::CyclicDependency { .. }));
    assert!(err.is_fatal());
    assert!(scenario.generator().calls().is_empty());
}

#[tokio::test]
async fn test_missing_dependency_is_fatal() {
    let scenario = TestScenario::new().with_pages(1);
    let fields = vec![FieldSpec::new("a", FieldKind::Summary)
        .with_scope(SummaryScope::ComposedFromFields)
        .depends_on(["ghost"])];

    let err = scenario.session().run(&fields, "doc").await.unwrap_err();
    assert!(matches!(err, ExtractionError::MissingDependency { .. }));
}

#[tokio::test]
async fn test_invalid_spec_rejected_before_ingestion() {
    let scenario = TestScenario::new().with_pages(1);
    let fields =
        vec![FieldSpec::new("occupancy", FieldKind::Checkbox).with_description("Occupancy")];

    let err = scenario.session().run(&fields, "doc").await.unwrap_err();
    assert!(matches!(err, ExtractionError::SpecValidation { .. }));
    assert!(scenario.ingestor().ingested().is_empty());
}

#[tokio::test]
async fn test_page_numbering_gap_is_fatal() {
    let ingestor = MockIngestor::new()
        .with_page(1, page_image(1))
        .with_page(3, page_image(3));
    let session = ExtractionSession::new(
        ingestor,
        docfields::MockEmbedder::new(),
        MockGenerator::new(),
    );

    let err = session.run(&[borrower()], "doc").await.unwrap_err();
    assert!(matches!(err, ExtractionError::Ingestion(_)));
}

#[tokio::test]
async fn test_embedding_failure_is_field_level() {
    let ingestor = MockIngestor::new().with_page_count(1);
    let generator = MockGenerator::new()
        .with_page_image(1, &page_image(1))
        .with_response(1, "Loan amount", r#"{"value": "$250,000", "normalized_value": "250000"}"#);
    let session = ExtractionSession::new(
        ingestor,
        docfields::MockEmbedder::new().failing_images(),
        generator,
    );

    let fields = vec![
        borrower(),
        FieldSpec::new("amount", FieldKind::KeyValue)
            .with_description("Loan amount")
            .with_pages([1]),
    ];

    let run = session.run(&fields, "doc").await.unwrap();
    assert_eq!(run.failure("borrower").unwrap().kind, "embedding");
    let Some(FieldResult::KeyValue(amount)) = run.result("amount") else {
        panic!("expected key-value result");
    };
    assert_eq!(amount.normalized_value.as_deref(), Some("250000"));
}

/// Cancels the run's token the first time it is asked about a page.
struct CancellingGenerator {
    inner: MockGenerator,
    token: CancellationToken,
}

#[async_trait]
impl Generator for CancellingGenerator {
    async fn generate(&self, image: &PageImage, prompt: &str) -> Result<String> {
        self.token.cancel();
        self.inner.generate(image, prompt).await
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.inner.complete(prompt).await
    }
}

#[tokio::test]
async fn test_cancellation_between_fields() {
    let token = CancellationToken::new();
    let scenario = TestScenario::new()
        .with_pages(2)
        .respond(1, "Borrower full name", r#"{"value": "Jane Doe"}"#)
        .respond(2, "Loan amount", r#"{"value": "$1"}"#);
    let generator = CancellingGenerator {
        inner: scenario.generator(),
        token: token.clone(),
    };
    let session = ExtractionSession::new(scenario.ingestor(), scenario.embedder(), generator);

    let fields = vec![
        borrower().with_pages([1]),
        FieldSpec::new("amount", FieldKind::KeyValue)
            .with_description("Loan amount")
            .with_pages([2]),
    ];

    let err = session
        .run_with_cancel(&fields, "doc", &token)
        .await
        .unwrap_err();

    assert!(matches!(err, ExtractionError::Cancelled));
    // The first field finished; the second never started
    assert_eq!(scenario.generator().pages_visited("Borrower full name"), vec![1]);
    assert!(scenario.generator().pages_visited("Loan amount").is_empty());
}

#[tokio::test]
async fn test_session_reusable_across_runs() {
    let scenario = TestScenario::new()
        .with_pages(1)
        .respond(1, "Borrower full name", r#"{"value": "Jane Doe"}"#);
    let session = scenario.session();
    let fields = vec![borrower().with_pages([1])];

    let first = session.run(&fields, "doc-1").await.unwrap();
    let second = session.run(&fields, "doc-2").await.unwrap();

    assert_eq!(first.registry.len(), 1);
    assert_eq!(second.registry.len(), 1);
    assert!(second.failures.is_empty());
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(scenario.ingestor().ingested(), vec!["doc-1", "doc-2"]);
}

#[tokio::test]
async fn test_output_document_shape() {
    let scenario = TestScenario::new()
        .with_pages(2)
        .respond(1, "Borrower full name", r#"{"value": "Jane Doe"}"#)
        .respond(2, "Loan conditions", r#"{"points": []}"#);

    let fields = load_field_specs(
        r#"[
            {"field_name": "borrower", "description": "Borrower full name",
             "type": "key-value", "probable_pages": [1]},
            {"field_name": "conditions", "description": "Loan conditions",
             "type": "bullet-points", "probable_pages": [2]}
        ]"#,
    )
    .unwrap();

    let run = scenario.session().run(&fields, "doc").await.unwrap();
    let output = serde_json::to_value(run.output()).unwrap();

    assert_eq!(output["run_id"], json!(run.run_id.to_string()));
    assert_eq!(output["results"][0]["type"], "key-value");
    assert_eq!(output["results"][0]["field_name"], "borrower");
    assert_eq!(output["results"][0]["value"], "Jane Doe");
    assert_eq!(output["errors"][0]["field_name"], "conditions");
    assert_eq!(output["errors"][0]["kind"], "validation");

    let parsed: docfields::ExtractionOutput = serde_json::from_value(output).unwrap();
    assert_eq!(parsed.by_field()["borrower"], json!("Jane Doe"));
}
