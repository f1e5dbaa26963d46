//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the extraction library
//! without running real embedding or vision models. Every mock is cheap to
//! clone and clones share state, so a test can keep a handle for assertions
//! after moving a copy into an [`ExtractionSession`].

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{ExtractionError, Result};
use crate::pipeline::session::ExtractionSession;
use crate::traits::{CheckboxDetector, DetectedCheckbox, DocumentIngestor, Embedder, Generator};
use crate::types::config::ExtractionConfig;
use crate::types::page::{Page, PageImage};

/// The synthetic image used for page `n` in mocks and scenarios.
pub fn page_image(n: u32) -> PageImage {
    PageImage::png(format!("page {}", n).into_bytes())
}

/// A mock ingestor returning canned pages.
///
/// The document handle is a plain string id, recorded for assertions.
#[derive(Clone, Default)]
pub struct MockIngestor {
    pages: Arc<RwLock<Vec<(u32, PageImage)>>>,
    fail: bool,
    ingested: Arc<RwLock<Vec<String>>>,
}

impl MockIngestor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pages 1..=n with synthetic images.
    pub fn with_page_count(self, n: u32) -> Self {
        for i in 1..=n {
            self.pages.write().unwrap().push((i, page_image(i)));
        }
        self
    }

    /// Append a page with an explicit number (may break numbering on purpose).
    pub fn with_page(self, page_number: u32, image: PageImage) -> Self {
        self.pages.write().unwrap().push((page_number, image));
        self
    }

    /// Make every ingest call fail.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Document ids passed to `ingest`.
    pub fn ingested(&self) -> Vec<String> {
        self.ingested.read().unwrap().clone()
    }
}

#[async_trait]
impl DocumentIngestor for MockIngestor {
    type Document = str;

    async fn ingest(&self, document: &str) -> Result<Vec<Page>> {
        self.ingested.write().unwrap().push(document.to_string());
        if self.fail {
            return Err(ExtractionError::Ingestion(
                format!("mock ingestion failure for {}", document).into(),
            ));
        }

        Ok(self
            .pages
            .read()
            .unwrap()
            .iter()
            .map(|(n, image)| Page::new(*n, image.clone()))
            .collect())
    }
}

/// A mock embedder with configurable and deterministic vectors.
///
/// Unconfigured inputs get a SHA-256-derived vector, so the same input
/// always embeds the same way.
#[derive(Clone)]
pub struct MockEmbedder {
    images: Arc<RwLock<HashMap<String, Vec<f32>>>>,
    texts: Arc<RwLock<HashMap<String, Vec<f32>>>>,
    embedding_dim: usize,
    fail_images: bool,
    image_calls: Arc<RwLock<usize>>,
    text_calls: Arc<RwLock<usize>>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            images: Arc::default(),
            texts: Arc::default(),
            embedding_dim: 8,
            fail_images: false,
            image_calls: Arc::default(),
            text_calls: Arc::default(),
        }
    }

    /// Set the dimension of generated vectors.
    pub fn with_embedding_dim(mut self, dim: usize) -> Self {
        self.embedding_dim = dim;
        self
    }

    /// Fix the vector for an image.
    pub fn with_image(self, image: &PageImage, embedding: Vec<f32>) -> Self {
        self.images
            .write()
            .unwrap()
            .insert(image.content_hash(), embedding);
        self
    }

    /// Fix the vector for a query text.
    pub fn with_text(self, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        self.texts.write().unwrap().insert(text.into(), embedding);
        self
    }

    /// Make every image embedding fail.
    pub fn failing_images(mut self) -> Self {
        self.fail_images = true;
        self
    }

    pub fn image_calls(&self) -> usize {
        *self.image_calls.read().unwrap()
    }

    pub fn text_calls(&self) -> usize {
        *self.text_calls.read().unwrap()
    }

    fn deterministic(&self, bytes: &[u8]) -> Vec<f32> {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let hash = hasher.finalize();

        (0..self.embedding_dim)
            .map(|i| (hash[i % 32] as f32 / 127.5) - 1.0)
            .collect()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed_image(&self, image: &PageImage) -> Result<Vec<f32>> {
        *self.image_calls.write().unwrap() += 1;
        if self.fail_images {
            return Err(ExtractionError::Embedding("mock image embedding failure".into()));
        }

        let configured = self.images.read().unwrap().get(&image.content_hash()).cloned();
        Ok(configured.unwrap_or_else(|| self.deterministic(&image.data)))
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        *self.text_calls.write().unwrap() += 1;
        let configured = self.texts.read().unwrap().get(text).cloned();
        Ok(configured.unwrap_or_else(|| self.deterministic(text.as_bytes())))
    }
}

/// Record of a call made to the mock generator.
#[derive(Debug, Clone, PartialEq)]
pub enum MockGeneratorCall {
    /// Page is `None` for images the mock was not told about
    Generate { page: Option<u32>, prompt: String },
    Complete { prompt: String },
}

#[derive(Clone)]
struct Rule {
    page: Option<u32>,
    prompt_contains: String,
    response: std::result::Result<String, String>,
}

/// A mock vision generator answering from scripted rules.
///
/// A rule matches a page number and a prompt substring (usually the field's
/// description). The first matching rule wins; a call with no matching rule
/// fails with an inference error, which the extraction loop treats like an
/// unreadable page.
#[derive(Clone, Default)]
pub struct MockGenerator {
    page_numbers: Arc<RwLock<HashMap<String, u32>>>,
    rules: Arc<RwLock<Vec<Rule>>>,
    calls: Arc<RwLock<Vec<MockGeneratorCall>>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tell the mock which page an image belongs to.
    pub fn with_page_image(self, page_number: u32, image: &PageImage) -> Self {
        self.page_numbers
            .write()
            .unwrap()
            .insert(image.content_hash(), page_number);
        self
    }

    /// Answer `raw` for `page` when the prompt contains `prompt_contains`.
    pub fn with_response(
        self,
        page: u32,
        prompt_contains: impl Into<String>,
        raw: impl Into<String>,
    ) -> Self {
        self.push_rule(Some(page), prompt_contains.into(), Ok(raw.into()));
        self
    }

    /// Fail inference for `page` when the prompt contains `prompt_contains`.
    pub fn with_failure(self, page: u32, prompt_contains: impl Into<String>) -> Self {
        self.push_rule(
            Some(page),
            prompt_contains.into(),
            Err("mock inference failure".into()),
        );
        self
    }

    /// Answer `raw` to text-only prompts containing `prompt_contains`.
    pub fn with_completion(
        self,
        prompt_contains: impl Into<String>,
        raw: impl Into<String>,
    ) -> Self {
        self.push_rule(None, prompt_contains.into(), Ok(raw.into()));
        self
    }

    fn push_rule(
        &self,
        page: Option<u32>,
        prompt_contains: String,
        response: std::result::Result<String, String>,
    ) {
        self.rules.write().unwrap().push(Rule {
            page,
            prompt_contains,
            response,
        });
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockGeneratorCall> {
        self.calls.read().unwrap().clone()
    }

    /// Pages generated for, in call order, for prompts containing `prompt_contains`.
    pub fn pages_visited(&self, prompt_contains: &str) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MockGeneratorCall::Generate { page, prompt } => {
                    prompt.contains(prompt_contains).then_some(page).flatten()
                }
                _ => None,
            })
            .collect()
    }

    /// Prompts of text-only calls.
    pub fn completions(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MockGeneratorCall::Complete { prompt } => Some(prompt),
                _ => None,
            })
            .collect()
    }

    fn answer(&self, page: Option<u32>, prompt: &str) -> Result<String> {
        let rules = self.rules.read().unwrap();
        let rule = rules
            .iter()
            .find(|r| r.page == page && prompt.contains(&r.prompt_contains));

        match rule.map(|r| r.response.clone()) {
            Some(Ok(raw)) => Ok(raw),
            Some(Err(reason)) => Err(ExtractionError::Inference(reason.into())),
            None => Err(ExtractionError::Inference("no scripted response".into())),
        }
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, image: &PageImage, prompt: &str) -> Result<String> {
        let page = self
            .page_numbers
            .read()
            .unwrap()
            .get(&image.content_hash())
            .copied();
        self.calls.write().unwrap().push(MockGeneratorCall::Generate {
            page,
            prompt: prompt.to_string(),
        });

        match page {
            Some(_) => self.answer(page, prompt),
            None => Err(ExtractionError::Inference("unknown page image".into())),
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.write().unwrap().push(MockGeneratorCall::Complete {
            prompt: prompt.to_string(),
        });
        self.answer(None, prompt)
    }
}

/// A mock checkbox detector returning the same marks for every page.
#[derive(Clone, Default)]
pub struct MockDetector {
    detections: Arc<RwLock<Vec<DetectedCheckbox>>>,
    fail: bool,
    calls: Arc<RwLock<usize>>,
}

impl MockDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detection(self, detection: DetectedCheckbox) -> Self {
        self.detections.write().unwrap().push(detection);
        self
    }

    /// Make every detect call fail.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.read().unwrap()
    }
}

#[async_trait]
impl CheckboxDetector for MockDetector {
    async fn detect(&self, _image: &PageImage) -> Result<Vec<DetectedCheckbox>> {
        *self.calls.write().unwrap() += 1;
        if self.fail {
            return Err(ExtractionError::Detection("mock detector failure".into()));
        }
        Ok(self.detections.read().unwrap().clone())
    }
}

/// Builder for a complete mocked document.
///
/// # Example
///
/// ```rust,ignore
/// let scenario = TestScenario::new()
///     .with_pages(3)
///     .respond(1, "Borrower", r#"{"value": "Jane Doe"}"#);
///
/// let run = scenario.session().run(&fields, "loan-42").await?;
/// assert_eq!(scenario.generator().pages_visited("Borrower"), vec![1]);
/// ```
#[derive(Clone)]
pub struct TestScenario {
    ingestor: MockIngestor,
    embedder: MockEmbedder,
    generator: MockGenerator,
    detector: Option<MockDetector>,
    config: ExtractionConfig,
}

impl TestScenario {
    pub fn new() -> Self {
        Self {
            ingestor: MockIngestor::new(),
            embedder: MockEmbedder::new(),
            generator: MockGenerator::new(),
            detector: None,
            config: ExtractionConfig::default(),
        }
    }

    /// A document of `n` synthetic pages.
    pub fn with_pages(mut self, n: u32) -> Self {
        self.ingestor = self.ingestor.with_page_count(n);
        for i in 1..=n {
            self.generator = self.generator.with_page_image(i, &page_image(i));
        }
        self
    }

    pub fn with_config(mut self, config: ExtractionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_detector(mut self, detector: MockDetector) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Script the model's answer on `page` for prompts containing `prompt_contains`.
    pub fn respond(mut self, page: u32, prompt_contains: &str, raw: &str) -> Self {
        self.generator = self.generator.with_response(page, prompt_contains, raw);
        self
    }

    /// Script an inference failure on `page`.
    pub fn fail(mut self, page: u32, prompt_contains: &str) -> Self {
        self.generator = self.generator.with_failure(page, prompt_contains);
        self
    }

    /// Script the text-only answer for prompts containing `prompt_contains`.
    pub fn complete(mut self, prompt_contains: &str, raw: &str) -> Self {
        self.generator = self.generator.with_completion(prompt_contains, raw);
        self
    }

    /// Fix the embedding of page `n`.
    pub fn embed_page(mut self, n: u32, embedding: Vec<f32>) -> Self {
        self.embedder = self.embedder.with_image(&page_image(n), embedding);
        self
    }

    /// Fix the embedding of a query.
    pub fn embed_query(mut self, query: &str, embedding: Vec<f32>) -> Self {
        self.embedder = self.embedder.with_text(query, embedding);
        self
    }

    /// Handle to the shared mock generator.
    pub fn generator(&self) -> MockGenerator {
        self.generator.clone()
    }

    /// Handle to the shared mock embedder.
    pub fn embedder(&self) -> MockEmbedder {
        self.embedder.clone()
    }

    /// Handle to the shared mock ingestor.
    pub fn ingestor(&self) -> MockIngestor {
        self.ingestor.clone()
    }

    /// A session wired to this scenario's mocks.
    pub fn session(&self) -> ExtractionSession<MockIngestor, MockEmbedder, MockGenerator> {
        let session = ExtractionSession::new(
            self.ingestor.clone(),
            self.embedder.clone(),
            self.generator.clone(),
        )
        .with_config(self.config.clone());

        match &self.detector {
            Some(detector) => session.with_detector(detector.clone()),
            None => session,
        }
    }
}

impl Default for TestScenario {
    fn default() -> Self {
        Self::new()
    }
}
