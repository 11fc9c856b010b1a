use crate::chunking::chunks_from_json;
use crate::embeddings::{embed_chunks, Embedder};
use crate::error::StageError;
use crate::ingest::{document_id_from_path, new_ocr_path, resolve_reference};
use crate::layout::{content_text, OcrDocument};
use crate::lenient_json::LenientJson;
use crate::models::{
    Chunk, IndexDatapoint, IndexReport, NamespaceRestriction, OcrUpload, PipelineOptions,
    RiskReport, RiskStatement,
};
use crate::prompts::{answer_prompt, risk_prompt, summary_prompt};
use crate::retrieval::{chunk_text_map, select_context, ContextLimits, RetrievedContext};
use crate::traits::{Generator, ObjectStore, OcrProcessor, VectorIndex};
use crate::{CollaboratorError, IngestError, ProcessingError};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs every document workflow over injected collaborator handles.
pub struct DocumentCoordinator {
    storage: Arc<dyn ObjectStore>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
    ocr: Option<Arc<dyn OcrProcessor>>,
    options: PipelineOptions,
}

impl DocumentCoordinator {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            storage,
            embedder,
            index,
            generator,
            ocr: None,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrProcessor>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// OCRs an upload and stores the layout JSON under a fresh path.
    pub async fn process_upload(
        &self,
        content: &[u8],
        mime_type: &str,
    ) -> Result<OcrUpload, ProcessingError> {
        self.process_upload_stages(content, mime_type)
            .await
            .map_err(|error| flatten("upload", error))
    }

    pub async fn chunk_document(&self, reference: &str) -> Result<Vec<Chunk>, ProcessingError> {
        self.chunk_stages(reference)
            .await
            .map_err(|error| flatten("chunk", error))
    }

    /// Chunks, embeds and indexes one stored document.
    pub async fn index_document(&self, reference: &str) -> Result<IndexReport, ProcessingError> {
        self.index_document_stages(reference)
            .await
            .map_err(|error| flatten("index", error))
    }

    /// Embeds already-built chunks and upserts them; returns how many
    /// survived deduplication.
    pub async fn index_chunks(&self, chunks: &[Chunk]) -> Result<usize, ProcessingError> {
        self.index_chunk_stages(chunks)
            .await
            .map_err(|error| flatten("index", error))
    }

    pub async fn retrieve_context(
        &self,
        question: &str,
        reference: &str,
    ) -> Result<RetrievedContext, ProcessingError> {
        self.retrieve_stages(question, reference)
            .await
            .map_err(|error| flatten("retrieve", error))
    }

    pub async fn answer(&self, question: &str, reference: &str) -> Result<String, ProcessingError> {
        let result = async {
            let context = self.retrieve_stages(question, reference).await?;
            let prompt = answer_prompt(&context.joined(), question);
            let answer = self.generator.generate(&prompt).await?;
            Ok::<_, StageError>(answer.trim().to_string())
        }
        .await;
        result.map_err(|error| flatten("answer", error))
    }

    /// Summarizes the document text while indexing the same document.
    pub async fn summarize(&self, reference: &str) -> Result<String, ProcessingError> {
        let result = async {
            let (storage_path, _) = resolve_reference(reference, &self.options.public_url_prefix)?;
            let (summary, report) = tokio::try_join!(
                self.generate_summary(&storage_path),
                self.index_document_stages(&storage_path)
            )?;
            info!(
                document_id = %report.document_id,
                indexed = report.indexed_count,
                "summary generated alongside indexing"
            );
            Ok::<_, StageError>(summary)
        }
        .await;
        result.map_err(|error| flatten("summary", error))
    }

    pub async fn extract_risks(&self, reference: &str) -> Result<RiskReport, ProcessingError> {
        let result = async {
            let (storage_path, _) = resolve_reference(reference, &self.options.public_url_prefix)?;
            let raw = self.storage.download(&storage_path).await?;
            let reply = self.generator.generate(&risk_prompt(&content_text(&raw))).await?;
            let raw_response = reply.trim().to_string();

            let statements = parse_risk_statements(&raw_response);
            debug!(count = statements.len(), "parsed risk statements");

            Ok::<_, StageError>(RiskReport {
                statements,
                raw_response,
            })
        }
        .await;
        result.map_err(|error| flatten("risk extraction", error))
    }

    async fn process_upload_stages(
        &self,
        content: &[u8],
        mime_type: &str,
    ) -> Result<OcrUpload, StageError> {
        if content.is_empty() {
            return Err(IngestError::EmptyInput("uploaded file is empty".to_string()).into());
        }
        let ocr = self.ocr.as_ref().ok_or_else(|| {
            CollaboratorError::request("ocr", "no OCR processor is configured")
        })?;

        let document = ocr.process(content, mime_type).await?;
        let page_count = OcrDocument::from_value(document.clone())?.pages.len();
        let storage_path = new_ocr_path(&self.options.ocr_folder);
        let document_id = document_id_from_path(&storage_path)?;

        self.storage
            .upload(
                &storage_path,
                serde_json::to_vec(&document).map_err(CollaboratorError::from)?,
                "application/json",
            )
            .await?;

        info!(%storage_path, page_count, "stored OCR layout");

        Ok(OcrUpload {
            public_url: self.storage.public_url(&storage_path),
            storage_path,
            document_id,
            page_count,
            processed_at: Utc::now(),
        })
    }

    async fn chunk_stages(&self, reference: &str) -> Result<Vec<Chunk>, StageError> {
        let (storage_path, document_id) =
            resolve_reference(reference, &self.options.public_url_prefix)?;
        self.load_chunks(&storage_path, &document_id).await
    }

    async fn load_chunks(
        &self,
        storage_path: &str,
        document_id: &str,
    ) -> Result<Vec<Chunk>, StageError> {
        let raw = self.storage.download(storage_path).await?;
        let chunks = chunks_from_json(&raw, document_id)?;
        debug!(%document_id, chunk_count = chunks.len(), "chunked document");
        Ok(chunks)
    }

    async fn index_document_stages(&self, reference: &str) -> Result<IndexReport, StageError> {
        let (storage_path, document_id) =
            resolve_reference(reference, &self.options.public_url_prefix)?;
        let chunks = self.load_chunks(&storage_path, &document_id).await?;

        if chunks.is_empty() {
            info!(%document_id, "document has no indexable text");
            return Ok(IndexReport {
                document_id,
                ..Default::default()
            });
        }

        let indexed_count = self.index_chunk_stages(&chunks).await?;
        info!(%document_id, chunk_count = chunks.len(), indexed_count, "indexed document");

        Ok(IndexReport {
            document_id,
            chunk_count: chunks.len(),
            indexed_count,
        })
    }

    async fn index_chunk_stages(&self, chunks: &[Chunk]) -> Result<usize, StageError> {
        let embedded =
            embed_chunks(self.embedder.as_ref(), chunks, self.options.embed_batch_size).await?;
        let datapoints = embedded.iter().map(IndexDatapoint::from).collect::<Vec<_>>();

        for batch in datapoints.chunks(self.options.upsert_batch_size.max(1)) {
            self.index.upsert(batch).await?;
        }

        Ok(datapoints.len())
    }

    async fn retrieve_stages(
        &self,
        question: &str,
        reference: &str,
    ) -> Result<RetrievedContext, StageError> {
        if question.trim().is_empty() {
            return Err(IngestError::EmptyInput("question is required".to_string()).into());
        }

        let (storage_path, document_id) =
            resolve_reference(reference, &self.options.public_url_prefix)?;
        let chunks = self.load_chunks(&storage_path, &document_id).await?;

        let query_vector = self
            .embedder
            .embed(&[question.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CollaboratorError::backend("embedder", "no vector for question"))?;

        let candidates = self
            .index
            .query(
                &query_vector,
                self.options.num_neighbors,
                &[NamespaceRestriction::document(&document_id)],
            )
            .await?;

        let context = select_context(
            &candidates,
            &chunk_text_map(&chunks, &document_id),
            ContextLimits {
                max_chunks: self.options.max_context_chunks,
                min_chunks: self.options.min_context_chunks,
            },
        );

        info!(
            %document_id,
            candidates = candidates.len(),
            accepted = context.texts.len(),
            strict = context.strict_count,
            relaxed = context.relaxed,
            "retrieved context"
        );

        Ok(context)
    }

    async fn generate_summary(&self, storage_path: &str) -> Result<String, StageError> {
        let raw = self.storage.download(storage_path).await?;
        let summary = self
            .generator
            .generate(&summary_prompt(&content_text(&raw)))
            .await?;
        Ok(summary)
    }
}

/// Risk statements from a model reply; a bare array or an object holding one.
fn parse_risk_statements(reply: &str) -> Vec<RiskStatement> {
    match LenientJson::parse(reply) {
        LenientJson::Structured(serde_json::Value::Object(map)) => map
            .into_iter()
            .find_map(|(_, value)| serde_json::from_value::<Vec<RiskStatement>>(value).ok())
            .unwrap_or_default(),
        parsed => parsed.into_typed().unwrap_or_default(),
    }
}

fn flatten(operation: &str, error: StageError) -> ProcessingError {
    warn!(operation, error = %error, "request failed");
    ProcessingError::from(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::stores::LocalIndex;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MemoryStore {
        fn with(path: &str, value: &Value) -> Self {
            let store = Self::default();
            store
                .objects
                .lock()
                .expect("lock is not poisoned")
                .insert(path.to_string(), serde_json::to_vec(value).expect("serializable"));
            store
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn download(&self, path: &str) -> Result<Vec<u8>, CollaboratorError> {
            self.objects
                .lock()
                .expect("lock is not poisoned")
                .get(path)
                .cloned()
                .ok_or_else(|| CollaboratorError::backend("memory", format!("{path} not found")))
        }

        async fn upload(
            &self,
            path: &str,
            bytes: Vec<u8>,
            _content_type: &str,
        ) -> Result<(), CollaboratorError> {
            self.objects
                .lock()
                .expect("lock is not poisoned")
                .insert(path.to_string(), bytes);
            Ok(())
        }

        fn public_url(&self, path: &str) -> String {
            format!("memory://{path}")
        }
    }

    struct ScriptedGenerator {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().expect("lock is not poisoned").clone()
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, CollaboratorError> {
            self.prompts
                .lock()
                .expect("lock is not poisoned")
                .push(prompt.to_string());
            self.reply
                .clone()
                .map_err(|message| CollaboratorError::backend("generator", message))
        }
    }

    struct StaticOcr;

    #[async_trait]
    impl OcrProcessor for StaticOcr {
        async fn process(&self, _content: &[u8], _mime_type: &str) -> Result<Value, CollaboratorError> {
            Ok(lease_layout())
        }
    }

    const PARAGRAPHS: [&str; 4] = [
        "LEASE AGREEMENT",
        "The tenant shall pay the monthly rent of 1200 euros on the first day of each month.",
        "The security deposit is returned within thirty days after the keys are handed back.",
        "Pets are allowed only with the written consent of the landlord.",
    ];

    fn lease_layout() -> Value {
        let mut text = String::new();
        let mut paragraphs = Vec::new();
        for paragraph in PARAGRAPHS {
            let start = text.chars().count();
            text.push_str(paragraph);
            let end = text.chars().count();
            text.push('\n');
            paragraphs.push(json!({"layout": {"textAnchor": {"textSegments": [
                {"startIndex": start.to_string(), "endIndex": end.to_string()}
            ]}}}));
        }
        json!({"text": text, "pages": [{"paragraphs": paragraphs}]})
    }

    fn coordinator(
        storage: Arc<MemoryStore>,
        index: Arc<LocalIndex>,
        generator: Arc<ScriptedGenerator>,
    ) -> DocumentCoordinator {
        DocumentCoordinator::new(
            storage,
            Arc::new(CharacterNgramEmbedder::default()),
            index,
            generator,
        )
    }

    #[tokio::test]
    async fn index_then_answer_uses_document_context() {
        let storage = Arc::new(MemoryStore::with("ocr/lease-001.json", &lease_layout()));
        let index = Arc::new(LocalIndex::in_memory());
        let generator = Arc::new(ScriptedGenerator::replying("  Rent is due on the first.  "));
        let coordinator = coordinator(storage, index.clone(), generator.clone());

        let report = coordinator
            .index_document("ocr/lease-001.json")
            .await
            .expect("indexing succeeds");
        assert_eq!(report.document_id, "lease-001");
        assert_eq!(report.chunk_count, 3);
        assert_eq!(report.indexed_count, 3);
        assert_eq!(index.len().await, 3);

        let answer = coordinator
            .answer("When is the rent due?", "ocr/lease-001.json")
            .await
            .expect("answer succeeds");
        assert_eq!(answer, "Rent is due on the first.");

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(PARAGRAPHS[1]));
        assert!(prompts[0].contains(PARAGRAPHS[3]));
        assert!(!prompts[0].contains(PARAGRAPHS[0]));
        assert!(prompts[0].contains("Question: When is the rent due?"));
    }

    #[tokio::test]
    async fn public_urls_resolve_like_bucket_paths() {
        let storage = Arc::new(MemoryStore::with("ocr/lease-001.json", &lease_layout()));
        let coordinator = coordinator(
            storage,
            Arc::new(LocalIndex::in_memory()),
            Arc::new(ScriptedGenerator::replying("ok")),
        );
        let url = format!("{}ocr/lease-001.json", coordinator.options().public_url_prefix);

        let chunks = coordinator.chunk_document(&url).await.expect("chunking succeeds");
        assert_eq!(chunks[0].id, "lease-001_page_1_para_2");
    }

    #[tokio::test]
    async fn unindexed_document_yields_empty_context() {
        let storage = Arc::new(MemoryStore::with("ocr/lease-001.json", &lease_layout()));
        let coordinator = coordinator(
            storage,
            Arc::new(LocalIndex::in_memory()),
            Arc::new(ScriptedGenerator::replying("ok")),
        );

        let context = coordinator
            .retrieve_context("Are pets allowed?", "ocr/lease-001.json")
            .await
            .expect("retrieval succeeds");
        assert!(context.is_empty());
        assert!(context.relaxed);
    }

    #[tokio::test]
    async fn summary_runs_with_indexing() {
        let storage = Arc::new(MemoryStore::with("ocr/lease-001.json", &lease_layout()));
        let index = Arc::new(LocalIndex::in_memory());
        let generator = Arc::new(ScriptedGenerator::replying("A residential lease."));
        let coordinator = coordinator(storage, index.clone(), generator.clone());

        let summary = coordinator
            .summarize("ocr/lease-001.json")
            .await
            .expect("summary succeeds");

        assert_eq!(summary, "A residential lease.");
        assert_eq!(index.len().await, 3);
        let prompts = generator.prompts();
        assert!(prompts[0].starts_with("Summarize the following document content"));
        assert!(prompts[0].contains("LEASE AGREEMENT"));
    }

    #[tokio::test]
    async fn generator_failure_is_reported_uniformly() {
        let storage = Arc::new(MemoryStore::with("ocr/lease-001.json", &lease_layout()));
        let coordinator = coordinator(
            storage,
            Arc::new(LocalIndex::in_memory()),
            Arc::new(ScriptedGenerator::failing("quota exceeded")),
        );

        let error = coordinator
            .summarize("ocr/lease-001.json")
            .await
            .expect_err("generation fails");
        assert_eq!(
            error.to_string(),
            "processing failed: invalid response from generator: quota exceeded"
        );
    }

    #[tokio::test]
    async fn missing_document_fails_answer() {
        let coordinator = coordinator(
            Arc::new(MemoryStore::default()),
            Arc::new(LocalIndex::in_memory()),
            Arc::new(ScriptedGenerator::replying("ok")),
        );

        let error = coordinator
            .answer("Anything?", "ocr/missing-01.json")
            .await
            .expect_err("download fails");
        assert!(error.to_string().starts_with("processing failed: "));
        assert!(error.to_string().contains("ocr/missing-01.json not found"));
    }

    #[tokio::test]
    async fn malformed_layout_aborts_indexing() {
        let broken = json!({"text": "tiny", "pages": [{"paragraphs": [
            {"layout": {"textAnchor": {"textSegments": [{"startIndex": "0", "endIndex": "99"}]}}}
        ]}]});
        let index = Arc::new(LocalIndex::in_memory());
        let coordinator = coordinator(
            Arc::new(MemoryStore::with("ocr/broken-1.json", &broken)),
            index.clone(),
            Arc::new(ScriptedGenerator::replying("ok")),
        );

        let error = coordinator
            .index_document("ocr/broken-1.json")
            .await
            .expect_err("layout is malformed");
        assert!(error.to_string().contains("malformed layout"));
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn empty_question_is_rejected() {
        let coordinator = coordinator(
            Arc::new(MemoryStore::with("ocr/lease-001.json", &lease_layout())),
            Arc::new(LocalIndex::in_memory()),
            Arc::new(ScriptedGenerator::replying("ok")),
        );
        let error = coordinator
            .answer("   ", "ocr/lease-001.json")
            .await
            .expect_err("question is empty");
        assert!(error.to_string().contains("question is required"));
    }

    #[tokio::test]
    async fn risks_are_parsed_from_fenced_reply() {
        let reply = "```json\n[{\"statement\": \"Pets are allowed only with consent.\", \"explanation\": \"Vague consent terms.\"}]\n```";
        let generator = Arc::new(ScriptedGenerator::replying(reply));
        let coordinator = coordinator(
            Arc::new(MemoryStore::with("ocr/lease-001.json", &lease_layout())),
            Arc::new(LocalIndex::in_memory()),
            generator.clone(),
        );

        let report = coordinator
            .extract_risks("ocr/lease-001.json")
            .await
            .expect("risk extraction succeeds");

        assert_eq!(report.statements.len(), 1);
        assert_eq!(report.statements[0].explanation, "Vague consent terms.");
        assert_eq!(report.raw_response, reply);
        assert!(generator.prompts()[0].contains("returned within thirty days"));
    }

    #[test]
    fn risk_statements_accept_wrapped_object() {
        let reply = r#"{"risk_statements": [{"statement": "s", "explanation": "e"}]}"#;
        assert_eq!(
            parse_risk_statements(reply),
            vec![RiskStatement {
                statement: "s".to_string(),
                explanation: "e".to_string(),
            }]
        );
        assert!(parse_risk_statements("No risks found.").is_empty());
    }

    #[tokio::test]
    async fn upload_stores_layout_under_fresh_id() {
        let storage = Arc::new(MemoryStore::default());
        let coordinator = coordinator(
            storage.clone(),
            Arc::new(LocalIndex::in_memory()),
            Arc::new(ScriptedGenerator::replying("ok")),
        )
        .with_ocr(Arc::new(StaticOcr));

        let upload = coordinator
            .process_upload(b"%PDF-1.4", "application/pdf")
            .await
            .expect("upload succeeds");

        assert_eq!(upload.storage_path, format!("ocr/{}.json", upload.document_id));
        assert!(uuid::Uuid::parse_str(&upload.document_id).is_ok());
        assert_eq!(upload.page_count, 1);
        assert_eq!(upload.public_url, format!("memory://{}", upload.storage_path));

        let chunks = coordinator
            .chunk_document(&upload.storage_path)
            .await
            .expect("stored layout chunks");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].document_id, upload.document_id);
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let coordinator = coordinator(
            Arc::new(MemoryStore::default()),
            Arc::new(LocalIndex::in_memory()),
            Arc::new(ScriptedGenerator::replying("ok")),
        )
        .with_ocr(Arc::new(StaticOcr));

        let error = coordinator
            .process_upload(b"", "application/pdf")
            .await
            .expect_err("empty upload");
        assert!(error.to_string().contains("uploaded file is empty"));
    }
}
