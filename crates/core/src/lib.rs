pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod gemini;
pub mod ingest;
pub mod layout;
pub mod lenient_json;
pub mod models;
pub mod ocr;
pub mod orchestrator;
pub mod prompts;
pub mod quality;
pub mod retrieval;
pub mod storage;
pub mod stores;
pub mod traits;

pub use chunking::{build_chunks, chunks_from_json, make_chunk_id};
pub use embeddings::{
    dedupe_chunks, embed_chunks, CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{CollaboratorError, IngestError, ProcessingError, StageError};
pub use gemini::{GeminiEmbedder, GeminiGenerator, GeminiSettings};
pub use ingest::{
    discover_ocr_files, document_id_from_path, relative_storage_path, resolve_reference,
};
pub use layout::{content_text, OcrDocument};
pub use lenient_json::LenientJson;
pub use models::{
    Chunk, EmbeddedChunk, IndexDatapoint, IndexReport, NamespaceRestriction, Neighbor,
    OcrUpload, PipelineOptions, RiskReport, RiskStatement,
};
pub use ocr::{mime_type_for, DocumentAiClient, DocumentAiSettings};
pub use orchestrator::DocumentCoordinator;
pub use quality::{is_low_value, looks_like_heading, normalize_whitespace};
pub use retrieval::{select_context, ContextLimits, RetrievedContext};
pub use storage::{LocalStorage, SupabaseStorage};
pub use stores::{LocalIndex, QdrantStore, VertexSettings, VertexVectorSearch};
pub use traits::{Generator, ObjectStore, OcrProcessor, VectorIndex};
