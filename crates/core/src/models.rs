use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_CONTEXT_CHUNKS: usize = 10;
pub const MIN_CONTEXT_CHUNKS: usize = 5;
pub const DEFAULT_NUM_NEIGHBORS: usize = 25;
pub const EMBED_BATCH_SIZE: usize = 200;
pub const UPSERT_BATCH_SIZE: usize = 100;
pub const DOCUMENT_NAMESPACE: &str = "document_id";
pub const DEFAULT_PUBLIC_PREFIX: &str =
    "https://jmyrzhpfzcaebymsmjcm.supabase.co/storage/v1/object/public/ocr_bucket/";

/// One quality-filtered paragraph of an OCR document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub document_id: String,
    pub page_number: u32,
}

/// Deduplicated copy of a [`Chunk`] carrying its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NamespaceRestriction {
    pub namespace: String,
    pub allow_list: Vec<String>,
}

impl NamespaceRestriction {
    pub fn document(document_id: &str) -> Self {
        Self {
            namespace: DOCUMENT_NAMESPACE.to_string(),
            allow_list: vec![document_id.to_string()],
        }
    }

    /// A datapoint passes when the restriction namespace is absent from it or
    /// one of its tokens is allowed.
    pub fn admits(&self, restricts: &[NamespaceRestriction]) -> bool {
        restricts
            .iter()
            .filter(|restrict| restrict.namespace == self.namespace)
            .all(|restrict| {
                restrict
                    .allow_list
                    .iter()
                    .any(|token| self.allow_list.contains(token))
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexDatapoint {
    pub datapoint_id: String,
    pub feature_vector: Vec<f32>,
    pub restricts: Vec<NamespaceRestriction>,
}

impl From<&EmbeddedChunk> for IndexDatapoint {
    fn from(value: &EmbeddedChunk) -> Self {
        Self {
            datapoint_id: value.chunk.id.clone(),
            feature_vector: value.vector.clone(),
            restricts: vec![NamespaceRestriction::document(&value.chunk.document_id)],
        }
    }
}

/// A vector search match in the index's own rank order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Neighbor {
    pub id: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RiskStatement {
    pub statement: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    pub statements: Vec<RiskStatement>,
    pub raw_response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrUpload {
    pub storage_path: String,
    pub public_url: String,
    pub document_id: String,
    pub page_count: usize,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IndexReport {
    pub document_id: String,
    pub chunk_count: usize,
    pub indexed_count: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub num_neighbors: usize,
    pub max_context_chunks: usize,
    pub min_context_chunks: usize,
    pub embed_batch_size: usize,
    pub upsert_batch_size: usize,
    pub public_url_prefix: String,
    pub ocr_folder: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            num_neighbors: DEFAULT_NUM_NEIGHBORS,
            max_context_chunks: MAX_CONTEXT_CHUNKS,
            min_context_chunks: MIN_CONTEXT_CHUNKS,
            embed_batch_size: EMBED_BATCH_SIZE,
            upsert_batch_size: UPSERT_BATCH_SIZE,
            public_url_prefix: DEFAULT_PUBLIC_PREFIX.to_string(),
            ocr_folder: "ocr".to_string(),
        }
    }
}
