use crate::error::CollaboratorError;
use crate::models::{Chunk, EmbeddedChunk, EMBED_BATCH_SIZE};
use crate::quality::{is_low_value, normalize_whitespace};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::debug;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    /// Largest number of texts accepted by one [`Embedder::embed`] call.
    fn max_batch_size(&self) -> usize {
        EMBED_BATCH_SIZE
    }

    /// One vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CollaboratorError>;
}

#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CollaboratorError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

/// Re-normalizes, drops low-value text and keeps the first occurrence of
/// every case-insensitive text.
pub fn dedupe_chunks(chunks: &[Chunk]) -> Vec<Chunk> {
    let mut seen = HashSet::new();
    let mut filtered = Vec::new();

    for chunk in chunks {
        let text = normalize_whitespace(&chunk.text);
        if text.is_empty() || is_low_value(&text) {
            continue;
        }
        if !seen.insert(text.to_lowercase()) {
            continue;
        }
        filtered.push(Chunk {
            text,
            ..chunk.clone()
        });
    }

    filtered
}

/// Embeds the deduplicated chunks in batches bounded by both `batch_size`
/// and the embedder's own limit. `result[i]` pairs the i-th surviving chunk
/// with the i-th returned vector.
pub async fn embed_chunks(
    embedder: &dyn Embedder,
    chunks: &[Chunk],
    batch_size: usize,
) -> Result<Vec<EmbeddedChunk>, CollaboratorError> {
    let filtered = dedupe_chunks(chunks);
    if filtered.is_empty() {
        return Ok(Vec::new());
    }

    let batch_size = batch_size.min(embedder.max_batch_size()).max(1);
    let texts: Vec<String> = filtered.iter().map(|chunk| chunk.text.clone()).collect();
    let mut vectors = Vec::with_capacity(texts.len());

    for (batch_index, batch) in texts.chunks(batch_size).enumerate() {
        let embedded = embedder.embed(batch).await?;
        if embedded.len() != batch.len() {
            return Err(CollaboratorError::backend(
                "embedder",
                format!(
                    "batch {batch_index} returned {} vectors for {} texts",
                    embedded.len(),
                    batch.len()
                ),
            ));
        }
        debug!(batch = batch_index + 1, size = batch.len(), "embedded batch");
        vectors.extend(embedded);
    }

    debug!(
        input = chunks.len(),
        embedded = filtered.len(),
        "embedded chunks"
    );

    Ok(filtered
        .into_iter()
        .zip(vectors)
        .map(|(chunk, vector)| EmbeddedChunk { chunk, vector })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingEmbedder {
        calls: Mutex<Vec<Vec<String>>>,
        short_by_one: bool,
    }

    #[async_trait]
    impl Embedder for RecordingEmbedder {
        fn dimensions(&self) -> usize {
            2
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CollaboratorError> {
            self.calls
                .lock()
                .expect("lock is not poisoned")
                .push(texts.to_vec());
            let offset = self.calls.lock().expect("lock is not poisoned").len() * 1000;
            let mut vectors: Vec<Vec<f32>> = texts
                .iter()
                .enumerate()
                .map(|(index, _)| vec![(offset + index) as f32, 0.0])
                .collect();
            if self.short_by_one {
                vectors.pop();
            }
            Ok(vectors)
        }
    }

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: text.to_string(),
            document_id: "doc".to_string(),
            page_number: 1,
        }
    }

    fn clause(number: usize) -> String {
        format!("Clause number {number} obliges the tenant to keep the premises clean.")
    }

    #[test]
    fn ngram_vectors_repeat_for_the_same_clause() {
        let embedder = CharacterNgramEmbedder::default();
        assert_eq!(embedder.embed_text(&clause(3)), embedder.embed_text(&clause(3)));
        assert_ne!(embedder.embed_text(&clause(3)), embedder.embed_text(&clause(4)));
    }

    #[test]
    fn ngram_vectors_are_unit_length_at_configured_width() {
        let embedder = CharacterNgramEmbedder { dimensions: 48 };
        let vector = embedder.embed_text("The deposit is refundable.");
        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();

        assert_eq!(vector.len(), 48);
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(embedder.embed_text("").iter().all(|value| *value == 0.0));
    }

    #[test]
    fn dedupe_is_case_insensitive_and_order_preserving() {
        let chunks = vec![
            chunk("a", "The tenant shall pay rent on the first day."),
            chunk("b", "PAGE 2"),
            chunk("c", "the TENANT shall pay rent   on the first day."),
            chunk("d", "The landlord shall maintain the roof and walls."),
        ];

        let filtered = dedupe_chunks(&chunks);
        let ids: Vec<_> = filtered.iter().map(|chunk| chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
    }

    #[tokio::test]
    async fn empty_input_skips_the_embedder() {
        let embedder = RecordingEmbedder::default();
        let embedded = embed_chunks(&embedder, &[chunk("a", "Signature")], EMBED_BATCH_SIZE)
            .await
            .expect("nothing to embed");
        assert!(embedded.is_empty());
        assert!(embedder.calls.lock().expect("lock is not poisoned").is_empty());
    }

    #[tokio::test]
    async fn batches_preserve_alignment() {
        let embedder = RecordingEmbedder::default();
        let chunks: Vec<_> = (0..450).map(|n| chunk(&format!("c{n}"), &clause(n))).collect();

        let embedded = embed_chunks(&embedder, &chunks, EMBED_BATCH_SIZE)
            .await
            .expect("embedding succeeds");

        let sizes: Vec<_> = embedder
            .calls
            .lock()
            .expect("lock is not poisoned")
            .iter()
            .map(Vec::len)
            .collect();
        assert_eq!(sizes, vec![200, 200, 50]);
        assert_eq!(embedded.len(), 450);
        assert_eq!(embedded[0].chunk.id, "c0");
        assert_eq!(embedded[0].vector[0], 1000.0);
        assert_eq!(embedded[201].chunk.id, "c201");
        assert_eq!(embedded[201].vector[0], 2001.0);
        assert_eq!(embedded[449].vector[0], 3049.0);
    }

    #[tokio::test]
    async fn vector_count_mismatch_is_an_error() {
        let embedder = RecordingEmbedder {
            short_by_one: true,
            ..Default::default()
        };
        let result = embed_chunks(&embedder, &[chunk("a", &clause(1))], EMBED_BATCH_SIZE).await;
        assert!(matches!(result, Err(CollaboratorError::BackendResponse { .. })));
    }
}
