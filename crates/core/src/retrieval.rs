//! Turns ranked vector matches into prompt context.
//!
//! A strict pass keeps only high-quality, distinct chunk texts. When that
//! leaves fewer than the minimum, a relaxed pass walks the same ranking again
//! and only rejects headings and mostly non-alphabetic text.

use crate::models::{Chunk, Neighbor, MAX_CONTEXT_CHUNKS, MIN_CONTEXT_CHUNKS};
use crate::quality::{is_low_value, is_mostly_non_alpha, looks_like_heading, normalize_whitespace};
use std::collections::{HashMap, HashSet};

pub const CONTEXT_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextLimits {
    pub max_chunks: usize,
    pub min_chunks: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            max_chunks: MAX_CONTEXT_CHUNKS,
            min_chunks: MIN_CONTEXT_CHUNKS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievedContext {
    pub texts: Vec<String>,
    pub strict_count: usize,
    pub relaxed: bool,
}

impl RetrievedContext {
    pub fn joined(&self) -> String {
        self.texts.join(CONTEXT_SEPARATOR)
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

/// Chunk id to text for a single document; chunks of other documents are
/// left out so their ids never resolve.
pub fn chunk_text_map(chunks: &[Chunk], document_id: &str) -> HashMap<String, String> {
    chunks
        .iter()
        .filter(|chunk| chunk.document_id == document_id)
        .map(|chunk| (chunk.id.clone(), chunk.text.clone()))
        .collect()
}

pub fn select_context(
    candidates: &[Neighbor],
    chunk_texts: &HashMap<String, String>,
    limits: ContextLimits,
) -> RetrievedContext {
    let mut accepted = Vec::new();
    let mut seen = HashSet::new();

    for text in resolve(candidates, chunk_texts) {
        if accepted.len() >= limits.max_chunks {
            break;
        }
        if text.is_empty() || is_low_value(&text) {
            continue;
        }
        if seen.insert(text.to_lowercase()) {
            accepted.push(text);
        }
    }

    let strict_count = accepted.len();
    let relaxed = strict_count < limits.min_chunks;

    if relaxed {
        for text in resolve(candidates, chunk_texts) {
            if accepted.len() >= limits.min_chunks {
                break;
            }
            if text.is_empty() || looks_like_heading(&text) || is_mostly_non_alpha(&text) {
                continue;
            }
            if seen.insert(text.to_lowercase()) {
                accepted.push(text);
            }
        }
    }

    RetrievedContext {
        texts: accepted,
        strict_count,
        relaxed,
    }
}

fn resolve<'a>(
    candidates: &'a [Neighbor],
    chunk_texts: &'a HashMap<String, String>,
) -> impl Iterator<Item = String> + 'a {
    candidates
        .iter()
        .filter(|candidate| !candidate.id.is_empty())
        .filter_map(|candidate| chunk_texts.get(&candidate.id))
        .map(|text| normalize_whitespace(text))
}
