use crate::error::IngestError;
use crate::layout::{FullText, OcrDocument};
use crate::models::Chunk;
use crate::quality::{is_low_value, normalize_whitespace};

/// Stable id of the paragraph at `paragraph` (1-based) on `page` (1-based).
pub fn make_chunk_id(document_id: &str, page: u32, paragraph: u32) -> String {
    format!("{document_id}_page_{page}_para_{paragraph}")
}

/// Walks pages and paragraphs in reading order and keeps every paragraph that
/// survives the quality filter.
pub fn build_chunks(document: &OcrDocument, document_id: &str) -> Result<Vec<Chunk>, IngestError> {
    let full_text = FullText::new(&document.text);
    let mut chunks = Vec::new();

    for (page_index, page) in document.pages.iter().enumerate() {
        let page_number = ordinal(page_index)?;
        for (paragraph_index, paragraph) in page.paragraphs.iter().enumerate() {
            let raw = full_text.layout_text(&paragraph.layout)?;
            let text = normalize_whitespace(&raw);

            if text.is_empty() || is_low_value(&text) {
                continue;
            }

            chunks.push(Chunk {
                id: make_chunk_id(document_id, page_number, ordinal(paragraph_index)?),
                text,
                document_id: document_id.to_string(),
                page_number,
            });
        }
    }

    Ok(chunks)
}

/// Parses raw OCR JSON and chunks it.
pub fn chunks_from_json(raw: &[u8], document_id: &str) -> Result<Vec<Chunk>, IngestError> {
    let document = OcrDocument::from_slice(raw)?;
    build_chunks(&document, document_id)
}

fn ordinal(index: usize) -> Result<u32, IngestError> {
    u32::try_from(index + 1)
        .map_err(|_| IngestError::MalformedLayout(format!("layout index {index} overflows u32")))
}
