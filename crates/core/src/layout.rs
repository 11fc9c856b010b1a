//! Document AI layout JSON and offset resolution against the full text.

use crate::error::IngestError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr, PickFirst};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrDocument {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub pages: Vec<OcrPage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrPage {
    #[serde(default)]
    pub paragraphs: Vec<OcrParagraph>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrParagraph {
    #[serde(default)]
    pub layout: Layout,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    #[serde(default)]
    pub text_anchor: TextAnchor,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnchor {
    #[serde(default)]
    pub text_segments: Vec<TextSegment>,
}

/// Half-open `[start_index, end_index)` range in code points.
///
/// Document AI serializes int64 fields as strings and omits zero values, so
/// both encodings are accepted and a missing index reads as 0.
#[serde_as]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TextSegment {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub start_index: u64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub end_index: u64,
}

impl OcrDocument {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IngestError> {
        serde_json::from_slice(bytes)
            .map_err(|error| IngestError::MalformedLayout(format!("invalid OCR json: {error}")))
    }

    pub fn from_value(value: Value) -> Result<Self, IngestError> {
        serde_json::from_value(value)
            .map_err(|error| IngestError::MalformedLayout(format!("invalid OCR json: {error}")))
    }
}

/// Full document text addressable by code point offsets.
pub struct FullText<'a> {
    text: &'a str,
    boundaries: Vec<usize>,
}

impl<'a> FullText<'a> {
    pub fn new(text: &'a str) -> Self {
        let boundaries = text
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(text.len()))
            .collect();
        Self { text, boundaries }
    }

    pub fn char_len(&self) -> usize {
        self.boundaries.len() - 1
    }

    pub fn slice(&self, segment: TextSegment) -> Result<&'a str, IngestError> {
        let start = usize::try_from(segment.start_index).unwrap_or(usize::MAX);
        let end = usize::try_from(segment.end_index).unwrap_or(usize::MAX);

        if start > end {
            return Err(IngestError::MalformedLayout(format!(
                "text segment {start}..{end} is inverted"
            )));
        }
        if end > self.char_len() {
            return Err(IngestError::MalformedLayout(format!(
                "text segment {start}..{end} exceeds document length {}",
                self.char_len()
            )));
        }

        Ok(&self.text[self.boundaries[start]..self.boundaries[end]])
    }

    /// Concatenates every segment of a layout in order, without separators.
    pub fn layout_text(&self, layout: &Layout) -> Result<String, IngestError> {
        let mut text = String::new();
        for segment in &layout.text_anchor.text_segments {
            text.push_str(self.slice(*segment)?);
        }
        Ok(text)
    }
}

/// Text to feed a whole-document prompt: the `text` field of an OCR JSON
/// object, or the raw content when it is not one.
pub fn content_text(raw: &[u8]) -> String {
    let decoded = String::from_utf8_lossy(raw).into_owned();
    match serde_json::from_str::<Value>(&decoded) {
        Ok(Value::Object(map)) => match map.get("text") {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => decoded,
        },
        _ => decoded,
    }
}
