//! Recovery of JSON payloads embedded in free-form model output.

use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum LenientJson {
    Structured(Value),
    Fallback,
}

impl LenientJson {
    /// Tries, in order: the whole reply, the body of a fenced code block,
    /// the outermost `[...]` span and the outermost `{...}` span.
    pub fn parse(reply: &str) -> Self {
        let trimmed = reply.trim();

        std::iter::once(trimmed)
            .chain(fenced_body(trimmed))
            .chain(delimited(trimmed, '[', ']'))
            .chain(delimited(trimmed, '{', '}'))
            .find_map(|candidate| serde_json::from_str::<Value>(candidate).ok())
            .map_or(Self::Fallback, Self::Structured)
    }

    pub fn into_typed<T: DeserializeOwned>(self) -> Option<T> {
        match self {
            Self::Structured(value) => serde_json::from_value(value).ok(),
            Self::Fallback => None,
        }
    }
}

fn fenced_body(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

fn delimited(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}
