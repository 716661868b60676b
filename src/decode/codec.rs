//! Serialization codec used for composite arguments and structured responses

use serde_json::Value;
use thiserror::Error;

use crate::core::types::TypeDescriptor;

/// Codec failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CodecError(pub String);

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError(err.to_string())
    }
}

/// Text serialization capability
///
/// The binder serializes composite arguments with it and the decoder parses
/// structured responses with it. `shape` lets an implementation pick a
/// parsing mode; it does not have to enforce it.
pub trait Codec: Send + Sync {
    /// Render a value as text
    fn serialize(&self, value: &Value) -> Result<String, CodecError>;

    /// Parse response text into a value
    fn deserialize(&self, text: &str, shape: &TypeDescriptor) -> Result<Value, CodecError>;
}

/// JSON codec tolerant of common model output wrappers
///
/// Markdown code fences around the payload are always stripped. When
/// `lenient`, text that still fails to parse is retried on the span between
/// the first opening and the last closing bracket matching the expected
/// shape, which drops chatty preambles like "Sure! Here you go:".
#[derive(Debug, Clone, Copy)]
pub struct JsonCodec {
    lenient: bool,
}

impl JsonCodec {
    /// Create a codec
    pub fn new(lenient: bool) -> Self {
        Self { lenient }
    }

    fn extract_span<'a>(&self, text: &'a str, shape: &TypeDescriptor) -> Option<&'a str> {
        let (open, close) = match shape {
            TypeDescriptor::Optional { inner } => return self.extract_span(text, inner),
            TypeDescriptor::Sequence { .. } => ('[', ']'),
            _ => ('{', '}'),
        };
        let start = text.find(open)?;
        let end = text.rfind(close)?;
        (end > start).then(|| &text[start..=end])
    }
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Codec for JsonCodec {
    fn serialize(&self, value: &Value) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }

    fn deserialize(&self, text: &str, shape: &TypeDescriptor) -> Result<Value, CodecError> {
        let body = strip_code_fence(text);
        match serde_json::from_str(body) {
            Ok(value) => Ok(value),
            Err(err) if self.lenient => match self.extract_span(body, shape) {
                Some(span) if span.len() < body.len() => Ok(serde_json::from_str(span)?),
                _ => Err(err.into()),
            },
            Err(err) => Err(err.into()),
        }
    }
}

/// Remove a surrounding Markdown code fence (```json ... ```), if present
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim(),
        None => body.trim(),
    }
}
