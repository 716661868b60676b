//! Response decoder: raw model text to a value of the declared shape

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use tracing::warn;

use super::codec::{strip_code_fence, Codec};
use crate::core::{
    error::DecodeError,
    types::{find_member, FinishReason, RawResponse, ScalarKind, TypeDescriptor},
};

/// Decodes raw responses according to a [`TypeDescriptor`]
///
/// Decoding is pure: the same response and descriptor always produce the
/// same value, and the model is never consulted again.
#[derive(Clone)]
pub struct ResponseDecoder {
    codec: Arc<dyn Codec>,
    diagnostic_limit: usize,
}

impl ResponseDecoder {
    /// Create a decoder
    ///
    /// `diagnostic_limit` bounds how much raw text a [`DecodeError`] keeps.
    pub fn new(codec: Arc<dyn Codec>, diagnostic_limit: usize) -> Self {
        Self {
            codec,
            diagnostic_limit,
        }
    }

    /// Decode into the canonical JSON value for `descriptor`
    pub fn decode(
        &self,
        raw: &RawResponse,
        descriptor: &TypeDescriptor,
    ) -> Result<Value, DecodeError> {
        if raw.finish_reason == Some(FinishReason::MaxTokens) {
            warn!("response was cut off by the token limit; decoding may fail");
        }
        self.decode_text(&raw.text, descriptor)
    }

    fn decode_text(&self, text: &str, descriptor: &TypeDescriptor) -> Result<Value, DecodeError> {
        match descriptor {
            TypeDescriptor::Unit => Ok(Value::Null),
            TypeDescriptor::Optional { inner } => {
                if strip_code_fence(text).eq_ignore_ascii_case("null") {
                    Ok(Value::Null)
                } else {
                    self.decode_text(text, inner)
                }
            }
            TypeDescriptor::String => Ok(Value::String(text.to_string())),
            TypeDescriptor::Scalar { scalar } => self.decode_scalar(text, *scalar, descriptor),
            TypeDescriptor::Enumeration { members, .. } => find_member(members, text.trim())
                .map(|member| Value::String(member.to_string()))
                .ok_or_else(|| {
                    self.error(
                        descriptor,
                        format!("expected one of: {}", members.join(", ")),
                        text,
                    )
                }),
            TypeDescriptor::Object { .. }
            | TypeDescriptor::Sequence { .. }
            | TypeDescriptor::Mapping { .. } => {
                let parsed = self
                    .codec
                    .deserialize(text, descriptor)
                    .map_err(|e| self.error(descriptor, e.to_string(), text))?;
                conform(parsed, descriptor, "$").map_err(|e| self.error(descriptor, e, text))
            }
        }
    }

    /// Decode and convert into `T`
    pub fn decode_as<T: DeserializeOwned>(
        &self,
        raw: &RawResponse,
        descriptor: &TypeDescriptor,
    ) -> Result<T, DecodeError> {
        let value = self.decode(raw, descriptor)?;
        serde_json::from_value(value).map_err(|e| self.error(descriptor, e.to_string(), &raw.text))
    }

    fn decode_scalar(
        &self,
        text: &str,
        scalar: ScalarKind,
        descriptor: &TypeDescriptor,
    ) -> Result<Value, DecodeError> {
        let trimmed = text.trim();
        let value = match scalar {
            ScalarKind::Bool => {
                if trimmed.eq_ignore_ascii_case("true") {
                    Some(Value::Bool(true))
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Some(Value::Bool(false))
                } else {
                    None
                }
            }
            ScalarKind::Integer => trimmed
                .parse::<i64>()
                .map(Value::from)
                .or_else(|_| trimmed.parse::<u64>().map(Value::from))
                .ok(),
            ScalarKind::Float => trimmed
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
        };
        value.ok_or_else(|| self.error(descriptor, format!("not a valid {}", descriptor), text))
    }

    fn error(&self, descriptor: &TypeDescriptor, message: impl Into<String>, raw: &str) -> DecodeError {
        DecodeError::new(descriptor.to_string(), message, raw, self.diagnostic_limit)
    }
}

/// Check a parsed value against `descriptor`, canonicalising enumeration members
pub(crate) fn conform(value: Value, descriptor: &TypeDescriptor, path: &str) -> Result<Value, String> {
    let mismatch = |value: &Value| format!("{}: expected {}, found {}", path, descriptor, value);
    match (descriptor, value) {
        (TypeDescriptor::Unit, Value::Null) => Ok(Value::Null),
        (TypeDescriptor::Optional { .. }, Value::Null) => Ok(Value::Null),
        (TypeDescriptor::Optional { inner }, value) => conform(value, inner, path),
        (TypeDescriptor::String, value @ Value::String(_)) => Ok(value),
        (TypeDescriptor::Scalar { scalar }, value) => {
            let ok = match scalar {
                ScalarKind::Bool => value.is_boolean(),
                ScalarKind::Integer => value.is_i64() || value.is_u64(),
                ScalarKind::Float => value.is_number(),
            };
            if ok {
                Ok(value)
            } else {
                Err(mismatch(&value))
            }
        }
        (TypeDescriptor::Enumeration { members, .. }, Value::String(s)) => {
            match find_member(members, s.trim()) {
                Some(member) => Ok(Value::String(member.to_string())),
                None => Err(format!(
                    "{}: {:?} is not one of {}",
                    path,
                    s,
                    members.join(", ")
                )),
            }
        }
        (TypeDescriptor::Object { .. }, value @ Value::Object(_)) => Ok(value),
        (TypeDescriptor::Sequence { element }, Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| conform(item, element, &format!("{}[{}]", path, i)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (TypeDescriptor::Mapping { key, value: element }, Value::Object(map)) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                let k = match key.as_ref() {
                    TypeDescriptor::Enumeration { members, .. } => find_member(members, &k)
                        .map(str::to_string)
                        .ok_or_else(|| format!("{}: key {:?} is not a valid {}", path, k, key))?,
                    TypeDescriptor::Scalar {
                        scalar: ScalarKind::Integer,
                    } if !is_integer_key(&k) => {
                        return Err(format!("{}: key {:?} is not a valid {}", path, k, key));
                    }
                    // String and integer keys stay as written
                    _ => k,
                };
                let child = format!("{}.{}", path, k);
                let v = conform(v, element, &child)?;
                out.insert(k, v);
            }
            Ok(Value::Object(out))
        }
        (_, value) => Err(mismatch(&value)),
    }
}

fn is_integer_key(candidate: &str) -> bool {
    candidate.parse::<i64>().is_ok() || candidate.parse::<u64>().is_ok()
}
