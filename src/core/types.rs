//! Core types shared by the binding, decoding and dispatch layers

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Primitive scalar kinds a method can accept or return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    /// `true` / `false`
    Bool,
    /// Signed or unsigned whole number
    Integer,
    /// Floating point number
    Float,
}

/// Shape of a parameter or return type
///
/// Selects the decoding strategy for return values and the type check
/// applied to call-time arguments. Element types of sequences and mappings
/// are themselves descriptors, so a descriptor is a finite tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDescriptor {
    /// No value; the response text is ignored
    Unit,
    /// A primitive scalar
    Scalar { scalar: ScalarKind },
    /// Free-form text
    String,
    /// One member of a closed set of names
    Enumeration { name: String, members: Vec<String> },
    /// A structured record, decoded from JSON
    Object { name: String },
    /// An ordered collection
    Sequence { element: Box<TypeDescriptor> },
    /// A key/value mapping
    Mapping {
        key: Box<TypeDescriptor>,
        value: Box<TypeDescriptor>,
    },
    /// A value that may be absent (`null`)
    Optional { inner: Box<TypeDescriptor> },
}

/// Decoding strategy selected by a descriptor's shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeStrategy {
    /// Discard the response
    Ignore,
    /// Pass the text through untouched
    Text,
    /// Coerce the trimmed text into a scalar
    Scalar,
    /// Case-insensitive member lookup
    Enumeration,
    /// Parse through the serialization codec
    Structured,
}

impl TypeDescriptor {
    /// Shorthand for `Scalar { scalar: Bool }`
    pub fn bool() -> Self {
        Self::Scalar {
            scalar: ScalarKind::Bool,
        }
    }

    /// Shorthand for `Scalar { scalar: Integer }`
    pub fn integer() -> Self {
        Self::Scalar {
            scalar: ScalarKind::Integer,
        }
    }

    /// Shorthand for `Scalar { scalar: Float }`
    pub fn float() -> Self {
        Self::Scalar {
            scalar: ScalarKind::Float,
        }
    }

    /// Create an enumeration descriptor
    pub fn enumeration<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enumeration {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a composite object descriptor
    pub fn object(name: impl Into<String>) -> Self {
        Self::Object { name: name.into() }
    }

    /// Create a sequence descriptor
    pub fn sequence(element: TypeDescriptor) -> Self {
        Self::Sequence {
            element: Box::new(element),
        }
    }

    /// Create a mapping descriptor
    pub fn mapping(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        Self::Mapping {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    /// Create an optional descriptor
    pub fn optional(inner: TypeDescriptor) -> Self {
        Self::Optional {
            inner: Box::new(inner),
        }
    }

    /// The decoding strategy for this shape
    pub fn strategy(&self) -> DecodeStrategy {
        match self {
            Self::Unit => DecodeStrategy::Ignore,
            Self::String => DecodeStrategy::Text,
            Self::Scalar { .. } => DecodeStrategy::Scalar,
            Self::Enumeration { .. } => DecodeStrategy::Enumeration,
            Self::Object { .. } | Self::Sequence { .. } | Self::Mapping { .. } => {
                DecodeStrategy::Structured
            }
            Self::Optional { inner } => inner.strategy(),
        }
    }

    /// Nesting depth of the descriptor tree (a leaf has depth 1)
    pub fn depth(&self) -> usize {
        match self {
            Self::Sequence { element } => 1 + element.depth(),
            Self::Mapping { key, value } => 1 + key.depth().max(value.depth()),
            Self::Optional { inner } => inner.depth(),
            _ => 1,
        }
    }

    /// Check that the tree only uses supported shapes
    ///
    /// Returns a human-readable reason on failure.
    pub fn validate(&self, max_depth: usize) -> Result<(), String> {
        self.validate_at(1, max_depth)
    }

    fn validate_at(&self, depth: usize, max_depth: usize) -> Result<(), String> {
        if depth > max_depth {
            return Err(format!("type nesting exceeds the maximum depth of {}", max_depth));
        }
        match self {
            Self::Enumeration { name, members } if members.is_empty() => {
                Err(format!("enumeration {} has no members", name))
            }
            Self::Sequence { element } => {
                if **element == Self::Unit {
                    return Err("sequence elements cannot be unit".to_string());
                }
                element.validate_at(depth + 1, max_depth)
            }
            Self::Mapping { key, value } => {
                match **key {
                    Self::String
                    | Self::Enumeration { .. }
                    | Self::Scalar {
                        scalar: ScalarKind::Integer,
                    } => {}
                    ref other => {
                        return Err(format!("{} cannot be used as a mapping key", other));
                    }
                }
                if **value == Self::Unit {
                    return Err("mapping values cannot be unit".to_string());
                }
                key.validate_at(depth + 1, max_depth)?;
                value.validate_at(depth + 1, max_depth)
            }
            Self::Optional { inner } => match **inner {
                Self::Unit | Self::Optional { .. } => {
                    Err(format!("{} cannot be made optional", inner))
                }
                _ => inner.validate_at(depth, max_depth),
            },
            _ => Ok(()),
        }
    }

    /// Whether a call-time argument value has this shape
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Unit, Value::Null) => true,
            (Self::Optional { .. }, Value::Null) => true,
            (Self::Optional { inner }, value) => inner.accepts(value),
            (Self::String, Value::String(_)) => true,
            (Self::Scalar { scalar }, value) => match scalar {
                ScalarKind::Bool => value.is_boolean(),
                ScalarKind::Integer => value.is_i64() || value.is_u64(),
                ScalarKind::Float => value.is_number(),
            },
            (Self::Enumeration { members, .. }, Value::String(s)) => {
                find_member(members, s).is_some()
            }
            (Self::Object { .. }, Value::Object(_)) => true,
            (Self::Sequence { element }, Value::Array(items)) => {
                items.iter().all(|item| element.accepts(item))
            }
            (Self::Mapping { key, value }, Value::Object(map)) => map
                .iter()
                .all(|(k, v)| key.accepts_key(k) && value.accepts(v)),
            _ => false,
        }
    }

    fn accepts_key(&self, key: &str) -> bool {
        match self {
            Self::Scalar {
                scalar: ScalarKind::Integer,
            } => key.parse::<i64>().is_ok() || key.parse::<u64>().is_ok(),
            Self::Enumeration { members, .. } => find_member(members, key).is_some(),
            _ => true,
        }
    }

    /// A structural JSON Schema for this descriptor
    ///
    /// Used for hand-built descriptors; schemars-derived declarations carry
    /// the full generated schema instead.
    pub fn json_schema(&self) -> Value {
        match self {
            Self::Unit => json!({ "type": "null" }),
            Self::Scalar { scalar } => match scalar {
                ScalarKind::Bool => json!({ "type": "boolean" }),
                ScalarKind::Integer => json!({ "type": "integer" }),
                ScalarKind::Float => json!({ "type": "number" }),
            },
            Self::String => json!({ "type": "string" }),
            Self::Enumeration { name, members } => {
                json!({ "title": name, "type": "string", "enum": members })
            }
            Self::Object { name } => json!({ "title": name, "type": "object" }),
            Self::Sequence { element } => {
                json!({ "type": "array", "items": element.json_schema() })
            }
            Self::Mapping { value, .. } => {
                json!({ "type": "object", "additionalProperties": value.json_schema() })
            }
            Self::Optional { inner } => {
                json!({ "anyOf": [inner.json_schema(), { "type": "null" }] })
            }
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => write!(f, "unit"),
            Self::Scalar { scalar } => match scalar {
                ScalarKind::Bool => write!(f, "bool"),
                ScalarKind::Integer => write!(f, "integer"),
                ScalarKind::Float => write!(f, "float"),
            },
            Self::String => write!(f, "string"),
            Self::Enumeration { name, .. } => write!(f, "enum {}", name),
            Self::Object { name } => write!(f, "object {}", name),
            Self::Sequence { element } => write!(f, "sequence<{}>", element),
            Self::Mapping { key, value } => write!(f, "map<{}, {}>", key, value),
            Self::Optional { inner } => write!(f, "optional<{}>", inner),
        }
    }
}

/// Find the declared member matching `candidate`, ignoring case
pub(crate) fn find_member<'a>(members: &'a [String], candidate: &str) -> Option<&'a str> {
    let wanted = candidate.to_lowercase();
    members
        .iter()
        .find(|member| member.to_lowercase() == wanted)
        .map(String::as_str)
}

/// A request rendered for one call
///
/// Owned by the in-flight call and dropped once it completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedRequest {
    /// Interface the method belongs to
    pub interface: String,
    /// Method being invoked
    pub method: String,
    /// System instructions, if the interface or method declares any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// The rendered user message
    pub user: String,
    /// JSON Schema of the expected output, for structured return types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

/// Raw response returned by a model invoker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    /// Response text
    pub text: String,
    /// Why generation stopped, if the provider reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Token accounting, if the provider reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageMetadata>,
}

impl RawResponse {
    /// Create a response carrying only text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            finish_reason: None,
            usage: None,
        }
    }

    /// Attach a finish reason
    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = Some(reason);
        self
    }

    /// Attach usage metadata
    pub fn with_usage(mut self, usage: UsageMetadata) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Reason why generation finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural completion
    Stop,
    /// Hit token limit
    MaxTokens,
    /// Hit stop sequence
    StopSequence,
    /// Blocked by safety filters
    Safety,
    /// Provider-specific reason
    Other(String),
}

/// Token usage information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    /// Prompt tokens consumed
    pub input_tokens: u32,
    /// Response tokens generated
    pub output_tokens: u32,
    /// Sum of input and output
    pub total_tokens: u32,
}

impl UsageMetadata {
    /// Create new usage metadata
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}
