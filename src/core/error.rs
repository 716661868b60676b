//! Error types for binding, invocation and decoding

use std::time::Duration;
use thiserror::Error;

/// A method declaration could not be turned into a binding
///
/// Detected when the binding is resolved, before any argument is rendered
/// or any request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// The interface declares no such method
    #[error("{interface} has no method named {method}")]
    UnknownMethod { interface: String, method: String },

    /// The interface declares the method more than once
    #[error("{interface}.{method} is declared more than once")]
    AmbiguousMethod { interface: String, method: String },

    /// The (interface, method) key was already resolved from a different declaration
    #[error("{interface}.{method} was already resolved from a different declaration")]
    ConflictingDeclaration { interface: String, method: String },

    /// The method has no user message template
    #[error("{interface}.{method} has no user message template")]
    MissingTemplate { interface: String, method: String },

    /// The template could not be parsed
    #[error("{interface}.{method}: malformed template at byte {position}: {reason}")]
    MalformedTemplate {
        interface: String,
        method: String,
        position: usize,
        reason: String,
    },

    /// A placeholder names no declared parameter
    #[error("{interface}.{method}: placeholder {{{placeholder}}} does not match any parameter")]
    UnknownPlaceholder {
        interface: String,
        method: String,
        placeholder: String,
    },

    /// A declared parameter is never referenced (strict mode only)
    #[error("{interface}.{method}: parameter {parameter} is never referenced by the template")]
    UnreferencedParameter {
        interface: String,
        method: String,
        parameter: String,
    },

    /// Two parameters share a name
    #[error("{interface}.{method}: parameter {parameter} is declared more than once")]
    DuplicateParameter {
        interface: String,
        method: String,
        parameter: String,
    },

    /// A parameter or return type has no supported descriptor
    #[error("{interface}.{method}: unsupported type for {target}: {reason}")]
    UnsupportedType {
        interface: String,
        method: String,
        target: String,
        reason: String,
    },
}

/// The caller supplied arguments that do not fit the binding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingArgumentError {
    /// Wrong number of arguments
    #[error("{method} expects {expected} argument(s), got {actual}")]
    CountMismatch {
        method: String,
        expected: usize,
        actual: usize,
    },

    /// An argument does not have the declared shape
    #[error("argument {parameter} of {method} must be {expected}, got {actual}")]
    TypeMismatch {
        method: String,
        parameter: String,
        expected: String,
        actual: String,
    },

    /// An argument could not be serialized
    #[error("argument {parameter} could not be serialized: {message}")]
    Serialization { parameter: String, message: String },
}

/// Network or provider failure; retryable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("HTTP error (status {status}): {body}")]
    Http { status: u16, body: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// The call did not complete in time
    #[error("Call timed out after {0:?}")]
    Timeout(Duration),

    /// The invoker reported the request itself as invalid
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Minimum wait requested by the provider, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TransportError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// The provider refused the request on its merits; terminal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Provider rejected the request ({code}): {message}")]
pub struct ProviderRejectedError {
    /// Provider-specific reason code
    pub code: String,
    /// Human-readable explanation
    pub message: String,
}

impl ProviderRejectedError {
    /// Create a rejection
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// The response could not be mapped onto the declared return type; terminal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot decode response as {expected}: {message} (raw: {raw:?})")]
pub struct DecodeError {
    /// The declared return type
    pub expected: String,
    /// What went wrong
    pub message: String,
    /// The offending response text, truncated
    pub raw: String,
}

impl DecodeError {
    /// Create a decode error, truncating `raw` to `limit` characters
    pub fn new(
        expected: impl Into<String>,
        message: impl Into<String>,
        raw: &str,
        limit: usize,
    ) -> Self {
        Self {
            expected: expected.into(),
            message: message.into(),
            raw: truncate_for_diagnostics(raw, limit),
        }
    }
}

/// Keep at most `limit` characters of `text`, marking the cut
pub fn truncate_for_diagnostics(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

/// Errors a model invoker may report
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokerError {
    /// Retryable network/provider failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Terminal refusal
    #[error(transparent)]
    Rejected(#[from] ProviderRejectedError),

    /// The rendered request itself is invalid; it is rendered again before retrying
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Where in the call a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureStage {
    /// The provider was never contacted
    NotSent,
    /// The provider was reached but failed or refused
    ProviderFailed,
    /// The provider answered but the answer did not fit the return type
    ResponseMismatch,
    /// The caller cancelled the call
    Cancelled,
}

/// Failure of a dispatched call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    /// The method binding could not be resolved
    #[error("Binding error: {0}")]
    Binding(#[from] BindingError),

    /// The arguments did not fit the binding
    #[error("Argument error: {0}")]
    Argument(#[from] BindingArgumentError),

    /// The last transport failure once attempts ran out
    #[error("Transport error after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// The provider refused the request
    #[error("{0}")]
    Rejected(#[from] ProviderRejectedError),

    /// The response did not decode
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The call was cancelled before it finished
    #[error("Call cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl InvocationError {
    /// Where the call failed
    pub fn stage(&self) -> FailureStage {
        match self {
            InvocationError::Binding(_) | InvocationError::Argument(_) => FailureStage::NotSent,
            InvocationError::Transport { .. } | InvocationError::Rejected(_) => {
                FailureStage::ProviderFailed
            }
            InvocationError::Decode(_) => FailureStage::ResponseMismatch,
            InvocationError::Cancelled { .. } => FailureStage::Cancelled,
        }
    }

    /// Whether the failure class is retryable in principle
    pub fn is_retryable(&self) -> bool {
        matches!(self, InvocationError::Transport { .. })
    }

    /// The underlying transport failure, if any
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            InvocationError::Transport { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Outcome of a dispatched call
pub type InvocationResult<T> = Result<T, InvocationError>;
