//! Declarative LLM clients
//!
//! Describe an interface whose methods stand for model calls, and the crate
//! resolves each method into a cached binding, renders its request template
//! from the call arguments, invokes a pluggable [`ModelInvoker`] with retries
//! and decodes the raw text answer into the method's return type.
//!
//! Interfaces are declared either with the builder API in [`binding`] or
//! with the [`llm_client`] attribute on a trait.

extern crate self as llm_mapper;

// Request/response types, errors, config and the invoker boundary
pub mod core;

// Declarations, the binding registry and argument rendering
pub mod binding;

// Response decoding
pub mod decode;

// Retries, cancellation and the call lifecycle
pub mod dispatch;

pub use crate::core::{
    config::{CallOptions, DispatcherConfig, ResolveOptions},
    error::{
        BindingArgumentError, BindingError, DecodeError, FailureStage, InvocationError,
        InvocationResult, InvokerError, ProviderRejectedError, TransportError,
    },
    invoker::ModelInvoker,
    types::{
        DecodeStrategy, FinishReason, RawResponse, RenderedRequest, ScalarKind, TypeDescriptor,
        UsageMetadata,
    },
};

pub use binding::{
    to_argument, BindingRegistry, InterfaceDeclaration, MethodBinding, MethodDeclaration,
};
pub use decode::{Codec, JsonCodec, ResponseDecoder};
pub use dispatch::{
    BackoffStrategy, CallContext, CallDispatcher, CallReport, CallState, RetryPolicy,
};

pub use llm_mapper_macros::llm_client;

/// Re-exports used by code generated with [`llm_client`]
#[doc(hidden)]
pub mod __private {
    pub use async_trait::async_trait;
    pub use serde_json;
}
