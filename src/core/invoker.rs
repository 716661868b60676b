//! Invoker trait for model backends

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    config::CallOptions,
    error::InvokerError,
    types::{RawResponse, RenderedRequest},
};

/// Capability the dispatcher uses to reach a model backend
///
/// Implementations own everything provider-specific: transport, auth,
/// message layout and interpretation of [`CallOptions`]. The dispatcher
/// only distinguishes the error classes of [`InvokerError`].
///
/// # Example
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use llm_mapper::{CallOptions, InvokerError, ModelInvoker, RawResponse, RenderedRequest};
///
/// struct Echo;
///
/// #[async_trait]
/// impl ModelInvoker for Echo {
///     async fn invoke(
///         &self,
///         request: &RenderedRequest,
///         _options: &CallOptions,
///     ) -> Result<RawResponse, InvokerError> {
///         Ok(RawResponse::text(request.user.clone()))
///     }
/// }
/// ```
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Send one rendered request and return the raw response
    ///
    /// # Errors
    ///
    /// * `InvokerError::Transport` - network/provider failure, retried by the dispatcher
    /// * `InvokerError::Rejected` - refusal on the merits, never retried
    /// * `InvokerError::InvalidRequest` - the request itself is unusable; it is
    ///   rendered again before the next attempt
    async fn invoke(
        &self,
        request: &RenderedRequest,
        options: &CallOptions,
    ) -> Result<RawResponse, InvokerError>;
}

#[async_trait]
impl<I: ModelInvoker + ?Sized> ModelInvoker for Arc<I> {
    async fn invoke(
        &self,
        request: &RenderedRequest,
        options: &CallOptions,
    ) -> Result<RawResponse, InvokerError> {
        (**self).invoke(request, options).await
    }
}
