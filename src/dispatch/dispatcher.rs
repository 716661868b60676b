//! Call dispatcher: resolve → render → invoke → decode, with retries

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info_span, warn, Instrument};
use uuid::Uuid;

use super::state::{CallLifecycle, CallState};
use crate::binding::{
    declaration::InterfaceDeclaration, registry::BindingRegistry, render::ArgumentBinder,
};
use crate::core::{
    config::{CallOptions, DispatcherConfig},
    error::{InvocationError, InvocationResult, InvokerError, TransportError},
    invoker::ModelInvoker,
    types::{RawResponse, RenderedRequest},
};
use crate::decode::{
    codec::{Codec, JsonCodec},
    decoder::ResponseDecoder,
};

/// Per-call overrides
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Options that take precedence over interface and dispatcher defaults
    pub options: Option<CallOptions>,
    /// Cancels the call; checked before every attempt and while waiting
    pub cancel: Option<CancellationToken>,
}

impl CallContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set per-call options
    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Attach a cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Outcome of a call together with how it got there
#[derive(Debug)]
pub struct CallReport<T> {
    /// Identifier recorded on the call's tracing span
    pub call_id: Uuid,
    /// Invoker calls issued
    pub attempts: u32,
    /// Lifecycle states visited, in order
    pub states: Vec<CallState>,
    /// Decoded value or the failure that ended the call
    pub result: InvocationResult<T>,
}

impl<T> CallReport<T> {
    /// Final lifecycle state
    pub fn final_state(&self) -> CallState {
        self.states.last().copied().unwrap_or(CallState::Pending)
    }

    /// Drop the bookkeeping and keep the outcome
    pub fn into_result(self) -> InvocationResult<T> {
        self.result
    }
}

/// Mutable bookkeeping for one call
struct CallRun {
    lifecycle: CallLifecycle,
    attempts: u32,
}

impl CallRun {
    fn new() -> Self {
        Self {
            lifecycle: CallLifecycle::new(),
            attempts: 0,
        }
    }

    fn advance(&mut self, next: CallState) {
        if let Err(err) = self.lifecycle.transition(next) {
            error!(error = %err, "dispatcher skipped a lifecycle step");
        }
    }
}

/// Turns declared method calls into model invocations
///
/// A dispatcher is cheap to share behind an `Arc` and safe for any number of
/// concurrent calls; the only state shared between calls is the binding
/// registry.
pub struct CallDispatcher {
    invoker: Arc<dyn ModelInvoker>,
    registry: Arc<BindingRegistry>,
    binder: ArgumentBinder,
    decoder: ResponseDecoder,
    config: DispatcherConfig,
}

impl CallDispatcher {
    /// Dispatcher with the global registry, JSON codec and default config
    pub fn new(invoker: impl ModelInvoker + 'static) -> Self {
        Self::builder(invoker).build()
    }

    /// Start building a dispatcher around `invoker`
    pub fn builder(invoker: impl ModelInvoker + 'static) -> CallDispatcherBuilder {
        CallDispatcherBuilder::new(Arc::new(invoker))
    }

    /// Registry used to resolve bindings
    pub fn registry(&self) -> &Arc<BindingRegistry> {
        &self.registry
    }

    /// Retry, timeout and default-option settings
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Call `method` of `interface` with positional arguments
    pub async fn call<T: DeserializeOwned>(
        &self,
        interface: &InterfaceDeclaration,
        method: &str,
        arguments: Vec<Value>,
    ) -> InvocationResult<T> {
        self.call_with(interface, method, arguments, CallContext::default())
            .await
    }

    /// Call with per-call options and cancellation
    pub async fn call_with<T: DeserializeOwned>(
        &self,
        interface: &InterfaceDeclaration,
        method: &str,
        arguments: Vec<Value>,
        context: CallContext,
    ) -> InvocationResult<T> {
        self.call_with_report(interface, method, arguments, context)
            .await
            .into_result()
    }

    /// Call and report the attempts and states the call went through
    pub async fn call_with_report<T: DeserializeOwned>(
        &self,
        interface: &InterfaceDeclaration,
        method: &str,
        arguments: Vec<Value>,
        context: CallContext,
    ) -> CallReport<T> {
        let call_id = Uuid::new_v4();
        let span = info_span!(
            "llm_call",
            call_id = %call_id,
            interface = %interface.name(),
            method = %method,
        );

        let mut run = CallRun::new();
        let result = self
            .execute::<T>(interface, method, &arguments, &context, &mut run)
            .instrument(span.clone())
            .await;

        span.in_scope(|| match &result {
            Ok(_) => {
                run.advance(CallState::Succeeded);
                debug!(attempts = run.attempts, "call succeeded");
            }
            Err(err) => {
                run.advance(CallState::Failed);
                debug!(attempts = run.attempts, stage = ?err.stage(), error = %err, "call failed");
            }
        });

        CallReport {
            call_id,
            attempts: run.attempts,
            states: run.lifecycle.into_history(),
            result,
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        interface: &InterfaceDeclaration,
        method: &str,
        arguments: &[Value],
        context: &CallContext,
        run: &mut CallRun,
    ) -> InvocationResult<T> {
        let cancel = context.cancel.clone().unwrap_or_default();
        if cancel.is_cancelled() {
            return Err(InvocationError::Cancelled { attempts: 0 });
        }

        run.advance(CallState::Rendering);
        let binding = self.registry.resolve(interface, method)?;
        let mut request = self.binder.render(&binding, arguments)?;

        let interface_options = CallOptions {
            model: binding.model.clone(),
            ..CallOptions::default()
        };
        let options = context
            .options
            .clone()
            .unwrap_or_default()
            .merged_over(&interface_options)
            .merged_over(&self.config.default_options);
        let timeout = options.timeout.or(self.config.call_timeout);
        let policy = &self.config.retry;
        let max_attempts = policy.attempts();

        loop {
            if cancel.is_cancelled() {
                return Err(InvocationError::Cancelled {
                    attempts: run.attempts,
                });
            }

            run.advance(CallState::Invoking);
            run.attempts += 1;
            let attempt = run.attempts;
            debug!(attempt, max_attempts, "invoking model");

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(InvocationError::Cancelled { attempts: attempt });
                }
                outcome = self.invoke_once(&request, &options, timeout) => outcome,
            };

            let (failure, rerender) = match outcome {
                Ok(raw) => {
                    // A result that lands after cancellation is dropped undecoded
                    if cancel.is_cancelled() {
                        return Err(InvocationError::Cancelled { attempts: attempt });
                    }
                    run.advance(CallState::Decoding);
                    return Ok(self.decoder.decode_as::<T>(&raw, &binding.return_type)?);
                }
                Err(InvokerError::Rejected(rejected)) => return Err(rejected.into()),
                Err(InvokerError::Transport(failure)) => (failure, false),
                Err(InvokerError::InvalidRequest(reason)) => {
                    (TransportError::InvalidRequest(reason), true)
                }
            };

            if attempt >= max_attempts {
                warn!(attempt, error = %failure, "giving up after last attempt");
                return Err(InvocationError::Transport {
                    attempts: attempt,
                    source: failure,
                });
            }

            let delay = policy.delay_for(attempt, failure.retry_after());
            warn!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "retryable failure, backing off"
            );
            run.advance(CallState::RetryWait);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(InvocationError::Cancelled { attempts: attempt });
                }
                _ = tokio::time::sleep(delay) => {}
            }

            if rerender {
                run.advance(CallState::Rendering);
                request = self.binder.render(&binding, arguments)?;
            }
        }
    }

    async fn invoke_once(
        &self,
        request: &RenderedRequest,
        options: &CallOptions,
        timeout: Option<Duration>,
    ) -> Result<RawResponse, InvokerError> {
        let call = self.invoker.invoke(request, options);
        match timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or_else(|_| Err(TransportError::Timeout(limit).into())),
            None => call.await,
        }
    }
}

/// Builder for [`CallDispatcher`]
pub struct CallDispatcherBuilder {
    invoker: Arc<dyn ModelInvoker>,
    registry: Option<Arc<BindingRegistry>>,
    codec: Option<Arc<dyn Codec>>,
    config: DispatcherConfig,
}

impl CallDispatcherBuilder {
    /// Start from a shared invoker
    pub fn new(invoker: Arc<dyn ModelInvoker>) -> Self {
        Self {
            invoker,
            registry: None,
            codec: None,
            config: DispatcherConfig::default(),
        }
    }

    /// Use a specific registry instead of [`BindingRegistry::global`]
    pub fn registry(mut self, registry: Arc<BindingRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use a specific codec instead of the lenient [`JsonCodec`]
    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Replace the default [`DispatcherConfig`]
    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Finish the dispatcher, falling back to the global registry and [`JsonCodec`]
    pub fn build(self) -> CallDispatcher {
        let codec = self
            .codec
            .unwrap_or_else(|| Arc::new(JsonCodec::default()));
        CallDispatcher {
            invoker: self.invoker,
            registry: self.registry.unwrap_or_else(BindingRegistry::global),
            binder: ArgumentBinder::new(codec.clone()),
            decoder: ResponseDecoder::new(codec, self.config.diagnostic_limit),
            config: self.config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::declaration::MethodDeclaration;
    use crate::core::error::{FailureStage, ProviderRejectedError};
    use crate::dispatch::retry::{BackoffStrategy, RetryPolicy};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    /// Replays canned outcomes and records what it was asked
    struct Scripted {
        outcomes: Mutex<VecDeque<Result<RawResponse, InvokerError>>>,
        delay: Option<Duration>,
        seen: Mutex<Vec<(RenderedRequest, CallOptions)>>,
    }

    impl Scripted {
        fn new(outcomes: Vec<Result<RawResponse, InvokerError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                delay: None,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn slow(delay: Duration, outcomes: Vec<Result<RawResponse, InvokerError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                delay: Some(delay),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelInvoker for Scripted {
        async fn invoke(
            &self,
            request: &RenderedRequest,
            options: &CallOptions,
        ) -> Result<RawResponse, InvokerError> {
            self.seen
                .lock()
                .unwrap()
                .push((request.clone(), options.clone()));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Network("script exhausted".into()).into()))
        }
    }

    fn network() -> Result<RawResponse, InvokerError> {
        Err(TransportError::Network("connection reset".into()).into())
    }

    fn summarizer() -> InterfaceDeclaration {
        InterfaceDeclaration::new("Summarizer").model("base-model").method(
            MethodDeclaration::new("summarize")
                .param::<String>("text")
                .user_message("Summarize: {text}"),
        )
    }

    fn dispatcher(invoker: Arc<Scripted>, retry: RetryPolicy) -> CallDispatcher {
        CallDispatcher::builder(invoker)
            .registry(Arc::new(BindingRegistry::new()))
            .config(DispatcherConfig::new().with_retry(retry))
            .build()
    }

    fn retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(max_attempts)
            .with_backoff(BackoffStrategy::Fixed {
                delay: Duration::from_millis(100),
            })
    }

    #[tokio::test]
    async fn test_summarize_round_trip() {
        let invoker = Scripted::new(vec![Ok(RawResponse::text("A greeting."))]);
        let dispatcher = dispatcher(invoker.clone(), retry(3));

        let report = dispatcher
            .call_with_report::<String>(
                &summarizer(),
                "summarize",
                vec![json!("hello world")],
                CallContext::new(),
            )
            .await;

        assert_eq!(report.attempts, 1);
        assert_eq!(report.final_state(), CallState::Succeeded);
        assert_eq!(
            report.states,
            vec![
                CallState::Pending,
                CallState::Rendering,
                CallState::Invoking,
                CallState::Decoding,
                CallState::Succeeded,
            ]
        );
        assert_eq!(assert_ok!(report.result), "A greeting.");

        let seen = invoker.seen.lock().unwrap();
        assert_eq!(seen[0].0.user, "Summarize: hello world");
        assert_eq!(seen[0].1.model.as_deref(), Some("base-model"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failures_then_success() {
        let invoker = Scripted::new(vec![network(), network(), Ok(RawResponse::text("done"))]);
        let dispatcher = dispatcher(invoker.clone(), retry(3));

        let report = dispatcher
            .call_with_report::<String>(
                &summarizer(),
                "summarize",
                vec![json!("x")],
                CallContext::new(),
            )
            .await;

        assert_eq!(assert_ok!(report.result), "done");
        assert_eq!(report.attempts, 3);
        assert_eq!(invoker.calls(), 3);
        assert_eq!(
            report
                .states
                .iter()
                .filter(|s| **s == CallState::RetryWait)
                .count(),
            2
        );
        // Retries reuse the rendered request
        let seen = invoker.seen.lock().unwrap();
        assert!(seen.iter().all(|(request, _)| request == &seen[0].0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_surfaces_last_transport_error() {
        let invoker = Scripted::new(vec![
            network(),
            Err(TransportError::Http {
                status: 503,
                body: "overloaded".into(),
            }
            .into()),
            Ok(RawResponse::text("too late")),
        ]);
        let dispatcher = dispatcher(invoker.clone(), retry(2));

        let err = assert_err!(
            dispatcher
                .call::<String>(&summarizer(), "summarize", vec![json!("x")])
                .await
        );
        assert_eq!(
            err,
            InvocationError::Transport {
                attempts: 2,
                source: TransportError::Http {
                    status: 503,
                    body: "overloaded".into(),
                },
            }
        );
        assert_eq!(err.stage(), FailureStage::ProviderFailed);
        assert_eq!(invoker.calls(), 2);
    }

    #[tokio::test]
    async fn test_rejection_is_terminal() {
        let invoker = Scripted::new(vec![
            Err(ProviderRejectedError::new("content_filter", "blocked").into()),
            Ok(RawResponse::text("unused")),
        ]);
        let dispatcher = dispatcher(invoker.clone(), retry(5));

        let err = assert_err!(
            dispatcher
                .call::<String>(&summarizer(), "summarize", vec![json!("x")])
                .await
        );
        assert!(matches!(err, InvocationError::Rejected(_)));
        assert_eq!(invoker.calls(), 1);
    }

    #[tokio::test]
    async fn test_decode_failure_is_terminal() {
        let iface = InterfaceDeclaration::new("Counter").method(
            MethodDeclaration::new("count")
                .param::<String>("text")
                .user_message("Count words in {text}")
                .returns::<u32>(),
        );
        let invoker = Scripted::new(vec![
            Ok(RawResponse::text("many")),
            Ok(RawResponse::text("3")),
        ]);
        let dispatcher = dispatcher(invoker.clone(), retry(5));

        let report = dispatcher
            .call_with_report::<u32>(&iface, "count", vec![json!("a b c")], CallContext::new())
            .await;
        let err = assert_err!(report.result);
        assert_eq!(err.stage(), FailureStage::ResponseMismatch);
        assert_eq!(invoker.calls(), 1);
        assert!(report.states.contains(&CallState::Decoding));
        assert_eq!(report.states.last(), Some(&CallState::Failed));
    }

    #[tokio::test]
    async fn test_binding_errors_never_reach_invoker() {
        let iface = InterfaceDeclaration::new("Broken").method(
            MethodDeclaration::new("summarize")
                .param::<String>("text")
                .user_message("Summarize: {topic}"),
        );
        let invoker = Scripted::new(vec![Ok(RawResponse::text("unused"))]);
        let dispatcher = dispatcher(invoker.clone(), retry(3));

        let err = assert_err!(
            dispatcher
                .call::<String>(&iface, "summarize", vec![json!("x")])
                .await
        );
        assert!(matches!(err, InvocationError::Binding(_)));
        assert_eq!(err.stage(), FailureStage::NotSent);

        let err = assert_err!(
            dispatcher
                .call::<String>(&summarizer(), "summarize", vec![json!(1), json!(2)])
                .await
        );
        assert!(matches!(err, InvocationError::Argument(_)));
        assert_eq!(invoker.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_retryable_transport_failure() {
        let invoker = Scripted::slow(
            Duration::from_secs(5),
            vec![Ok(RawResponse::text("slow")), Ok(RawResponse::text("slow"))],
        );
        let dispatcher = CallDispatcher::builder(invoker.clone())
            .registry(Arc::new(BindingRegistry::new()))
            .config(
                DispatcherConfig::new()
                    .with_retry(retry(2))
                    .with_call_timeout(Duration::from_secs(1)),
            )
            .build();

        let err = assert_err!(
            dispatcher
                .call::<String>(&summarizer(), "summarize", vec![json!("x")])
                .await
        );
        assert_eq!(
            err.transport(),
            Some(&TransportError::Timeout(Duration::from_secs(1)))
        );
        assert_eq!(invoker.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_call_timeout_overrides_default() {
        let invoker = Scripted::slow(Duration::from_secs(2), vec![Ok(RawResponse::text("ok"))]);
        let dispatcher = CallDispatcher::builder(invoker)
            .registry(Arc::new(BindingRegistry::new()))
            .config(DispatcherConfig::new().with_call_timeout(Duration::from_secs(1)))
            .build();

        let context =
            CallContext::new().with_options(CallOptions::new().with_timeout(Duration::from_secs(3)));
        let text: String = assert_ok!(
            dispatcher
                .call_with(&summarizer(), "summarize", vec![json!("x")], context)
                .await
        );
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn test_option_precedence() {
        let invoker = Scripted::new(vec![Ok(RawResponse::text("a")), Ok(RawResponse::text("b"))]);
        let dispatcher = CallDispatcher::builder(invoker.clone())
            .registry(Arc::new(BindingRegistry::new()))
            .config(DispatcherConfig::new().with_default_options(
                CallOptions::new().with_model("default-model").with_temperature(0.1),
            ))
            .build();

        let _: String = assert_ok!(
            dispatcher
                .call(&summarizer(), "summarize", vec![json!("x")])
                .await
        );
        let context = CallContext::new().with_options(CallOptions::new().with_model("override"));
        let _: String = assert_ok!(
            dispatcher
                .call_with(&summarizer(), "summarize", vec![json!("x")], context)
                .await
        );

        let seen = invoker.seen.lock().unwrap();
        assert_eq!(seen[0].1.model.as_deref(), Some("base-model"));
        assert_eq!(seen[0].1.temperature, Some(0.1));
        assert_eq!(seen[1].1.model.as_deref(), Some("override"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let invoker = Scripted::new(vec![Ok(RawResponse::text("unused"))]);
        let dispatcher = dispatcher(invoker.clone(), retry(3));
        let token = CancellationToken::new();
        token.cancel();

        let report = dispatcher
            .call_with_report::<String>(
                &summarizer(),
                "summarize",
                vec![json!("x")],
                CallContext::new().with_cancellation(token),
            )
            .await;
        assert_eq!(
            assert_err!(report.result),
            InvocationError::Cancelled { attempts: 0 }
        );
        assert_eq!(report.states, vec![CallState::Pending, CallState::Failed]);
        assert_eq!(invoker.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_during_backoff() {
        let invoker = Scripted::new(vec![network(), Ok(RawResponse::text("unused"))]);
        let dispatcher = CallDispatcher::builder(invoker.clone())
            .registry(Arc::new(BindingRegistry::new()))
            .config(DispatcherConfig::new().with_retry(
                RetryPolicy::new().with_backoff(BackoffStrategy::Fixed {
                    delay: Duration::from_secs(10),
                }),
            ))
            .build();

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = assert_err!(
            dispatcher
                .call_with::<String>(
                    &summarizer(),
                    "summarize",
                    vec![json!("x")],
                    CallContext::new().with_cancellation(token),
                )
                .await
        );
        assert_eq!(err, InvocationError::Cancelled { attempts: 1 });
        assert_eq!(err.stage(), FailureStage::Cancelled);
        assert_eq!(invoker.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_result_is_not_decoded_after_cancel() {
        let invoker = Scripted::slow(Duration::from_secs(1), vec![Ok(RawResponse::text("late"))]);
        let dispatcher = dispatcher(invoker.clone(), retry(3));

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let report = dispatcher
            .call_with_report::<String>(
                &summarizer(),
                "summarize",
                vec![json!("x")],
                CallContext::new().with_cancellation(token),
            )
            .await;
        assert_eq!(
            assert_err!(report.result),
            InvocationError::Cancelled { attempts: 1 }
        );
        assert!(!report.states.contains(&CallState::Decoding));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_request_re_renders() {
        let invoker = Scripted::new(vec![
            Err(InvokerError::InvalidRequest("bad payload".into())),
            Ok(RawResponse::text("fine")),
        ]);
        let dispatcher = dispatcher(invoker.clone(), retry(2));

        let report = dispatcher
            .call_with_report::<String>(
                &summarizer(),
                "summarize",
                vec![json!("x")],
                CallContext::new(),
            )
            .await;
        assert_eq!(assert_ok!(report.result), "fine");
        assert_eq!(
            report.states,
            vec![
                CallState::Pending,
                CallState::Rendering,
                CallState::Invoking,
                CallState::RetryWait,
                CallState::Rendering,
                CallState::Invoking,
                CallState::Decoding,
                CallState::Succeeded,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_invalid_request_is_transport_error() {
        let invoker = Scripted::new(vec![Err(InvokerError::InvalidRequest("bad".into()))]);
        let dispatcher = dispatcher(invoker, RetryPolicy::no_retry());

        let err = assert_err!(
            dispatcher
                .call::<String>(&summarizer(), "summarize", vec![json!("x")])
                .await
        );
        assert_eq!(
            err.transport(),
            Some(&TransportError::InvalidRequest("bad".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_hint_extends_backoff() {
        let invoker = Scripted::new(vec![
            Err(TransportError::RateLimited {
                retry_after: Some(Duration::from_secs(30)),
            }
            .into()),
            Ok(RawResponse::text("ok")),
        ]);
        let dispatcher = dispatcher(invoker, retry(2));

        let started = tokio::time::Instant::now();
        let _: String = assert_ok!(
            dispatcher
                .call(&summarizer(), "summarize", vec![json!("x")])
                .await
        );
        assert!(started.elapsed() >= Duration::from_secs(30));
    }
}
