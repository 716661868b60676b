#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use llm_mapper::{
    CallOptions, InvokerError, ModelInvoker, RawResponse, RenderedRequest, TransportError,
};

/// Model invoker that replays a fixed script of outcomes
///
/// Every request is recorded so tests can assert on what was sent. Once the
/// script runs out, further calls fail with a network error.
pub struct ScriptedInvoker {
    script: Mutex<VecDeque<Result<RawResponse, InvokerError>>>,
    requests: Mutex<Vec<(RenderedRequest, CallOptions)>>,
}

impl ScriptedInvoker {
    pub fn new(script: Vec<Result<RawResponse, InvokerError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Invoker that answers every call in order with the given texts
    pub fn replying<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            replies
                .into_iter()
                .map(|text| Ok(RawResponse::text(text)))
                .collect(),
        )
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RenderedRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    pub fn options(&self) -> Vec<CallOptions> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, options)| options.clone())
            .collect()
    }
}

#[async_trait]
impl ModelInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        request: &RenderedRequest,
        options: &CallOptions,
    ) -> Result<RawResponse, InvokerError> {
        self.requests
            .lock()
            .unwrap()
            .push((request.clone(), options.clone()));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("script exhausted".to_string()).into()))
    }
}

/// Install a test subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_exhaustion() {
        let invoker = ScriptedInvoker::replying(["one"]);
        let request = RenderedRequest {
            interface: "I".to_string(),
            method: "m".to_string(),
            system: None,
            user: "hi".to_string(),
            output_schema: None,
        };
        let options = CallOptions::default();

        let first = invoker.invoke(&request, &options).await.unwrap();
        assert_eq!(first.text, "one");
        assert!(invoker.invoke(&request, &options).await.is_err());
        assert_eq!(invoker.calls(), 2);
    }
}
