//! Call dispatch: retries, cancellation and the per-call lifecycle

pub mod dispatcher;
pub mod retry;
pub mod state;

pub use dispatcher::{CallContext, CallDispatcher, CallDispatcherBuilder, CallReport};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use state::{CallLifecycle, CallState, StateError};
