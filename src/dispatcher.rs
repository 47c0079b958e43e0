//! Inbound message routing and handler fan-out.
//!
//! Each inbound message is classified exactly once:
//!
//! ```text
//!            ┌─ no id ──────────────────► Ignore
//!            ├─ id is pending ──────────► Response (settle the call)
//! message ───┼─ response, not pending ──► Stale    (late or duplicate)
//!            └─ otherwise ──────────────► Request  (run matching handlers)
//! ```
//!
//! Stale responses are dropped, never answered.
//!
//! A request is answered from the handlers that match it:
//! - none: error response with [`NO_HANDLER_MESSAGE`]
//! - one: its result, success or failure
//! - several: all run concurrently; success is the list of results in
//!   registration order, and the first failure fails the whole response

use std::panic::AssertUnwindSafe;

use futures::future::try_join_all;
use futures::FutureExt;
use serde_json::Value;

use crate::handler::{Handler, HandlerResult};
use crate::pending::PendingCalls;
use crate::protocol::{CorrelationId, Envelope, Response};

/// Failure payload sent when no handler matches a request.
pub const NO_HANDLER_MESSAGE: &str = "Nothing handle the message";

/// Failure payload sent when a handler panics.
pub const HANDLER_PANICKED_MESSAGE: &str = "handler panicked";

/// Classification of one inbound message.
#[derive(Debug, PartialEq)]
pub enum Route {
    /// Not an envelope; unrelated traffic on the channel.
    Ignore,
    /// Response to one of our pending calls.
    Response { id: CorrelationId, response: Response },
    /// Response for a call that is no longer pending.
    Stale { id: CorrelationId },
    /// Request from the peer, to be answered under the same id.
    Request { id: CorrelationId, content: Value },
}

impl Route {
    /// Classify `message` against the calls currently pending.
    pub fn classify(message: Value, pending: &PendingCalls) -> Route {
        let Some(envelope) = Envelope::from_value(message) else {
            return Route::Ignore;
        };
        let (id, content) = envelope.into_parts();
        if pending.contains(&id) {
            Route::Response {
                id,
                response: Response::from_content(content),
            }
        } else if Response::is_response(&content) {
            Route::Stale { id }
        } else {
            Route::Request { id, content }
        }
    }
}

/// Run the matched handlers on `content` and aggregate their outcomes.
pub async fn run_handlers(mut handlers: Vec<Handler>, content: Value) -> HandlerResult {
    match handlers.len() {
        0 => Err(Value::String(NO_HANDLER_MESSAGE.to_string())),
        1 => guarded(handlers.remove(0), content).await,
        _ => {
            let calls = handlers
                .into_iter()
                .map(|handler| guarded(handler, content.clone()));
            try_join_all(calls).await.map(Value::Array)
        }
    }
}

/// Invoke a handler, turning a panic into a failure payload.
async fn guarded(handler: Handler, content: Value) -> HandlerResult {
    let call = async move { handler.invoke(content).await };
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("request handler panicked");
            Err(Value::String(HANDLER_PANICKED_MESSAGE.to_string()))
        }
    }
}
