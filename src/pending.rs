//! Pending-call table.
//!
//! Every outgoing call registers a settle-once slot under a fresh
//! correlation id and hands the caller a [`ReplyFuture`]. The slot is
//! removed from the table at the moment it settles, whether by a response,
//! an error response, or a timeout, so a second settlement for the same id
//! finds nothing and is ignored.
//!
//! A caller that drops its `ReplyFuture` does not remove the slot; it stays
//! until a response arrives or the call times out.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{ExchangeError, Result};
use crate::protocol::{CorrelationId, IdGenerator};

type Settle = oneshot::Sender<Result<Value>>;

/// Outstanding calls keyed by correlation id.
pub struct PendingCalls {
    calls: Mutex<HashMap<CorrelationId, Settle>>,
    ids: Box<dyn IdGenerator>,
}

impl PendingCalls {
    /// Create an empty table drawing ids from `ids`.
    pub fn new(ids: Box<dyn IdGenerator>) -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
            ids,
        }
    }

    /// Register a new call.
    ///
    /// The id is guaranteed distinct from every other pending id.
    pub fn register(&self) -> (CorrelationId, ReplyFuture) {
        let (tx, rx) = oneshot::channel();
        let mut calls = self.calls.lock();

        let id = loop {
            let id = self.ids.generate();
            if !calls.contains_key(&id) {
                break id;
            }
            tracing::debug!(id = %id, "correlation id collision, drawing again");
        };

        calls.insert(id.clone(), tx);
        tracing::trace!(id = %id, pending = calls.len(), "registered pending call");

        let reply = ReplyFuture {
            id: id.clone(),
            rx,
        };
        (id, reply)
    }

    /// Settle a call successfully. Returns `false` if the id is not pending.
    pub fn resolve(&self, id: &str, payload: Value) -> bool {
        self.settle(id, Ok(payload))
    }

    /// Settle a call with an error. Returns `false` if the id is not pending.
    pub fn reject(&self, id: &str, error: ExchangeError) -> bool {
        self.settle(id, Err(error))
    }

    /// Drop a call without settling it (its future reports `Abandoned`).
    pub fn discard(&self, id: &str) -> bool {
        self.calls.lock().remove(id).is_some()
    }

    fn settle(&self, id: &str, outcome: Result<Value>) -> bool {
        let Some(tx) = self.calls.lock().remove(id) else {
            tracing::debug!(id = %id, "no pending call for id, ignoring settlement");
            return false;
        };
        // The caller may have stopped waiting; that is not an error.
        let _ = tx.send(outcome);
        true
    }

    /// Whether `id` is pending.
    pub fn contains(&self, id: &str) -> bool {
        self.calls.lock().contains_key(id)
    }

    /// Number of pending calls.
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// Check if no calls are pending.
    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    /// Ids of all pending calls, sorted (for diagnostics).
    pub fn ids(&self) -> Vec<CorrelationId> {
        let mut ids: Vec<_> = self.calls.lock().keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Future resolving to the peer's response for one call.
///
/// Resolves to the success payload, or to
/// [`ExchangeError::Remote`] carrying the failure payload.
#[derive(Debug)]
pub struct ReplyFuture {
    id: CorrelationId,
    rx: oneshot::Receiver<Result<Value>>,
}

impl ReplyFuture {
    /// Correlation id of this call.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Await the response and deserialize the success payload.
    pub async fn decode<T: DeserializeOwned>(self) -> Result<T> {
        let payload = self.await?;
        Ok(serde_json::from_value(payload)?)
    }
}

impl Future for ReplyFuture {
    type Output = Result<Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ExchangeError::Abandoned(this.id.clone()))),
            Poll::Pending => Poll::Pending,
        }
    }
}
