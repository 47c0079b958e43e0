//! Exchanger builder and runtime.
//!
//! The [`ExchangerBuilder`] configures the channel, default target and
//! call timeout. The [`Exchanger`] then:
//! 1. Sends calls (`send`, `send_to`, `post`) and tracks them until answered
//! 2. Listens on an [`Inbox`] after `init`, settling responses and answering
//!    requests with the registered handlers
//! 3. Stops listening on `uninit`, handing the inbox back
//!
//! # Example
//!
//! ```
//! use msg_exchanger::handler::Callback;
//! use msg_exchanger::transport::MemoryHub;
//! use msg_exchanger::Exchanger;
//! use serde_json::{json, Value};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let hub = MemoryHub::new();
//! let (host_port, host_inbox) = hub.connect("host");
//! let (frame_port, frame_inbox) = hub.connect("frame");
//!
//! let frame = Exchanger::new(frame_port);
//! frame.on("ping", Callback::sync(|_| Ok(json!("pong"))));
//! frame.init(frame_inbox)?;
//!
//! let host = Exchanger::builder(host_port).default_target("frame").build();
//! host.init(host_inbox)?;
//!
//! let reply = host.send("ping", Value::Null)?.await?;
//! assert_eq!(reply, json!("pong"));
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::dispatcher::{run_handlers, Route};
use crate::error::{ExchangeError, Result};
use crate::handler::{Callback, Handler, HandlerEq, HandlerRegistry};
use crate::pending::{PendingCalls, ReplyFuture};
use crate::protocol::{CorrelationId, Envelope, IdStrategy, Request, Response};
use crate::transport::{Channel, Inbound, Inbox, PeerId};

/// Default call timeout: none, calls wait until answered.
pub const DEFAULT_CALL_TIMEOUT: Option<Duration> = None;

/// Builder for configuring and creating an [`Exchanger`].
pub struct ExchangerBuilder {
    channel: Box<dyn Channel>,
    default_target: Option<PeerId>,
    call_timeout: Option<Duration>,
    id_strategy: IdStrategy,
}

impl ExchangerBuilder {
    /// Create a builder over `channel`.
    pub fn new(channel: impl Channel) -> Self {
        Self {
            channel: Box::new(channel),
            default_target: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            id_strategy: IdStrategy::default(),
        }
    }

    /// Peer that `send` addresses.
    ///
    /// Without one, `send` fails with [`ExchangeError::NoTarget`] and only
    /// `send_to` can be used.
    pub fn default_target(mut self, target: impl Into<PeerId>) -> Self {
        self.default_target = Some(target.into());
        self
    }

    /// Reject calls that get no response within `timeout`.
    ///
    /// Calls must then be made within a tokio runtime.
    /// Default: no timeout
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// How correlation ids are generated.
    ///
    /// Default: [`IdStrategy::Random`]
    pub fn id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.id_strategy = strategy;
        self
    }

    /// Build the exchanger. It does not listen until `init` is called.
    pub fn build(self) -> Exchanger {
        Exchanger {
            inner: Arc::new(Inner {
                channel: self.channel,
                default_target: self.default_target,
                call_timeout: self.call_timeout,
                pending: PendingCalls::new(self.id_strategy.generator()),
                handlers: Mutex::new(HandlerRegistry::new()),
                listener: Mutex::new(None),
            }),
        }
    }
}

/// Correlated call/response endpoint over one channel.
///
/// Cheap to clone; clones share the pending calls, handlers and listener.
#[derive(Clone)]
pub struct Exchanger {
    inner: Arc<Inner>,
}

struct Inner {
    channel: Box<dyn Channel>,
    default_target: Option<PeerId>,
    call_timeout: Option<Duration>,
    pending: PendingCalls,
    handlers: Mutex<HandlerRegistry>,
    listener: Mutex<Option<Listener>>,
}

struct Listener {
    stop: oneshot::Sender<()>,
    task: JoinHandle<Inbox>,
}

impl Exchanger {
    /// Create a builder over `channel`.
    pub fn builder(channel: impl Channel) -> ExchangerBuilder {
        ExchangerBuilder::new(channel)
    }

    /// Exchanger with default settings and no default target.
    pub fn new(channel: impl Channel) -> Self {
        ExchangerBuilder::new(channel).build()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start dispatching messages from `inbox`.
    ///
    /// Spawns the listener task, so this must run within a tokio runtime.
    pub fn init(&self, inbox: Inbox) -> Result<()> {
        let mut listener = self.inner.listener.lock();
        if listener.as_ref().is_some_and(|l| !l.task.is_finished()) {
            return Err(ExchangeError::AlreadyListening);
        }

        let (stop, stopped) = oneshot::channel();
        let task = tokio::spawn(listen(Arc::downgrade(&self.inner), inbox, stopped));
        *listener = Some(Listener { stop, task });

        tracing::debug!(peer = %self.local_id(), "exchanger listening");
        Ok(())
    }

    /// Stop dispatching and return the inbox.
    ///
    /// Pending calls stay pending. Returns `None` if not listening.
    pub async fn uninit(&self) -> Option<Inbox> {
        let listener = self.inner.listener.lock().take()?;
        let _ = listener.stop.send(());

        match listener.task.await {
            Ok(inbox) => {
                tracing::debug!(peer = %self.local_id(), "exchanger stopped");
                Some(inbox)
            }
            Err(e) => {
                tracing::warn!(error = %e, "listener task failed");
                None
            }
        }
    }

    /// Whether the listener task is running.
    pub fn is_listening(&self) -> bool {
        self.inner
            .listener
            .lock()
            .as_ref()
            .is_some_and(|l| !l.task.is_finished())
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// Call the default target with `{ type: kind, message }`.
    ///
    /// Fails with [`ExchangeError::NoTarget`], without touching the
    /// channel, if no default target was configured.
    pub fn send(&self, kind: &str, message: Value) -> Result<ReplyFuture> {
        let target = self
            .inner
            .default_target
            .as_ref()
            .ok_or(ExchangeError::NoTarget)?;
        self.send_to(target, kind, message)
    }

    /// Call `target` with `{ type: kind, message }`.
    pub fn send_to(&self, target: &PeerId, kind: &str, message: Value) -> Result<ReplyFuture> {
        self.post(target, Request::new(kind, message).into_value())
    }

    /// Call `target` with arbitrary request content.
    ///
    /// Registers the call before posting so an immediate response is
    /// matched. If the channel refuses the message the call is dropped
    /// and the channel error returned.
    ///
    /// Content shaped exactly like a response (`{ isError: bool, payload }`
    /// and nothing else) is taken by the peer as a stale response and is
    /// never dispatched, so such a call is never answered.
    pub fn post(&self, target: &PeerId, content: Value) -> Result<ReplyFuture> {
        let (id, reply) = self.inner.pending.register();
        let request = Envelope::new(id.clone(), content);

        if let Err(e) = self.inner.channel.post(target, request.into_value()) {
            self.inner.pending.discard(&id);
            return Err(e);
        }
        tracing::debug!(id = %id, peer = %target, "call sent");

        if let Some(timeout) = self.inner.call_timeout {
            self.arm_timeout(id, timeout);
        }
        Ok(reply)
    }

    fn arm_timeout(&self, id: CorrelationId, timeout: Duration) {
        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            if inner.pending.reject(&id, ExchangeError::Timeout(id.clone())) {
                tracing::warn!(id = %id, ?timeout, "call timed out");
            }
        });
    }

    // ------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------

    /// Answer requests of type `kind` with `callback(message)`.
    pub fn on(&self, kind: &str, callback: Callback) -> &Self {
        self.add_handler(Handler::tagged(kind, callback))
    }

    /// Remove one registration made with `on(kind, callback)`.
    ///
    /// `callback` must be a clone of the registered one. Returns `false`
    /// (and logs) if no such registration exists.
    pub fn off(&self, kind: &str, callback: &Callback) -> bool {
        let probe = Handler::tagged(kind, callback.clone());
        self.remove_handler_by(&probe, Handler::same_tag)
    }

    /// Register a handler.
    pub fn add_handler(&self, handler: Handler) -> &Self {
        self.inner.handlers.lock().add(handler);
        self
    }

    /// Remove the first registration identical to `handler`.
    pub fn remove_handler(&self, handler: &Handler) -> bool {
        self.inner.handlers.lock().remove(handler)
    }

    /// Remove the first registration equal to `handler` under `eq`.
    pub fn remove_handler_by(&self, handler: &Handler, eq: HandlerEq) -> bool {
        self.inner.handlers.lock().remove_by(handler, eq)
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Process one inbound message to completion.
    ///
    /// For a request this awaits the handlers and posts the response. The
    /// listener started by `init` does the same, but answers each request
    /// on its own task.
    pub async fn dispatch(&self, message: Inbound) {
        if let Some(answer) = self.route(message) {
            answer.await;
        }
    }

    /// Settle a response immediately; return the work answering a request.
    fn route(&self, message: Inbound) -> Option<impl Future<Output = ()> + Send + 'static> {
        let Inbound { data, source } = message;

        match Route::classify(data, &self.inner.pending) {
            Route::Ignore => {
                tracing::trace!(peer = %source, "ignoring message without correlation id");
                None
            }
            Route::Response { id, response } => {
                let settled = match response.into_result() {
                    Ok(payload) => self.inner.pending.resolve(&id, payload),
                    Err(payload) => self.inner.pending.reject(&id, ExchangeError::Remote(payload)),
                };
                tracing::debug!(id = %id, peer = %source, settled, "response received");
                None
            }
            Route::Stale { id } => {
                tracing::debug!(id = %id, peer = %source, "dropping response for unknown call");
                None
            }
            Route::Request { id, content } => {
                // Matchers are user code; run them outside the lock.
                let registry = self.inner.handlers.lock().clone();
                let handlers = registry.matching(&content);
                let this = self.clone();
                Some(async move { this.answer(id, source, handlers, content).await })
            }
        }
    }

    async fn answer(
        &self,
        id: CorrelationId,
        source: PeerId,
        handlers: Vec<Handler>,
        content: Value,
    ) {
        tracing::debug!(id = %id, peer = %source, matched = handlers.len(), "request received");

        let response = Response::from(run_handlers(handlers, content).await);
        let is_error = response.is_error;
        let reply = Envelope::new(id, response.into_value());

        if let Err(e) = self.inner.channel.post(&source, reply.into_value()) {
            tracing::warn!(peer = %source, error = %e, "failed to deliver response");
        } else {
            tracing::trace!(peer = %source, is_error, "response sent");
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Identity of this end of the channel.
    pub fn local_id(&self) -> &PeerId {
        self.inner.channel.local_id()
    }

    /// Peer addressed by `send`, if configured.
    pub fn default_target(&self) -> Option<&PeerId> {
        self.inner.default_target.as_ref()
    }

    /// Number of calls awaiting a response.
    pub fn pending_calls(&self) -> usize {
        self.inner.pending.len()
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.inner.handlers.lock().len()
    }
}

/// Listener loop: route every inbound message until stopped.
///
/// Holds only a weak reference so a forgotten exchanger is not kept alive.
async fn listen(inner: Weak<Inner>, mut inbox: Inbox, mut stop: oneshot::Receiver<()>) -> Inbox {
    loop {
        tokio::select! {
            _ = &mut stop => break,
            message = inbox.recv() => {
                let Some(message) = message else {
                    tracing::debug!("inbox closed, listener exiting");
                    break;
                };
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let exchanger = Exchanger { inner };
                if let Some(answer) = exchanger.route(message) {
                    tokio::spawn(answer);
                }
            }
        }
    }
    inbox
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::NO_HANDLER_MESSAGE;
    use crate::transport::MemoryHub;
    use serde_json::json;
    use tokio::sync::mpsc;

    /// Exchanger on "me" plus the inbox of a silent peer "you".
    fn lone_exchanger() -> (Exchanger, Inbox, MemoryHub) {
        let hub = MemoryHub::new();
        let (port, _own_inbox) = hub.connect("me");
        let (_peer, peer_inbox) = hub.connect("you");
        let ex = Exchanger::builder(port)
            .default_target("you")
            .id_strategy(IdStrategy::Sequential)
            .build();
        (ex, peer_inbox, hub)
    }

    #[test]
    fn test_builder_configuration() {
        let hub = MemoryHub::new();
        let (port, _inbox) = hub.connect("me");
        let ex = Exchanger::builder(port)
            .default_target("you")
            .call_timeout(Duration::from_secs(3))
            .build();

        assert_eq!(ex.default_target(), Some(&PeerId::new("you")));
        assert_eq!(ex.inner.call_timeout, Some(Duration::from_secs(3)));
        assert_eq!(ex.local_id().as_str(), "me");
        assert_eq!(ex.pending_calls(), 0);
        assert!(!ex.is_listening());
    }

    #[test]
    fn test_send_without_target_has_no_side_effects() {
        let hub = MemoryHub::new();
        let (port, _inbox) = hub.connect("me");
        let (_peer, mut peer_inbox) = hub.connect("you");
        let ex = Exchanger::new(port);

        let err = ex.send("ping", Value::Null).unwrap_err();
        assert!(matches!(err, ExchangeError::NoTarget));
        assert_eq!(ex.pending_calls(), 0);
        assert!(peer_inbox.try_recv().is_err());
    }

    #[test]
    fn test_send_writes_request_envelope() {
        let (ex, mut peer_inbox, _hub) = lone_exchanger();

        let reply = ex.send("ping", json!({ "n": 1 })).unwrap();
        let inbound = peer_inbox.try_recv().unwrap();

        assert_eq!(inbound.source.as_str(), "me");
        assert_eq!(
            inbound.data,
            json!({ "id": reply.id(), "content": { "type": "ping", "message": { "n": 1 } } })
        );
        assert_eq!(ex.pending_calls(), 1);
    }

    #[test]
    fn test_send_to_unknown_peer_drops_call() {
        let (ex, _peer_inbox, _hub) = lone_exchanger();

        let err = ex.send_to(&PeerId::new("ghost"), "ping", Value::Null).unwrap_err();
        assert!(matches!(err, ExchangeError::UnknownPeer(_)));
        assert_eq!(ex.pending_calls(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_response_settles_call() {
        let (ex, _peer_inbox, _hub) = lone_exchanger();
        let reply = ex.send("ping", Value::Null).unwrap();
        let id = reply.id().to_string();

        let response = Envelope::new(id, Response::ok(json!("pong")).into_value());
        ex.dispatch(Inbound::new(response.into_value(), "you")).await;

        assert_eq!(reply.await.unwrap(), json!("pong"));
        assert_eq!(ex.pending_calls(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_error_response_rejects_call() {
        let (ex, _peer_inbox, _hub) = lone_exchanger();
        let reply = ex.send("ping", Value::Null).unwrap();
        let id = reply.id().to_string();

        let response = Envelope::new(id, Response::err(json!({ "code": 7 })).into_value());
        ex.dispatch(Inbound::new(response.into_value(), "you")).await;

        let err = reply.await.unwrap_err();
        assert_eq!(err.remote_payload(), Some(&json!({ "code": 7 })));
        assert_eq!(ex.pending_calls(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_request_answers_source() {
        let (ex, mut peer_inbox, _hub) = lone_exchanger();
        ex.on("ping", Callback::sync(|m| Ok(json!({ "pong": m }))));

        let request = Envelope::new("r1", Request::new("ping", json!(5)).into_value());
        ex.dispatch(Inbound::new(request.into_value(), "you")).await;

        let inbound = peer_inbox.try_recv().unwrap();
        assert_eq!(
            inbound.data,
            json!({ "id": "r1", "content": { "isError": false, "payload": { "pong": 5 } } })
        );
    }

    #[tokio::test]
    async fn test_dispatch_request_without_handler() {
        let (ex, mut peer_inbox, _hub) = lone_exchanger();

        let request = Envelope::new("r2", Request::new("nope", Value::Null).into_value());
        ex.dispatch(Inbound::new(request.into_value(), "you")).await;

        let inbound = peer_inbox.try_recv().unwrap();
        assert_eq!(
            inbound.data,
            json!({ "id": "r2", "content": { "isError": true, "payload": NO_HANDLER_MESSAGE } })
        );
    }

    #[tokio::test]
    async fn test_dispatch_ignores_untagged_traffic() {
        let (ex, mut peer_inbox, _hub) = lone_exchanger();
        ex.add_handler(Handler::function(Callback::sync(|_| Ok(Value::Null))));

        ex.dispatch(Inbound::new(json!({ "unrelated": true }), "you")).await;
        ex.dispatch(Inbound::new(json!("plain string"), "you")).await;

        assert!(peer_inbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_late_response_is_noop() {
        let (ex, mut peer_inbox, _hub) = lone_exchanger();
        let reply = ex.send("ping", Value::Null).unwrap();
        peer_inbox.try_recv().unwrap();
        let id = reply.id().to_string();

        let first = Envelope::new(id.clone(), Response::ok(json!(1)).into_value());
        ex.dispatch(Inbound::new(first.into_value(), "you")).await;
        assert_eq!(reply.await.unwrap(), json!(1));

        let duplicate = Envelope::new(id, Response::ok(json!(2)).into_value());
        ex.dispatch(Inbound::new(duplicate.into_value(), "you")).await;
        assert_eq!(ex.pending_calls(), 0);
        assert!(peer_inbox.try_recv().is_err());
    }

    #[test]
    fn test_on_off() {
        let (ex, _peer_inbox, _hub) = lone_exchanger();
        let cb = Callback::sync(|_| Ok(Value::Null));

        ex.on("a", cb.clone()).on("a", cb.clone());
        assert_eq!(ex.handler_count(), 2);

        assert!(ex.off("a", &cb));
        assert_eq!(ex.handler_count(), 1);
        assert!(!ex.off("b", &cb));
        assert!(!ex.off("a", &Callback::sync(|_| Ok(Value::Null))));
        assert_eq!(ex.handler_count(), 1);
    }

    #[test]
    fn test_remove_handler_identity() {
        let (ex, _peer_inbox, _hub) = lone_exchanger();
        let h = Handler::function(Callback::sync(|_| Ok(Value::Null)));

        ex.add_handler(h.clone());
        assert!(!ex.remove_handler(&Handler::function(Callback::sync(|_| Ok(Value::Null)))));
        assert!(ex.remove_handler(&h));
        assert_eq!(ex.handler_count(), 0);
    }

    #[tokio::test]
    async fn test_init_uninit_round_trip() {
        let (ex, _peer_inbox, _hub) = lone_exchanger();
        let (_tx, rx) = mpsc::unbounded_channel();

        ex.init(rx).unwrap();
        assert!(ex.is_listening());

        let (_tx2, rx2) = mpsc::unbounded_channel();
        assert!(matches!(ex.init(rx2), Err(ExchangeError::AlreadyListening)));

        let inbox = ex.uninit().await;
        assert!(inbox.is_some());
        assert!(!ex.is_listening());
        assert!(ex.uninit().await.is_none());

        // The returned inbox can be listened on again.
        ex.init(inbox.unwrap()).unwrap();
        assert!(ex.is_listening());
    }

    #[tokio::test]
    async fn test_timeout_rejects_and_cleans_up() {
        let hub = MemoryHub::new();
        let (port, _inbox) = hub.connect("me");
        let (_peer, _peer_inbox) = hub.connect("you");
        let ex = Exchanger::builder(port)
            .default_target("you")
            .call_timeout(Duration::from_millis(20))
            .build();

        let reply = ex.send("slow", Value::Null).unwrap();
        let id = reply.id().to_string();

        let err = reply.await.unwrap_err();
        assert!(matches!(err, ExchangeError::Timeout(ref t) if *t == id));
        assert_eq!(ex.pending_calls(), 0);
    }
}
