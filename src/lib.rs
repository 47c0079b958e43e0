//! # msg-exchanger
//!
//! Request/response calls over a fire-and-forget message channel.
//!
//! A channel can only post untyped messages to a peer. This crate layers
//! correlated calls on top: every call travels as an `{ id, content }`
//! envelope, the peer answers under the same id, and the caller's future
//! settles with the peer's success or failure payload.
//!
//! ## Architecture
//!
//! - **Exchanger**: `send` / `send_to` calls, `on` / `off` handlers,
//!   `init` / `uninit` listening
//! - **Dispatcher**: routes inbound traffic to pending calls or handlers,
//!   fanning a request out to every matching handler
//! - **Transport**: the [`Channel`](transport::Channel) trait, with an
//!   in-process hub and a length-prefixed MsgPack byte-stream port
//!
//! ## Example
//!
//! ```
//! use msg_exchanger::handler::Callback;
//! use msg_exchanger::transport::MemoryHub;
//! use msg_exchanger::Exchanger;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let hub = MemoryHub::new();
//! let (host_port, host_inbox) = hub.connect("host");
//! let (plugin_port, plugin_inbox) = hub.connect("plugin");
//!
//! let plugin = Exchanger::new(plugin_port);
//! plugin.on("greet", Callback::sync(|name| {
//!     Ok(json!(format!("hello {}", name.as_str().unwrap_or("stranger"))))
//! }));
//! plugin.init(plugin_inbox)?;
//!
//! let host = Exchanger::builder(host_port).default_target("plugin").build();
//! host.init(host_inbox)?;
//!
//! let reply = host.send("greet", json!("world"))?.await?;
//! assert_eq!(reply, json!("hello world"));
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod pending;
pub mod protocol;
pub mod transport;

mod exchanger;

pub use error::{ExchangeError, Result};
pub use exchanger::{Exchanger, ExchangerBuilder, DEFAULT_CALL_TIMEOUT};
pub use handler::{Callback, Handler, Matcher};
pub use pending::ReplyFuture;
pub use protocol::IdStrategy;
pub use transport::{Channel, Inbound, Inbox, PeerId};
