//! Handler module - request handlers and their registry.
//!
//! Provides:
//! - [`Callback`] / [`Matcher`] - shared handler functions and predicates
//! - [`Handler`] - a plain function or a predicated `{ match, handle }` pair
//! - [`HandlerRegistry`] - ordered handler list with pluggable removal equality
//!
//! # Example
//!
//! ```
//! use msg_exchanger::handler::{Callback, Handler, Matcher};
//! use serde_json::{json, Value};
//!
//! // Answers everything
//! let any = Handler::function(Callback::sync(|_| Ok(json!("seen"))));
//!
//! // Answers only numbers, asynchronously
//! let numbers = Handler::predicated(
//!     Matcher::new(Value::is_number),
//!     Callback::new(|n| async move { Ok(n) }),
//! );
//!
//! assert!(any.matches(&json!("text")));
//! assert!(!numbers.matches(&json!("text")));
//! ```

mod callback;
mod entry;
mod registry;

pub use callback::{BoxFuture, Callback, HandlerResult, Matcher};
pub use entry::{Handler, HandlerTag};
pub use registry::{HandlerEq, HandlerRegistry};
