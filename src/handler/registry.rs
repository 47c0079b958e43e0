//! Handler registry.
//!
//! An ordered list of handlers. Duplicates are allowed and each one is
//! invoked on a matching request. Matching preserves registration order,
//! which is also the order of results in a fan-out response.
//!
//! # Example
//!
//! ```
//! use msg_exchanger::handler::{Callback, Handler, HandlerRegistry};
//! use serde_json::json;
//!
//! let mut registry = HandlerRegistry::new();
//! let handler = Handler::function(Callback::sync(|_| Ok(json!("pong"))));
//!
//! registry.add(handler.clone());
//! assert_eq!(registry.matching(&json!("ping")).len(), 1);
//!
//! assert!(registry.remove(&handler));
//! assert!(registry.is_empty());
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::Value;

use super::Handler;

/// Equality rule used to find the entry to remove.
pub type HandlerEq = fn(&Handler, &Handler) -> bool;

/// Ordered collection of registered handlers.
#[derive(Clone, Debug, Default)]
pub struct HandlerRegistry {
    handlers: Vec<Handler>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler.
    pub fn add(&mut self, handler: Handler) {
        self.handlers.push(handler);
    }

    /// Remove the first handler identical to `probe`.
    pub fn remove(&mut self, probe: &Handler) -> bool {
        self.remove_by(probe, Handler::same_identity)
    }

    /// Remove the first handler equal to `probe` under `eq`.
    ///
    /// When nothing matches, logs an error and leaves the registry as is.
    pub fn remove_by(&mut self, probe: &Handler, eq: HandlerEq) -> bool {
        match self.handlers.iter().position(|h| eq(h, probe)) {
            Some(idx) => {
                self.handlers.remove(idx);
                true
            }
            None => {
                tracing::error!(
                    kind = probe.tag().map(|t| t.kind.as_str()),
                    "No matched handler!"
                );
                false
            }
        }
    }

    /// Handlers accepting `content`, in registration order.
    ///
    /// A matcher that panics counts as not matching.
    pub fn matching(&self, content: &Value) -> Vec<Handler> {
        self.handlers
            .iter()
            .filter(|h| {
                catch_unwind(AssertUnwindSafe(|| h.matches(content))).unwrap_or_else(|_| {
                    tracing::error!(
                        kind = h.tag().map(|t| t.kind.as_str()),
                        "request matcher panicked"
                    );
                    false
                })
            })
            .cloned()
            .collect()
    }

    /// Iterate over registered handlers.
    pub fn iter(&self) -> impl Iterator<Item = &Handler> {
        self.handlers.iter()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
