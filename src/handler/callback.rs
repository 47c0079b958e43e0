//! Handler functions and match predicates.
//!
//! A [`Callback`] is a shared async function from request content to a
//! [`HandlerResult`]. Clones share identity, so a clone kept by the caller
//! can later remove the registration it was used for.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Outcome of a handler: success payload or failure payload.
pub type HandlerResult = std::result::Result<Value, Value>;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type CallbackFn = dyn Fn(Value) -> BoxFuture<'static, HandlerResult> + Send + Sync;
type MatchFn = dyn Fn(&Value) -> bool + Send + Sync;

/// Shared handler function.
#[derive(Clone)]
pub struct Callback(Arc<CallbackFn>);

impl Callback {
    /// Wrap an async function.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self(Arc::new(move |content| Box::pin(f(content))))
    }

    /// Wrap a function that produces its result synchronously.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(Value) -> HandlerResult + Send + Sync + 'static,
    {
        Self(Arc::new(move |content| {
            let result = f(content);
            Box::pin(std::future::ready(result))
        }))
    }

    /// Wrap an async function over serde types.
    ///
    /// Content that does not deserialize into `T` fails the call with a
    /// string describing the decode error.
    pub fn typed<F, T, Fut, R, E>(f: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
        R: Serialize,
        E: Serialize,
    {
        let f = Arc::new(f);
        Self::new(move |content| {
            let f = f.clone();
            async move {
                let input: T = serde_json::from_value(content)
                    .map_err(|e| Value::String(format!("invalid message: {}", e)))?;
                match f(input).await {
                    Ok(output) => serde_json::to_value(output).map_err(encode_failure),
                    Err(error) => Err(serde_json::to_value(error).map_err(encode_failure)?),
                }
            }
        })
    }

    /// Invoke with request content.
    pub fn call(&self, content: Value) -> BoxFuture<'static, HandlerResult> {
        (self.0)(content)
    }

    /// Whether both callbacks are clones of the same function.
    pub fn ptr_eq(&self, other: &Callback) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

fn encode_failure(e: serde_json::Error) -> Value {
    Value::String(format!("unencodable result: {}", e))
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Arc::as_ptr(&self.0))
    }
}

/// Shared predicate over request content.
#[derive(Clone)]
pub struct Matcher(Arc<MatchFn>);

impl Matcher {
    /// Wrap a predicate.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Evaluate against request content.
    pub fn matches(&self, content: &Value) -> bool {
        (self.0)(content)
    }

    /// Whether both matchers are clones of the same predicate.
    pub fn ptr_eq(&self, other: &Matcher) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Matcher({:p})", Arc::as_ptr(&self.0))
    }
}
