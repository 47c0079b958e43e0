//! Registered handlers.

use serde_json::Value;

use super::callback::{BoxFuture, Callback, HandlerResult, Matcher};
use crate::protocol::Request;

/// The `(type, origin)` pair a facade registration is known by.
#[derive(Clone, Debug)]
pub struct HandlerTag {
    /// Request type the handler answers.
    pub kind: String,
    /// Callback the caller registered.
    pub origin: Callback,
}

/// A responder for inbound requests.
#[derive(Clone, Debug)]
pub enum Handler {
    /// Matches every request.
    Function(Callback),
    /// Matches requests accepted by `matcher` (all requests if `None`).
    Predicated {
        matcher: Option<Matcher>,
        handle: Callback,
        tag: Option<HandlerTag>,
    },
}

impl Handler {
    /// Handler that answers every request.
    pub fn function(callback: Callback) -> Self {
        Handler::Function(callback)
    }

    /// Handler that answers requests accepted by `matcher`.
    pub fn predicated(matcher: Matcher, handle: Callback) -> Self {
        Handler::Predicated {
            matcher: Some(matcher),
            handle,
            tag: None,
        }
    }

    /// Facade handler: matches `content.type == kind` and calls `origin`
    /// with `content.message`.
    pub fn tagged(kind: impl Into<String>, origin: Callback) -> Self {
        let kind = kind.into();

        let matcher = {
            let kind = kind.clone();
            Matcher::new(move |content| Request::kind_of(content) == Some(kind.as_str()))
        };
        let handle = {
            let origin = origin.clone();
            Callback::new(move |content| origin.call(Request::take_message(content)))
        };

        Handler::Predicated {
            matcher: Some(matcher),
            handle,
            tag: Some(HandlerTag { kind, origin }),
        }
    }

    /// Whether this handler accepts `content`.
    pub fn matches(&self, content: &Value) -> bool {
        match self {
            Handler::Function(_) => true,
            Handler::Predicated { matcher, .. } => {
                matcher.as_ref().map_or(true, |m| m.matches(content))
            }
        }
    }

    /// Run the handler on `content`.
    pub fn invoke(&self, content: Value) -> BoxFuture<'static, HandlerResult> {
        match self {
            Handler::Function(callback) => callback.call(content),
            Handler::Predicated { handle, .. } => handle.call(content),
        }
    }

    /// Facade tag, if registered through `on`.
    pub fn tag(&self) -> Option<&HandlerTag> {
        match self {
            Handler::Predicated { tag, .. } => tag.as_ref(),
            Handler::Function(_) => None,
        }
    }

    /// Identity equality: both are clones of the same registration.
    pub fn same_identity(a: &Handler, b: &Handler) -> bool {
        match (a, b) {
            (Handler::Function(x), Handler::Function(y)) => x.ptr_eq(y),
            (
                Handler::Predicated {
                    matcher: ma,
                    handle: ha,
                    ..
                },
                Handler::Predicated {
                    matcher: mb,
                    handle: hb,
                    ..
                },
            ) => {
                let same_matcher = match (ma, mb) {
                    (Some(x), Some(y)) => x.ptr_eq(y),
                    (None, None) => true,
                    _ => false,
                };
                same_matcher && ha.ptr_eq(hb)
            }
            _ => false,
        }
    }

    /// Structural equality on `(type, origin)`; untagged handlers never match.
    pub fn same_tag(a: &Handler, b: &Handler) -> bool {
        match (a.tag(), b.tag()) {
            (Some(x), Some(y)) => x.kind == y.kind && x.origin.ptr_eq(&y.origin),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo() -> Callback {
        Callback::sync(Ok)
    }

    #[test]
    fn test_function_matches_everything() {
        let h = Handler::function(echo());
        assert!(h.matches(&json!(null)));
        assert!(h.matches(&json!({ "type": "anything" })));
        assert!(h.tag().is_none());
    }

    #[test]
    fn test_predicate_without_matcher_matches_everything() {
        let h = Handler::Predicated {
            matcher: None,
            handle: echo(),
            tag: None,
        };
        assert!(h.matches(&json!(42)));
    }

    #[tokio::test]
    async fn test_predicated() {
        let h = Handler::predicated(Matcher::new(|c| c.as_i64() == Some(1)), echo());
        assert!(h.matches(&json!(1)));
        assert!(!h.matches(&json!(2)));
        assert_eq!(h.invoke(json!(1)).await, Ok(json!(1)));
    }

    #[tokio::test]
    async fn test_tagged_unwraps_message() {
        let h = Handler::tagged("ping", Callback::sync(|m| Ok(json!({ "echo": m }))));

        let request = Request::new("ping", json!("hi")).into_value();
        assert!(h.matches(&request));
        assert!(!h.matches(&Request::new("pong", json!("hi")).into_value()));
        assert!(!h.matches(&json!("ping")));

        assert_eq!(h.invoke(request).await, Ok(json!({ "echo": "hi" })));
        assert_eq!(h.tag().unwrap().kind, "ping");
    }

    #[test]
    fn test_identity_equality() {
        let cb = echo();
        let a = Handler::function(cb.clone());
        let b = Handler::function(cb);
        let c = Handler::function(echo());

        assert!(Handler::same_identity(&a, &b));
        assert!(!Handler::same_identity(&a, &c));

        // Two tagged wrappers around one origin are distinct objects.
        let origin = echo();
        let t1 = Handler::tagged("x", origin.clone());
        let t2 = Handler::tagged("x", origin);
        assert!(Handler::same_identity(&t1, &t1.clone()));
        assert!(!Handler::same_identity(&t1, &t2));
        assert!(!Handler::same_identity(&a, &t1));
    }

    #[test]
    fn test_tag_equality() {
        let origin = echo();
        let t1 = Handler::tagged("x", origin.clone());
        let t2 = Handler::tagged("x", origin.clone());
        let other_kind = Handler::tagged("y", origin);
        let other_origin = Handler::tagged("x", echo());

        assert!(Handler::same_tag(&t1, &t2));
        assert!(!Handler::same_tag(&t1, &other_kind));
        assert!(!Handler::same_tag(&t1, &other_origin));
        assert!(!Handler::same_tag(&Handler::function(echo()), &Handler::function(echo())));
    }
}
