//! Rewrite hooks.
//!
//! A request hook receives an explicit mutable copy of the outgoing request and
//! returns what should happen next. It never reaches the engine's state; the
//! only way to affect the response is to hand back a [`ReplyHook`] or a stub.

use crate::http::{InterceptedRequest, InterceptedResponse, StubResponse};
use crate::result::SnareResult;
use std::fmt;
use std::sync::Arc;

/// Mutates the response immediately before it is delivered to the caller
pub type ReplyHook = Box<dyn FnOnce(&mut InterceptedResponse) -> SnareResult<()> + Send>;

/// What a request hook decided
pub enum HookOutcome {
    /// Proceed with the rule's response source
    Continue,
    /// Proceed, then run this hook on the obtained response
    Reply(ReplyHook),
    /// Short-circuit with this response (the rule's source is skipped)
    Respond(StubResponse),
    /// Short-circuit with this response, then run the reply hook on it
    RespondThen(StubResponse, ReplyHook),
}

impl HookOutcome {
    /// Attach a reply hook
    pub fn reply<F>(f: F) -> Self
    where
        F: FnOnce(&mut InterceptedResponse) -> SnareResult<()> + Send + 'static,
    {
        Self::Reply(Box::new(f))
    }

    /// Short-circuit with a stub
    #[must_use]
    pub fn respond(stub: StubResponse) -> Self {
        Self::Respond(stub)
    }

    /// Short-circuit with a stub that the reply hook still rewrites
    pub fn respond_then<F>(stub: StubResponse, f: F) -> Self
    where
        F: FnOnce(&mut InterceptedResponse) -> SnareResult<()> + Send + 'static,
    {
        Self::RespondThen(stub, Box::new(f))
    }

    /// Name of the variant, for logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Reply(_) => "reply",
            Self::Respond(_) => "respond",
            Self::RespondThen(..) => "respond_then",
        }
    }

    /// Split into the short-circuit stub and the pending reply hook
    #[must_use]
    pub fn into_parts(self) -> (Option<StubResponse>, Option<ReplyHook>) {
        match self {
            Self::Continue => (None, None),
            Self::Reply(reply) => (None, Some(reply)),
            Self::Respond(stub) => (Some(stub), None),
            Self::RespondThen(stub, reply) => (Some(stub), Some(reply)),
        }
    }

    /// Inverse of [`HookOutcome::into_parts`]
    #[must_use]
    pub fn from_parts(stub: Option<StubResponse>, reply: Option<ReplyHook>) -> Self {
        match (stub, reply) {
            (None, None) => Self::Continue,
            (None, Some(reply)) => Self::Reply(reply),
            (Some(stub), None) => Self::Respond(stub),
            (Some(stub), Some(reply)) => Self::RespondThen(stub, reply),
        }
    }
}

impl fmt::Debug for HookOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Respond(stub) => f.debug_tuple("Respond").field(stub).finish(),
            Self::RespondThen(stub, _) => f
                .debug_struct("RespondThen")
                .field("stub", stub)
                .finish_non_exhaustive(),
            other => f.write_str(other.kind()),
        }
    }
}

type RequestHookFn = dyn Fn(&mut InterceptedRequest) -> SnareResult<HookOutcome> + Send + Sync;

/// Hook invoked with a mutable copy of each matched request
#[derive(Clone)]
pub struct RequestHook {
    func: Arc<RequestHookFn>,
}

impl fmt::Debug for RequestHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHook").finish_non_exhaustive()
    }
}

impl RequestHook {
    /// Wrap a request hook function
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut InterceptedRequest) -> SnareResult<HookOutcome> + Send + Sync + 'static,
    {
        Self { func: Arc::new(f) }
    }

    /// Hook that leaves the request alone and only rewrites the response
    pub fn on_reply<F>(f: F) -> Self
    where
        F: Fn(&mut InterceptedResponse) -> SnareResult<()> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::new(move |_req| {
            let f = Arc::clone(&f);
            Ok(HookOutcome::reply(move |res| f(res)))
        })
    }

    /// Invoke the hook
    pub fn call(&self, request: &mut InterceptedRequest) -> SnareResult<HookOutcome> {
        (self.func)(request)
    }

    /// Run `self`, then `next` on the request `self` left behind.
    ///
    /// A stub from either side wins over the rule source; if both respond,
    /// `next` has the last word. Reply hooks from both sides are kept and run
    /// in registration order on whatever response is delivered.
    #[must_use]
    pub fn then(self, next: RequestHook) -> Self {
        Self::new(move |req| {
            let first = self.call(req)?;
            let second = next.call(req)?;
            Ok(combine(first, second))
        })
    }
}

fn combine(first: HookOutcome, second: HookOutcome) -> HookOutcome {
    let (first_stub, first_reply) = first.into_parts();
    let (second_stub, second_reply) = second.into_parts();
    let reply: Option<ReplyHook> = match (first_reply, second_reply) {
        (Some(a), Some(b)) => Some(Box::new(move |res: &mut InterceptedResponse| {
            a(res)?;
            b(res)
        })),
        (a, b) => a.or(b),
    };
    HookOutcome::from_parts(second_stub.or(first_stub), reply)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use crate::result::SnareError;
    use serde_json::json;

    fn post() -> InterceptedRequest {
        InterceptedRequest::new(HttpMethod::Post, "https://api.test/api/articles")
            .with_json(json!({"article": {"description": "original"}}))
    }

    #[test]
    fn test_request_mutation_is_visible_to_caller() {
        let hook = RequestHook::new(|req| {
            req.body
                .set_field("/article/description", json!("rewritten"))?;
            Ok(HookOutcome::Continue)
        });
        let mut req = post();
        let outcome = hook.call(&mut req).unwrap();
        assert!(matches!(outcome, HookOutcome::Continue));
        assert_eq!(
            req.body.field("/article/description"),
            Some(&json!("rewritten"))
        );
    }

    #[test]
    fn test_on_reply_runs_on_response() {
        let hook = RequestHook::on_reply(|res| {
            res.body.set_field("/article/description", json!("X"))
        });
        let mut req = post();
        let HookOutcome::Reply(reply) = hook.call(&mut req).unwrap() else {
            panic!("expected reply outcome");
        };
        let mut res = InterceptedResponse::json(json!({"article": {"description": "a"}}));
        reply(&mut res).unwrap();
        assert_eq!(res.body.field("/article/description"), Some(&json!("X")));
    }

    #[test]
    fn test_hook_error_propagates() {
        let hook = RequestHook::new(|_| Err(SnareError::assertion("unexpected body")));
        assert!(hook.call(&mut post()).is_err());
    }

    #[test]
    fn test_then_chains_reply_hooks_in_order() {
        let a = RequestHook::on_reply(|res| {
            res.body.set_field("/trail", json!("a"))
        });
        let b = RequestHook::on_reply(|res| {
            let trail = res.body.field("/trail").cloned().unwrap_or(json!(""));
            res.body
                .set_field("/trail", json!(format!("{}b", trail.as_str().unwrap_or(""))))
        });
        let HookOutcome::Reply(reply) = a.then(b).call(&mut post()).unwrap() else {
            panic!("expected reply outcome");
        };
        let mut res = InterceptedResponse::json(json!({}));
        reply(&mut res).unwrap();
        assert_eq!(res.body.field("/trail"), Some(&json!("ab")));
    }

    #[test]
    fn test_then_respond_wins() {
        let a = RequestHook::new(|_| Ok(HookOutcome::respond(StubResponse::new().with_status(201))));
        let b = RequestHook::new(|_| Ok(HookOutcome::Continue));
        match a.then(b).call(&mut post()).unwrap() {
            HookOutcome::Respond(stub) => assert_eq!(stub.status, 201),
            other => panic!("expected respond, got {other:?}"),
        }
    }

    #[test]
    fn test_reply_survives_a_later_respond() {
        let rewrite = RequestHook::on_reply(|res| res.body.set_field("/rewritten", json!(true)));
        let stub = RequestHook::new(|_| {
            Ok(HookOutcome::respond(StubResponse::json(json!({"tags": []}))))
        });
        let HookOutcome::RespondThen(stub, reply) = rewrite.then(stub).call(&mut post()).unwrap()
        else {
            panic!("expected respond_then outcome");
        };
        let mut res = stub.to_response();
        reply(&mut res).unwrap();
        assert_eq!(res.body.field("/tags"), Some(&json!([])));
        assert_eq!(res.body.field("/rewritten"), Some(&json!(true)));
    }

    #[test]
    fn test_reply_after_respond_is_kept() {
        let stub = RequestHook::new(|_| Ok(HookOutcome::respond(StubResponse::new())));
        let rewrite = RequestHook::on_reply(|res| res.body.set_field("/late", json!(1)));
        let outcome = stub.then(rewrite).call(&mut post()).unwrap();
        assert_eq!(outcome.kind(), "respond_then");
    }

    #[test]
    fn test_parts_round_trip_every_shape() {
        let (stub, reply) = HookOutcome::Continue.into_parts();
        assert!(stub.is_none() && reply.is_none());
        let (stub, reply) = HookOutcome::respond_then(StubResponse::new(), |_| Ok(())).into_parts();
        assert!(stub.is_some() && reply.is_some());
        assert_eq!(HookOutcome::from_parts(stub, None).kind(), "respond");
    }

    #[test]
    fn test_outcome_kind() {
        assert_eq!(HookOutcome::Continue.kind(), "continue");
        assert_eq!(HookOutcome::reply(|_| Ok(())).kind(), "reply");
        assert_eq!(
            HookOutcome::respond_then(StubResponse::new(), |_| Ok(())).kind(),
            "respond_then"
        );
    }
}
