//! Snare: HTTP interception, fixture substitution and exchange assertions
//!
//! Snare sits between a test driver's outgoing HTTP requests and the network.
//! Tests register rules that match requests by method and URL, answer them from
//! canned responses or named fixtures, rewrite them on the way out or back, and
//! then wait on aliased exchanges to assert on what was actually sent and
//! received.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  request   ┌──────────────────────────────────────┐
//! │ Test driver  │───────────►│ Interceptor                          │
//! │ (browser,    │            │  ├─ RouteMatcher   (rules, priority) │
//! │  app client) │◄───────────│  ├─ FixtureStore   (json / yaml)     │
//! └──────────────┘  response  │  ├─ hooks          (request, reply)  │
//!                             │  └─ ExchangeTable  (aliases, waits)  │
//!        ┌────────────┐       └───────────────┬──────────────────────┘
//!        │ Test body  │◄── wait_for("@alias") ┘   forward │
//!        └────────────┘                           ┌───────▼──────┐
//!                                                 │   Upstream   │
//!                                                 └──────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use snare::{FixtureStore, InMemorySource, InterceptContext, InterceptedRequest, HttpMethod, SnareConfig};
//! use serde_json::json;
//!
//! let fixtures = FixtureStore::new()
//!     .with_source(InMemorySource::new().with("tags", json!({"tags": ["cypress"]})));
//! let ctx = InterceptContext::with_fixtures(SnareConfig::default(), fixtures);
//!
//! ctx.intercept("GET", "**/tags").fixture("tags.json").alias("getTags").register()?;
//!
//! let backend = |_: &InterceptedRequest| -> snare::SnareResult<snare::InterceptedResponse> {
//!     unreachable!("stubbed requests never reach the network")
//! };
//! let response = ctx.dispatch(
//!     InterceptedRequest::new(HttpMethod::Get, "https://api.realworld.io/api/tags"),
//!     &backend,
//! )?;
//! assert_eq!(response.body.field("/tags/0"), Some(&json!("cypress")));
//!
//! let exchange = ctx.wait_for("@getTags")?;
//! exchange.assert_status(200)?;
//! # Ok::<(), snare::SnareError>(())
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

#[cfg(feature = "http")]
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod api;
#[allow(clippy::missing_errors_doc)]
pub mod config;
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn
)]
pub mod context;
#[allow(clippy::missing_errors_doc)]
pub mod exchange;
#[allow(clippy::missing_errors_doc)]
pub mod fixture;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod hook;
#[allow(clippy::missing_errors_doc)]
pub mod http;
#[allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]
pub mod interceptor;
#[allow(clippy::missing_errors_doc)]
pub mod logging;
mod result;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod route;
#[allow(clippy::missing_errors_doc)]
pub mod upstream;
#[allow(clippy::missing_errors_doc)]
pub mod wait;

#[cfg(feature = "http")]
pub use api::{ApiClient, ApiRequest, ApiResponse};
pub use config::SnareConfig;
pub use context::{InterceptContext, RuleBuilder};
pub use exchange::{Exchange, ExchangeState, ExchangeTable};
pub use fixture::{DirectorySource, FixtureSource, FixtureStore, InMemorySource};
pub use hook::{HookOutcome, ReplyHook, RequestHook};
pub use http::{
    Body, Headers, HttpMethod, InterceptedRequest, InterceptedResponse, IntoMethod, RequestUrl,
    StubResponse,
};
pub use interceptor::{Interception, Interceptor, LoggedRequest, PendingExchange};
pub use logging::LogFormat;
pub use result::{SnareError, SnareResult};
pub use route::{
    FixtureResponse, InterceptRule, MatchPolicy, RequestMatcher, ResponseSource, RouteMatcher,
    RuleId, UrlPattern,
};
#[cfg(feature = "http")]
pub use upstream::HttpUpstream;
pub use upstream::Upstream;
pub use wait::{WaitCondition, WaitOptions, WaitResult};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        Exchange, HookOutcome, HttpMethod, InterceptContext, InterceptRule, InterceptedRequest,
        InterceptedResponse, Interception, SnareConfig, SnareError, SnareResult, StubResponse,
        UrlPattern,
    };
    pub use serde_json::json;
}
