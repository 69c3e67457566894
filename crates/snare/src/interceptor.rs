//! Interceptor engine.
//!
//! Sits between the driver's outgoing requests and the network. Each request
//! is logged, matched against the rule registry and then passed through,
//! fulfilled locally, or forwarded with a pending exchange the driver settles
//! once the real response arrives.

use crate::exchange::ExchangeTable;
use crate::fixture::FixtureStore;
use crate::hook::{HookOutcome, ReplyHook};
use crate::http::{HttpMethod, InterceptedRequest, InterceptedResponse, StubResponse};
use crate::result::{SnareError, SnareResult};
use crate::route::{
    FixtureResponse, InterceptRule, MatchPolicy, ResponseSource, RouteMatcher, RuleId, UrlPattern,
};
use crate::upstream::Upstream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

// =============================================================================
// REQUEST LOG
// =============================================================================

/// A request seen by the interceptor, matched or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Request URL
    pub url: String,
    /// Rule that matched, if any
    pub rule_id: Option<RuleId>,
    /// Milliseconds since the interceptor was created
    pub timestamp_ms: u64,
}

// =============================================================================
// INTERCEPTION OUTCOMES
// =============================================================================

/// A forwarded request awaiting its real response
pub struct PendingExchange {
    exchange_id: Uuid,
    rule_id: RuleId,
    alias: Option<String>,
    request: InterceptedRequest,
    reply: Option<ReplyHook>,
}

impl fmt::Debug for PendingExchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingExchange")
            .field("exchange_id", &self.exchange_id)
            .field("rule_id", &self.rule_id)
            .field("alias", &self.alias)
            .field("request", &self.request)
            .field("has_reply_hook", &self.reply.is_some())
            .finish()
    }
}

impl PendingExchange {
    /// Exchange id in the table
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.exchange_id
    }

    /// Matching rule
    #[must_use]
    pub const fn rule_id(&self) -> RuleId {
        self.rule_id
    }

    /// Alias of the matching rule
    #[must_use]
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// The request to send, after any request hook
    #[must_use]
    pub const fn request(&self) -> &InterceptedRequest {
        &self.request
    }
}

/// What the driver should do with an outgoing request
#[derive(Debug)]
pub enum Interception {
    /// Send the original request unchanged; nothing was recorded
    PassThrough,
    /// Do not touch the network; deliver this response after `delay_ms`
    Fulfill {
        /// Response to deliver
        response: InterceptedResponse,
        /// Delivery delay in milliseconds
        delay_ms: u64,
    },
    /// Send [`PendingExchange::request`], then call
    /// [`Interceptor::complete`] or [`Interceptor::fail`]
    Forward(PendingExchange),
}

impl Interception {
    /// Name of the variant, for logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PassThrough => "pass_through",
            Self::Fulfill { .. } => "fulfill",
            Self::Forward(_) => "forward",
        }
    }
}

// =============================================================================
// INTERCEPTOR
// =============================================================================

/// The interception engine for one test case
pub struct Interceptor {
    routes: Mutex<RouteMatcher>,
    exchanges: ExchangeTable,
    log: Mutex<Vec<LoggedRequest>>,
    fixtures: Arc<FixtureStore>,
    block_unmatched: bool,
    log_requests: bool,
    start: Instant,
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("rules", &self.rule_count())
            .field("exchanges", &self.exchanges.len())
            .field("block_unmatched", &self.block_unmatched)
            .finish_non_exhaustive()
    }
}

impl Interceptor {
    /// Create an engine backed by a fixture store
    #[must_use]
    pub fn new(fixtures: Arc<FixtureStore>, policy: MatchPolicy) -> Self {
        Self {
            routes: Mutex::new(RouteMatcher::new(policy)),
            exchanges: ExchangeTable::new(),
            log: Mutex::new(Vec::new()),
            fixtures,
            block_unmatched: false,
            log_requests: false,
            start: Instant::now(),
        }
    }

    /// Answer unmatched requests with 404 instead of passing them through
    #[must_use]
    pub const fn block_unmatched(mut self, block: bool) -> Self {
        self.block_unmatched = block;
        self
    }

    /// Emit every request at info level
    #[must_use]
    pub const fn log_requests(mut self, enabled: bool) -> Self {
        self.log_requests = enabled;
        self
    }

    fn routes(&self) -> MutexGuard<'_, RouteMatcher> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request_log(&self) -> MutexGuard<'_, Vec<LoggedRequest>> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fixture store used for fixture-backed rules
    #[must_use]
    pub fn fixtures(&self) -> &Arc<FixtureStore> {
        &self.fixtures
    }

    /// Exchange history
    #[must_use]
    pub const fn exchanges(&self) -> &ExchangeTable {
        &self.exchanges
    }

    // -------------------------------------------------------------------------
    // Rule registry
    // -------------------------------------------------------------------------

    /// Register a rule
    pub fn register(&self, rule: InterceptRule) -> SnareResult<RuleId> {
        self.routes().register(rule)
    }

    /// Remove a rule
    pub fn unregister(&self, id: RuleId) -> bool {
        self.routes().unregister(id)
    }

    /// Number of registered rules
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.routes().len()
    }

    /// Snapshot of registered rules
    #[must_use]
    pub fn rules(&self) -> Vec<InterceptRule> {
        self.routes().rules().cloned().collect()
    }

    /// Drop rules, exchanges and the request log. Returns how many
    /// exchanges were still pending.
    pub fn reset(&self) -> usize {
        self.routes().clear();
        self.request_log().clear();
        self.exchanges.clear()
    }

    // -------------------------------------------------------------------------
    // Interception
    // -------------------------------------------------------------------------

    #[allow(clippy::cast_possible_truncation)]
    fn record(&self, request: &InterceptedRequest, rule_id: Option<RuleId>) {
        let entry = LoggedRequest {
            method: request.method,
            url: request.url.clone(),
            rule_id,
            timestamp_ms: self.start.elapsed().as_millis() as u64,
        };
        if self.log_requests {
            tracing::info!(method = %entry.method, url = %entry.url, matched = rule_id.is_some(), "request");
        }
        self.request_log().push(entry);
    }

    /// Decide what happens to an outgoing request
    pub fn intercept(&self, request: InterceptedRequest) -> SnareResult<Interception> {
        let rule = self.routes().claim(request.method, &request.url);
        self.record(&request, rule.as_ref().map(|r| r.id));

        let Some(rule) = rule else {
            if self.block_unmatched {
                tracing::debug!(method = %request.method, url = %request.url, "blocked unmatched request");
                return Ok(Interception::Fulfill {
                    response: StubResponse::error(404, "blocked by interceptor").to_response(),
                    delay_ms: 0,
                });
            }
            return Ok(Interception::PassThrough);
        };

        let exchange_id = self
            .exchanges
            .open(rule.alias.as_deref(), rule.id, request.clone());

        let mut request = request;
        let outcome = match &rule.hook {
            Some(hook) => {
                let outcome = hook
                    .call(&mut request)
                    .map_err(|e| self.rewrite_failed(rule.alias.as_deref(), exchange_id, &e))?;
                self.exchanges.update_request(exchange_id, request.clone());
                outcome
            }
            None => HookOutcome::Continue,
        };

        let (stub, reply) = outcome.into_parts();

        let (response, delay_ms) = match (stub, &rule.source) {
            (Some(stub), _) => (stub.to_response(), stub.delay_ms),
            (None, ResponseSource::Literal(stub)) => (stub.to_response(), stub.delay_ms),
            (None, ResponseSource::Fixture(fixture)) => {
                let response = self.fixture_response(fixture).map_err(|e| {
                    self.exchanges.fail(exchange_id, &e.to_string());
                    e
                })?;
                (response, fixture.delay_ms)
            }
            (None, ResponseSource::Network) => {
                return Ok(Interception::Forward(PendingExchange {
                    exchange_id,
                    rule_id: rule.id,
                    alias: rule.alias,
                    request,
                    reply,
                }));
            }
        };

        let response = self.settle(rule.alias.as_deref(), exchange_id, reply, response)?;
        Ok(Interception::Fulfill { response, delay_ms })
    }

    fn fixture_response(&self, fixture: &FixtureResponse) -> SnareResult<InterceptedResponse> {
        let payload = self.fixtures.load(&fixture.name)?;
        let mut response = InterceptedResponse::new(fixture.status).with_json(payload);
        for (name, value) in &fixture.headers {
            response.set_header(name, value);
        }
        Ok(response)
    }

    fn rewrite_failed(&self, alias: Option<&str>, exchange_id: Uuid, err: &SnareError) -> SnareError {
        let message = err.to_string();
        tracing::warn!(alias = alias.unwrap_or(""), error = %message, "rewrite hook failed");
        self.exchanges.fail(exchange_id, &message);
        SnareError::RewriteFailure {
            alias: alias.map(str::to_string),
            message,
        }
    }

    fn settle(
        &self,
        alias: Option<&str>,
        exchange_id: Uuid,
        reply: Option<ReplyHook>,
        mut response: InterceptedResponse,
    ) -> SnareResult<InterceptedResponse> {
        if let Some(reply) = reply {
            reply(&mut response).map_err(|e| self.rewrite_failed(alias, exchange_id, &e))?;
        }
        self.exchanges.resolve(exchange_id, response.clone());
        Ok(response)
    }

    /// Settle a forwarded exchange with the real response
    pub fn complete(
        &self,
        pending: PendingExchange,
        response: InterceptedResponse,
    ) -> SnareResult<InterceptedResponse> {
        self.settle(
            pending.alias.as_deref(),
            pending.exchange_id,
            pending.reply,
            response,
        )
    }

    /// Settle a forwarded exchange as failed (network error)
    pub fn fail(&self, pending: PendingExchange, message: &str) {
        tracing::warn!(
            alias = pending.alias.as_deref().unwrap_or(""),
            url = %pending.request.url,
            error = message,
            "forwarded request failed"
        );
        self.exchanges.fail(pending.exchange_id, message);
    }

    /// Intercept and carry the request to completion through `upstream`
    pub fn dispatch(
        &self,
        request: InterceptedRequest,
        upstream: &dyn Upstream,
    ) -> SnareResult<InterceptedResponse> {
        match self.intercept(request.clone())? {
            Interception::PassThrough => upstream.forward(&request),
            Interception::Fulfill { response, delay_ms } => {
                if delay_ms > 0 {
                    std::thread::sleep(Duration::from_millis(delay_ms));
                }
                Ok(response)
            }
            Interception::Forward(pending) => match upstream.forward(pending.request()) {
                Ok(response) => self.complete(pending, response),
                Err(e) => {
                    self.fail(pending, &e.to_string());
                    Err(e)
                }
            },
        }
    }

    // -------------------------------------------------------------------------
    // Request log assertions
    // -------------------------------------------------------------------------

    /// Every request seen, in order
    #[must_use]
    pub fn requests(&self) -> Vec<LoggedRequest> {
        self.request_log().clone()
    }

    /// Requests whose method and URL match
    pub fn requests_matching(
        &self,
        method: HttpMethod,
        pattern: impl Into<UrlPattern>,
    ) -> SnareResult<Vec<LoggedRequest>> {
        let compiled = pattern.into().compile()?;
        Ok(self
            .request_log()
            .iter()
            .filter(|r| method.matches(&r.method) && compiled.is_match(&r.url))
            .cloned()
            .collect())
    }

    /// Assert at least one matching request was seen
    pub fn assert_requested(&self, method: HttpMethod, pattern: impl Into<UrlPattern>) -> SnareResult<()> {
        let pattern = pattern.into();
        if self.requests_matching(method, pattern.clone())?.is_empty() {
            return Err(SnareError::assertion(format!(
                "expected a {method} request matching {pattern}, saw none"
            )));
        }
        Ok(())
    }

    /// Assert exactly `times` matching requests were seen
    pub fn assert_requested_times(
        &self,
        method: HttpMethod,
        pattern: impl Into<UrlPattern>,
        times: usize,
    ) -> SnareResult<()> {
        let pattern = pattern.into();
        let actual = self.requests_matching(method, pattern.clone())?.len();
        if actual != times {
            return Err(SnareError::assertion(format!(
                "expected {times} {method} request(s) matching {pattern}, saw {actual}"
            )));
        }
        Ok(())
    }

    /// Assert no matching request was seen
    pub fn assert_not_requested(
        &self,
        method: HttpMethod,
        pattern: impl Into<UrlPattern>,
    ) -> SnareResult<()> {
        self.assert_requested_times(method, pattern, 0)
    }
}
