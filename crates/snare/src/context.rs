//! Per-test interception context.
//!
//! An [`InterceptContext`] owns the fixture store, the rule registry, the
//! exchange table and the request log for one test case. Clones share the same
//! state, so a driver thread can intercept while the test thread waits.

use crate::config::SnareConfig;
use crate::exchange::Exchange;
use crate::fixture::FixtureStore;
use crate::hook::{HookOutcome, RequestHook};
use crate::http::{
    InterceptedRequest, InterceptedResponse, IntoMethod, StubResponse,
};
use crate::interceptor::{Interception, Interceptor, LoggedRequest, PendingExchange};
use crate::result::SnareResult;
use crate::route::{FixtureResponse, InterceptRule, ResponseSource, RuleId, UrlPattern};
use crate::upstream::Upstream;
use crate::wait::{self, WaitOptions, WaitResult};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug)]
struct ContextInner {
    config: SnareConfig,
    fixtures: Arc<FixtureStore>,
    engine: Interceptor,
}

/// Interception state for one test case
#[derive(Debug, Clone)]
pub struct InterceptContext {
    inner: Arc<ContextInner>,
}

impl Default for InterceptContext {
    fn default() -> Self {
        Self::new(SnareConfig::default())
    }
}

impl InterceptContext {
    /// Create a context reading fixtures from `config.fixtures_dir`
    #[must_use]
    pub fn new(config: SnareConfig) -> Self {
        let fixtures = FixtureStore::from_dir(config.fixtures_dir.clone());
        Self::with_fixtures(config, fixtures)
    }

    /// Create a context with a prepared fixture store
    #[must_use]
    pub fn with_fixtures(config: SnareConfig, fixtures: FixtureStore) -> Self {
        let fixtures = Arc::new(fixtures);
        let engine = Interceptor::new(Arc::clone(&fixtures), config.match_policy)
            .block_unmatched(config.block_unmatched)
            .log_requests(config.log_requests);
        tracing::debug!(
            fixtures = ?fixtures,
            policy = ?config.match_policy,
            "created intercept context"
        );
        Self {
            inner: Arc::new(ContextInner {
                config,
                fixtures,
                engine,
            }),
        }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &SnareConfig {
        &self.inner.config
    }

    /// Fixture store
    #[must_use]
    pub fn fixtures(&self) -> &FixtureStore {
        &self.inner.fixtures
    }

    /// Underlying engine
    #[must_use]
    pub fn interceptor(&self) -> &Interceptor {
        &self.inner.engine
    }

    // -------------------------------------------------------------------------
    // Rules
    // -------------------------------------------------------------------------

    /// Start building a rule for `method` and `pattern`
    pub fn intercept<M: IntoMethod>(
        &self,
        method: M,
        pattern: impl Into<UrlPattern>,
    ) -> RuleBuilder<'_> {
        let pattern = pattern.into();
        RuleBuilder {
            context: self,
            rule: method
                .into_method()
                .map(|method| InterceptRule::new(method, pattern)),
        }
    }

    /// Register a fully built rule
    pub fn register(&self, rule: InterceptRule) -> SnareResult<RuleId> {
        self.inner.engine.register(rule)
    }

    /// Remove a rule
    pub fn unregister(&self, id: RuleId) -> bool {
        self.inner.engine.unregister(id)
    }

    // -------------------------------------------------------------------------
    // Fixtures
    // -------------------------------------------------------------------------

    /// Independent copy of a fixture
    pub fn fixture(&self, name: &str) -> SnareResult<Value> {
        self.inner.fixtures.load(name)
    }

    /// Replace a fixture for the rest of this test case
    pub fn override_fixture(&self, name: &str, payload: Value) -> SnareResult<()> {
        self.inner.fixtures.insert(name, payload)
    }

    // -------------------------------------------------------------------------
    // Driver side
    // -------------------------------------------------------------------------

    /// See [`Interceptor::intercept`]
    pub fn handle(&self, request: InterceptedRequest) -> SnareResult<Interception> {
        self.inner.engine.intercept(request)
    }

    /// See [`Interceptor::complete`]
    pub fn complete(
        &self,
        pending: PendingExchange,
        response: InterceptedResponse,
    ) -> SnareResult<InterceptedResponse> {
        self.inner.engine.complete(pending, response)
    }

    /// See [`Interceptor::fail`]
    pub fn fail(&self, pending: PendingExchange, message: &str) {
        self.inner.engine.fail(pending, message);
    }

    /// See [`Interceptor::dispatch`]
    pub fn dispatch(
        &self,
        request: InterceptedRequest,
        upstream: &dyn Upstream,
    ) -> SnareResult<InterceptedResponse> {
        self.inner.engine.dispatch(request, upstream)
    }

    // -------------------------------------------------------------------------
    // Waits and history
    // -------------------------------------------------------------------------

    /// Wait options from the configuration
    #[must_use]
    pub fn wait_options(&self) -> WaitOptions {
        self.inner.config.wait_options()
    }

    /// Wait for the next exchange of `alias` with the configured timeout
    pub fn wait_for(&self, alias: &str) -> SnareResult<Exchange> {
        self.wait_for_with(alias, &self.wait_options())
    }

    /// Wait for the next exchange of `alias` with explicit options
    pub fn wait_for_with(&self, alias: &str, options: &WaitOptions) -> SnareResult<Exchange> {
        wait::wait_for(self.inner.engine.exchanges(), alias, options)
    }

    /// Wait for one exchange per alias within the configured timeout
    pub fn wait_for_all(&self, aliases: &[&str]) -> SnareResult<Vec<Exchange>> {
        wait::wait_for_all(self.inner.engine.exchanges(), aliases, &self.wait_options())
    }

    /// Poll a predicate with the configured timeout and interval
    pub fn wait_until<F: Fn() -> bool>(&self, predicate: F, description: &str) -> SnareResult<WaitResult> {
        wait::wait_until_fn(predicate, description, &self.wait_options())
    }

    /// Sleep unconditionally (discouraged)
    pub fn wait_fixed(&self, duration_ms: u64) {
        wait::wait_fixed(duration_ms);
    }

    /// Most recent exchange for `alias` without consuming it
    #[must_use]
    pub fn latest(&self, alias: &str) -> Option<Exchange> {
        self.inner
            .engine
            .exchanges()
            .latest(wait::normalize_alias(alias))
    }

    /// Every exchange for `alias` without consuming any
    #[must_use]
    pub fn all(&self, alias: &str) -> Vec<Exchange> {
        self.inner
            .engine
            .exchanges()
            .all(wait::normalize_alias(alias))
    }

    /// Every request seen so far
    #[must_use]
    pub fn requests(&self) -> Vec<LoggedRequest> {
        self.inner.engine.requests()
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    fn clear(&self) -> usize {
        self.inner.fixtures.clear_overrides();
        self.inner.engine.reset()
    }

    /// Start a fresh test case: rules, exchanges, request log and fixture
    /// overrides are dropped.
    pub fn reset(&self) {
        let abandoned = self.clear();
        tracing::debug!(abandoned, "context reset");
    }

    /// End the test case. Returns how many exchanges never settled.
    pub fn teardown(&self) -> usize {
        let abandoned = self.clear();
        if abandoned > 0 {
            tracing::warn!(abandoned, "teardown abandoned pending exchanges");
        }
        abandoned
    }
}

/// Fluent rule construction, returned by [`InterceptContext::intercept`]
#[derive(Debug)]
#[must_use = "rules take effect only after register()"]
pub struct RuleBuilder<'a> {
    context: &'a InterceptContext,
    rule: SnareResult<InterceptRule>,
}

impl RuleBuilder<'_> {
    fn map(mut self, f: impl FnOnce(InterceptRule) -> InterceptRule) -> Self {
        self.rule = self.rule.map(f);
        self
    }

    /// Reply with a canned response
    pub fn reply(self, stub: StubResponse) -> Self {
        self.map(|r| r.reply(stub))
    }

    /// Reply with a JSON body and status 200
    pub fn reply_json(self, body: Value) -> Self {
        self.reply(StubResponse::json(body))
    }

    /// Reply with a fixture
    pub fn fixture(self, name: &str) -> Self {
        let name = name.to_string();
        self.map(|r| r.fixture(name))
    }

    /// Reply with a fixture, customizing status and headers
    pub fn fixture_response(self, fixture: FixtureResponse) -> Self {
        self.map(|r| r.with_source(ResponseSource::Fixture(fixture)))
    }

    /// Attach a request hook
    pub fn hook(self, hook: RequestHook) -> Self {
        self.map(|r| match r.hook.clone() {
            Some(existing) => r.hook(existing.then(hook)),
            None => r.hook(hook),
        })
    }

    /// Attach a request hook from a closure
    pub fn on_request<F>(self, f: F) -> Self
    where
        F: Fn(&mut InterceptedRequest) -> SnareResult<HookOutcome> + Send + Sync + 'static,
    {
        self.hook(RequestHook::new(f))
    }

    /// Rewrite the response before it is delivered
    pub fn on_reply<F>(self, f: F) -> Self
    where
        F: Fn(&mut InterceptedResponse) -> SnareResult<()> + Send + Sync + 'static,
    {
        self.hook(RequestHook::on_reply(f))
    }

    /// Record exchanges under an alias (`@` prefix optional)
    pub fn alias(self, alias: &str) -> Self {
        let alias = wait::normalize_alias(alias).to_string();
        self.map(|r| r.alias(alias))
    }

    /// Set priority
    pub fn priority(self, priority: i32) -> Self {
        self.map(|r| r.priority(priority))
    }

    /// Limit the number of matches
    pub fn times(self, n: usize) -> Self {
        self.map(|r| r.times(n))
    }

    /// Register the rule
    pub fn register(self) -> SnareResult<RuleId> {
        self.context.register(self.rule?)
    }
}
