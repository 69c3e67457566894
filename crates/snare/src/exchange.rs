//! Recorded request/response exchanges and the table waiters block on.

use crate::http::{InterceptedRequest, InterceptedResponse};
use crate::result::{SnareError, SnareResult};
use crate::route::RuleId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Lifecycle of an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeState {
    /// Request matched, response not yet known
    Pending,
    /// Response delivered
    Resolved,
    /// Hook or network failure
    Failed,
}

/// One matched request and what became of it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    /// Unique id
    pub id: Uuid,
    /// Alias of the matching rule
    pub alias: Option<String>,
    /// Matching rule
    pub rule_id: RuleId,
    /// Request as sent (after any request hook)
    pub request: InterceptedRequest,
    /// Response as delivered (after any reply hook)
    pub response: Option<InterceptedResponse>,
    /// Current state
    pub state: ExchangeState,
    /// Failure message
    pub error: Option<String>,
    /// Milliseconds since the table was created
    pub started_at_ms: u64,
    /// Milliseconds since the table was created
    pub finished_at_ms: Option<u64>,
}

impl Exchange {
    fn label(&self) -> String {
        self.alias
            .as_ref()
            .map_or_else(|| self.id.to_string(), |a| format!("@{a}"))
    }

    /// Whether the exchange reached a final state
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.state != ExchangeState::Pending
    }

    /// Response status, if resolved
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }

    /// Time between match and settlement
    #[must_use]
    pub fn duration_ms(&self) -> Option<u64> {
        self.finished_at_ms
            .map(|end| end.saturating_sub(self.started_at_ms))
    }

    /// Request body field by JSON pointer
    #[must_use]
    pub fn request_field(&self, pointer: &str) -> Option<&Value> {
        self.request.body.field(pointer)
    }

    /// Response body field by JSON pointer
    #[must_use]
    pub fn response_field(&self, pointer: &str) -> Option<&Value> {
        self.response.as_ref().and_then(|r| r.body.field(pointer))
    }

    /// Deserialize the request body
    pub fn request_json<T: DeserializeOwned>(&self) -> SnareResult<T> {
        self.request.body_json()
    }

    /// Deserialize the response body
    pub fn response_json<T: DeserializeOwned>(&self) -> SnareResult<T> {
        self.response
            .as_ref()
            .ok_or_else(|| SnareError::assertion(format!("{} has no response", self.label())))?
            .body_json()
    }

    /// Assert the response status code
    pub fn assert_status(&self, expected: u16) -> SnareResult<()> {
        match self.status() {
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => Err(SnareError::assertion(format!(
                "{}: expected status {expected}, got {actual}",
                self.label()
            ))),
            None => Err(SnareError::assertion(format!(
                "{}: expected status {expected}, but there is no response",
                self.label()
            ))),
        }
    }

    /// Assert a request body field equals `expected`
    pub fn assert_request_field(&self, pointer: &str, expected: &Value) -> SnareResult<()> {
        check_field(&self.label(), "request", pointer, self.request_field(pointer), expected)
    }

    /// Assert a response body field equals `expected`
    pub fn assert_response_field(&self, pointer: &str, expected: &Value) -> SnareResult<()> {
        check_field(&self.label(), "response", pointer, self.response_field(pointer), expected)
    }

    /// Assert a request header value (case-insensitive name)
    pub fn assert_request_header(&self, name: &str, expected: &str) -> SnareResult<()> {
        match self.request.header(name) {
            Some(actual) if actual == expected => Ok(()),
            actual => Err(SnareError::assertion(format!(
                "{}: request header {name} expected {expected:?}, got {actual:?}",
                self.label()
            ))),
        }
    }
}

fn check_field(
    label: &str,
    side: &str,
    pointer: &str,
    actual: Option<&Value>,
    expected: &Value,
) -> SnareResult<()> {
    match actual {
        Some(actual) if actual == expected => Ok(()),
        Some(actual) => Err(SnareError::assertion(format!(
            "{label}: {side} field {pointer} expected {expected}, got {actual}"
        ))),
        None => Err(SnareError::assertion(format!(
            "{label}: {side} field {pointer} is missing (expected {expected})"
        ))),
    }
}

#[derive(Debug, Default)]
struct TableState {
    exchanges: Vec<Exchange>,
    by_alias: HashMap<String, Vec<usize>>,
    cursors: HashMap<String, usize>,
}

impl TableState {
    fn find_mut(&mut self, id: Uuid) -> Option<&mut Exchange> {
        self.exchanges.iter_mut().find(|e| e.id == id)
    }

    fn aliased(&self, alias: &str) -> impl Iterator<Item = &Exchange> {
        self.by_alias
            .get(alias)
            .into_iter()
            .flatten()
            .filter_map(move |&i| self.exchanges.get(i))
    }
}

/// Exchange history for one test case.
///
/// Writers settle exchanges from the driver thread; readers block in
/// [`ExchangeTable::wait_next`] until the next exchange for an alias settles.
#[derive(Debug)]
pub struct ExchangeTable {
    state: Mutex<TableState>,
    settled: Condvar,
    start: Instant,
}

impl Default for ExchangeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TableState::default()),
            settled: Condvar::new(),
            start: Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Record a new pending exchange
    pub fn open(&self, alias: Option<&str>, rule_id: RuleId, request: InterceptedRequest) -> Uuid {
        let exchange = Exchange {
            id: Uuid::new_v4(),
            alias: alias.map(str::to_string),
            rule_id,
            request,
            response: None,
            state: ExchangeState::Pending,
            error: None,
            started_at_ms: self.now_ms(),
            finished_at_ms: None,
        };
        let id = exchange.id;
        let mut state = self.lock();
        let index = state.exchanges.len();
        if let Some(alias) = alias {
            state
                .by_alias
                .entry(alias.to_string())
                .or_default()
                .push(index);
        }
        state.exchanges.push(exchange);
        id
    }

    /// Replace the recorded request (after a request hook ran)
    pub fn update_request(&self, id: Uuid, request: InterceptedRequest) {
        if let Some(exchange) = self.lock().find_mut(id) {
            exchange.request = request;
        }
    }

    /// Settle an exchange with its delivered response
    pub fn resolve(&self, id: Uuid, response: InterceptedResponse) -> Option<Exchange> {
        let at = self.now_ms();
        let settled = {
            let mut state = self.lock();
            let exchange = state.find_mut(id)?;
            exchange.response = Some(response);
            exchange.state = ExchangeState::Resolved;
            exchange.finished_at_ms = Some(at);
            exchange.clone()
        };
        tracing::info!(
            exchange = %settled.label(),
            status = settled.status().unwrap_or_default(),
            "exchange resolved"
        );
        self.settled.notify_all();
        Some(settled)
    }

    /// Settle an exchange as failed
    pub fn fail(&self, id: Uuid, message: &str) -> Option<Exchange> {
        let at = self.now_ms();
        let settled = {
            let mut state = self.lock();
            let exchange = state.find_mut(id)?;
            exchange.state = ExchangeState::Failed;
            exchange.error = Some(message.to_string());
            exchange.finished_at_ms = Some(at);
            exchange.clone()
        };
        tracing::info!(exchange = %settled.label(), error = message, "exchange failed");
        self.settled.notify_all();
        Some(settled)
    }

    /// Snapshot of one exchange
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<Exchange> {
        self.lock().exchanges.iter().find(|e| e.id == id).cloned()
    }

    /// Most recent exchange for an alias, settled or not
    #[must_use]
    pub fn latest(&self, alias: &str) -> Option<Exchange> {
        self.lock().aliased(alias).last().cloned()
    }

    /// Every exchange for an alias in creation order
    #[must_use]
    pub fn all(&self, alias: &str) -> Vec<Exchange> {
        self.lock().aliased(alias).cloned().collect()
    }

    /// Every exchange in creation order
    #[must_use]
    pub fn exchanges(&self) -> Vec<Exchange> {
        self.lock().exchanges.clone()
    }

    /// Number of recorded exchanges
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().exchanges.len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().exchanges.is_empty()
    }

    /// Number of exchanges still pending
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.lock()
            .exchanges
            .iter()
            .filter(|e| e.state == ExchangeState::Pending)
            .count()
    }

    /// Block until the next unconsumed exchange for `alias` settles.
    ///
    /// A settled exchange is consumed whether it resolved or failed. On
    /// timeout nothing is consumed and the pending exchange keeps running.
    pub fn wait_next(&self, alias: &str, timeout: Duration) -> SnareResult<Exchange> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            let cursor = state.cursors.get(alias).copied().unwrap_or(0);
            let next = state
                .aliased(alias)
                .nth(cursor)
                .filter(|e| e.is_settled())
                .cloned();
            if let Some(exchange) = next {
                state.cursors.insert(alias.to_string(), cursor + 1);
                return match exchange.state {
                    ExchangeState::Failed => Err(SnareError::FailedExchange {
                        alias: alias.to_string(),
                        message: exchange.error.unwrap_or_default(),
                    }),
                    _ => Ok(exchange),
                };
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                #[allow(clippy::cast_possible_truncation)]
                let ms = timeout.as_millis() as u64;
                tracing::warn!(alias, timeout_ms = ms, "timed out waiting for exchange");
                return Err(SnareError::Timeout {
                    alias: alias.to_string(),
                    ms,
                });
            }
            state = self
                .settled
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Drop all exchanges and cursors. Returns how many were still pending.
    pub fn clear(&self) -> usize {
        let abandoned = {
            let mut state = self.lock();
            let pending = state
                .exchanges
                .iter()
                .filter(|e| e.state == ExchangeState::Pending)
                .count();
            *state = TableState::default();
            pending
        };
        self.settled.notify_all();
        abandoned
    }
}
