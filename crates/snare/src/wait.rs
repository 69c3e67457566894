//! Wait mechanisms
//!
//! Alias waits block on the exchange table until the next exchange for the
//! alias settles. Condition waits poll a predicate. Fixed sleeps exist but are
//! logged as discouraged.

use crate::exchange::{Exchange, ExchangeTable};
use crate::result::{SnareError, SnareResult};
use std::time::{Duration, Instant};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (5 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =============================================================================
// WAIT CONDITION TRAIT
// =============================================================================

/// Trait for custom wait conditions
pub trait WaitCondition {
    /// Check if the condition is satisfied
    fn check(&self) -> bool;

    /// Get description for error messages
    fn description(&self) -> String;
}

/// A function-based wait condition
pub struct FnCondition<F: Fn() -> bool> {
    func: F,
    description: String,
}

impl<F: Fn() -> bool> std::fmt::Debug for FnCondition<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCondition")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<F: Fn() -> bool> FnCondition<F> {
    /// Create a new function condition
    pub fn new(func: F, description: impl Into<String>) -> Self {
        Self {
            func,
            description: description.into(),
        }
    }
}

impl<F: Fn() -> bool> WaitCondition for FnCondition<F> {
    fn check(&self) -> bool {
        (self.func)()
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

/// Result of a successful condition wait
#[derive(Debug, Clone)]
pub struct WaitResult {
    /// Time spent waiting
    pub elapsed: Duration,
    /// Description of what was waited for
    pub waited_for: String,
}

// =============================================================================
// WAITS
// =============================================================================

/// Strip the `@` prefix used when referring to aliases
#[must_use]
pub fn normalize_alias(alias: &str) -> &str {
    alias.strip_prefix('@').unwrap_or(alias)
}

/// Block until the next unconsumed exchange for `alias` settles.
///
/// Successive calls consume successive exchanges. A timeout leaves the
/// pending exchange untouched.
pub fn wait_for(table: &ExchangeTable, alias: &str, options: &WaitOptions) -> SnareResult<Exchange> {
    table.wait_next(normalize_alias(alias), options.timeout())
}

/// Wait for one exchange per alias, in order, sharing a single timeout budget
pub fn wait_for_all(
    table: &ExchangeTable,
    aliases: &[&str],
    options: &WaitOptions,
) -> SnareResult<Vec<Exchange>> {
    let deadline = Instant::now() + options.timeout();
    aliases
        .iter()
        .map(|alias| {
            let remaining = deadline.saturating_duration_since(Instant::now());
            table
                .wait_next(normalize_alias(alias), remaining)
                .map_err(|e| match e {
                    SnareError::Timeout { alias, .. } => SnareError::Timeout {
                        alias,
                        ms: options.timeout_ms,
                    },
                    other => other,
                })
        })
        .collect()
}

/// Poll a condition until it holds or the timeout expires
pub fn wait_until<C: WaitCondition>(condition: &C, options: &WaitOptions) -> SnareResult<WaitResult> {
    let start = Instant::now();
    let timeout = options.timeout();
    loop {
        if condition.check() {
            return Ok(WaitResult {
                elapsed: start.elapsed(),
                waited_for: condition.description(),
            });
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            break;
        }
        std::thread::sleep(options.poll_interval().min(timeout - elapsed));
    }
    tracing::warn!(
        condition = %condition.description(),
        timeout_ms = options.timeout_ms,
        "condition wait timed out"
    );
    Err(SnareError::ConditionTimeout {
        condition: condition.description(),
        ms: options.timeout_ms,
    })
}

/// Poll a predicate until it returns true
pub fn wait_until_fn<F>(predicate: F, description: &str, options: &WaitOptions) -> SnareResult<WaitResult>
where
    F: Fn() -> bool,
{
    wait_until(&FnCondition::new(predicate, description), options)
}

/// Sleep for a fixed duration (discouraged - wait on an alias or condition instead)
pub fn wait_fixed(duration_ms: u64) {
    tracing::warn!(duration_ms, "fixed-duration wait; prefer waiting on an alias or condition");
    std::thread::sleep(Duration::from_millis(duration_ms));
}
