//! Interception configuration

use crate::result::{SnareError, SnareResult};
use crate::route::MatchPolicy;
use crate::wait::{WaitOptions, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding `fixtures_dir`
pub const ENV_FIXTURES_DIR: &str = "SNARE_FIXTURES_DIR";
/// Environment variable overriding `default_timeout_ms`
pub const ENV_TIMEOUT_MS: &str = "SNARE_TIMEOUT_MS";
/// Environment variable overriding `match_policy`
pub const ENV_MATCH_POLICY: &str = "SNARE_MATCH_POLICY";

/// Configuration for an [`InterceptContext`](crate::context::InterceptContext)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnareConfig {
    /// Directory fixtures are resolved against
    pub fixtures_dir: PathBuf,
    /// Timeout for alias and condition waits
    pub default_timeout_ms: u64,
    /// Polling interval for condition waits
    pub poll_interval_ms: u64,
    /// Tie-break between equal-priority rules
    pub match_policy: MatchPolicy,
    /// Answer unmatched requests with 404
    pub block_unmatched: bool,
    /// Log every request at info level
    pub log_requests: bool,
}

impl Default for SnareConfig {
    fn default() -> Self {
        Self {
            fixtures_dir: PathBuf::from("fixtures"),
            default_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            match_policy: MatchPolicy::LastRegistered,
            block_unmatched: false,
            log_requests: false,
        }
    }
}

impl SnareConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set fixtures directory
    #[must_use]
    pub fn with_fixtures_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fixtures_dir = dir.into();
        self
    }

    /// Set default wait timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Set match policy
    #[must_use]
    pub const fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.match_policy = policy;
        self
    }

    /// Block unmatched requests
    #[must_use]
    pub const fn with_block_unmatched(mut self, block: bool) -> Self {
        self.block_unmatched = block;
        self
    }

    /// Log every request
    #[must_use]
    pub const fn with_log_requests(mut self, enabled: bool) -> Self {
        self.log_requests = enabled;
        self
    }

    /// Wait options derived from this configuration
    #[must_use]
    pub const fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            timeout_ms: self.default_timeout_ms,
            poll_interval_ms: self.poll_interval_ms,
        }
    }

    /// Parse from YAML. Missing keys take their defaults.
    pub fn from_yaml(yaml: &str) -> SnareResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    pub fn load(path: impl AsRef<Path>) -> SnareResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| SnareError::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        let config = Self::from_yaml(&yaml)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Apply `SNARE_*` overrides from the process environment
    pub fn apply_env(self) -> SnareResult<Self> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply `SNARE_*` overrides from an arbitrary lookup
    pub fn apply_env_from<F>(mut self, lookup: F) -> SnareResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_FIXTURES_DIR) {
            self.fixtures_dir = PathBuf::from(dir);
        }
        if let Some(ms) = lookup(ENV_TIMEOUT_MS) {
            self.default_timeout_ms = ms.trim().parse().map_err(|_| SnareError::Config {
                message: format!("{ENV_TIMEOUT_MS} must be an integer, got {ms:?}"),
            })?;
        }
        if let Some(policy) = lookup(ENV_MATCH_POLICY) {
            self.match_policy = policy.parse()?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check internal consistency
    pub fn validate(&self) -> SnareResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(SnareError::Config {
                message: "poll_interval_ms must be greater than zero".to_string(),
            });
        }
        if self.poll_interval_ms > self.default_timeout_ms {
            return Err(SnareError::Config {
                message: format!(
                    "poll_interval_ms ({}) exceeds default_timeout_ms ({})",
                    self.poll_interval_ms, self.default_timeout_ms
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    mod default_tests {
        use super::*;

        #[test]
        fn test_default_config() {
            let config = SnareConfig::default();
            assert_eq!(config.fixtures_dir, PathBuf::from("fixtures"));
            assert_eq!(config.default_timeout_ms, 5_000);
            assert_eq!(config.poll_interval_ms, 50);
            assert_eq!(config.match_policy, MatchPolicy::LastRegistered);
            assert!(!config.block_unmatched);
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_builder() {
            let config = SnareConfig::new()
                .with_fixtures_dir("cypress/fixtures")
                .with_timeout(10_000)
                .with_poll_interval(25)
                .with_match_policy(MatchPolicy::FirstMatch)
                .with_block_unmatched(true)
                .with_log_requests(true);
            assert_eq!(config.fixtures_dir, PathBuf::from("cypress/fixtures"));
            assert_eq!(config.wait_options().timeout_ms, 10_000);
            assert_eq!(config.wait_options().poll_interval_ms, 25);
            assert!(config.block_unmatched);
            assert!(config.log_requests);
        }
    }

    mod yaml_tests {
        use super::*;

        #[test]
        fn test_partial_yaml_uses_defaults() {
            let config = SnareConfig::from_yaml("default_timeout_ms: 8000\nmatch_policy: first_match\n").unwrap();
            assert_eq!(config.default_timeout_ms, 8_000);
            assert_eq!(config.match_policy, MatchPolicy::FirstMatch);
            assert_eq!(config.poll_interval_ms, 50);
        }

        #[test]
        fn test_invalid_yaml_value() {
            assert!(SnareConfig::from_yaml("match_policy: sometimes\n").is_err());
            assert!(SnareConfig::from_yaml("poll_interval_ms: 0\n").is_err());
        }

        #[test]
        fn test_load_from_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("snare.yaml");
            std::fs::write(&path, "fixtures_dir: data\nblock_unmatched: true\n").unwrap();
            let config = SnareConfig::load(&path).unwrap();
            assert_eq!(config.fixtures_dir, PathBuf::from("data"));
            assert!(config.block_unmatched);
        }

        #[test]
        fn test_load_missing_file() {
            let err = SnareConfig::load("/nonexistent/snare.yaml").unwrap_err();
            assert!(matches!(err, SnareError::Config { .. }));
        }
    }

    mod env_tests {
        use super::*;

        fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
            let map: HashMap<String, String> = pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect();
            move |key| map.get(key).cloned()
        }

        #[test]
        fn test_env_overrides() {
            let config = SnareConfig::default()
                .apply_env_from(env(&[
                    (ENV_FIXTURES_DIR, "/tmp/fx"),
                    (ENV_TIMEOUT_MS, " 250 "),
                    (ENV_MATCH_POLICY, "first-match"),
                ]))
                .unwrap();
            assert_eq!(config.fixtures_dir, PathBuf::from("/tmp/fx"));
            assert_eq!(config.default_timeout_ms, 250);
            assert_eq!(config.match_policy, MatchPolicy::FirstMatch);
        }

        #[test]
        fn test_env_absent_keeps_values() {
            let config = SnareConfig::default().with_timeout(1234).apply_env_from(env(&[])).unwrap();
            assert_eq!(config.default_timeout_ms, 1234);
        }

        #[test]
        fn test_env_bad_timeout() {
            let err = SnareConfig::default()
                .apply_env_from(env(&[(ENV_TIMEOUT_MS, "soon")]))
                .unwrap_err();
            assert!(err.to_string().contains(ENV_TIMEOUT_MS));
        }
    }
}
