//! Route matching: URL patterns, intercept rules and the rule registry.
//!
//! Patterns are compiled once when a rule is registered. Matching a request
//! walks every live rule and picks a single winner: highest priority first,
//! then registration order according to the configured [`MatchPolicy`].

use crate::hook::RequestHook;
use crate::http::{Headers, HttpMethod, RequestUrl, StubResponse};
use crate::result::{SnareError, SnareResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;

/// URL pattern for matching requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "pattern", rename_all = "snake_case")]
pub enum UrlPattern {
    /// Exact URL match
    Exact(String),
    /// Glob over the whole URL (`**/api/articles/*`)
    Glob(String),
    /// Regex search over the whole URL, query included
    Regex(String),
    /// Glob over the URL path only; relative patterns match at any depth
    Path(String),
    /// Match any URL
    Any,
}

impl UrlPattern {
    /// Glob pattern
    pub fn glob(pattern: impl Into<String>) -> Self {
        Self::Glob(pattern.into())
    }

    /// Regex pattern
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::Regex(pattern.into())
    }

    /// Path pattern
    pub fn path(pattern: impl Into<String>) -> Self {
        Self::Path(pattern.into())
    }

    /// Compile into a reusable matcher
    pub fn compile(&self) -> SnareResult<CompiledPattern> {
        let regex = match self {
            Self::Exact(_) | Self::Any => None,
            Self::Glob(glob) => Some(compile_regex(glob, &glob_to_regex(glob))?),
            Self::Path(glob) => Some(compile_regex(glob, &glob_to_regex(&path_glob(glob)))?),
            Self::Regex(source) => Some(compile_regex(source, source)?),
        };
        let exact = match self {
            Self::Exact(p) => Some(
                RequestUrl::parse(p).map_or_else(|_| p.clone(), |u| u.without_fragment().to_string()),
            ),
            _ => None,
        };
        Ok(CompiledPattern {
            pattern: self.clone(),
            regex,
            exact,
        })
    }

    /// Check if a URL matches this pattern. Invalid patterns never match.
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        self.compile().is_ok_and(|compiled| compiled.is_match(url))
    }

    fn keeps_query(&self) -> bool {
        match self {
            Self::Exact(p) | Self::Glob(p) | Self::Path(p) => p.contains('?'),
            Self::Regex(_) | Self::Any => true,
        }
    }
}

impl From<&str> for UrlPattern {
    /// Strings containing `*` are globs, everything else is exact
    fn from(s: &str) -> Self {
        if s.contains('*') {
            Self::Glob(s.to_string())
        } else {
            Self::Exact(s.to_string())
        }
    }
}

impl From<String> for UrlPattern {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(p) => write!(f, "{p}"),
            Self::Glob(p) => write!(f, "glob:{p}"),
            Self::Regex(p) => write!(f, "regex:{p}"),
            Self::Path(p) => write!(f, "path:{p}"),
            Self::Any => f.write_str("*"),
        }
    }
}

fn compile_regex(pattern: &str, source: &str) -> SnareResult<Regex> {
    Regex::new(source).map_err(|e| SnareError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');
    let mut chars = glob.chars().peekable();
    let mut buf = [0u8; 4];
    while let Some(c) = chars.next() {
        if c == '*' {
            if chars.peek() == Some(&'*') {
                chars.next();
                out.push_str(".*");
            } else {
                out.push_str("[^/]*");
            }
        } else {
            out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
        }
    }
    out.push('$');
    out
}

fn path_glob(pattern: &str) -> String {
    if pattern.starts_with('/') || pattern.starts_with('*') {
        pattern.to_string()
    } else {
        format!("**/{pattern}")
    }
}

/// A pattern compiled for repeated matching
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pattern: UrlPattern,
    regex: Option<Regex>,
    exact: Option<String>,
}

impl CompiledPattern {
    /// Source pattern
    #[must_use]
    pub const fn pattern(&self) -> &UrlPattern {
        &self.pattern
    }

    /// Check if a URL matches
    #[must_use]
    pub fn is_match(&self, url: &str) -> bool {
        match &self.pattern {
            UrlPattern::Any => true,
            UrlPattern::Regex(_) => self.regex.as_ref().is_some_and(|re| re.is_match(url)),
            UrlPattern::Exact(_) => self
                .exact
                .as_ref()
                .is_some_and(|expected| self.targets(url).iter().any(|t| t == expected)),
            UrlPattern::Glob(_) | UrlPattern::Path(_) => self
                .regex
                .as_ref()
                .is_some_and(|re| self.targets(url).iter().any(|t| re.is_match(t))),
        }
    }

    /// The URL forms this pattern is compared against. Unparseable URLs are
    /// compared verbatim.
    fn targets(&self, url: &str) -> Vec<String> {
        let Ok(parsed) = RequestUrl::parse(url) else {
            return vec![url.to_string()];
        };
        let keep_query = self.pattern.keeps_query();
        let target = match (&self.pattern, keep_query) {
            (UrlPattern::Path(_), true) => parsed.path_and_query(),
            (UrlPattern::Path(_), false) => parsed.path(),
            (_, true) => parsed.without_fragment(),
            (_, false) => parsed.without_query(),
        };
        let mut targets = vec![target.to_string()];
        if !keep_query && target.len() > 1 {
            if let Some(trimmed) = target.strip_suffix('/') {
                targets.push(trimmed.to_string());
            }
        }
        targets
    }
}

/// Method and URL constraints of a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMatcher {
    /// HTTP method to match
    pub method: HttpMethod,
    /// URL pattern
    pub url: UrlPattern,
}

impl RequestMatcher {
    /// Create a matcher
    pub fn new(method: HttpMethod, url: impl Into<UrlPattern>) -> Self {
        Self {
            method,
            url: url.into(),
        }
    }
}

/// Fixture-backed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureResponse {
    /// Fixture name
    pub name: String,
    /// HTTP status code
    pub status: u16,
    /// Extra response headers
    pub headers: Headers,
    /// Artificial delay in milliseconds
    pub delay_ms: u64,
}

impl FixtureResponse {
    /// 200 response with the named fixture as JSON body
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: 200,
            headers: Headers::new(),
            delay_ms: 0,
        }
    }

    /// Set status code
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }
}

/// Where a matched request gets its response
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseSource {
    /// Forward to the real network (spy)
    #[default]
    Network,
    /// Canned response
    Literal(StubResponse),
    /// Response body loaded from the fixture store
    Fixture(FixtureResponse),
}

/// Identifier assigned at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId(pub u64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule-{}", self.0)
    }
}

/// A registered interception rule
#[derive(Debug, Clone)]
pub struct InterceptRule {
    /// Assigned at registration
    pub id: RuleId,
    /// Method and URL constraints
    pub matcher: RequestMatcher,
    /// Response source
    pub source: ResponseSource,
    /// Optional request hook
    pub hook: Option<RequestHook>,
    /// Alias exchanges are recorded under
    pub alias: Option<String>,
    /// Higher priority wins regardless of registration order
    pub priority: i32,
    /// Number of times this rule may match (None = unlimited)
    pub times: Option<usize>,
    /// Registration ordinal
    pub registered_at: u64,
    /// Number of times this rule has matched
    pub match_count: usize,
}

impl InterceptRule {
    /// Spy rule: matches and forwards to the network
    pub fn new(method: HttpMethod, url: impl Into<UrlPattern>) -> Self {
        Self {
            id: RuleId(0),
            matcher: RequestMatcher::new(method, url),
            source: ResponseSource::Network,
            hook: None,
            alias: None,
            priority: 0,
            times: None,
            registered_at: 0,
            match_count: 0,
        }
    }

    /// Set the response source
    #[must_use]
    pub fn with_source(mut self, source: ResponseSource) -> Self {
        self.source = source;
        self
    }

    /// Reply with a canned response
    #[must_use]
    pub fn reply(self, stub: StubResponse) -> Self {
        self.with_source(ResponseSource::Literal(stub))
    }

    /// Reply with a fixture
    #[must_use]
    pub fn fixture(self, name: impl Into<String>) -> Self {
        self.with_source(ResponseSource::Fixture(FixtureResponse::new(name)))
    }

    /// Attach a request hook
    #[must_use]
    pub fn hook(mut self, hook: RequestHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Record exchanges under an alias
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set priority
    #[must_use]
    pub const fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Limit the number of matches
    #[must_use]
    pub const fn times(mut self, n: usize) -> Self {
        self.times = Some(n);
        self
    }

    /// Check if the rule has used up its matches
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.times.is_some_and(|max| self.match_count >= max)
    }

    /// Label for logs: alias if set, otherwise the id
    #[must_use]
    pub fn label(&self) -> String {
        self.alias
            .as_ref()
            .map_or_else(|| self.id.to_string(), |a| format!("@{a}"))
    }
}

/// How ties between equal-priority rules are broken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// The most recently registered rule wins
    #[default]
    LastRegistered,
    /// The earliest registered rule wins
    FirstMatch,
}

impl FromStr for MatchPolicy {
    type Err = SnareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "last_registered" | "last" => Ok(Self::LastRegistered),
            "first_match" | "first" => Ok(Self::FirstMatch),
            other => Err(SnareError::Config {
                message: format!("unknown match policy: {other}"),
            }),
        }
    }
}

#[derive(Debug)]
struct Entry {
    rule: InterceptRule,
    compiled: CompiledPattern,
}

impl Entry {
    fn matches(&self, method: HttpMethod, url: &str) -> bool {
        !self.rule.is_exhausted()
            && self.rule.matcher.method.matches(&method)
            && self.compiled.is_match(url)
    }
}

/// Ordered registry of intercept rules
#[derive(Debug, Default)]
pub struct RouteMatcher {
    entries: Vec<Entry>,
    next_ordinal: u64,
    policy: MatchPolicy,
}

impl RouteMatcher {
    /// Create an empty registry
    #[must_use]
    pub fn new(policy: MatchPolicy) -> Self {
        Self {
            entries: Vec::new(),
            next_ordinal: 0,
            policy,
        }
    }

    /// Tie-break policy
    #[must_use]
    pub const fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Compile and register a rule
    pub fn register(&mut self, mut rule: InterceptRule) -> SnareResult<RuleId> {
        let compiled = rule.matcher.url.compile()?;
        self.next_ordinal += 1;
        rule.id = RuleId(self.next_ordinal);
        rule.registered_at = self.next_ordinal;
        rule.match_count = 0;
        tracing::debug!(
            rule = %rule.id,
            method = %rule.matcher.method,
            pattern = %rule.matcher.url,
            alias = rule.alias.as_deref().unwrap_or(""),
            priority = rule.priority,
            "registered intercept rule"
        );
        let id = rule.id;
        self.entries.push(Entry { rule, compiled });
        Ok(id)
    }

    /// Find the winning rule for a request without recording a match
    #[must_use]
    pub fn find(&self, method: HttpMethod, url: &str) -> Option<&InterceptRule> {
        self.select(method, url).map(|i| &self.entries[i].rule)
    }

    /// Find the winning rule and count the match against its `times` limit
    pub fn claim(&mut self, method: HttpMethod, url: &str) -> Option<InterceptRule> {
        let index = self.select(method, url)?;
        let rule = &mut self.entries[index].rule;
        rule.match_count += 1;
        tracing::debug!(rule = %rule.id, %method, url, "matched intercept rule");
        Some(rule.clone())
    }

    fn select(&self, method: HttpMethod, url: &str) -> Option<usize> {
        let candidates = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.matches(method, url));
        let winner = match self.policy {
            MatchPolicy::LastRegistered => {
                candidates.max_by_key(|(_, e)| (e.rule.priority, e.rule.registered_at))
            }
            MatchPolicy::FirstMatch => {
                candidates.max_by_key(|(_, e)| (e.rule.priority, Reverse(e.rule.registered_at)))
            }
        };
        winner.map(|(i, _)| i)
    }

    /// Look up a rule by id
    #[must_use]
    pub fn get(&self, id: RuleId) -> Option<&InterceptRule> {
        self.entries.iter().map(|e| &e.rule).find(|r| r.id == id)
    }

    /// Remove a rule. Returns false if it was not registered.
    pub fn unregister(&mut self, id: RuleId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.rule.id != id);
        before != self.entries.len()
    }

    /// Remove all rules
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of registered rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no rules are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered rules in registration order
    pub fn rules(&self) -> impl Iterator<Item = &InterceptRule> {
        self.entries.iter().map(|e| &e.rule)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    const FEED: &str = "https://api.realworld.io/api/articles/feed?limit=10&offset=0";

    mod pattern_tests {
        use super::*;

        #[test]
        fn test_exact_ignores_query_unless_pattern_has_one() {
            let plain = UrlPattern::from("https://api.realworld.io/api/articles/feed");
            assert!(plain.matches(FEED));
            let with_query = UrlPattern::from(FEED);
            assert!(with_query.matches(FEED));
            assert!(!with_query.matches("https://api.realworld.io/api/articles/feed?limit=20"));
        }

        #[test]
        fn test_glob_single_star_stops_at_slash() {
            let pattern = UrlPattern::glob("https://api.test/api/*/comments");
            assert!(pattern.matches("https://api.test/api/slug-1/comments"));
            assert!(!pattern.matches("https://api.test/api/a/b/comments"));
        }

        #[test]
        fn test_glob_double_star_crosses_segments() {
            let pattern = UrlPattern::from("**/tags");
            assert!(pattern.matches("https://api.realworld.io/api/tags"));
            assert!(pattern.matches("https://api.realworld.io/api/tags?x=1"));
            assert!(!pattern.matches("https://api.realworld.io/api/tags/popular"));
        }

        #[test]
        fn test_glob_escapes_regex_metacharacters() {
            let pattern = UrlPattern::glob("**/api.v1/(items)");
            assert!(pattern.matches("https://x.test/api.v1/(items)"));
            assert!(!pattern.matches("https://x.test/apixv1/(items)"));
        }

        #[test]
        fn test_trailing_slash_tolerated() {
            assert!(UrlPattern::from("**/articles").matches("https://x.test/api/articles/"));
            assert!(UrlPattern::from("https://x.test/api/tags").matches("https://x.test/api/tags/"));
        }

        #[test]
        fn test_regex_is_unanchored_and_sees_query() {
            let pattern = UrlPattern::regex(r"articles\?limit=\d+");
            assert!(pattern.matches(FEED));
            assert!(!pattern.matches("https://x.test/api/articles"));
        }

        #[test]
        fn test_invalid_regex_is_reported() {
            let err = UrlPattern::regex("(unclosed").compile().unwrap_err();
            assert!(matches!(err, SnareError::InvalidPattern { .. }));
            assert!(!UrlPattern::regex("(unclosed").matches("anything"));
        }

        #[test]
        fn test_path_pattern_ignores_host() {
            let relative = UrlPattern::path("tags");
            assert!(relative.matches("https://api.realworld.io/api/tags"));
            assert!(relative.matches("http://localhost:3000/tags"));
            let absolute = UrlPattern::path("/api/articles/*/favorite");
            assert!(absolute.matches("https://api.realworld.io/api/articles/how-to/favorite"));
            assert!(!absolute.matches("https://api.realworld.io/v2/api/articles/x/favorite"));
        }

        #[test]
        fn test_path_pattern_with_query() {
            let pattern = UrlPattern::path("/api/articles?limit=10&offset=0");
            assert!(pattern.matches("https://api.realworld.io/api/articles?limit=10&offset=0"));
            assert!(!pattern.matches("https://api.realworld.io/api/articles"));
        }

        #[test]
        fn test_url_in_query_does_not_split_the_path() {
            let pattern = UrlPattern::path("/login?next=**");
            assert!(pattern.matches("/login?next=https://app.test/home"));
            assert!(pattern.matches("https://app.test/login?next=https://app.test/home"));
            let plain = UrlPattern::path("/login");
            assert!(plain.matches("https://app.test/login?next=https://app.test/home/login"));
            assert!(!UrlPattern::path("/home").matches("/login?next=https://app.test/home"));
        }

        #[test]
        fn test_relative_request_urls() {
            assert!(UrlPattern::from("/api/tags").matches("/api/tags?limit=5"));
            assert!(UrlPattern::from("**/tags").matches("/api/tags/"));
            assert!(!UrlPattern::from("https://x.test/api/tags").matches("/api/tags"));
        }

        #[test]
        fn test_exact_compares_normalized_urls() {
            let pattern = UrlPattern::from("HTTPS://API.Realworld.io:443/api/tags");
            assert!(pattern.matches("https://api.realworld.io/api/tags"));
        }

        #[test]
        fn test_fragment_never_participates() {
            assert!(UrlPattern::from("https://x.test/a?b=1").matches("https://x.test/a?b=1#top"));
        }

        #[test]
        fn test_any() {
            assert!(UrlPattern::Any.matches(""));
            assert!(UrlPattern::Any.matches(FEED));
        }
    }

    mod matcher_tests {
        use super::*;

        fn tags_rule() -> InterceptRule {
            InterceptRule::new(HttpMethod::Get, "**/tags")
        }

        #[test]
        fn test_register_assigns_increasing_ids() {
            let mut matcher = RouteMatcher::default();
            let a = matcher.register(tags_rule()).unwrap();
            let b = matcher.register(tags_rule()).unwrap();
            assert!(b > a);
            assert_eq!(matcher.len(), 2);
        }

        #[test]
        fn test_register_rejects_invalid_pattern() {
            let mut matcher = RouteMatcher::default();
            let rule = InterceptRule::new(HttpMethod::Get, UrlPattern::regex("["));
            assert!(matcher.register(rule).is_err());
            assert!(matcher.is_empty());
        }

        #[test]
        fn test_method_must_match() {
            let mut matcher = RouteMatcher::default();
            matcher.register(tags_rule()).unwrap();
            assert!(matcher.find(HttpMethod::Post, "https://x.test/api/tags").is_none());
            assert!(matcher.find(HttpMethod::Get, "https://x.test/api/tags").is_some());
        }

        #[test]
        fn test_any_method_rule() {
            let mut matcher = RouteMatcher::default();
            matcher
                .register(InterceptRule::new(HttpMethod::Any, "**/articles"))
                .unwrap();
            assert!(matcher.find(HttpMethod::Delete, "https://x.test/api/articles").is_some());
        }

        #[test]
        fn test_any_request_method_matches_only_any_rules() {
            let mut matcher = RouteMatcher::default();
            matcher.register(tags_rule()).unwrap();
            assert!(matcher.find(HttpMethod::Any, "https://x.test/api/tags").is_none());
            let any = matcher
                .register(InterceptRule::new(HttpMethod::Any, "**/tags"))
                .unwrap();
            assert_eq!(
                matcher.find(HttpMethod::Any, "https://x.test/api/tags").unwrap().id,
                any
            );
        }

        #[test]
        fn test_later_specific_rule_overrides_broad_one() {
            let mut matcher = RouteMatcher::default();
            let broad = matcher
                .register(InterceptRule::new(HttpMethod::Get, UrlPattern::Any))
                .unwrap();
            let specific = matcher.register(tags_rule()).unwrap();
            let url = "https://x.test/api/tags";
            assert_eq!(matcher.find(HttpMethod::Get, url).unwrap().id, specific);
            assert_eq!(
                matcher.find(HttpMethod::Get, "https://x.test/api/user").unwrap().id,
                broad
            );
        }

        #[test]
        fn test_first_match_policy() {
            let mut matcher = RouteMatcher::new(MatchPolicy::FirstMatch);
            let first = matcher.register(tags_rule()).unwrap();
            matcher.register(tags_rule()).unwrap();
            assert_eq!(
                matcher.find(HttpMethod::Get, "https://x.test/tags").unwrap().id,
                first
            );
        }

        #[test]
        fn test_priority_beats_ordinal() {
            let mut matcher = RouteMatcher::default();
            let high = matcher.register(tags_rule().priority(10)).unwrap();
            matcher.register(tags_rule()).unwrap();
            assert_eq!(
                matcher.find(HttpMethod::Get, "https://x.test/tags").unwrap().id,
                high
            );
        }

        #[test]
        fn test_times_exhaustion_falls_through() {
            let mut matcher = RouteMatcher::default();
            let fallback = matcher.register(tags_rule()).unwrap();
            let once = matcher.register(tags_rule().times(1)).unwrap();
            let url = "https://x.test/tags";
            assert_eq!(matcher.claim(HttpMethod::Get, url).unwrap().id, once);
            assert_eq!(matcher.claim(HttpMethod::Get, url).unwrap().id, fallback);
            assert!(matcher.get(once).unwrap().is_exhausted());
        }

        #[test]
        fn test_find_does_not_count() {
            let mut matcher = RouteMatcher::default();
            let id = matcher.register(tags_rule().times(1)).unwrap();
            let url = "https://x.test/tags";
            assert!(matcher.find(HttpMethod::Get, url).is_some());
            assert!(matcher.find(HttpMethod::Get, url).is_some());
            assert_eq!(matcher.get(id).unwrap().match_count, 0);
        }

        #[test]
        fn test_unregister_and_clear() {
            let mut matcher = RouteMatcher::default();
            let id = matcher.register(tags_rule()).unwrap();
            matcher.register(tags_rule()).unwrap();
            assert!(matcher.unregister(id));
            assert!(!matcher.unregister(id));
            assert_eq!(matcher.len(), 1);
            matcher.clear();
            assert!(matcher.is_empty());
        }

        #[test]
        fn test_no_match_returns_none() {
            let matcher = RouteMatcher::default();
            assert!(matcher.find(HttpMethod::Get, FEED).is_none());
        }

        #[test]
        fn test_rule_label() {
            let rule = tags_rule().alias("getTags");
            assert_eq!(rule.label(), "@getTags");
            assert_eq!(tags_rule().label(), "rule-0");
        }
    }

    mod policy_tests {
        use super::*;

        #[test]
        fn test_parse_policy() {
            assert_eq!(
                "first-match".parse::<MatchPolicy>().unwrap(),
                MatchPolicy::FirstMatch
            );
            assert_eq!(
                "LAST_REGISTERED".parse::<MatchPolicy>().unwrap(),
                MatchPolicy::LastRegistered
            );
            assert!("random".parse::<MatchPolicy>().is_err());
        }
    }
}
