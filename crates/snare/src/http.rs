//! HTTP message model shared by the matcher, the engine and the driver seam.
//!
//! Requests and responses carry a [`Body`] that keeps JSON payloads parsed, so
//! hooks and assertions can address fields with JSON pointers
//! (`/article/description`) instead of re-parsing bytes.

use crate::result::{SnareError, SnareResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use url::{ParseError, Position, Url};

/// Header map. Lookups through the message helpers are case-insensitive.
pub type Headers = HashMap<String, String>;

/// HTTP methods for request matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET request
    Get,
    /// POST request
    Post,
    /// PUT request
    Put,
    /// DELETE request
    Delete,
    /// PATCH request
    Patch,
    /// HEAD request
    Head,
    /// OPTIONS request
    Options,
    /// Any method (rule side only)
    Any,
}

impl HttpMethod {
    /// Convert to string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Any => "*",
        }
    }

    /// Check if a request method satisfies this rule method. Only the rule
    /// side treats `Any` as a wildcard.
    #[must_use]
    pub fn matches(&self, request: &Self) -> bool {
        *self == Self::Any || self == request
    }
}

impl FromStr for HttpMethod {
    type Err = SnareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "*" | "ANY" => Ok(Self::Any),
            _ => Err(SnareError::InvalidMethod {
                method: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversion into a method, accepting both typed and string forms
pub trait IntoMethod {
    /// Convert, failing on unknown method names
    fn into_method(self) -> SnareResult<HttpMethod>;
}

impl IntoMethod for HttpMethod {
    fn into_method(self) -> SnareResult<HttpMethod> {
        Ok(self)
    }
}

impl IntoMethod for &str {
    fn into_method(self) -> SnareResult<HttpMethod> {
        self.parse()
    }
}

impl IntoMethod for String {
    fn into_method(self) -> SnareResult<HttpMethod> {
        self.parse()
    }
}

/// Message body
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Body {
    /// No body
    #[default]
    Empty,
    /// Parsed JSON document
    Json(Value),
    /// UTF-8 text
    Text(String),
    /// Opaque bytes
    Binary(Vec<u8>),
}

impl Body {
    /// Decode raw bytes. JSON content types are parsed when well-formed,
    /// otherwise valid UTF-8 becomes text and anything else stays binary.
    #[must_use]
    pub fn from_bytes(bytes: &[u8], content_type: Option<&str>) -> Self {
        if bytes.is_empty() {
            return Self::Empty;
        }
        let is_json = content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));
        if is_json {
            if let Ok(value) = serde_json::from_slice(bytes) {
                return Self::Json(value);
            }
        }
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::Text(text.to_string()),
            Err(_) => Self::Binary(bytes.to_vec()),
        }
    }

    /// Serialize a value into a JSON body
    pub fn json<T: Serialize>(data: &T) -> SnareResult<Self> {
        Ok(Self::Json(serde_json::to_value(data)?))
    }

    /// Encode to bytes for the wire
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Empty => Vec::new(),
            Self::Json(value) => value.to_string().into_bytes(),
            Self::Text(text) => text.as_bytes().to_vec(),
            Self::Binary(bytes) => bytes.clone(),
        }
    }

    /// Whether there is no content
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Json(_) => false,
            Self::Text(text) => text.is_empty(),
            Self::Binary(bytes) => bytes.is_empty(),
        }
    }

    /// Parsed JSON, if this is a JSON body
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Mutable parsed JSON, if this is a JSON body
    pub fn as_json_mut(&mut self) -> Option<&mut Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Field lookup by JSON pointer (`/article/description`)
    #[must_use]
    pub fn field(&self, pointer: &str) -> Option<&Value> {
        self.as_json().and_then(|v| v.pointer(pointer))
    }

    /// Mutable field lookup by JSON pointer
    pub fn field_mut(&mut self, pointer: &str) -> Option<&mut Value> {
        self.as_json_mut().and_then(|v| v.pointer_mut(pointer))
    }

    /// Set a field by JSON pointer, creating intermediate objects.
    ///
    /// An empty body is promoted to an empty JSON object first.
    pub fn set_field(&mut self, pointer: &str, value: Value) -> SnareResult<()> {
        if matches!(self, Self::Empty) {
            *self = Self::Json(Value::Object(serde_json::Map::new()));
        }
        let root = self.as_json_mut().ok_or_else(|| {
            SnareError::assertion(format!("cannot set {pointer}: body is not JSON"))
        })?;
        set_pointer(root, pointer, value)
    }

    /// Deserialize the JSON body into `T`
    pub fn parse<T: DeserializeOwned>(&self) -> SnareResult<T> {
        match self {
            Self::Json(value) => Ok(serde_json::from_value(value.clone())?),
            Self::Text(text) => Ok(serde_json::from_str(text)?),
            Self::Binary(bytes) => Ok(serde_json::from_slice(bytes)?),
            Self::Empty => Err(SnareError::assertion("body is empty")),
        }
    }

    /// Body rendered as text (lossy for binary)
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.to_bytes()).to_string()
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

fn set_pointer(root: &mut Value, pointer: &str, value: Value) -> SnareResult<()> {
    if pointer.is_empty() {
        *root = value;
        return Ok(());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(SnareError::assertion(format!(
            "JSON pointer must start with '/': {pointer}"
        )));
    };
    let tokens: Vec<String> = rest
        .split('/')
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .collect();

    let mut current = root;
    let (last, parents) = tokens
        .split_last()
        .ok_or_else(|| SnareError::assertion("empty JSON pointer"))?;
    for token in parents {
        current = match current {
            Value::Object(map) => map
                .entry(token.clone())
                .or_insert_with(|| Value::Object(serde_json::Map::new())),
            Value::Array(items) => {
                let index: usize = token.parse().map_err(|_| {
                    SnareError::assertion(format!("invalid array index {token:?} in {pointer}"))
                })?;
                items.get_mut(index).ok_or_else(|| {
                    SnareError::assertion(format!("index {index} out of bounds in {pointer}"))
                })?
            }
            _ => {
                return Err(SnareError::assertion(format!(
                    "cannot descend into scalar at {token:?} in {pointer}"
                )))
            }
        };
    }
    match current {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            let index: usize = last.parse().map_err(|_| {
                SnareError::assertion(format!("invalid array index {last:?} in {pointer}"))
            })?;
            let slot = items.get_mut(index).ok_or_else(|| {
                SnareError::assertion(format!("index {index} out of bounds in {pointer}"))
            })?;
            *slot = value;
            Ok(())
        }
        _ => Err(SnareError::assertion(format!(
            "cannot set field on scalar in {pointer}"
        ))),
    }
}

fn header_lookup<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn header_replace(headers: &mut Headers, name: &str, value: &str) {
    headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value.to_string());
}

/// An outgoing request as seen by the interceptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterceptedRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Absolute URL including query string
    pub url: String,
    /// Request headers
    pub headers: Headers,
    /// Request body
    pub body: Body,
}

impl InterceptedRequest {
    /// Create a request with no headers or body
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: Body::Empty,
        }
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        header_replace(&mut self.headers, key, value);
        self
    }

    /// Set a JSON body
    #[must_use]
    pub fn with_json(mut self, value: Value) -> Self {
        self.body = Body::Json(value);
        header_replace(&mut self.headers, "content-type", "application/json");
        self
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Case-insensitive header lookup
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_lookup(&self.headers, name)
    }

    /// Replace a header regardless of its current casing
    pub fn set_header(&mut self, name: &str, value: &str) {
        header_replace(&mut self.headers, name, value);
    }

    /// Parsed request URL
    pub fn parsed_url(&self) -> SnareResult<RequestUrl> {
        RequestUrl::parse(&self.url)
    }

    /// URL path component, `None` when the URL does not parse
    #[must_use]
    pub fn path(&self) -> Option<String> {
        self.parsed_url().ok().map(|u| u.path().to_string())
    }

    /// URL query string without the leading `?`
    #[must_use]
    pub fn query(&self) -> Option<String> {
        self.parsed_url().ok()?.query().map(str::to_string)
    }

    /// Parse body as JSON
    pub fn body_json<T: DeserializeOwned>(&self) -> SnareResult<T> {
        self.body.parse()
    }
}

/// A response delivered back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterceptedResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: Headers,
    /// Response body
    pub body: Body,
}

impl Default for InterceptedResponse {
    fn default() -> Self {
        Self::new(200)
    }
}

impl InterceptedResponse {
    /// Create an empty response with a status
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Body::Empty,
        }
    }

    /// 200 response with a JSON body
    #[must_use]
    pub fn json(value: Value) -> Self {
        Self::new(200).with_json(value)
    }

    /// Set a JSON body
    #[must_use]
    pub fn with_json(mut self, value: Value) -> Self {
        self.body = Body::Json(value);
        header_replace(&mut self.headers, "content-type", "application/json");
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        header_replace(&mut self.headers, key, value);
        self
    }

    /// Case-insensitive header lookup
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_lookup(&self.headers, name)
    }

    /// Replace a header regardless of its current casing
    pub fn set_header(&mut self, name: &str, value: &str) {
        header_replace(&mut self.headers, name, value);
    }

    /// Whether the status is 2xx
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Parse body as JSON
    pub fn body_json<T: DeserializeOwned>(&self) -> SnareResult<T> {
        self.body.parse()
    }
}

/// A canned response registered on a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StubResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: Headers,
    /// Response body
    pub body: Body,
    /// Artificial delay in milliseconds
    pub delay_ms: u64,
}

impl Default for StubResponse {
    fn default() -> Self {
        Self {
            status: 200,
            headers: Headers::new(),
            body: Body::Empty,
            delay_ms: 0,
        }
    }
}

impl StubResponse {
    /// Create a new empty 200 stub
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a JSON stub
    #[must_use]
    pub fn json(value: Value) -> Self {
        Self::new()
            .with_body(Body::Json(value))
            .with_header("content-type", "application/json")
    }

    /// Create a text stub
    #[must_use]
    pub fn text(content: &str) -> Self {
        Self::new()
            .with_body(Body::Text(content.to_string()))
            .with_header("content-type", "text/plain")
    }

    /// Create an error stub with `{"error": message}`
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(serde_json::json!({ "error": message })).with_status(status)
    }

    /// Set status code
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set body
    #[must_use]
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        header_replace(&mut self.headers, key, value);
        self
    }

    /// Set delay
    #[must_use]
    pub const fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Materialize the response delivered to the caller
    #[must_use]
    pub fn to_response(&self) -> InterceptedResponse {
        InterceptedResponse {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

// ===== REQUEST URLS =====

/// Origin that relative URLs are resolved against; never part of a result
const RELATIVE_BASE: &str = "http://relative.invalid/";

/// A parsed request URL
///
/// Relative URLs (`/api/tags?limit=5`) are resolved against a placeholder
/// origin that every accessor leaves out, so `without_query` of a relative
/// URL is still relative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUrl {
    parsed: Url,
    relative: bool,
}

impl RequestUrl {
    /// Parse an absolute or relative URL
    pub fn parse(raw: &str) -> SnareResult<Self> {
        match Url::parse(raw) {
            Ok(parsed) => Ok(Self {
                parsed,
                relative: false,
            }),
            Err(ParseError::RelativeUrlWithoutBase) => {
                let base = Url::parse(RELATIVE_BASE).map_err(|e| invalid_url(RELATIVE_BASE, &e))?;
                let parsed = base.join(raw).map_err(|e| invalid_url(raw, &e))?;
                Ok(Self {
                    parsed,
                    relative: true,
                })
            }
            Err(e) => Err(invalid_url(raw, &e)),
        }
    }

    /// Whether the URL was given without scheme and host
    #[must_use]
    pub const fn is_relative(&self) -> bool {
        self.relative
    }

    /// Path component, `/` for a bare origin
    #[must_use]
    pub fn path(&self) -> &str {
        self.parsed.path()
    }

    /// Query string without the leading `?`
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.parsed.query()
    }

    /// Path and query as they appear on the request line
    #[must_use]
    pub fn path_and_query(&self) -> &str {
        &self.parsed[Position::BeforePath..Position::AfterQuery]
    }

    /// The URL without query or fragment
    #[must_use]
    pub fn without_query(&self) -> &str {
        &self.parsed[self.start()..Position::AfterPath]
    }

    /// The URL without its fragment
    #[must_use]
    pub fn without_fragment(&self) -> &str {
        &self.parsed[self.start()..Position::AfterQuery]
    }

    const fn start(&self) -> Position {
        if self.relative {
            Position::BeforePath
        } else {
            Position::BeforeScheme
        }
    }
}

impl FromStr for RequestUrl {
    type Err = SnareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RequestUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parsed[self.start()..])
    }
}

fn invalid_url(url: &str, err: &ParseError) -> SnareError {
    SnareError::InvalidUrl {
        url: url.to_string(),
        message: err.to_string(),
    }
}
