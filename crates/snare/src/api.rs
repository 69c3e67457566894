//! Out-of-band HTTP client for test setup.
//!
//! Requests sent here go straight to the backend and are never intercepted:
//! logging in, seeding data and cleaning up after a test.

use crate::http::{Headers, HttpMethod};
use crate::result::{SnareError, SnareResult};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// A request for [`ApiClient::send`]
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Path relative to the client's base URL, or an absolute URL
    pub path: String,
    /// Extra headers
    pub headers: Headers,
    /// JSON body
    pub body: Option<Value>,
    /// Turn non-2xx responses into errors
    pub fail_on_status: bool,
}

impl ApiRequest {
    /// Create a request without a body
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Headers::new(),
            body: None,
            fail_on_status: true,
        }
    }

    /// GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// POST request with a JSON body
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, path).with_json(body)
    }

    /// DELETE request
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    /// Set a JSON body
    #[must_use]
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `data` as the JSON body
    pub fn with_body<T: Serialize>(self, data: &T) -> SnareResult<Self> {
        Ok(self.with_json(serde_json::to_value(data)?))
    }

    /// Return non-2xx responses instead of failing
    #[must_use]
    pub const fn allow_any_status(mut self) -> Self {
        self.fail_on_status = false;
        self
    }
}

/// Response from [`ApiClient::send`]
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: Headers,
    /// Parsed JSON body; `Null` when empty, a string when not JSON
    pub body: Value,
}

impl ApiResponse {
    /// Body field by JSON pointer
    #[must_use]
    pub fn field(&self, pointer: &str) -> Option<&Value> {
        self.body.pointer(pointer)
    }

    /// Body field as a string
    pub fn str_field(&self, pointer: &str) -> SnareResult<&str> {
        self.field(pointer)
            .and_then(Value::as_str)
            .ok_or_else(|| SnareError::assertion(format!("response has no string at {pointer}")))
    }

    /// Assert the status code
    pub fn assert_status(&self, expected: u16) -> SnareResult<()> {
        if self.status == expected {
            Ok(())
        } else {
            Err(SnareError::assertion(format!(
                "expected status {expected}, got {}",
                self.status
            )))
        }
    }
}

fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).to_string()))
}

/// Async client for requests that bypass interception
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client for `base_url` (e.g. `https://api.realworld.io/api`)
    /// with a 30 second request timeout
    pub fn new(base_url: impl Into<String>) -> SnareResult<Self> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create with a custom request timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> SnareResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, client))
    }

    /// Create with a custom reqwest client
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            token: None,
        }
    }

    /// Send `Authorization: Token <token>` on every request
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Returns the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the auth token, if any
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Resolve a path against the base URL
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    fn method(method: HttpMethod) -> SnareResult<reqwest::Method> {
        if method == HttpMethod::Any {
            return Err(SnareError::InvalidMethod {
                method: method.to_string(),
            });
        }
        reqwest::Method::from_bytes(method.as_str().as_bytes()).map_err(|_| {
            SnareError::InvalidMethod {
                method: method.to_string(),
            }
        })
    }

    /// Send a request
    pub async fn send(&self, request: ApiRequest) -> SnareResult<ApiResponse> {
        let url = self.url(&request.path);
        let mut builder = self.client.request(Self::method(request.method)?, &url);
        if let Some(token) = &self.token {
            builder = builder.header("Authorization", format!("Token {token}"));
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let headers: Headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let bytes = resp.bytes().await?;
        let response = ApiResponse {
            status,
            headers,
            body: parse_body(&bytes),
        };
        tracing::debug!(method = %request.method, %url, status, "api request");

        if request.fail_on_status && !(200..300).contains(&status) {
            return Err(SnareError::Upstream {
                message: format!("{} {url} returned {status}: {}", request.method, response.body),
            });
        }
        Ok(response)
    }

    /// Log in and return the session token (`user.token`)
    pub async fn login(&self, email: &str, password: &str) -> SnareResult<String> {
        let body = serde_json::json!({ "user": { "email": email, "password": password } });
        let response = self.send(ApiRequest::post("/users/login", body)).await?;
        Ok(response.str_field("/user/token")?.to_string())
    }

    /// Log in and return a client authenticated with the session token
    pub async fn authenticated(&self, email: &str, password: &str) -> SnareResult<Self> {
        let token = self.login(email, password).await?;
        Ok(self.clone().with_token(token))
    }
}
