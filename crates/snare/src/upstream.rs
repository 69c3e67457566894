//! The real network, as seen by the interceptor.
//!
//! Drivers that own their transport call [`Interceptor::complete`] themselves;
//! drivers that delegate it hand an [`Upstream`] to [`Interceptor::dispatch`].
//!
//! [`Interceptor::complete`]: crate::interceptor::Interceptor::complete
//! [`Interceptor::dispatch`]: crate::interceptor::Interceptor::dispatch

use crate::http::{InterceptedRequest, InterceptedResponse};
use crate::result::SnareResult;

/// Sends a request to the real backend
pub trait Upstream: Send + Sync {
    /// Forward the request and return the backend's response
    fn forward(&self, request: &InterceptedRequest) -> SnareResult<InterceptedResponse>;
}

impl<F> Upstream for F
where
    F: Fn(&InterceptedRequest) -> SnareResult<InterceptedResponse> + Send + Sync,
{
    fn forward(&self, request: &InterceptedRequest) -> SnareResult<InterceptedResponse> {
        self(request)
    }
}

#[cfg(feature = "http")]
pub use self::http_upstream::HttpUpstream;

#[cfg(feature = "http")]
mod http_upstream {
    use super::Upstream;
    use crate::http::{Body, Headers, HttpMethod, InterceptedRequest, InterceptedResponse};
    use crate::result::{SnareError, SnareResult};
    use std::time::Duration;

    /// Blocking HTTP upstream.
    ///
    /// Must not be used from inside an async runtime; use the driver's own
    /// transport and [`crate::interceptor::Interceptor::complete`] there.
    #[derive(Debug, Clone)]
    pub struct HttpUpstream {
        client: reqwest::blocking::Client,
    }

    impl HttpUpstream {
        /// Create with a 30 second request timeout
        pub fn new() -> SnareResult<Self> {
            Self::with_timeout(Duration::from_secs(30))
        }

        /// Create with a custom request timeout
        pub fn with_timeout(timeout: Duration) -> SnareResult<Self> {
            let client = reqwest::blocking::Client::builder()
                .timeout(timeout)
                .build()?;
            Ok(Self { client })
        }
    }

    fn to_reqwest_method(method: HttpMethod) -> SnareResult<reqwest::Method> {
        match method {
            HttpMethod::Get => Ok(reqwest::Method::GET),
            HttpMethod::Post => Ok(reqwest::Method::POST),
            HttpMethod::Put => Ok(reqwest::Method::PUT),
            HttpMethod::Delete => Ok(reqwest::Method::DELETE),
            HttpMethod::Patch => Ok(reqwest::Method::PATCH),
            HttpMethod::Head => Ok(reqwest::Method::HEAD),
            HttpMethod::Options => Ok(reqwest::Method::OPTIONS),
            HttpMethod::Any => Err(SnareError::InvalidMethod {
                method: method.to_string(),
            }),
        }
    }

    impl Upstream for HttpUpstream {
        fn forward(&self, request: &InterceptedRequest) -> SnareResult<InterceptedResponse> {
            let mut builder = self
                .client
                .request(to_reqwest_method(request.method)?, &request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if !request.body.is_empty() {
                builder = builder.body(request.body.to_bytes());
            }

            let response = builder.send().map_err(|e| SnareError::Upstream {
                message: e.to_string(),
            })?;
            let status = response.status().as_u16();
            let headers: Headers = response
                .headers()
                .iter()
                .filter_map(|(k, v)| {
                    v.to_str()
                        .ok()
                        .map(|v| (k.as_str().to_string(), v.to_string()))
                })
                .collect();
            let bytes = response.bytes().map_err(|e| SnareError::Upstream {
                message: e.to_string(),
            })?;
            let content_type = headers.get("content-type").map(String::as_str);
            let body = Body::from_bytes(&bytes, content_type);

            tracing::debug!(url = %request.url, status, "forwarded to upstream");
            Ok(InterceptedResponse {
                status,
                headers,
                body,
            })
        }
    }

    #[cfg(test)]
    #[allow(clippy::unwrap_used, clippy::expect_used)]
    mod tests {
        use super::*;

        #[test]
        fn test_any_method_cannot_be_sent() {
            assert!(to_reqwest_method(HttpMethod::Any).is_err());
            assert_eq!(
                to_reqwest_method(HttpMethod::Patch).unwrap(),
                reqwest::Method::PATCH
            );
        }

        #[test]
        fn test_unreachable_host_is_upstream_error() {
            let upstream = HttpUpstream::with_timeout(Duration::from_millis(500)).unwrap();
            let request = InterceptedRequest::new(HttpMethod::Get, "http://127.0.0.1:9/api/tags");
            let err = upstream.forward(&request).unwrap_err();
            assert!(matches!(err, SnareError::Upstream { .. }));
        }
    }
}
