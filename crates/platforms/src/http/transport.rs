//! The network seam every component talks through.
//!
//! [`ReqwestTransport`] is the production implementation. Tests plug in stub
//! transports that return canned responses and count calls.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use rustls::ClientConfig;
use rustls_platform_verifier::BuilderVerifierExt;
use tracing::{debug, trace};
use url::Url;

use crate::config::ResolverConfig;
use crate::error::{ResolverError, Result};

pub(crate) const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
}

/// A fully-built request: absolute URL, headers and optional body.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    /// Overrides the transport's default timeout.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn form<K: Into<String>, V: Into<String>>(
        mut self,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.body = Some(RequestBody::Form(fields));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Fails with [`ResolverError::Status`] unless the status is 2xx.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ResolverError::Status {
                status: self.status,
                body: self.text_lossy(),
            })
        }
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends one request. Non-2xx responses are returned, not turned into errors.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// reqwest-backed transport.
///
/// Hosts listed in `relaxed_hosts` are routed through a second client that
/// skips certificate verification; some manifest origins need it.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    strict: Client,
    relaxed: Client,
    relaxed_hosts: Arc<[String]>,
}

impl ReqwestTransport {
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let tls_config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| ResolverError::Config(format!("tls protocol versions: {e}")))?
            .with_platform_verifier()
            .map_err(|e| ResolverError::Config(format!("platform verifier: {e}")))?
            .with_no_client_auth();

        let timeout = Duration::from_secs(config.request_timeout_secs);
        let strict = Client::builder()
            .use_preconfigured_tls(tls_config)
            .user_agent(config.user_agent.as_str())
            .timeout(timeout)
            .build()?;
        let relaxed = Client::builder()
            .danger_accept_invalid_certs(true)
            .user_agent(config.user_agent.as_str())
            .timeout(timeout)
            .build()?;

        Ok(Self {
            strict,
            relaxed,
            relaxed_hosts: config.relaxed_tls_hosts.clone().into(),
        })
    }

    fn client_for(&self, url: &Url) -> &Client {
        let relaxed = url
            .host_str()
            .is_some_and(|host| self.relaxed_hosts.iter().any(|h| h == host));
        if relaxed {
            trace!(host = ?url.host_str(), "Using relaxed TLS client");
            &self.relaxed
        } else {
            &self.strict
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = Url::parse(&request.url)
            .map_err(|e| ResolverError::Validation(format!("invalid url {}: {e}", request.url)))?;

        let mut headers = HeaderMap::new();
        for (key, value) in &request.headers {
            match (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => debug!(header = %key, "Invalid header; skipping"),
            }
        }

        let mut builder = self
            .client_for(&url)
            .request(request.method.clone(), url)
            .headers(headers);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder = match request.body {
            Some(RequestBody::Json(body)) => builder.json(&body),
            Some(RequestBody::Form(fields)) => builder.form(&fields),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        trace!(status, len = body.len(), "Received response");
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
pub(crate) mod stub {
    //! Scripted transport for tests.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;

    type Responder = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync>;

    struct Route {
        matcher: String,
        responses: VecDeque<Responder>,
        fallback: Option<Responder>,
        calls: Arc<AtomicUsize>,
    }

    /// Routes requests by URL substring. Each route serves its queued
    /// responses in order, then repeats its fallback if one was set.
    #[derive(Default)]
    pub struct StubTransport {
        routes: Mutex<Vec<Route>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl StubTransport {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn route(&self, matcher: &str) -> Arc<AtomicUsize> {
            let mut routes = self.routes.lock();
            if let Some(route) = routes.iter().find(|r| r.matcher == matcher) {
                return route.calls.clone();
            }
            let calls = Arc::new(AtomicUsize::new(0));
            routes.push(Route {
                matcher: matcher.to_string(),
                responses: VecDeque::new(),
                fallback: None,
                calls: calls.clone(),
            });
            calls
        }

        /// Queues one response for URLs containing `matcher`.
        pub fn respond(&self, matcher: &str, status: u16, body: impl Into<String>) -> Arc<AtomicUsize> {
            let body = body.into();
            self.respond_with(matcher, move |_| Ok(HttpResponse::new(status, body.clone())))
        }

        pub fn respond_with(
            &self,
            matcher: &str,
            responder: impl Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync + 'static,
        ) -> Arc<AtomicUsize> {
            let calls = self.route(matcher);
            let mut routes = self.routes.lock();
            if let Some(route) = routes.iter_mut().find(|r| r.matcher == matcher) {
                route.responses.push_back(Box::new(responder));
            }
            calls
        }

        /// Serves this response for every call once the queue is empty.
        pub fn always(&self, matcher: &str, status: u16, body: impl Into<String>) -> Arc<AtomicUsize> {
            let calls = self.route(matcher);
            let body = body.into();
            let mut routes = self.routes.lock();
            if let Some(route) = routes.iter_mut().find(|r| r.matcher == matcher) {
                route.fallback = Some(Box::new(move |_| Ok(HttpResponse::new(status, body.clone()))));
            }
            calls
        }

        pub fn fail(&self, matcher: &str, message: &str) -> Arc<AtomicUsize> {
            let message = message.to_string();
            self.respond_with(matcher, move |_| Err(ResolverError::Transport(message.clone())))
        }

        pub fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().clone()
        }

        pub fn calls_to(&self, matcher: &str) -> usize {
            self.requests
                .lock()
                .iter()
                .filter(|r| r.url.contains(matcher))
                .count()
        }
    }

    #[async_trait]
    impl HttpTransport for StubTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            self.requests.lock().push(request.clone());
            let mut routes = self.routes.lock();
            let Some(route) = routes.iter_mut().find(|r| request.url.contains(&r.matcher)) else {
                return Err(ResolverError::Transport(format!("no stub for {}", request.url)));
            };
            route.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(responder) = route.responses.pop_front() {
                return responder(&request);
            }
            match &route.fallback {
                Some(responder) => responder(&request),
                None => Err(ResolverError::Transport(format!(
                    "stub for {} exhausted",
                    route.matcher
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_for_status_keeps_body() {
        let err = HttpResponse::new(404, "missing").error_for_status().unwrap_err();
        match err {
            ResolverError::Status { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "missing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let request = HttpRequest::get("https://a").header("Authorization", "Bearer x");
        assert_eq!(request.header_value("authorization"), Some("Bearer x"));
    }

    #[tokio::test]
    #[ignore]
    async fn fetches_over_network() {
        let transport = ReqwestTransport::new(&ResolverConfig::default()).unwrap();
        let response = transport
            .send(HttpRequest::get("https://www.twitch.tv"))
            .await
            .unwrap();
        assert!(response.is_success());
    }
}
