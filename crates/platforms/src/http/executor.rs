//! Authenticated API calls with refresh-and-replay on expired credentials.
//!
//! Every platform REST call goes through [`ApiExecutor`]. It attaches the
//! authorization scheme of the target [`ApiBase`], recognises the
//! platform's "unauthenticated" signals (HTTP 401 or an embedded error in an
//! otherwise successful body), recovers once and replays the identical request
//! once. A second auth failure is returned as [`ResolverError::Unauthorized`].

use std::sync::Arc;

use bytes::Bytes;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::pagination::PagedResponse;
use super::query::{QueryParams, QueryValue};
use super::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::credentials::Credentials;
use crate::error::{ResolverError, Result};
use crate::platform::Platform;
use crate::utils::decode_json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// Legacy `Authorization: OAuth <token>` used by Twitch's web endpoints.
    OAuth,
    None,
}

/// Which token of the Credential Set a base authenticates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Primary,
    Web,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiBase {
    pub platform: Platform,
    pub url: &'static str,
    pub auth: AuthScheme,
    pub token: TokenKind,
    pub client_id_header: bool,
}

impl ApiBase {
    pub const TWITCH_HELIX: ApiBase = ApiBase {
        platform: Platform::Twitch,
        url: "https://api.twitch.tv/helix",
        auth: AuthScheme::Bearer,
        token: TokenKind::Primary,
        client_id_header: true,
    };

    pub const TWITCH_GQL: ApiBase = ApiBase {
        platform: Platform::Twitch,
        url: "https://gql.twitch.tv",
        auth: AuthScheme::OAuth,
        token: TokenKind::Web,
        client_id_header: true,
    };

    pub const YOUTUBE_DATA: ApiBase = ApiBase {
        platform: Platform::Youtube,
        url: "https://www.googleapis.com/youtube/v3",
        auth: AuthScheme::Bearer,
        token: TokenKind::Primary,
        client_id_header: false,
    };

    pub const GOOGLE_PEOPLE: ApiBase = ApiBase {
        platform: Platform::Youtube,
        url: "https://people.googleapis.com/v1",
        auth: AuthScheme::Bearer,
        token: TokenKind::Primary,
        client_id_header: false,
    };

    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Guards the single replay allowed after an auth failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthAttempt {
    Initial,
    Replay,
}

/// One request against an [`ApiBase`], replayable as-is.
#[derive(Debug, Clone)]
pub struct ApiCall<'a> {
    pub method: Method,
    pub base: &'a ApiBase,
    pub path: &'a str,
    pub query: QueryParams,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl<'a> ApiCall<'a> {
    pub fn new(method: Method, base: &'a ApiBase, path: &'a str) -> Self {
        Self {
            method,
            base,
            path,
            query: QueryParams::new(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

#[derive(Clone)]
pub struct ApiExecutor {
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<Credentials>,
}

impl ApiExecutor {
    pub fn new(transport: Arc<dyn HttpTransport>, credentials: Arc<Credentials>) -> Self {
        Self {
            transport,
            credentials,
        }
    }

    pub fn credentials(&self) -> &Arc<Credentials> {
        &self.credentials
    }

    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    pub async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        base: &ApiBase,
        path: &str,
        query: &QueryParams,
    ) -> Result<T> {
        let call = ApiCall::new(method, base, path).query(query.clone());
        self.execute_call(&call).await
    }

    pub async fn execute_raw(
        &self,
        method: Method,
        base: &ApiBase,
        path: &str,
        query: &QueryParams,
    ) -> Result<Bytes> {
        let call = ApiCall::new(method, base, path).query(query.clone());
        self.send(&call).await
    }

    pub async fn execute_call<T: DeserializeOwned>(&self, call: &ApiCall<'_>) -> Result<T> {
        let body = self.send(call).await?;
        decode_json(&body, std::any::type_name::<T>())
    }

    /// Follows the page cursor until it is invalid or a page comes back empty.
    pub async fn execute_fetch_all<P>(
        &self,
        base: &ApiBase,
        path: &str,
        query: &QueryParams,
    ) -> Result<Vec<P::Item>>
    where
        P: PagedResponse + DeserializeOwned,
    {
        let mut query = query.clone();
        let mut items = Vec::new();
        let mut pages = 0usize;
        loop {
            let page: P = self.execute(Method::GET, base, path, &query).await?;
            let (page_items, cursor) = page.into_parts();
            pages += 1;
            if page_items.is_empty() {
                break;
            }
            items.extend(page_items);
            match cursor.as_str() {
                Some(next) => query.set(P::CURSOR_PARAM, QueryValue::One(next.to_string())),
                None => break,
            }
        }
        debug!(path, pages, items = items.len(), "Fetched all pages");
        Ok(items)
    }

    #[instrument(skip(self, call), fields(platform = %call.base.platform, path = call.path))]
    async fn send(&self, call: &ApiCall<'_>) -> Result<Bytes> {
        let base = call.base;
        if base.auth != AuthScheme::None && base.token == TokenKind::Primary {
            self.credentials.ensure_fresh().await?;
        }

        let mut attempt = AuthAttempt::Initial;
        loop {
            let token = self.token_for(base);
            let request = self.build_request(call, token.as_deref());
            let response = self.transport.send(request).await?;

            let Some(message) = auth_failure(base.platform, &response) else {
                return response.error_for_status().map(|r| r.body);
            };

            if base.auth == AuthScheme::None || attempt == AuthAttempt::Replay {
                return Err(ResolverError::Unauthorized {
                    platform: base.platform,
                    message,
                });
            }

            warn!(%message, "Request rejected as unauthenticated; recovering and replaying once");
            self.recover(base, token.as_deref()).await?;
            attempt = AuthAttempt::Replay;
        }
    }

    async fn recover(&self, base: &ApiBase, rejected: Option<&str>) -> Result<()> {
        match base.token {
            TokenKind::Web => self.credentials.discard_web_access_token(rejected).await,
            TokenKind::Primary => {
                if rejected.is_none() && !self.credentials.has_refresh_token() {
                    return Err(ResolverError::MissingCredentials(base.platform));
                }
                self.credentials.refresh_after_failure(rejected).await
            }
        }
    }

    fn token_for(&self, base: &ApiBase) -> Option<String> {
        match (base.auth, base.token) {
            (AuthScheme::None, _) => None,
            (_, TokenKind::Primary) => self.credentials.access_token(),
            (_, TokenKind::Web) => self.credentials.web_access_token(),
        }
    }

    fn build_request(&self, call: &ApiCall<'_>, token: Option<&str>) -> HttpRequest {
        let base = call.base;
        let url = call.query.append_to(&base.endpoint(call.path));
        let mut request = HttpRequest::new(call.method.clone(), url);

        if base.client_id_header {
            let client_id = match base.token {
                TokenKind::Primary => self.credentials.client_id(),
                TokenKind::Web => self.credentials.web_client_id(),
            };
            if !client_id.is_empty() {
                request = request.header("Client-Id", client_id);
            }
        }
        match (base.auth, token) {
            (AuthScheme::Bearer, Some(token)) => {
                request = request.header("Authorization", format!("Bearer {token}"));
            }
            (AuthScheme::OAuth, Some(token)) => {
                request = request.header("Authorization", format!("OAuth {token}"));
            }
            _ => {}
        }
        for (key, value) in &call.headers {
            request = request.header(key.clone(), value.clone());
        }
        if let Some(body) = &call.body {
            request = request.json(body.clone());
        }
        request
    }
}

impl std::fmt::Debug for ApiExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiExecutor")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// Returns the platform's message when `response` signals rejected credentials.
fn auth_failure(platform: Platform, response: &HttpResponse) -> Option<String> {
    let body = serde_json::from_slice::<Value>(&response.body).ok();
    let embedded = body.as_ref().and_then(|body| match platform {
        Platform::Twitch => twitch_auth_error(body),
        Platform::Youtube => google_auth_error(body),
    });

    match embedded {
        Some(message) => Some(message),
        None if response.status == 401 => Some(response.text_lossy()),
        None => None,
    }
}

// Helix and GQL: `{"error": "Unauthorized", "status": 401, "message": "..."}`
fn twitch_auth_error(body: &Value) -> Option<String> {
    if body.get("status").and_then(Value::as_u64) != Some(401) {
        return None;
    }
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unauthorized");
    Some(message.to_string())
}

// `{"error": {"code": 401, "status": "UNAUTHENTICATED", "message": "..."}}`
fn google_auth_error(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    let unauthenticated = error.get("status").and_then(Value::as_str) == Some("UNAUTHENTICATED")
        || error.get("code").and_then(Value::as_u64) == Some(401);
    if !unauthenticated {
        return None;
    }
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unauthenticated");
    Some(message.to_string())
}
