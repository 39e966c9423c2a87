use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::credentials::{CredentialSet, TokenGrant, TokenRefresher};
use crate::error::{ResolverError, Result};
use crate::http::{HttpRequest, HttpTransport};
use crate::oauth::{
    DeviceAuthorizer, DevicePoll, OAuthSession, device_poll_from_response,
    exchange_refresh_token, request_device_session,
};

const DEVICE_CODE_URL: &str = "https://oauth2.googleapis.com/device/code";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

pub const DEFAULT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/youtube.readonly",
    "profile",
];

/// Google's OAuth 2.0 endpoints for limited-input devices.
pub struct GoogleAuth {
    transport: Arc<dyn HttpTransport>,
    client_id: String,
    client_secret: Option<String>,
    scopes: Vec<String>,
}

impl GoogleAuth {
    pub fn new(transport: Arc<dyn HttpTransport>, credentials: &CredentialSet) -> Self {
        Self {
            transport,
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    // Google requires the secret on every token call, even for device clients.
    fn client_form(&self, client_id: &str, client_secret: Option<&str>) -> Result<Vec<(&'static str, String)>> {
        let secret = client_secret.ok_or_else(|| {
            ResolverError::Config("google client_secret is required for token calls".to_string())
        })?;
        Ok(vec![
            ("client_id", client_id.to_string()),
            ("client_secret", secret.to_string()),
        ])
    }
}

#[async_trait]
impl DeviceAuthorizer for GoogleAuth {
    async fn request_device_code(&self) -> Result<OAuthSession> {
        let form = vec![
            ("client_id", self.client_id.clone()),
            ("scope", self.scopes.join(" ")),
        ];
        request_device_session(self.transport.as_ref(), DEVICE_CODE_URL, form).await
    }

    async fn poll_device_token(&self, session: &OAuthSession) -> Result<DevicePoll> {
        let mut form = self.client_form(&self.client_id, self.client_secret.as_deref())?;
        form.push(("device_code", session.device_code.clone()));
        form.push(("grant_type", DEVICE_CODE_GRANT.to_string()));

        let response = self
            .transport
            .send(HttpRequest::post(TOKEN_URL).form(form))
            .await?;
        let poll = device_poll_from_response(&response)?;
        debug!(status = response.status, ?poll, "Polled Google device token");
        Ok(poll)
    }
}

#[async_trait]
impl TokenRefresher for GoogleAuth {
    async fn refresh(&self, credentials: &CredentialSet) -> Result<TokenGrant> {
        let refresh_token = credentials
            .refresh_token
            .clone()
            .ok_or_else(|| ResolverError::RefreshFailed("no google refresh token".to_string()))?;
        let mut form = self.client_form(&credentials.client_id, credentials.client_secret.as_deref())?;
        form.push(("grant_type", "refresh_token".to_string()));
        form.push(("refresh_token", refresh_token));
        exchange_refresh_token(self.transport.as_ref(), TOKEN_URL, form).await
    }
}
