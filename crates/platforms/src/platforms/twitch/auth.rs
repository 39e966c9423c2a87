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

const DEVICE_CODE_URL: &str = "https://id.twitch.tv/oauth2/device";
const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

pub const DEFAULT_SCOPES: &[&str] = &["user:read:follows"];

/// Twitch's id.twitch.tv OAuth endpoints.
pub struct TwitchAuth {
    transport: Arc<dyn HttpTransport>,
    client_id: String,
    client_secret: Option<String>,
    scopes: Vec<String>,
}

impl TwitchAuth {
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

    fn client_form(&self, client_id: &str, client_secret: Option<&str>) -> Vec<(&'static str, String)> {
        let mut form = vec![("client_id", client_id.to_string())];
        if let Some(secret) = client_secret {
            form.push(("client_secret", secret.to_string()));
        }
        form
    }
}

#[async_trait]
impl DeviceAuthorizer for TwitchAuth {
    async fn request_device_code(&self) -> Result<OAuthSession> {
        let mut form = self.client_form(&self.client_id, None);
        form.push(("scopes", self.scopes.join(" ")));
        request_device_session(self.transport.as_ref(), DEVICE_CODE_URL, form).await
    }

    async fn poll_device_token(&self, session: &OAuthSession) -> Result<DevicePoll> {
        let mut form = self.client_form(&self.client_id, self.client_secret.as_deref());
        form.push(("scopes", self.scopes.join(" ")));
        form.push(("device_code", session.device_code.clone()));
        form.push(("grant_type", DEVICE_CODE_GRANT.to_string()));

        let response = self
            .transport
            .send(HttpRequest::post(TOKEN_URL).form(form))
            .await?;
        let poll = device_poll_from_response(&response)?;
        debug!(status = response.status, ?poll, "Polled Twitch device token");
        Ok(poll)
    }
}

#[async_trait]
impl TokenRefresher for TwitchAuth {
    async fn refresh(&self, credentials: &CredentialSet) -> Result<TokenGrant> {
        let refresh_token = credentials
            .refresh_token
            .clone()
            .ok_or_else(|| ResolverError::RefreshFailed("no twitch refresh token".to_string()))?;
        let mut form = self.client_form(&credentials.client_id, credentials.client_secret.as_deref());
        form.push(("grant_type", "refresh_token".to_string()));
        form.push(("refresh_token", refresh_token));
        exchange_refresh_token(self.transport.as_ref(), TOKEN_URL, form).await
    }
}
