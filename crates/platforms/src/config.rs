//! Resolver and platform client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::credentials::CredentialSet;
use crate::error::{ResolverError, Result};
use crate::http::DEFAULT_UA;
use crate::platforms::twitch::WEB_CLIENT_ID;
use crate::retry::RetryPolicy;

fn default_extraction_timeout_secs() -> u64 {
    120
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_user_agent() -> String {
    DEFAULT_UA.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Base URL of the extraction service; its tier fails when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_service_url: Option<String>,
    /// Timeout of one extraction-service call (default: 120)
    #[serde(default = "default_extraction_timeout_secs")]
    pub extraction_timeout_secs: u64,
    /// Timeout of every other request (default: 30)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Attempts of the Twitch manifest pipeline (default: 3)
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Fixed delay between attempts (default: 1000)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Hosts reached without certificate verification.
    #[serde(default)]
    pub relaxed_tls_hosts: Vec<String>,
    /// User agent for page scraping and manifest fetches.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            extraction_service_url: None,
            extraction_timeout_secs: default_extraction_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            relaxed_tls_hosts: Vec::new(),
            user_agent: default_user_agent(),
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 || self.extraction_timeout_secs == 0 {
            return Err(ResolverError::Config("timeouts must be positive".to_string()));
        }
        if let Some(url) = &self.extraction_service_url {
            url::Url::parse(url)
                .map_err(|e| ResolverError::Config(format!("extraction_service_url: {e}")))?;
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, Duration::from_millis(self.retry_delay_ms))
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }
}

fn default_web_client_id() -> Option<String> {
    Some(WEB_CLIENT_ID.to_string())
}

/// Twitch application and optional pre-seeded tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwitchSecrets {
    #[serde(default)]
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Client id sent to the GQL endpoint (default: the web player's)
    #[serde(default = "default_web_client_id")]
    pub web_client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// `auth-token` cookie of a twitch.tv browser session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_access_token: Option<String>,
}

impl Default for TwitchSecrets {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            web_client_id: default_web_client_id(),
            access_token: None,
            refresh_token: None,
            web_access_token: None,
        }
    }
}

/// Google OAuth client and optional pre-seeded tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleSecrets {
    #[serde(default)]
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSecrets {
    #[serde(default)]
    pub twitch: TwitchSecrets,
    #[serde(default)]
    pub youtube: GoogleSecrets,
}

impl From<&TwitchSecrets> for CredentialSet {
    fn from(secrets: &TwitchSecrets) -> Self {
        CredentialSet {
            client_id: secrets.client_id.clone(),
            web_client_id: secrets.web_client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            access_token: secrets.access_token.clone(),
            refresh_token: secrets.refresh_token.clone(),
            web_access_token: secrets.web_access_token.clone(),
            expires_at: None,
        }
    }
}

impl From<&GoogleSecrets> for CredentialSet {
    fn from(secrets: &GoogleSecrets) -> Self {
        CredentialSet {
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            access_token: secrets.access_token.clone(),
            refresh_token: secrets.refresh_token.clone(),
            ..CredentialSet::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config: ResolverConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ResolverConfig::default());
        assert_eq!(config.extraction_timeout(), Duration::from_secs(120));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert!(config.relaxed_tls_hosts.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn rejects_zero_timeouts_and_bad_urls() {
        let config = ResolverConfig {
            request_timeout_secs: 0,
            ..ResolverConfig::default()
        };
        assert!(matches!(config.validate(), Err(ResolverError::Config(_))));

        let config = ResolverConfig {
            extraction_service_url: Some("not a url".into()),
            ..ResolverConfig::default()
        };
        assert!(matches!(config.validate(), Err(ResolverError::Config(_))));
    }

    #[test]
    fn twitch_secrets_default_to_web_client_id() {
        let secrets: PlatformSecrets =
            serde_json::from_str(r#"{"twitch":{"client_id":"abc"}}"#).unwrap();
        let set = CredentialSet::from(&secrets.twitch);
        assert_eq!(set.client_id, "abc");
        assert_eq!(set.web_client_id.as_deref(), Some(WEB_CLIENT_ID));
        assert_eq!(secrets.youtube, GoogleSecrets::default());
    }
}
