//! Device authorization (RFC 8628) session and poll types.

use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;

use crate::credentials::TokenGrant;
use crate::platform::UserIdentity;

/// Interval used when the platform does not send one.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// A pending device authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthSession {
    pub device_code: String,
    /// Code the user types at `verification_url`.
    pub user_code: String,
    pub verification_url: String,
    pub requested_at: Instant,
    pub expires_in: Duration,
    pub poll_interval: Duration,
}

impl OAuthSession {
    pub fn is_expired(&self) -> bool {
        Instant::now() > self.requested_at + self.expires_in
    }

    /// Time left before the user code stops working.
    pub fn remaining(&self) -> Duration {
        (self.requested_at + self.expires_in).saturating_duration_since(Instant::now())
    }
}

/// Device-code endpoint response. Twitch says `verification_uri`, Google
/// says `verification_url`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    #[serde(alias = "verification_uri")]
    pub verification_url: String,
    pub expires_in: u64,
    #[serde(default)]
    pub interval: Option<u64>,
}

impl DeviceCodeResponse {
    pub fn into_session(self) -> OAuthSession {
        OAuthSession {
            device_code: self.device_code,
            user_code: self.user_code,
            verification_url: self.verification_url,
            requested_at: Instant::now(),
            expires_in: Duration::from_secs(self.expires_in),
            poll_interval: Duration::from_secs(
                self.interval.unwrap_or(DEFAULT_POLL_INTERVAL_SECS).max(1),
            ),
        }
    }
}

/// Result of one token-endpoint poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DevicePoll {
    Pending,
    /// Poll less often.
    SlowDown,
    Authorized(TokenGrant),
    Denied,
    Expired,
    Failed(String),
}

impl DevicePoll {
    /// Maps an RFC 8628 error code.
    pub fn from_error_code(code: &str) -> Self {
        match code {
            "authorization_pending" => Self::Pending,
            "slow_down" => Self::SlowDown,
            "access_denied" => Self::Denied,
            "expired_token" => Self::Expired,
            other => Self::Failed(other.to_string()),
        }
    }
}

/// Terminal value of a device flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    Authorized(UserIdentity),
    Denied,
    Expired,
    Cancelled,
    Failed(String),
}

impl SignInOutcome {
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_rfc8628_codes() {
        assert_eq!(DevicePoll::from_error_code("authorization_pending"), DevicePoll::Pending);
        assert_eq!(DevicePoll::from_error_code("slow_down"), DevicePoll::SlowDown);
        assert_eq!(DevicePoll::from_error_code("access_denied"), DevicePoll::Denied);
        assert_eq!(DevicePoll::from_error_code("expired_token"), DevicePoll::Expired);
        assert_eq!(
            DevicePoll::from_error_code("invalid_client"),
            DevicePoll::Failed("invalid_client".into())
        );
    }

    #[test]
    fn accepts_both_verification_spellings() {
        let twitch: DeviceCodeResponse = serde_json::from_str(
            r#"{"device_code":"d","user_code":"ABCD","verification_uri":"https://www.twitch.tv/activate","expires_in":1800,"interval":5}"#,
        )
        .unwrap();
        assert_eq!(twitch.verification_url, "https://www.twitch.tv/activate");

        let google: DeviceCodeResponse = serde_json::from_str(
            r#"{"device_code":"d","user_code":"WXYZ","verification_url":"https://www.google.com/device","expires_in":1800}"#,
        )
        .unwrap();
        let session = google.into_session();
        assert_eq!(session.poll_interval, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn session_expires_after_its_lifetime() {
        let session = DeviceCodeResponse {
            device_code: "d".into(),
            user_code: "u".into(),
            verification_url: "https://x".into(),
            expires_in: 10,
            interval: Some(1),
        }
        .into_session();
        assert!(!session.is_expired());
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(session.is_expired());
        assert_eq!(session.remaining(), Duration::ZERO);
    }
}
