//! OAuth device authorization.

mod device_flow;
mod session;

pub use device_flow::{DeviceAuthorizer, DeviceFlowOrchestrator, IdentityProvider, SignInHandle};
pub use session::{DeviceCodeResponse, DevicePoll, OAuthSession, SignInOutcome};

use serde::Deserialize;
use tracing::debug;

use crate::credentials::TokenGrant;
use crate::error::{ResolverError, Result};
use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use crate::utils::decode_json;

/// Error body of an OAuth token endpoint.
///
/// Google follows RFC 6749 (`error`, `error_description`); Twitch reports the
/// code in `message` next to a numeric `status`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct OAuthErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl OAuthErrorBody {
    /// The RFC 8628 code, whichever field carries it.
    pub(crate) fn code(&self) -> Option<&str> {
        [self.error.as_deref(), self.message.as_deref()]
            .into_iter()
            .flatten()
            .find(|code| is_device_code_error(code))
            .or(self.error.as_deref())
            .or(self.message.as_deref())
    }

    pub(crate) fn describe(&self) -> String {
        self.error_description
            .clone()
            .or_else(|| self.message.clone())
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "unknown oauth error".to_string())
    }
}

fn is_device_code_error(code: &str) -> bool {
    matches!(
        code,
        "authorization_pending" | "slow_down" | "access_denied" | "expired_token"
    )
}

/// POSTs a form to a device-code endpoint and starts the session clock.
pub(crate) async fn request_device_session(
    transport: &dyn HttpTransport,
    url: &str,
    form: Vec<(&'static str, String)>,
) -> Result<OAuthSession> {
    let response = transport
        .send(HttpRequest::post(url).form(form))
        .await?
        .error_for_status()?;
    let device: DeviceCodeResponse = decode_json(&response.body, "device code response")?;
    debug!(
        verification_url = %device.verification_url,
        expires_in = device.expires_in,
        "Device code issued"
    );
    Ok(device.into_session())
}

/// Exchanges a refresh token at `url`.
pub(crate) async fn exchange_refresh_token(
    transport: &dyn HttpTransport,
    url: &str,
    form: Vec<(&'static str, String)>,
) -> Result<TokenGrant> {
    let response = transport.send(HttpRequest::post(url).form(form)).await?;
    if !response.is_success() {
        let body: OAuthErrorBody = serde_json::from_slice(&response.body).unwrap_or_default();
        return Err(ResolverError::OAuth(format!(
            "refresh rejected with {}: {}",
            response.status,
            body.describe()
        )));
    }
    decode_json(&response.body, "token grant")
}

/// Interprets a token-endpoint response during device polling.
pub(crate) fn device_poll_from_response(response: &HttpResponse) -> Result<DevicePoll> {
    if response.is_success() {
        let grant: TokenGrant = decode_json(&response.body, "token grant")?;
        return Ok(DevicePoll::Authorized(grant));
    }
    let body: OAuthErrorBody = serde_json::from_slice(&response.body).unwrap_or_default();
    Ok(match body.code() {
        Some(code) if is_device_code_error(code) => DevicePoll::from_error_code(code),
        _ => DevicePoll::Failed(format!("{} ({})", body.describe(), response.status)),
    })
}
