use thiserror::Error;

use crate::platform::Platform;

pub type Result<T> = std::result::Result<T, ResolverError>;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("{platform} rejected the credentials: {message}")]
    Unauthorized { platform: Platform, message: String },
    #[error("failed to decode {target}: {source}")]
    Decode {
        target: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("manifest is not valid utf-8: {0}")]
    ManifestEncoding(#[from] std::string::FromUtf8Error),
    #[error("playlist parse error: {0}")]
    PlaylistParse(String),
    #[error("scrape error: {0}")]
    Scrape(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("api error: {0}")]
    Api(String),
    #[error("no credentials available for {0}")]
    MissingCredentials(Platform),
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
    #[error("oauth error: {0}")]
    OAuth(String),
    #[error("invalid reference: {0}")]
    InvalidReference(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("config error: {0}")]
    Config(String),
}

impl ResolverError {
    pub fn decode(target: &'static str, source: serde_json::Error) -> Self {
        Self::Decode { target, source }
    }

    /// Whether this error means the platform refused the current access token.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Whether a later attempt of the same request may succeed.
    ///
    /// Decode failures are schema mismatches and never transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout() || e.is_request() || e.is_body(),
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
