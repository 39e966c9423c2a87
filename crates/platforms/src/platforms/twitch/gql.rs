//! Playback access token exchange over Twitch's private GQL endpoint.

use rand::RngExt;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{ResolverError, Result};
use crate::http::{ApiBase, ApiCall, ApiExecutor};

const PLAYBACK_ACCESS_TOKEN_OPERATION: &str = "PlaybackAccessToken";
const PLAYBACK_ACCESS_TOKEN_HASH: &str =
    "ed230aa1e33e07eebb8928504583da78a5173989fadfb1ac94be06a04f3cdbe9";
const PLAYER_TYPE: &str = "site";

/// What a playback token is minted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackTarget {
    Live { login: String },
    Vod { id: String },
}

impl PlaybackTarget {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }
}

/// Short-lived signed token authorising one manifest fetch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlaybackGrant {
    pub signature: String,
    #[serde(rename = "value")]
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaybackTokenData {
    stream_playback_access_token: Option<PlaybackGrant>,
    video_playback_access_token: Option<PlaybackGrant>,
}

#[derive(Debug, Deserialize)]
struct GqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GqlError>,
}

pub(crate) fn build_persisted_query(operation_name: &str, sha256_hash: &str, variables: Value) -> Value {
    json!({
        "operationName": operation_name,
        "extensions": {
            "persistedQuery": {
                "version": 1,
                "sha256Hash": sha256_hash,
            }
        },
        "variables": variables,
    })
}

pub(crate) fn playback_token_query(target: &PlaybackTarget) -> Value {
    let (login, vod_id) = match target {
        PlaybackTarget::Live { login } => (login.as_str(), ""),
        PlaybackTarget::Vod { id } => ("", id.as_str()),
    };
    build_persisted_query(
        PLAYBACK_ACCESS_TOKEN_OPERATION,
        PLAYBACK_ACCESS_TOKEN_HASH,
        json!({
            "isLive": target.is_live(),
            "login": login,
            "isVod": !target.is_live(),
            "vodID": vod_id,
            "playerType": PLAYER_TYPE,
        }),
    )
}

fn device_id() -> String {
    // 16 random digits
    rand::rng()
        .random_range(1_000_000_000_000_000u64..10_000_000_000_000_000u64)
        .to_string()
}

/// Mints a fresh [`PlaybackGrant`]; grants are never cached.
pub async fn fetch_playback_grant(
    executor: &ApiExecutor,
    target: &PlaybackTarget,
) -> Result<PlaybackGrant> {
    let call = ApiCall::new(Method::POST, &ApiBase::TWITCH_GQL, "gql")
        .header("Device-ID", device_id())
        .json(playback_token_query(target));
    let response: GqlResponse<PlaybackTokenData> = executor.execute_call(&call).await?;

    if !response.errors.is_empty() {
        let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(ResolverError::Api(format!(
            "playback token query failed: {}",
            messages.join("; ")
        )));
    }

    let data = response
        .data
        .ok_or_else(|| ResolverError::Api("playback token response has no data".to_string()))?;
    let grant = data
        .stream_playback_access_token
        .or(data.video_playback_access_token)
        .ok_or_else(|| ResolverError::Api(format!("no playback token issued for {target:?}")))?;
    debug!(live = target.is_live(), "Obtained playback grant");
    Ok(grant)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::credentials::testing::CountingRefresher;
    use crate::credentials::{CredentialSet, Credentials, MemoryCredentialStore};
    use crate::http::stub::StubTransport;
    use crate::platform::Platform;

    fn executor(transport: Arc<StubTransport>) -> ApiExecutor {
        let credentials = Credentials::new(
            Platform::Twitch,
            CredentialSet {
                web_client_id: Some("web-client".into()),
                ..CredentialSet::new("app-client")
            },
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(CountingRefresher::default()),
        );
        ApiExecutor::new(transport, Arc::new(credentials))
    }

    #[test]
    fn query_shape_for_vod() {
        let query = playback_token_query(&PlaybackTarget::Vod { id: "123".into() });
        assert_eq!(query["operationName"], "PlaybackAccessToken");
        assert_eq!(query["extensions"]["persistedQuery"]["version"], 1);
        assert_eq!(
            query["extensions"]["persistedQuery"]["sha256Hash"],
            PLAYBACK_ACCESS_TOKEN_HASH
        );
        assert_eq!(query["variables"]["isLive"], false);
        assert_eq!(query["variables"]["isVod"], true);
        assert_eq!(query["variables"]["vodID"], "123");
    }

    #[tokio::test]
    async fn unwraps_stream_grant() {
        let transport = StubTransport::new();
        transport.respond(
            "gql.twitch.tv/gql",
            200,
            r#"{"data":{"streamPlaybackAccessToken":{"value":"{\"channel\":\"x\"}","signature":"abc"}}}"#,
        );
        let grant = fetch_playback_grant(
            &executor(transport.clone()),
            &PlaybackTarget::Live { login: "x".into() },
        )
        .await
        .unwrap();
        assert_eq!(grant.signature, "abc");
        assert_eq!(grant.token, r#"{"channel":"x"}"#);

        let request = &transport.requests()[0];
        assert_eq!(request.header_value("client-id"), Some("web-client"));
        assert_eq!(request.header_value("authorization"), None);
        assert_eq!(request.header_value("device-id").map(str::len), Some(16));
    }

    #[tokio::test]
    async fn unwraps_video_grant() {
        let transport = StubTransport::new();
        transport.respond(
            "gql.twitch.tv/gql",
            200,
            r#"{"data":{"videoPlaybackAccessToken":{"value":"v","signature":"s"}}}"#,
        );
        let grant = fetch_playback_grant(&executor(transport), &PlaybackTarget::Vod { id: "1".into() })
            .await
            .unwrap();
        assert_eq!(grant, PlaybackGrant { signature: "s".into(), token: "v".into() });
    }

    #[tokio::test]
    async fn gql_errors_surface_as_api_errors() {
        let transport = StubTransport::new();
        transport.respond(
            "gql.twitch.tv/gql",
            200,
            r#"{"errors":[{"message":"PersistedQueryNotFound"}]}"#,
        );
        let err = fetch_playback_grant(&executor(transport), &PlaybackTarget::Vod { id: "1".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::Api(msg) if msg.contains("PersistedQueryNotFound")));
    }
}
