use std::collections::HashMap;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{ResolverError, Result};
use crate::http::{ApiBase, ApiExecutor, HelixPage, QueryParams};
use crate::oauth::IdentityProvider;
use crate::platform::{Channel, LiveStatus, Platform, UserIdentity};

/// Helix accepts at most this many ids per lookup.
const HELIX_MAX_IDS: usize = 100;

#[derive(Debug, Clone, Deserialize)]
struct HelixUser {
    id: String,
    login: String,
    display_name: String,
    #[serde(default)]
    profile_image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct HelixFollow {
    broadcaster_id: String,
    broadcaster_login: String,
    broadcaster_name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct HelixStream {
    user_id: String,
    #[serde(rename = "type", default)]
    stream_type: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    viewer_count: Option<u64>,
}

/// Twitch Helix API client.
#[derive(Debug, Clone)]
pub struct TwitchApi {
    executor: ApiExecutor,
}

impl TwitchApi {
    pub fn new(executor: ApiExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &ApiExecutor {
        &self.executor
    }

    /// Maps a numeric user id to the channel's login name.
    #[instrument(skip(self))]
    pub async fn login_for_id(&self, user_id: &str) -> Result<String> {
        let query = QueryParams::new().with("id", user_id);
        let page: HelixPage<HelixUser> = self
            .executor
            .execute(Method::GET, &ApiBase::TWITCH_HELIX, "users", &query)
            .await?;
        page.data
            .into_iter()
            .next()
            .map(|user| user.login)
            .ok_or_else(|| ResolverError::Api(format!("no twitch user with id {user_id}")))
    }

    pub async fn followed_channels(&self, user_id: &str) -> Result<Vec<Channel>> {
        let query = QueryParams::new().with("user_id", user_id).with("first", 100);
        let follows = self
            .executor
            .execute_fetch_all::<HelixPage<HelixFollow>>(
                &ApiBase::TWITCH_HELIX,
                "channels/followed",
                &query,
            )
            .await?;
        Ok(follows
            .into_iter()
            .map(|follow| Channel {
                platform: Platform::Twitch,
                id: follow.broadcaster_id,
                login: follow.broadcaster_login,
                display_name: follow.broadcaster_name,
                avatar_url: None,
            })
            .collect())
    }

    /// Liveness of every channel, one Helix `streams` call per batch of ids,
    /// all batches in flight at once.
    #[instrument(skip_all, fields(channels = channels.len()))]
    pub async fn live_statuses(&self, channels: &[Channel]) -> Result<Vec<LiveStatus>> {
        let batches = channels.chunks(HELIX_MAX_IDS).map(|batch| {
            let query = QueryParams::new()
                .with_all("user_id", batch.iter().map(|c| c.id.as_str()))
                .with("first", HELIX_MAX_IDS);
            async move {
                self.executor
                    .execute::<HelixPage<HelixStream>>(
                        Method::GET,
                        &ApiBase::TWITCH_HELIX,
                        "streams",
                        &query,
                    )
                    .await
            }
        });

        let mut live: HashMap<String, HelixStream> = HashMap::new();
        for page in join_all(batches).await {
            for stream in page?.data {
                if stream.stream_type == "live" {
                    live.insert(stream.user_id.clone(), stream);
                }
            }
        }
        debug!(live = live.len(), "Checked Twitch liveness");

        Ok(channels
            .iter()
            .map(|channel| {
                let stream = live.remove(&channel.id);
                LiveStatus {
                    channel: channel.clone(),
                    is_live: stream.is_some(),
                    title: stream.as_ref().and_then(|s| s.title.clone()),
                    viewer_count: stream.and_then(|s| s.viewer_count),
                }
            })
            .collect())
    }
}

#[async_trait]
impl IdentityProvider for TwitchApi {
    /// Without parameters Helix `users` describes the token's owner.
    async fn current_user(&self) -> Result<UserIdentity> {
        let page: HelixPage<HelixUser> = self
            .executor
            .execute(Method::GET, &ApiBase::TWITCH_HELIX, "users", &QueryParams::new())
            .await?;
        let user = page
            .data
            .into_iter()
            .next()
            .ok_or(ResolverError::MissingCredentials(Platform::Twitch))?;
        Ok(UserIdentity {
            platform: Platform::Twitch,
            id: user.id,
            login: user.login,
            display_name: user.display_name,
            avatar_url: user.profile_image_url,
        })
    }
}
