use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::error::{ResolverError, Result};
use crate::http::{ApiBase, ApiExecutor, GoogleListPage, QueryParams};
use crate::oauth::IdentityProvider;
use crate::platform::{Channel, LiveStatus, Platform, UserIdentity};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Person {
    resource_name: String,
    #[serde(default)]
    names: Vec<PersonName>,
    #[serde(default)]
    photos: Vec<PersonPhoto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersonName {
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct PersonPhoto {
    url: String,
}

#[derive(Debug, Deserialize)]
struct Subscription {
    snippet: SubscriptionSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionSnippet {
    title: String,
    resource_id: ResourceId,
    #[serde(default)]
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    channel_id: String,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    #[serde(default)]
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    snippet: SearchSnippet,
}

#[derive(Debug, Deserialize)]
struct SearchSnippet {
    title: String,
}

/// YouTube Data API and People API client.
#[derive(Debug, Clone)]
pub struct YoutubeApi {
    executor: ApiExecutor,
}

impl YoutubeApi {
    pub fn new(executor: ApiExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &ApiExecutor {
        &self.executor
    }

    /// Channels the signed-in account subscribes to.
    pub async fn subscriptions(&self) -> Result<Vec<Channel>> {
        let query = QueryParams::new()
            .with("part", "snippet")
            .with("mine", true)
            .with("maxResults", 50);
        let subscriptions = self
            .executor
            .execute_fetch_all::<GoogleListPage<Subscription>>(
                &ApiBase::YOUTUBE_DATA,
                "subscriptions",
                &query,
            )
            .await?;
        Ok(subscriptions
            .into_iter()
            .map(|s| {
                let snippet = s.snippet;
                Channel {
                    platform: Platform::Youtube,
                    login: snippet.resource_id.channel_id.clone(),
                    id: snippet.resource_id.channel_id,
                    display_name: snippet.title,
                    avatar_url: snippet.thumbnails.and_then(|t| t.default).map(|t| t.url),
                }
            })
            .collect())
    }

    /// Current live broadcast of one channel, if any.
    pub async fn live_status(&self, channel: &Channel) -> Result<LiveStatus> {
        let query = QueryParams::new()
            .with("part", "snippet")
            .with("channelId", &channel.id)
            .with("eventType", "live")
            .with("type", "video")
            .with("maxResults", 1);
        let page: GoogleListPage<SearchResult> = self
            .executor
            .execute(Method::GET, &ApiBase::YOUTUBE_DATA, "search", &query)
            .await?;
        let broadcast = page.items.into_iter().next();
        Ok(LiveStatus {
            channel: channel.clone(),
            is_live: broadcast.is_some(),
            title: broadcast.map(|b| b.snippet.title),
            viewer_count: None,
        })
    }

    /// One search per channel, all in flight at once. Channels whose lookup
    /// fails are reported offline unless the failure is an auth failure.
    #[instrument(skip_all, fields(channels = channels.len()))]
    pub async fn live_statuses(&self, channels: &[Channel]) -> Result<Vec<LiveStatus>> {
        let results = join_all(channels.iter().map(|c| self.live_status(c))).await;

        let mut statuses = Vec::with_capacity(channels.len());
        for (channel, result) in channels.iter().zip(results) {
            match result {
                Ok(status) => statuses.push(status),
                Err(e) if e.is_auth_failure() => return Err(e),
                Err(e) => {
                    warn!(channel = %channel.id, error = %e, "Live lookup failed");
                    statuses.push(LiveStatus {
                        channel: channel.clone(),
                        is_live: false,
                        title: None,
                        viewer_count: None,
                    });
                }
            }
        }
        debug!(live = statuses.iter().filter(|s| s.is_live).count(), "Checked YouTube liveness");
        Ok(statuses)
    }
}

#[async_trait]
impl IdentityProvider for YoutubeApi {
    async fn current_user(&self) -> Result<UserIdentity> {
        let query = QueryParams::new().with("personFields", "names,photos");
        let person: Person = self
            .executor
            .execute(Method::GET, &ApiBase::GOOGLE_PEOPLE, "people/me", &query)
            .await?;
        let id = person
            .resource_name
            .strip_prefix("people/")
            .unwrap_or(&person.resource_name)
            .to_string();
        let display_name = person
            .names
            .into_iter()
            .next()
            .map(|n| n.display_name)
            .ok_or_else(|| ResolverError::Api("google profile has no name".to_string()))?;
        Ok(UserIdentity {
            platform: Platform::Youtube,
            login: display_name.clone(),
            id,
            display_name,
            avatar_url: person.photos.into_iter().next().map(|p| p.url),
        })
    }
}
