//! Wires transports, credentials and platform clients into one handle.

use std::sync::Arc;

use tracing::info;

use crate::config::{PlatformSecrets, ResolverConfig};
use crate::credentials::{CredentialSet, CredentialStore, Credentials};
use crate::error::Result;
use crate::http::{ApiExecutor, HttpTransport, ReqwestTransport};
use crate::oauth::{DeviceFlowOrchestrator, IdentityProvider};
use crate::platform::{Channel, LiveStatus, Platform};
use crate::platforms::twitch::{TwitchApi, TwitchAuth};
use crate::platforms::youtube::{ExtractionService, GoogleAuth, PageScraper, YoutubeApi};
use crate::resolver::VideoResolver;

/// Credential stores, one per platform.
#[derive(Clone)]
pub struct CredentialStores {
    pub twitch: Arc<dyn CredentialStore>,
    pub youtube: Arc<dyn CredentialStore>,
}

/// Every service handle of both platforms, sharing one transport.
#[derive(Clone)]
pub struct PlatformClients {
    pub twitch: TwitchApi,
    pub youtube: YoutubeApi,
    pub resolver: VideoResolver,
    twitch_auth: Arc<TwitchAuth>,
    google_auth: Arc<GoogleAuth>,
}

impl PlatformClients {
    /// Builds clients over the reqwest transport.
    pub async fn connect(
        config: &ResolverConfig,
        secrets: &PlatformSecrets,
        stores: CredentialStores,
    ) -> Result<Self> {
        config.validate()?;
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(config)?);
        Self::with_transport(transport, config, secrets, stores).await
    }

    pub async fn with_transport(
        transport: Arc<dyn HttpTransport>,
        config: &ResolverConfig,
        secrets: &PlatformSecrets,
        stores: CredentialStores,
    ) -> Result<Self> {
        let twitch_seed = CredentialSet::from(&secrets.twitch);
        let twitch_auth = Arc::new(TwitchAuth::new(transport.clone(), &twitch_seed));
        let twitch_credentials = Arc::new(
            Credentials::load(Platform::Twitch, twitch_seed, stores.twitch, twitch_auth.clone())
                .await?,
        );

        let google_seed = CredentialSet::from(&secrets.youtube);
        let google_auth = Arc::new(GoogleAuth::new(transport.clone(), &google_seed));
        let google_credentials = Arc::new(
            Credentials::load(Platform::Youtube, google_seed, stores.youtube, google_auth.clone())
                .await?,
        );

        let twitch = TwitchApi::new(ApiExecutor::new(transport.clone(), twitch_credentials));
        let youtube = YoutubeApi::new(ApiExecutor::new(transport.clone(), google_credentials));
        let resolver = VideoResolver::new(
            twitch.clone(),
            PageScraper::new(transport.clone(), config.user_agent.clone()),
            ExtractionService::new(
                transport,
                config.extraction_service_url.clone(),
                config.extraction_timeout(),
            ),
            config.retry_policy(),
        );
        info!("Platform clients ready");

        Ok(Self {
            twitch,
            youtube,
            resolver,
            twitch_auth,
            google_auth,
        })
    }

    pub fn credentials(&self, platform: Platform) -> &Arc<Credentials> {
        match platform {
            Platform::Twitch => self.twitch.executor().credentials(),
            Platform::Youtube => self.youtube.executor().credentials(),
        }
    }

    /// Device-flow sign-in for `platform`.
    pub fn sign_in_flow(&self, platform: Platform) -> DeviceFlowOrchestrator {
        let credentials = self.credentials(platform).clone();
        match platform {
            Platform::Twitch => DeviceFlowOrchestrator::new(
                self.twitch_auth.clone(),
                Arc::new(self.twitch.clone()),
                credentials,
            ),
            Platform::Youtube => DeviceFlowOrchestrator::new(
                self.google_auth.clone(),
                Arc::new(self.youtube.clone()),
                credentials,
            ),
        }
    }

    /// Followed (Twitch) or subscribed (YouTube) channels of the signed-in
    /// account.
    pub async fn followed_channels(&self, platform: Platform) -> Result<Vec<Channel>> {
        match platform {
            Platform::Twitch => {
                let me = self.twitch.current_user().await?;
                self.twitch.followed_channels(&me.id).await
            }
            Platform::Youtube => self.youtube.subscriptions().await,
        }
    }

    pub async fn live_statuses(
        &self,
        platform: Platform,
        channels: &[Channel],
    ) -> Result<Vec<LiveStatus>> {
        match platform {
            Platform::Twitch => self.twitch.live_statuses(channels).await,
            Platform::Youtube => self.youtube.live_statuses(channels).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{ACCESS_TOKEN_KEY, MemoryCredentialStore};
    use crate::http::stub::StubTransport;

    fn stores() -> CredentialStores {
        CredentialStores {
            twitch: Arc::new(MemoryCredentialStore::with_values([(ACCESS_TOKEN_KEY, "stored")])),
            youtube: Arc::new(MemoryCredentialStore::new()),
        }
    }

    #[tokio::test]
    async fn loads_stored_tokens_per_platform() {
        let clients = PlatformClients::with_transport(
            StubTransport::new(),
            &ResolverConfig::default(),
            &PlatformSecrets::default(),
            stores(),
        )
        .await
        .unwrap();
        assert_eq!(
            clients.credentials(Platform::Twitch).access_token().as_deref(),
            Some("stored")
        );
        assert!(!clients.credentials(Platform::Youtube).has_access_token());
    }

    #[tokio::test]
    async fn twitch_follows_use_current_user_id() {
        let transport = StubTransport::new();
        transport.respond(
            "/helix/users",
            200,
            r#"{"data":[{"id":"77","login":"me","display_name":"Me"}]}"#,
        );
        transport.respond(
            "/helix/channels/followed?user_id=77",
            200,
            r#"{"data":[{"broadcaster_id":"1","broadcaster_login":"a","broadcaster_name":"A"}]}"#,
        );
        let clients = PlatformClients::with_transport(
            transport,
            &ResolverConfig::default(),
            &PlatformSecrets::default(),
            stores(),
        )
        .await
        .unwrap();
        let channels = clients.followed_channels(Platform::Twitch).await.unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].login, "a");
    }
}
