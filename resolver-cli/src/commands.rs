use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use platforms_resolver::{
    CredentialStores, OAuthSession, Platform, PlatformClients, QualityPreference, SignInOutcome,
    VideoRef,
};
use tracing::{info, warn};

use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::output::{OutputManager, write_output};
use crate::store::JsonFileStore;

pub struct CommandExecutor {
    clients: PlatformClients,
    output: OutputManager,
}

impl CommandExecutor {
    pub async fn new(config: &AppConfig, colored: bool) -> Result<Self> {
        let dir = config.credentials_dir();
        let stores = CredentialStores {
            twitch: Arc::new(JsonFileStore::open(&dir, Platform::Twitch)?),
            youtube: Arc::new(JsonFileStore::open(&dir, Platform::Youtube)?),
        };
        let clients = PlatformClients::connect(&config.resolver, &config.secrets, stores)
            .await
            .context("initialising platform clients")?;
        Ok(Self {
            clients,
            output: OutputManager::new(colored),
        })
    }

    pub async fn resolve(
        &self,
        url: &str,
        quality: &str,
        url_only: bool,
        format: OutputFormat,
        output_file: Option<&Path>,
    ) -> Result<()> {
        let reference = VideoRef::from_url(url)?;
        info!(%reference, "Resolving");
        let result = self
            .clients
            .resolver
            .resolve(&reference)
            .await
            .with_context(|| format!("resolving {url}"))?;

        let preference = QualityPreference::parse(quality);
        let selected = result.preferred_url(&preference);
        let content = if url_only {
            match selected {
                Some(url) => format!("{url}\n"),
                None => bail!("no playable URL in {} result", result.kind()),
            }
        } else {
            self.output.format_resolution(&result, selected, format)?
        };
        write_output(&content, output_file)
    }

    pub async fn login(&self, platform: Platform) -> Result<()> {
        let flow = self.clients.sign_in_flow(platform);
        let handle = flow.authenticate(print_session, |_| {});
        let cancel = handle.cancellation_token();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; cancelling sign-in");
                cancel.cancel();
            }
        });

        let outcome = handle.join().await;
        interrupt.abort();

        match outcome {
            SignInOutcome::Authorized(identity) => {
                println!("Signed in to {platform} as {}", identity.display_name);
                Ok(())
            }
            SignInOutcome::Denied => bail!("authorization was denied"),
            SignInOutcome::Expired => bail!("the code expired before it was entered"),
            SignInOutcome::Cancelled => bail!("sign-in cancelled"),
            SignInOutcome::Failed(reason) => bail!("sign-in failed: {reason}"),
        }
    }

    pub async fn live(&self, platform: Platform, all: bool, format: OutputFormat) -> Result<()> {
        let credentials = self.clients.credentials(platform);
        if !credentials.has_access_token() && !credentials.has_refresh_token() {
            bail!("not signed in to {platform}; run `vresolve login {platform}` first");
        }

        let channels = self.clients.followed_channels(platform).await?;
        let mut statuses = self.clients.live_statuses(platform, &channels).await?;
        if !all {
            statuses.retain(|status| status.is_live);
        }
        statuses.sort_by(|a, b| {
            b.is_live
                .cmp(&a.is_live)
                .then_with(|| a.channel.display_name.cmp(&b.channel.display_name))
        });
        write_output(&self.output.format_live(&statuses, format)?, None)
    }

    pub async fn logout(&self, platform: Platform) -> Result<()> {
        self.clients.sign_in_flow(platform).sign_out().await?;
        println!("Signed out of {platform}");
        Ok(())
    }
}

fn print_session(session: &OAuthSession) {
    println!(
        "Open {} and enter the code {}",
        session.verification_url, session.user_code
    );
    println!(
        "Waiting for authorization (code valid for {}s)...",
        session.expires_in.as_secs()
    );
}
