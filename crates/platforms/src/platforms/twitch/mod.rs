//! Twitch: Helix API, OAuth, and the private playback-token exchange.

mod api;
mod auth;
mod gql;
mod usher;

pub use api::TwitchApi;
pub use auth::{DEFAULT_SCOPES, TwitchAuth};
pub use gql::{PlaybackGrant, PlaybackTarget, fetch_playback_grant};
pub use usher::{encode_token, manifest_base, manifest_url};

use tracing::debug;

use crate::error::Result;
use crate::http::{ApiExecutor, HttpRequest};
use crate::playlist::{Manifest, parse_manifest};

/// Client id of Twitch's own web player, required by the GQL endpoint.
pub const WEB_CLIENT_ID: &str = "kimne78kx3ncx6brgo4mv6wki5h1ko";

/// Mints a grant, fetches the signed master playlist and parses it.
pub async fn fetch_manifest(executor: &ApiExecutor, target: &PlaybackTarget) -> Result<Manifest> {
    let grant = fetch_playback_grant(executor, target).await?;
    let url = manifest_url(target, &grant);
    debug!(base = %manifest_base(target), "Fetching signed manifest");

    let response = executor
        .transport()
        .send(HttpRequest::get(url))
        .await?
        .error_for_status()?;
    parse_manifest(&response.body)
}
