//! Turns a [`VideoRef`] into playable media.
//!
//! Twitch goes through the playback-token exchange and the signed usher
//! manifest, retried as a whole. YouTube runs two tiers, page scrape and the
//! extraction service, in an order that depends on whether the reference is
//! live or recorded. Only the last tier's error reaches the caller.

mod result;

pub use result::{ExtractorFormat, ResolutionResult, StructuredFormat};

use std::future::Future;

use tracing::{Instrument, debug, info_span, warn};

use crate::error::Result;
use crate::platform::{Platform, VideoRef};
use crate::platforms::twitch::{self, PlaybackTarget, TwitchApi};
use crate::platforms::youtube::{ExtractionService, PageScraper, live_watch_url, vod_watch_url};
use crate::retry::{RetryPolicy, retry};

#[derive(Clone)]
pub struct VideoResolver {
    twitch: TwitchApi,
    scraper: PageScraper,
    extraction: ExtractionService,
    retry_policy: RetryPolicy,
}

impl VideoResolver {
    pub fn new(
        twitch: TwitchApi,
        scraper: PageScraper,
        extraction: ExtractionService,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            twitch,
            scraper,
            extraction,
            retry_policy,
        }
    }

    pub async fn resolve(&self, reference: &VideoRef) -> Result<ResolutionResult> {
        let span = info_span!(
            "resolve",
            platform = %reference.platform(),
            kind = if reference.is_live() { "live" } else { "vod" },
            id = reference.id(),
        );
        async {
            let result = match (reference.platform(), reference) {
                (Platform::Twitch, VideoRef::Live { external_id, .. }) => {
                    self.resolve_twitch_live(external_id).await
                }
                (Platform::Twitch, VideoRef::Vod { video_id, .. }) => {
                    let target = PlaybackTarget::Vod {
                        id: video_id.clone(),
                    };
                    self.resolve_twitch(&target).await
                }
                (Platform::Youtube, VideoRef::Live { external_id, .. }) => {
                    run_tiers(
                        ("page scrape", self.scraper.resolve_live(external_id)),
                        ("extraction service", async {
                            self.extraction.extract(&live_watch_url(external_id)).await
                        }),
                    )
                    .await
                }
                (Platform::Youtube, VideoRef::Vod { video_id, .. }) => {
                    run_tiers(
                        ("extraction service", async {
                            self.extraction.extract(&vod_watch_url(video_id)).await
                        }),
                        ("page scrape", self.scraper.resolve_vod(video_id)),
                    )
                    .await
                }
            };
            if let Ok(result) = &result {
                debug!(kind = result.kind(), "Resolved");
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn resolve_twitch_live(&self, external_id: &str) -> Result<ResolutionResult> {
        // Numeric ids need a Helix lookup; anything else already is a login.
        let login = if external_id.chars().all(|c| c.is_ascii_digit()) {
            self.twitch.login_for_id(external_id).await?
        } else {
            external_id.to_lowercase()
        };
        self.resolve_twitch(&PlaybackTarget::Live { login }).await
    }

    async fn resolve_twitch(&self, target: &PlaybackTarget) -> Result<ResolutionResult> {
        let manifest = retry(&self.retry_policy, |attempt| async move {
            let result = twitch::fetch_manifest(self.twitch.executor(), target).await;
            if let Err(e) = &result {
                if attempt.is_last {
                    warn!(error = %e, "Twitch manifest fetch failed on final attempt");
                } else {
                    debug!(attempt = attempt.number, error = %e, "Twitch manifest fetch failed");
                }
            }
            result
        })
        .await?;
        Ok(ResolutionResult::Manifest(manifest))
    }
}

/// Runs `first`, falling back to `second` on any error.
async fn run_tiers<F, S>(first: (&str, F), second: (&str, S)) -> Result<ResolutionResult>
where
    F: Future<Output = Result<ResolutionResult>>,
    S: Future<Output = Result<ResolutionResult>>,
{
    let (first_name, first) = first;
    let (second_name, second) = second;
    match first.await {
        Ok(result) => Ok(result),
        Err(e) => {
            warn!(tier = first_name, fallback = second_name, error = %e, "Resolution tier failed");
            second.await
        }
    }
}
