//! Watch-page scraping: the embedded `ytInitialPlayerResponse` object.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ResolverError, Result};
use crate::http::{HttpRequest, HttpTransport};
use crate::playlist::parse_manifest;
use crate::resolver::{ResolutionResult, StructuredFormat};
use crate::utils::{capture_group_1_or_scrape_error, decode_json};

const WATCH_BASE: &str = "https://www.youtube.com";

// The two page types close the object differently.
static LIVE_PLAYER_RESPONSE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)var ytInitialPlayerResponse\s*=\s*(\{.+?\});\s*</script>").unwrap()
});
static VOD_PLAYER_RESPONSE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)ytInitialPlayerResponse\s*=\s*(\{.+?\});\s*var meta").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Live,
    Vod,
}

impl PageKind {
    fn regex(&self) -> &'static Regex {
        match self {
            PageKind::Live => &LIVE_PLAYER_RESPONSE_REGEX,
            PageKind::Vod => &VOD_PLAYER_RESPONSE_REGEX,
        }
    }
}

pub fn live_watch_url(channel_id: &str) -> String {
    format!("{WATCH_BASE}/channel/{channel_id}/live")
}

pub fn vod_watch_url(video_id: &str) -> String {
    format!("{WATCH_BASE}/watch?v={video_id}")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResponse {
    #[serde(default)]
    pub playability_status: Option<PlayabilityStatus>,
    #[serde(default)]
    pub streaming_data: Option<StreamingData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayabilityStatus {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingData {
    #[serde(default)]
    pub hls_manifest_url: Option<String>,
    #[serde(default)]
    pub formats: Vec<PlayerFormat>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerFormat {
    pub itag: u32,
    /// Absent for ciphered formats.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub quality_label: Option<String>,
}

impl PlayerResponse {
    fn ensure_playable(&self) -> Result<()> {
        match &self.playability_status {
            Some(status) if status.status != "OK" => Err(ResolverError::Scrape(format!(
                "video not playable ({}): {}",
                status.status,
                status.reason.as_deref().unwrap_or("no reason given")
            ))),
            _ => Ok(()),
        }
    }

    fn hls_manifest_url(&self) -> Option<&str> {
        self.streaming_data
            .as_ref()
            .and_then(|data| data.hls_manifest_url.as_deref())
    }

    /// Progressive formats that can be played without deciphering.
    pub fn direct_formats(&self) -> Vec<StructuredFormat> {
        self.streaming_data
            .iter()
            .flat_map(|data| data.formats.iter())
            .filter_map(|format| {
                Some(StructuredFormat {
                    url: format.url.clone()?,
                    quality_label: format.quality_label.clone()?,
                    itag: format.itag,
                })
            })
            .collect()
    }
}

/// Extracts and decodes the player response embedded in `html`.
pub fn extract_player_response(html: &str, kind: PageKind) -> Result<PlayerResponse> {
    let json = capture_group_1_or_scrape_error(kind.regex(), html, "ytInitialPlayerResponse")?;
    decode_json(json.as_bytes(), "ytInitialPlayerResponse")
}

/// Page-scrape tiers of YouTube resolution.
#[derive(Clone)]
pub struct PageScraper {
    transport: std::sync::Arc<dyn HttpTransport>,
    user_agent: String,
}

impl PageScraper {
    pub fn new(transport: std::sync::Arc<dyn HttpTransport>, user_agent: impl Into<String>) -> Self {
        Self {
            transport,
            user_agent: user_agent.into(),
        }
    }

    async fn player_response(&self, url: &str, kind: PageKind) -> Result<PlayerResponse> {
        let request = HttpRequest::get(url)
            .header("User-Agent", self.user_agent.as_str())
            .header("Accept-Language", "en-US,en;q=0.9");
        let page = self.transport.send(request).await?.error_for_status()?;
        let html = String::from_utf8_lossy(&page.body);
        let response = extract_player_response(&html, kind)?;
        response.ensure_playable()?;
        Ok(response)
    }

    async fn fetch_hls(&self, manifest_url: &str) -> Result<ResolutionResult> {
        let response = self
            .transport
            .send(HttpRequest::get(manifest_url))
            .await?
            .error_for_status()?;
        Ok(ResolutionResult::Manifest(parse_manifest(&response.body)?))
    }

    /// Live watch page, then the HLS manifest it references.
    pub async fn resolve_live(&self, channel_id: &str) -> Result<ResolutionResult> {
        let response = self
            .player_response(&live_watch_url(channel_id), PageKind::Live)
            .await?;
        let manifest_url = response
            .hls_manifest_url()
            .ok_or_else(|| ResolverError::Scrape("live page has no hls manifest".to_string()))?;
        debug!(channel_id, "Found live HLS manifest");
        self.fetch_hls(manifest_url).await
    }

    /// VOD watch page: direct progressive formats, else the HLS manifest.
    pub async fn resolve_vod(&self, video_id: &str) -> Result<ResolutionResult> {
        let response = self
            .player_response(&vod_watch_url(video_id), PageKind::Vod)
            .await?;
        let formats = response.direct_formats();
        if !formats.is_empty() {
            debug!(video_id, count = formats.len(), "Found direct formats");
            return Ok(ResolutionResult::StructuredFormats(formats));
        }
        match response.hls_manifest_url() {
            Some(url) => self.fetch_hls(url).await,
            None => Err(ResolverError::Scrape(
                "video page has no playable formats".to_string(),
            )),
        }
    }
}
