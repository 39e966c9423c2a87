//! Signed manifest URLs on Twitch's usher service.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::RngExt;

use super::gql::{PlaybackGrant, PlaybackTarget};
use crate::http::QueryParams;

const USHER_BASE: &str = "https://usher.ttvnw.net";
const PLAYER: &str = "twitchweb";

/// Everything except ASCII alphanumerics, `.` and `_` is escaped.
const TOKEN_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'_');

pub fn manifest_base(target: &PlaybackTarget) -> String {
    match target {
        PlaybackTarget::Live { login } => {
            format!("{USHER_BASE}/api/channel/hls/{}.m3u8", login.to_lowercase())
        }
        PlaybackTarget::Vod { id } => format!("{USHER_BASE}/vod/{id}.m3u8"),
    }
}

/// Builds the signed manifest URL. The token is appended verbatim after its
/// own encoding pass, outside the regular query serialisation.
pub fn manifest_url(target: &PlaybackTarget, grant: &PlaybackGrant) -> String {
    let nonce: u32 = rand::rng().random_range(0..10_000_000);
    let query = QueryParams::new()
        .with("player", PLAYER)
        .with("p", nonce)
        .with("allow_source", true)
        .with("allow_audio_only", true)
        .with("allow_spectre", false)
        .with("fast_bread", true)
        .with("sig", &grant.signature);
    format!(
        "{}&token={}",
        query.append_to(&manifest_base(target)),
        encode_token(&grant.token)
    )
}

pub fn encode_token(token: &str) -> String {
    let stripped = token.replace('\\', "");
    utf8_percent_encode(&stripped, TOKEN_ENCODE_SET).to_string()
}
