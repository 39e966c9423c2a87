//! Platform-bound value types and public URL parsing.
//!
//! Every value that belongs to a streaming platform carries an explicit
//! [`Platform`] discriminant. Channels and videos compare, hash and sort by
//! `(platform, id)` so lists mixing both platforms behave consistently.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ResolverError, Result};
use crate::utils::capture_group_1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitch,
    Youtube,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitch => "twitch",
            Platform::Youtube => "youtube",
        }
    }
}

impl FromStr for Platform {
    type Err = ResolverError;

    fn from_str(platform: &str) -> Result<Self> {
        match platform.to_lowercase().as_str() {
            "twitch" => Ok(Platform::Twitch),
            "youtube" | "yt" => Ok(Platform::Youtube),
            _ => Err(ResolverError::Validation(format!(
                "unknown platform `{platform}`"
            ))),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller wants played.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum VideoRef {
    /// A channel's current broadcast. For Twitch the id is the numeric user
    /// id or the login; for YouTube it is the channel id.
    Live {
        platform: Platform,
        external_id: String,
    },
    /// A recorded video.
    Vod { platform: Platform, video_id: String },
}

impl VideoRef {
    pub fn live(platform: Platform, external_id: impl Into<String>) -> Self {
        Self::Live {
            platform,
            external_id: external_id.into(),
        }
    }

    pub fn vod(platform: Platform, video_id: impl Into<String>) -> Self {
        Self::Vod {
            platform,
            video_id: video_id.into(),
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            Self::Live { platform, .. } | Self::Vod { platform, .. } => *platform,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Live { external_id, .. } => external_id,
            Self::Vod { video_id, .. } => video_id,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }

    /// Parse a public platform URL.
    pub fn from_url(url: &str) -> Result<Self> {
        for entry in REFERENCE_PATTERNS {
            if let Some(id) = capture_group_1(entry.regex, url) {
                return Ok((entry.constructor)(id));
            }
        }
        Err(ResolverError::InvalidReference(url.to_string()))
    }
}

impl fmt::Display for VideoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_live() { "live" } else { "vod" };
        write!(f, "{}:{}:{}", self.platform(), kind, self.id())
    }
}

type RefConstructor = fn(&str) -> VideoRef;

struct ReferencePattern {
    regex: &'static LazyLock<Regex>,
    constructor: RefConstructor,
}

static TWITCH_VOD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.|m\.)?twitch\.tv/videos/(\d+)").expect("valid regex")
});
static TWITCH_CHANNEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.|m\.)?twitch\.tv/([a-zA-Z0-9_]+)/?(?:[?#].*)?$")
        .expect("valid regex")
});
static YOUTUBE_WATCH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.|m\.)?youtube\.com/watch\?(?:.*&)?v=([a-zA-Z0-9_-]{11})")
        .expect("valid regex")
});
static YOUTUBE_SHORT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://youtu\.be/([a-zA-Z0-9_-]{11})").expect("valid regex")
});
static YOUTUBE_CHANNEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.|m\.)?youtube\.com/channel/(UC[a-zA-Z0-9_-]{22})")
        .expect("valid regex")
});

macro_rules! reference_registry {
    ( $( $regex:path => $platform:expr, $ctor:path ),+ $(,)? ) => {
        &[
            $(
                ReferencePattern {
                    regex: &$regex,
                    constructor: |id| $ctor($platform, id),
                },
            )+
        ]
    };
}

// Order matters: `twitch.tv/videos/<id>` must win over `twitch.tv/<login>`.
static REFERENCE_PATTERNS: &[ReferencePattern] = reference_registry![
    TWITCH_VOD_REGEX => Platform::Twitch, VideoRef::vod,
    TWITCH_CHANNEL_REGEX => Platform::Twitch, VideoRef::live,
    YOUTUBE_WATCH_REGEX => Platform::Youtube, VideoRef::vod,
    YOUTUBE_SHORT_REGEX => Platform::Youtube, VideoRef::vod,
    YOUTUBE_CHANNEL_REGEX => Platform::Youtube, VideoRef::live,
];

/// A channel on either platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub platform: Platform,
    pub id: String,
    pub login: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl Channel {
    pub fn live_ref(&self) -> VideoRef {
        VideoRef::live(self.platform, self.id.clone())
    }
}

/// A recorded video on either platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub platform: Platform,
    pub id: String,
    pub channel_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
}

impl Video {
    pub fn vod_ref(&self) -> VideoRef {
        VideoRef::vod(self.platform, self.id.clone())
    }
}

/// Identity equality: two items are the same iff platform and id match.
macro_rules! impl_platform_identity {
    ( $( $ty:ty ),+ $(,)? ) => {
        $(
            impl PartialEq for $ty {
                fn eq(&self, other: &Self) -> bool {
                    self.platform == other.platform && self.id == other.id
                }
            }

            impl Eq for $ty {}

            impl Hash for $ty {
                fn hash<H: Hasher>(&self, state: &mut H) {
                    self.platform.hash(state);
                    self.id.hash(state);
                }
            }

            impl PartialOrd for $ty {
                fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                    Some(self.cmp(other))
                }
            }

            impl Ord for $ty {
                fn cmp(&self, other: &Self) -> Ordering {
                    (self.platform, &self.id).cmp(&(other.platform, &other.id))
                }
            }
        )+
    };
}

impl_platform_identity!(Channel, Video);

/// Liveness of one channel, as reported by the platform API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveStatus {
    pub channel: Channel,
    pub is_live: bool,
    pub title: Option<String>,
    pub viewer_count: Option<u64>,
}

/// The signed-in account of a platform client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub platform: Platform,
    pub id: String,
    pub login: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn channel(platform: Platform, id: &str, name: &str) -> Channel {
        Channel {
            platform,
            id: id.to_string(),
            login: name.to_lowercase(),
            display_name: name.to_string(),
            avatar_url: None,
        }
    }

    #[test]
    fn parses_twitch_urls() {
        assert_eq!(
            VideoRef::from_url("https://www.twitch.tv/videos/123456").unwrap(),
            VideoRef::vod(Platform::Twitch, "123456")
        );
        assert_eq!(
            VideoRef::from_url("https://twitch.tv/some_streamer").unwrap(),
            VideoRef::live(Platform::Twitch, "some_streamer")
        );
    }

    #[test]
    fn parses_youtube_urls() {
        assert_eq!(
            VideoRef::from_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=3").unwrap(),
            VideoRef::vod(Platform::Youtube, "dQw4w9WgXcQ")
        );
        assert_eq!(
            VideoRef::from_url("https://youtu.be/dQw4w9WgXcQ").unwrap(),
            VideoRef::vod(Platform::Youtube, "dQw4w9WgXcQ")
        );
        assert_eq!(
            VideoRef::from_url("https://www.youtube.com/channel/UCabcdefghijklmnopqrstuv/live")
                .unwrap(),
            VideoRef::live(Platform::Youtube, "UCabcdefghijklmnopqrstuv")
        );
    }

    #[test]
    fn rejects_unknown_urls() {
        assert!(matches!(
            VideoRef::from_url("https://example.com/video/1"),
            Err(ResolverError::InvalidReference(_))
        ));
    }

    #[test]
    fn identity_ignores_display_fields() {
        let a = channel(Platform::Twitch, "42", "Alice");
        let b = channel(Platform::Twitch, "42", "Renamed");
        let c = channel(Platform::Youtube, "42", "Alice");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn ordering_groups_by_platform_then_id() {
        let mut channels = vec![
            channel(Platform::Youtube, "a", "y"),
            channel(Platform::Twitch, "b", "t2"),
            channel(Platform::Twitch, "a", "t1"),
        ];
        channels.sort();
        let keys: Vec<_> = channels
            .iter()
            .map(|c| (c.platform, c.id.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (Platform::Twitch, "a"),
                (Platform::Twitch, "b"),
                (Platform::Youtube, "a")
            ]
        );
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(
            VideoRef::live(Platform::Twitch, "99").to_string(),
            "twitch:live:99"
        );
    }

    #[test]
    fn platform_parses_names_and_aliases() {
        assert_eq!("Twitch".parse::<Platform>().unwrap(), Platform::Twitch);
        assert_eq!("yt".parse::<Platform>().unwrap(), Platform::Youtube);
        assert_eq!(
            Platform::Youtube.as_str().parse::<Platform>().unwrap(),
            Platform::Youtube
        );
        assert!(matches!(
            "vimeo".parse::<Platform>(),
            Err(ResolverError::Validation(_))
        ));
    }
}
