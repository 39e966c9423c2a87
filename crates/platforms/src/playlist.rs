//! Master-playlist text parsing.
//!
//! Video media lines (`#EXT-X-MEDIA:TYPE=VIDEO`), stream lines
//! (`#EXT-X-STREAM-INF:`) and absolute URL lines are matched independently,
//! then correlated by position: the nth URL takes the nth stream line and the
//! nth video media line. When a stream line references a `VIDEO` group
//! declared by exactly one media line, that media line is used instead of the
//! positional one. Audio and subtitle renditions never name a variant.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ResolverError, Result};

static MEDIA_LINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#EXT-X-MEDIA:(.*?)\r?$").unwrap());
static STREAM_LINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#EXT-X-STREAM-INF:(.*?)\r?$").unwrap());
static URL_LINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(https?://\S+?)\r?$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamVariant {
    pub url: String,
    pub name: Option<String>,
    pub resolution: Option<String>,
    /// Peak bandwidth in bits per second, 0 when missing or malformed.
    pub bandwidth: u64,
    pub codecs: Option<String>,
    pub is_audio_only: bool,
}

impl StreamVariant {
    /// Name if present, else resolution, else bandwidth in kbps.
    pub fn label(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.resolution.clone())
            .unwrap_or_else(|| format!("{}k", self.bandwidth / 1000))
    }
}

/// Rendition the caller wants from a [`Manifest`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum QualityPreference {
    #[default]
    Highest,
    Named(String),
    AudioOnly,
}

impl QualityPreference {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "best" | "highest" | "source" => Self::Highest,
            "audio" | "audio_only" | "audio-only" => Self::AudioOnly,
            _ => Self::Named(value.trim().to_string()),
        }
    }
}

/// Variants of one master playlist, sorted by bandwidth ascending. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ManifestFields")]
pub struct Manifest {
    variants: Vec<StreamVariant>,
}

#[derive(Deserialize)]
struct ManifestFields {
    variants: Vec<StreamVariant>,
}

impl TryFrom<ManifestFields> for Manifest {
    type Error = ResolverError;

    fn try_from(fields: ManifestFields) -> Result<Self> {
        Manifest::new(fields.variants)
    }
}

impl Manifest {
    pub fn new(mut variants: Vec<StreamVariant>) -> Result<Self> {
        if variants.is_empty() {
            return Err(ResolverError::PlaylistParse(
                "manifest has no stream variants".to_string(),
            ));
        }
        variants.sort_by_key(|v| v.bandwidth);
        Ok(Self { variants })
    }

    pub fn variants(&self) -> &[StreamVariant] {
        &self.variants
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn highest(&self) -> &StreamVariant {
        // Sorted ascending and never empty.
        &self.variants[self.variants.len() - 1]
    }

    pub fn lowest(&self) -> &StreamVariant {
        &self.variants[0]
    }

    /// Exact (case-insensitive) name match first, then a name prefix match,
    /// so a remembered "720p" still finds "720p60".
    pub fn find_by_name(&self, name: &str) -> Option<&StreamVariant> {
        let wanted = name.to_ascii_lowercase();
        let named = || {
            self.variants
                .iter()
                .rev()
                .filter_map(|v| v.name.as_deref().map(|n| (v, n.to_ascii_lowercase())))
        };
        named()
            .find(|(_, n)| *n == wanted)
            .or_else(|| named().find(|(_, n)| n.starts_with(&wanted)))
            .map(|(v, _)| v)
    }

    pub fn audio_only(&self) -> Option<&StreamVariant> {
        self.variants.iter().rev().find(|v| v.is_audio_only)
    }

    /// Falls back to [`Manifest::highest`] when nothing matches.
    pub fn select(&self, preference: &QualityPreference) -> &StreamVariant {
        let selected = match preference {
            QualityPreference::Highest => None,
            QualityPreference::Named(name) => self.find_by_name(name),
            QualityPreference::AudioOnly => self.audio_only(),
        };
        selected.unwrap_or_else(|| self.highest())
    }
}

/// Parses raw manifest bytes into a [`Manifest`].
pub fn parse_manifest(bytes: &[u8]) -> Result<Manifest> {
    let text = String::from_utf8(bytes.to_vec())?;

    let media_lines: Vec<&str> = captures(&MEDIA_LINE_REGEX, &text)
        .into_iter()
        .filter(|line| attribute(line, "TYPE") == Some("VIDEO"))
        .collect();
    let stream_lines: Vec<&str> = captures(&STREAM_LINE_REGEX, &text);
    let urls: Vec<&str> = captures(&URL_LINE_REGEX, &text);

    if urls.is_empty() {
        return Err(ResolverError::PlaylistParse(
            "no stream urls found in manifest".to_string(),
        ));
    }
    if media_lines.len() != urls.len() || stream_lines.len() != urls.len() {
        debug!(
            media = media_lines.len(),
            streams = stream_lines.len(),
            urls = urls.len(),
            "Manifest line counts differ; pairing by position"
        );
    }

    let variants = urls
        .iter()
        .enumerate()
        .map(|(index, url)| {
            let stream = stream_lines.get(index).copied();
            let media = stream
                .and_then(|s| attribute(s, "VIDEO"))
                .and_then(|group| media_for_group(&media_lines, group))
                .or_else(|| media_lines.get(index).copied());
            build_variant(url, media, stream)
        })
        .collect();

    Manifest::new(variants)
}

fn captures<'a>(re: &Regex, text: &'a str) -> Vec<&'a str> {
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}

fn media_for_group<'a>(media_lines: &[&'a str], group: &str) -> Option<&'a str> {
    let mut matching = media_lines
        .iter()
        .filter(|line| attribute(line, "GROUP-ID") == Some(group));
    match (matching.next(), matching.next()) {
        (Some(line), None) => Some(line),
        _ => None,
    }
}

fn build_variant(url: &str, media: Option<&str>, stream: Option<&str>) -> StreamVariant {
    let name = media
        .and_then(|m| attribute(m, "NAME"))
        .or_else(|| stream.and_then(|s| attribute(s, "NAME")))
        .map(str::to_string);
    let bandwidth = stream
        .and_then(|s| attribute(s, "BANDWIDTH"))
        .and_then(|b| b.parse::<u64>().ok())
        .unwrap_or(0);
    let is_audio_only = name.as_deref().is_some_and(|n| n.contains("audio"));

    StreamVariant {
        url: url.to_string(),
        resolution: stream
            .and_then(|s| attribute(s, "RESOLUTION"))
            .map(str::to_string),
        codecs: stream
            .and_then(|s| attribute(s, "CODECS"))
            .map(str::to_string),
        name,
        bandwidth,
        is_audio_only,
    }
}

/// Value of `key` in an attribute list. Quoted values run to the closing
/// quote, bare values to the next comma.
fn attribute<'a>(attributes: &'a str, key: &str) -> Option<&'a str> {
    let mut search_from = 0;
    while let Some(found) = attributes[search_from..].find(key) {
        let start = search_from + found;
        let after_key = start + key.len();
        search_from = after_key;

        let at_boundary = start == 0 || attributes[..start].ends_with(',');
        if !at_boundary || !attributes[after_key..].starts_with('=') {
            continue;
        }

        let value = &attributes[after_key + 1..];
        return Some(match value.strip_prefix('"') {
            Some(quoted) => quoted.find('"').map_or(quoted, |end| &quoted[..end]),
            None => value.find(',').map_or(value, |end| &value[..end]),
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWITCH_MANIFEST: &str = "#EXTM3U
#EXT-X-TWITCH-INFO:NODE=\"video-edge\",MANIFEST-NODE-TYPE=\"weaver_cluster\"
#EXT-X-MEDIA:TYPE=VIDEO,GROUP-ID=\"chunked\",NAME=\"1080p60 (source)\",AUTOSELECT=YES,DEFAULT=YES
#EXT-X-STREAM-INF:BANDWIDTH=8534030,RESOLUTION=1920x1080,CODECS=\"avc1.64002A,mp4a.40.2\",VIDEO=\"chunked\",FRAME-RATE=60.000
https://video-weaver.example.hls.ttvnw.net/v1/playlist/source.m3u8
#EXT-X-MEDIA:TYPE=VIDEO,GROUP-ID=\"720p30\",NAME=\"720p\",AUTOSELECT=YES,DEFAULT=YES
#EXT-X-STREAM-INF:BANDWIDTH=2373000,RESOLUTION=1280x720,CODECS=\"avc1.4D401F,mp4a.40.2\",VIDEO=\"720p30\",FRAME-RATE=30.000
https://video-weaver.example.hls.ttvnw.net/v1/playlist/720p.m3u8
#EXT-X-MEDIA:TYPE=VIDEO,GROUP-ID=\"audio_only\",NAME=\"audio_only\",AUTOSELECT=NO,DEFAULT=NO
#EXT-X-STREAM-INF:BANDWIDTH=160000,CODECS=\"mp4a.40.2\",VIDEO=\"audio_only\"
https://video-weaver.example.hls.ttvnw.net/v1/playlist/audio.m3u8
";

    #[test]
    fn parses_every_variant_sorted_by_bandwidth() {
        let manifest = parse_manifest(TWITCH_MANIFEST.as_bytes()).unwrap();
        assert_eq!(manifest.len(), 3);

        let bandwidths: Vec<_> = manifest.variants().iter().map(|v| v.bandwidth).collect();
        assert_eq!(bandwidths, vec![160000, 2373000, 8534030]);

        let source = manifest.highest();
        assert_eq!(source.name.as_deref(), Some("1080p60 (source)"));
        assert_eq!(source.resolution.as_deref(), Some("1920x1080"));
        assert_eq!(source.codecs.as_deref(), Some("avc1.64002A,mp4a.40.2"));
        assert!(source.url.ends_with("source.m3u8"));
        assert!(!source.is_audio_only);

        let audio = manifest.lowest();
        assert!(audio.is_audio_only);
        assert_eq!(audio.resolution, None);
    }

    #[test]
    fn zero_urls_is_a_parse_error() {
        let err = parse_manifest(b"#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\nrelative.m3u8\n").unwrap_err();
        assert!(matches!(err, ResolverError::PlaylistParse(_)));
    }

    #[test]
    fn invalid_utf8_is_an_encoding_error() {
        let err = parse_manifest(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, ResolverError::ManifestEncoding(_)));
    }

    #[test]
    fn tolerates_missing_fields_and_bad_bandwidth() {
        let text = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=abc
https://a/1.m3u8
https://a/2.m3u8
";
        let manifest = parse_manifest(text.as_bytes()).unwrap();
        assert_eq!(manifest.len(), 2);
        assert!(manifest.variants().iter().all(|v| v.bandwidth == 0));
        assert!(manifest.variants().iter().all(|v| v.name.is_none()));
        // Stable sort keeps document order for equal bandwidth.
        assert_eq!(manifest.variants()[0].url, "https://a/1.m3u8");
    }

    #[test]
    fn average_bandwidth_does_not_shadow_bandwidth() {
        let line = "AVERAGE-BANDWIDTH=100,BANDWIDTH=200,NAME=\"x,y\"";
        assert_eq!(attribute(line, "BANDWIDTH"), Some("200"));
        assert_eq!(attribute(line, "NAME"), Some("x,y"));
        assert_eq!(attribute(line, "CODECS"), None);
    }

    #[test]
    fn video_group_overrides_positional_media_line() {
        // Media lines listed up front, in a different order than the streams.
        let text = "#EXTM3U
#EXT-X-MEDIA:TYPE=VIDEO,GROUP-ID=\"low\",NAME=\"360p\"
#EXT-X-MEDIA:TYPE=VIDEO,GROUP-ID=\"high\",NAME=\"1080p\"
#EXT-X-STREAM-INF:BANDWIDTH=6000000,VIDEO=\"high\"
https://a/high.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=600000,VIDEO=\"low\"
https://a/low.m3u8
";
        let manifest = parse_manifest(text.as_bytes()).unwrap();
        assert_eq!(manifest.highest().name.as_deref(), Some("1080p"));
        assert_eq!(manifest.lowest().name.as_deref(), Some("360p"));
    }

    #[test]
    fn audio_renditions_never_name_video_variants() {
        let text = "#EXTM3U
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aac\",NAME=\"audio_en\",DEFAULT=YES
#EXT-X-STREAM-INF:BANDWIDTH=6000000,RESOLUTION=1920x1080,AUDIO=\"aac\"
https://a/1080.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2000000,RESOLUTION=1280x720,AUDIO=\"aac\"
https://a/720.m3u8
";
        let manifest = parse_manifest(text.as_bytes()).unwrap();
        assert!(manifest.variants().iter().all(|v| v.name.is_none()));
        assert!(manifest.audio_only().is_none());
        assert_eq!(manifest.highest().label(), "1920x1080");
        // No audio-only variant, so the preference falls back to the highest.
        assert_eq!(
            manifest.select(&QualityPreference::AudioOnly).url,
            "https://a/1080.m3u8"
        );
        assert!(!manifest.select(&QualityPreference::AudioOnly).is_audio_only);
    }

    #[test]
    fn deserializing_an_empty_manifest_fails() {
        let err = serde_json::from_str::<Manifest>(r#"{"variants":[]}"#).unwrap_err();
        assert!(err.to_string().contains("no stream variants"));

        let manifest = parse_manifest(TWITCH_MANIFEST.as_bytes()).unwrap();
        let json = serde_json::to_string(&manifest).unwrap();
        assert_eq!(serde_json::from_str::<Manifest>(&json).unwrap(), manifest);
    }

    #[test]
    fn deserializing_sorts_variants() {
        let json = r#"{"variants":[
            {"url":"https://a/hi","name":null,"resolution":null,"bandwidth":900,"codecs":null,"is_audio_only":false},
            {"url":"https://a/lo","name":null,"resolution":null,"bandwidth":100,"codecs":null,"is_audio_only":false}
        ]}"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.highest().url, "https://a/hi");
        assert_eq!(manifest.lowest().url, "https://a/lo");
    }

    #[test]
    fn selection_by_preference() {
        let manifest = parse_manifest(TWITCH_MANIFEST.as_bytes()).unwrap();
        assert_eq!(
            manifest.select(&QualityPreference::Highest).bandwidth,
            8534030
        );
        assert_eq!(
            manifest
                .select(&QualityPreference::Named("720p".into()))
                .bandwidth,
            2373000
        );
        assert_eq!(
            manifest
                .select(&QualityPreference::Named("1080p60".into()))
                .bandwidth,
            8534030
        );
        assert!(manifest.select(&QualityPreference::AudioOnly).is_audio_only);
        assert_eq!(
            manifest
                .select(&QualityPreference::Named("4k".into()))
                .bandwidth,
            8534030
        );
    }

    #[test]
    fn preference_parsing() {
        assert_eq!(QualityPreference::parse("best"), QualityPreference::Highest);
        assert_eq!(QualityPreference::parse("audio_only"), QualityPreference::AudioOnly);
        assert_eq!(
            QualityPreference::parse("720p60"),
            QualityPreference::Named("720p60".into())
        );
    }
}
