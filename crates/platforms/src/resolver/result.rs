use serde::{Deserialize, Serialize};

use crate::playlist::{Manifest, QualityPreference};

/// Progressive format listed in a watch page's player response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredFormat {
    pub url: String,
    pub quality_label: String,
    pub itag: u32,
}

/// Format reported by the extraction service without itag metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorFormat {
    pub url: String,
    pub codec_info: String,
    pub file_size: Option<u64>,
}

/// What a resolution produced. Exactly one shape per successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ResolutionResult {
    Manifest(Manifest),
    StructuredFormats(Vec<StructuredFormat>),
    ExtractorFormats(Vec<ExtractorFormat>),
    RawUrls(Vec<String>),
}

impl ResolutionResult {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Manifest(_) => "manifest",
            Self::StructuredFormats(_) => "structured_formats",
            Self::ExtractorFormats(_) => "extractor_formats",
            Self::RawUrls(_) => "raw_urls",
        }
    }

    /// Picks one playable URL according to `preference`.
    pub fn preferred_url(&self, preference: &QualityPreference) -> Option<&str> {
        match self {
            Self::Manifest(manifest) => Some(manifest.select(preference).url.as_str()),
            Self::StructuredFormats(formats) => {
                let named = match preference {
                    QualityPreference::Named(name) => {
                        let name = name.to_ascii_lowercase();
                        formats
                            .iter()
                            .find(|f| f.quality_label.to_ascii_lowercase().starts_with(&name))
                    }
                    _ => None,
                };
                named
                    .or_else(|| formats.iter().max_by_key(|f| label_height(&f.quality_label)))
                    .map(|f| f.url.as_str())
            }
            // The service lists formats worst to best.
            Self::ExtractorFormats(formats) => formats
                .iter()
                .filter(|f| f.file_size.is_some())
                .max_by_key(|f| f.file_size)
                .or_else(|| formats.last())
                .map(|f| f.url.as_str()),
            Self::RawUrls(urls) => urls.first().map(String::as_str),
        }
    }
}

/// Vertical resolution of a label such as `720p60`, 0 when unparsable.
fn label_height(label: &str) -> u32 {
    label
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::StreamVariant;

    fn structured(label: &str, itag: u32) -> StructuredFormat {
        StructuredFormat {
            url: format!("https://v/{itag}"),
            quality_label: label.to_string(),
            itag,
        }
    }

    #[test]
    fn structured_formats_pick_tallest_or_named() {
        let result = ResolutionResult::StructuredFormats(vec![
            structured("360p", 18),
            structured("720p", 22),
        ]);
        assert_eq!(result.preferred_url(&QualityPreference::Highest), Some("https://v/22"));
        assert_eq!(
            result.preferred_url(&QualityPreference::Named("360p".into())),
            Some("https://v/18")
        );
        assert_eq!(
            result.preferred_url(&QualityPreference::Named("1080p".into())),
            Some("https://v/22")
        );
    }

    #[test]
    fn extractor_formats_prefer_largest_file() {
        let result = ResolutionResult::ExtractorFormats(vec![
            ExtractorFormat {
                url: "https://a".into(),
                codec_info: "avc1+mp4a".into(),
                file_size: Some(10),
            },
            ExtractorFormat {
                url: "https://b".into(),
                codec_info: "vp9+opus".into(),
                file_size: Some(30),
            },
            ExtractorFormat {
                url: "https://c".into(),
                codec_info: "av01".into(),
                file_size: None,
            },
        ]);
        assert_eq!(result.preferred_url(&QualityPreference::Highest), Some("https://b"));
    }

    #[test]
    fn manifest_and_raw_urls() {
        let manifest = Manifest::new(vec![StreamVariant {
            url: "https://m/only.m3u8".into(),
            name: None,
            resolution: None,
            bandwidth: 1,
            codecs: None,
            is_audio_only: false,
        }])
        .unwrap();
        let result = ResolutionResult::Manifest(manifest);
        assert_eq!(result.kind(), "manifest");
        assert_eq!(
            result.preferred_url(&QualityPreference::AudioOnly),
            Some("https://m/only.m3u8")
        );

        let raw = ResolutionResult::RawUrls(vec!["https://x/best.mp4".into()]);
        assert_eq!(raw.preferred_url(&QualityPreference::Highest), Some("https://x/best.mp4"));
        assert_eq!(ResolutionResult::RawUrls(vec![]).preferred_url(&QualityPreference::Highest), None);
    }

    #[test]
    fn empty_manifest_result_is_rejected_on_decode() {
        let err = serde_json::from_str::<ResolutionResult>(
            r#"{"type":"manifest","value":{"variants":[]}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("no stream variants"));

        let raw: ResolutionResult =
            serde_json::from_str(r#"{"type":"raw_urls","value":["https://x"]}"#).unwrap();
        assert_eq!(raw, ResolutionResult::RawUrls(vec!["https://x".into()]));
    }
}
