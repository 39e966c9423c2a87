//! Client for the external extraction service (`GET /info?q=&f=`).

use std::sync::Arc;
use std::time::Duration;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use tracing::{debug, instrument};

use crate::error::{ResolverError, Result};
use crate::http::{HttpRequest, HttpTransport, QueryParams};
use crate::resolver::{ExtractorFormat, ResolutionResult, StructuredFormat};
use crate::utils::decode_json;

const FORMAT_SELECTOR: &str = "bestvideo+bestaudio/best";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ServiceResponse {
    Single { url: String },
    Formats { formats: Vec<ServiceFormat> },
}

#[derive(Debug, Deserialize)]
struct ServiceFormat {
    #[serde(default)]
    url: Option<String>,
    #[serde(default, deserialize_with = "number_or_string")]
    itag: Option<u32>,
    #[serde(default, rename = "qualityLabel")]
    quality_label: Option<String>,
    #[serde(default)]
    vcodec: Option<String>,
    #[serde(default)]
    acodec: Option<String>,
    #[serde(default)]
    filesize: Option<u64>,
}

impl ServiceFormat {
    fn codec_info(&self) -> String {
        [self.vcodec.as_deref(), self.acodec.as_deref()]
            .into_iter()
            .flatten()
            .filter(|codec| !codec.is_empty() && *codec != "none")
            .collect::<Vec<_>>()
            .join("+")
    }
}

fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<u32>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }
    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) => s.parse().ok(),
        None => None,
    })
}

/// Turns the service's JSON into a resolution result.
pub fn decode_service_response(body: &[u8]) -> Result<ResolutionResult> {
    let response: ServiceResponse = decode_json(body, "extraction service response")?;
    let formats = match response {
        ServiceResponse::Single { url } => return Ok(ResolutionResult::RawUrls(vec![url])),
        ServiceResponse::Formats { formats } => formats,
    };
    if formats.is_empty() {
        return Err(ResolverError::decode(
            "extraction service response",
            serde_json::Error::custom("format list is empty"),
        ));
    }

    let structured = formats.iter().all(|f| {
        f.itag.is_some() && f.quality_label.is_some() && f.url.is_some()
    });
    if structured {
        return Ok(ResolutionResult::StructuredFormats(
            formats
                .into_iter()
                .filter_map(|f| {
                    Some(StructuredFormat {
                        url: f.url?,
                        quality_label: f.quality_label?,
                        itag: f.itag?,
                    })
                })
                .collect(),
        ));
    }

    let extracted: Vec<ExtractorFormat> = formats
        .into_iter()
        .filter_map(|f| {
            let codec_info = f.codec_info();
            Some(ExtractorFormat {
                url: f.url?,
                codec_info,
                file_size: f.filesize,
            })
        })
        .collect();
    if extracted.is_empty() {
        return Err(ResolverError::decode(
            "extraction service response",
            serde_json::Error::custom("no format carries a url"),
        ));
    }
    Ok(ResolutionResult::ExtractorFormats(extracted))
}

#[derive(Clone)]
pub struct ExtractionService {
    transport: Arc<dyn HttpTransport>,
    base_url: Option<String>,
    timeout: Duration,
}

impl ExtractionService {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: Option<String>, timeout: Duration) -> Self {
        Self {
            transport,
            base_url,
            timeout,
        }
    }

    #[instrument(skip(self))]
    pub async fn extract(&self, watch_url: &str) -> Result<ResolutionResult> {
        let base_url = self.base_url.as_deref().ok_or_else(|| {
            ResolverError::Config("no extraction service url configured".to_string())
        })?;
        let query = QueryParams::new()
            .with("q", watch_url)
            .with("f", FORMAT_SELECTOR);
        let url = query.append_to(&format!("{}/info", base_url.trim_end_matches('/')));

        let response = self
            .transport
            .send(HttpRequest::get(url).timeout(self.timeout))
            .await?
            .error_for_status()?;
        let result = decode_service_response(&response.body)?;
        debug!(kind = result.kind(), "Extraction service answered");
        Ok(result)
    }
}
