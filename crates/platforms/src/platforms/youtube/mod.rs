//! YouTube: Data/People API, Google OAuth, page scraping and the extraction
//! service fallback.

mod api;
mod auth;
mod extraction;
mod scrape;

pub use api::YoutubeApi;
pub use auth::{DEFAULT_SCOPES, GoogleAuth};
pub use extraction::{ExtractionService, decode_service_response};
pub use scrape::{
    PageKind, PageScraper, PlayerResponse, extract_player_response, live_watch_url,
    vod_watch_url,
};
