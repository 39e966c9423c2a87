//! Playable-media resolution and account plumbing for Twitch and YouTube.
//!
//! The crate turns a [`VideoRef`] into a [`ResolutionResult`] and carries the
//! pieces around it: OAuth device sign-in, per-platform credentials with
//! single-flight refresh, an authenticated API executor that replays a
//! request once after refreshing, and follow/liveness queries.

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod oauth;
pub mod platform;
pub mod platforms;
pub mod playlist;
pub mod resolver;
pub mod retry;
pub(crate) mod utils;

pub use client::{CredentialStores, PlatformClients};
pub use config::{GoogleSecrets, PlatformSecrets, ResolverConfig, TwitchSecrets};
pub use credentials::{CredentialStore, Credentials, MemoryCredentialStore};
pub use error::{ResolverError, Result};
pub use oauth::{DeviceFlowOrchestrator, OAuthSession, SignInOutcome};
pub use platform::{Channel, LiveStatus, Platform, UserIdentity, Video, VideoRef};
pub use playlist::{Manifest, QualityPreference, StreamVariant, parse_manifest};
pub use resolver::{ExtractorFormat, ResolutionResult, StructuredFormat, VideoResolver};
