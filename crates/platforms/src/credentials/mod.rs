//! Per-platform credential state, persistence and refresh.

mod manager;
mod store;

pub use manager::{CredentialSet, Credentials, TokenGrant, TokenRefresher};
pub use store::{
    ACCESS_TOKEN_KEY, CredentialStore, EXPIRES_AT_KEY, MemoryCredentialStore, REFRESH_TOKEN_KEY,
    WEB_ACCESS_TOKEN_KEY,
};

#[cfg(test)]
pub(crate) use manager::testing;
