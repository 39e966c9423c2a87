//! The shared, refreshable Credential Set of one platform client.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::store::{
    ACCESS_TOKEN_KEY, CredentialStore, EXPIRES_AT_KEY, REFRESH_TOKEN_KEY, WEB_ACCESS_TOKEN_KEY,
};
use crate::error::{ResolverError, Result};
use crate::platform::Platform;

/// Tokens are treated as expired this long before their stated expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Client ids, secret and tokens of one platform client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSet {
    pub client_id: String,
    /// Client id used by the platform's own web player, when it differs.
    pub web_client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Secondary token issued to the platform's web client.
    pub web_access_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CredentialSet {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|at| at <= now + ChronoDuration::seconds(EXPIRY_SKEW_SECS))
    }

    fn apply(&mut self, grant: TokenGrant) {
        self.access_token = Some(grant.access_token);
        // Some providers omit the refresh token on refresh; keep the old one.
        if grant.refresh_token.is_some() {
            self.refresh_token = grant.refresh_token;
        }
        self.expires_at = grant
            .expires_in
            .map(|secs| Utc::now() + ChronoDuration::seconds(secs as i64));
    }

    fn clear_tokens(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.web_access_token = None;
        self.expires_at = None;
    }
}

/// Tokens returned by a refresh or a completed device authorization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Platform-specific refresh-token grant.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, credentials: &CredentialSet) -> Result<TokenGrant>;
}

/// Owns one platform's Credential Set.
///
/// Reads are lock-free for practical purposes; refreshes are serialised so
/// concurrent auth failures cause a single refresh call.
pub struct Credentials {
    platform: Platform,
    state: RwLock<CredentialSet>,
    refresh_lock: Mutex<()>,
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
}

impl Credentials {
    pub fn new(
        platform: Platform,
        initial: CredentialSet,
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        Self {
            platform,
            state: RwLock::new(initial),
            refresh_lock: Mutex::new(()),
            store,
            refresher,
        }
    }

    /// Builds the set from `seed` (client ids and pre-seeded tokens), letting
    /// tokens found in `store` take precedence.
    pub async fn load(
        platform: Platform,
        seed: CredentialSet,
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Result<Self> {
        let mut set = seed;
        if let Some(token) = store.get(ACCESS_TOKEN_KEY).await? {
            set.access_token = Some(token);
        }
        if let Some(token) = store.get(REFRESH_TOKEN_KEY).await? {
            set.refresh_token = Some(token);
        }
        if let Some(token) = store.get(WEB_ACCESS_TOKEN_KEY).await? {
            set.web_access_token = Some(token);
        }
        if let Some(expires_at) = store.get(EXPIRES_AT_KEY).await? {
            set.expires_at = DateTime::parse_from_rfc3339(&expires_at)
                .ok()
                .map(|dt| dt.with_timezone(&Utc));
        }
        debug!(
            %platform,
            has_access_token = set.access_token.is_some(),
            has_refresh_token = set.refresh_token.is_some(),
            "Loaded credentials"
        );
        Ok(Self::new(platform, set, store, refresher))
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn snapshot(&self) -> CredentialSet {
        self.state.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.read().access_token.clone()
    }

    pub fn web_access_token(&self) -> Option<String> {
        self.state.read().web_access_token.clone()
    }

    pub fn client_id(&self) -> String {
        self.state.read().client_id.clone()
    }

    /// The web client id, or the primary one when none is configured.
    pub fn web_client_id(&self) -> String {
        let state = self.state.read();
        state
            .web_client_id
            .clone()
            .unwrap_or_else(|| state.client_id.clone())
    }

    pub fn has_access_token(&self) -> bool {
        self.state.read().access_token.is_some()
    }

    pub fn has_refresh_token(&self) -> bool {
        self.state.read().refresh_token.is_some()
    }

    pub fn is_expired(&self) -> bool {
        self.state.read().is_expired_at(Utc::now())
    }

    /// Stores tokens obtained by a completed sign-in.
    #[instrument(skip(self, grant), fields(platform = %self.platform))]
    pub async fn sign_in(&self, grant: TokenGrant) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        self.state.write().apply(grant);
        self.persist().await?;
        info!("Signed in");
        Ok(())
    }

    pub async fn set_web_access_token(&self, token: impl Into<String>) -> Result<()> {
        let token = token.into();
        self.state.write().web_access_token = Some(token.clone());
        self.store.set(WEB_ACCESS_TOKEN_KEY, &token).await
    }

    /// Forgets the web token if it is still the one that was rejected.
    ///
    /// Web tokens come from a browser session and cannot be refreshed.
    pub async fn discard_web_access_token(&self, rejected: Option<&str>) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        let discarded = {
            let mut state = self.state.write();
            if state.web_access_token.as_deref() == rejected {
                state.web_access_token = None;
                true
            } else {
                false
            }
        };
        if discarded {
            warn!(platform = %self.platform, "Web access token rejected; continuing without it");
            self.persist_after_clear().await?;
        }
        Ok(())
    }

    /// Refreshes the access token after `rejected` was refused.
    ///
    /// Callers that lose the race find a different token in place once they
    /// get the lock and return without refreshing again. A failed refresh
    /// clears the whole set and the store.
    #[instrument(skip(self, rejected), fields(platform = %self.platform))]
    pub async fn refresh_after_failure(&self, rejected: Option<&str>) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        let snapshot = self.snapshot();
        if snapshot.access_token.as_deref() != rejected {
            debug!("Access token already replaced by a concurrent refresh");
            return Ok(());
        }

        if snapshot.refresh_token.is_none() {
            warn!("No refresh token available; clearing credentials");
            self.clear_locked().await?;
            return Err(ResolverError::RefreshFailed(format!(
                "no refresh token stored for {}",
                self.platform
            )));
        }

        match self.refresher.refresh(&snapshot).await {
            Ok(grant) => {
                self.state.write().apply(grant);
                self.persist().await?;
                info!("Access token refreshed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed; clearing credentials");
                self.clear_locked().await?;
                Err(ResolverError::RefreshFailed(e.to_string()))
            }
        }
    }

    /// Refreshes ahead of time when the stored expiry has passed.
    pub async fn ensure_fresh(&self) -> Result<()> {
        if !self.is_expired() {
            return Ok(());
        }
        let current = self.access_token();
        debug!(platform = %self.platform, "Access token past expiry; refreshing");
        self.refresh_after_failure(current.as_deref()).await
    }

    /// Drops every token, in memory and in the store.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        self.clear_locked().await
    }

    async fn clear_locked(&self) -> Result<()> {
        self.state.write().clear_tokens();
        self.store.clear().await
    }

    async fn persist(&self) -> Result<()> {
        let snapshot = self.snapshot();
        if let Some(token) = &snapshot.access_token {
            self.store.set(ACCESS_TOKEN_KEY, token).await?;
        }
        if let Some(token) = &snapshot.refresh_token {
            self.store.set(REFRESH_TOKEN_KEY, token).await?;
        }
        if let Some(token) = &snapshot.web_access_token {
            self.store.set(WEB_ACCESS_TOKEN_KEY, token).await?;
        }
        if let Some(expires_at) = snapshot.expires_at {
            self.store.set(EXPIRES_AT_KEY, &expires_at.to_rfc3339()).await?;
        }
        Ok(())
    }

    // The store has no per-key delete, so rewrite it from the current set.
    async fn persist_after_clear(&self) -> Result<()> {
        self.store.clear().await?;
        self.persist().await
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Credentials")
            .field("platform", &self.platform)
            .field("client_id", &state.client_id)
            .field("has_access_token", &state.access_token.is_some())
            .field("has_refresh_token", &state.refresh_token.is_some())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Refresher returning numbered tokens, or failing when `fail` is set.
    #[derive(Default)]
    pub struct CountingRefresher {
        pub calls: AtomicUsize,
        pub fail: bool,
        pub delay: Option<std::time::Duration>,
    }

    #[async_trait]
    impl TokenRefresher for CountingRefresher {
        async fn refresh(&self, _credentials: &CredentialSet) -> Result<TokenGrant> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(ResolverError::Api("invalid_grant".into()));
            }
            Ok(TokenGrant {
                access_token: format!("refreshed-{n}"),
                refresh_token: None,
                expires_in: Some(3600),
            })
        }
    }

    pub fn signed_in_set() -> CredentialSet {
        CredentialSet {
            client_id: "client".into(),
            access_token: Some("initial".into()),
            refresh_token: Some("refresh".into()),
            ..CredentialSet::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::{CountingRefresher, signed_in_set};
    use super::*;
    use crate::credentials::MemoryCredentialStore;

    fn credentials(refresher: Arc<CountingRefresher>, store: Arc<MemoryCredentialStore>) -> Arc<Credentials> {
        Arc::new(Credentials::new(
            Platform::Twitch,
            signed_in_set(),
            store,
            refresher,
        ))
    }

    #[tokio::test]
    async fn refresh_updates_and_persists() {
        let refresher = Arc::new(CountingRefresher::default());
        let store = Arc::new(MemoryCredentialStore::new());
        let creds = credentials(refresher.clone(), store.clone());

        creds.refresh_after_failure(Some("initial")).await.unwrap();

        assert_eq!(creds.access_token().as_deref(), Some("refreshed-1"));
        let snapshot = creds.snapshot();
        assert_eq!(snapshot.refresh_token.as_deref(), Some("refresh"));
        assert!(snapshot.expires_at.is_some());
        let stored = store.snapshot();
        assert_eq!(stored.get(ACCESS_TOKEN_KEY).map(String::as_str), Some("refreshed-1"));
        assert_eq!(stored.get(REFRESH_TOKEN_KEY).map(String::as_str), Some("refresh"));
    }

    #[tokio::test]
    async fn concurrent_failures_coalesce_into_one_refresh() {
        let refresher = Arc::new(CountingRefresher {
            delay: Some(std::time::Duration::from_millis(20)),
            ..CountingRefresher::default()
        });
        let creds = credentials(refresher.clone(), Arc::new(MemoryCredentialStore::new()));

        let (a, b) = tokio::join!(
            creds.refresh_after_failure(Some("initial")),
            creds.refresh_after_failure(Some("initial")),
        );
        a.unwrap();
        b.unwrap();
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(creds.access_token().as_deref(), Some("refreshed-1"));
    }

    #[tokio::test]
    async fn failed_refresh_clears_everything() {
        let refresher = Arc::new(CountingRefresher {
            fail: true,
            ..CountingRefresher::default()
        });
        let store = Arc::new(MemoryCredentialStore::with_values([(ACCESS_TOKEN_KEY, "initial")]));
        let creds = credentials(refresher, store.clone());

        let err = creds.refresh_after_failure(Some("initial")).await.unwrap_err();
        assert!(matches!(err, ResolverError::RefreshFailed(_)));
        let snapshot = creds.snapshot();
        assert_eq!(snapshot.access_token, None);
        assert_eq!(snapshot.refresh_token, None);
        assert_eq!(snapshot.client_id, "client");
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn missing_refresh_token_fails_without_calling_refresher() {
        let refresher = Arc::new(CountingRefresher::default());
        let creds = Credentials::new(
            Platform::Youtube,
            CredentialSet {
                access_token: Some("only-access".into()),
                ..CredentialSet::new("client")
            },
            Arc::new(MemoryCredentialStore::new()),
            refresher.clone(),
        );
        let err = creds
            .refresh_after_failure(Some("only-access"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::RefreshFailed(_)));
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
        assert!(!creds.has_access_token());
    }

    #[tokio::test]
    async fn load_prefers_stored_tokens() {
        let store = Arc::new(MemoryCredentialStore::with_values([
            (ACCESS_TOKEN_KEY, "stored"),
            (EXPIRES_AT_KEY, "2030-01-01T00:00:00+00:00"),
        ]));
        let seed = CredentialSet {
            access_token: Some("seeded".into()),
            refresh_token: Some("seeded-refresh".into()),
            ..CredentialSet::new("client")
        };
        let creds = Credentials::load(
            Platform::Twitch,
            seed,
            store,
            Arc::new(CountingRefresher::default()),
        )
        .await
        .unwrap();
        let snapshot = creds.snapshot();
        assert_eq!(snapshot.access_token.as_deref(), Some("stored"));
        assert_eq!(snapshot.refresh_token.as_deref(), Some("seeded-refresh"));
        assert!(!creds.is_expired());
    }

    #[tokio::test]
    async fn ensure_fresh_refreshes_expired_tokens_only() {
        let refresher = Arc::new(CountingRefresher::default());
        let creds = credentials(refresher.clone(), Arc::new(MemoryCredentialStore::new()));
        creds.ensure_fresh().await.unwrap();
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);

        creds.state.write().expires_at = Some(Utc::now() - ChronoDuration::seconds(5));
        creds.ensure_fresh().await.unwrap();
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn discarding_web_token_keeps_primary_tokens() {
        let store = Arc::new(MemoryCredentialStore::new());
        let creds = credentials(Arc::new(CountingRefresher::default()), store.clone());
        creds.set_web_access_token("web").await.unwrap();

        creds.discard_web_access_token(Some("web")).await.unwrap();
        assert_eq!(creds.web_access_token(), None);
        assert_eq!(creds.access_token().as_deref(), Some("initial"));
        assert!(!store.snapshot().contains_key(WEB_ACCESS_TOKEN_KEY));
    }
}
