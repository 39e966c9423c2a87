//! Device-flow sign-in driver.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::session::{DevicePoll, OAuthSession, SignInOutcome};
use crate::credentials::Credentials;
use crate::error::Result;
use crate::platform::UserIdentity;

/// Extra wait added to the interval for every `slow_down` answer.
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// Platform device-code and token endpoints.
#[async_trait]
pub trait DeviceAuthorizer: Send + Sync {
    async fn request_device_code(&self) -> Result<OAuthSession>;

    async fn poll_device_token(&self, session: &OAuthSession) -> Result<DevicePoll>;
}

/// Looks up the account the current access token belongs to.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self) -> Result<UserIdentity>;
}

/// A running sign-in. Dropping the handle does not stop the flow; call
/// [`SignInHandle::cancel`].
#[derive(Debug)]
pub struct SignInHandle {
    cancel: CancellationToken,
    task: JoinHandle<SignInOutcome>,
}

impl SignInHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this flow, usable after [`SignInHandle::join`] has
    /// taken the handle.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn join(self) -> SignInOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => SignInOutcome::Failed(format!("sign-in task failed: {e}")),
        }
    }
}

#[derive(Clone)]
pub struct DeviceFlowOrchestrator {
    authorizer: Arc<dyn DeviceAuthorizer>,
    identity: Arc<dyn IdentityProvider>,
    credentials: Arc<Credentials>,
}

impl DeviceFlowOrchestrator {
    pub fn new(
        authorizer: Arc<dyn DeviceAuthorizer>,
        identity: Arc<dyn IdentityProvider>,
        credentials: Arc<Credentials>,
    ) -> Self {
        Self {
            authorizer,
            identity,
            credentials,
        }
    }

    /// Spawns the flow. `on_session` runs once before the first poll;
    /// `on_complete` runs exactly once with the terminal outcome.
    pub fn authenticate<S, C>(&self, on_session: S, on_complete: C) -> SignInHandle
    where
        S: FnOnce(&OAuthSession) + Send + 'static,
        C: FnOnce(SignInOutcome) + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let this = self.clone();
        let task = tokio::spawn(async move {
            let outcome = this.run(on_session, &token).await;
            on_complete(outcome.clone());
            outcome
        });
        SignInHandle { cancel, task }
    }

    /// Drives the flow on the current task.
    #[instrument(skip_all, fields(platform = %self.credentials.platform()))]
    pub async fn run<S>(&self, on_session: S, cancel: &CancellationToken) -> SignInOutcome
    where
        S: FnOnce(&OAuthSession) + Send,
    {
        if self.credentials.has_access_token() {
            let existing = tokio::select! {
                _ = cancel.cancelled() => return SignInOutcome::Cancelled,
                result = self.identity.current_user() => result,
            };
            match existing {
                Ok(identity) => {
                    info!(login = %identity.login, "Stored credentials are valid");
                    return SignInOutcome::Authorized(identity);
                }
                Err(e) => debug!(error = %e, "Stored credentials unusable; starting device flow"),
            }
        }

        let requested = tokio::select! {
            _ = cancel.cancelled() => return SignInOutcome::Cancelled,
            result = self.authorizer.request_device_code() => result,
        };
        let session = match requested {
            Ok(session) => session,
            Err(e) => return SignInOutcome::Failed(e.to_string()),
        };
        on_session(&session);

        let mut interval = session.poll_interval;
        loop {
            if session.is_expired() {
                warn!("Device code expired before authorization");
                return SignInOutcome::Expired;
            }

            tokio::select! {
                _ = cancel.cancelled() => return SignInOutcome::Cancelled,
                _ = tokio::time::sleep(interval) => {}
            }

            let polled = tokio::select! {
                _ = cancel.cancelled() => return SignInOutcome::Cancelled,
                result = self.authorizer.poll_device_token(&session) => result,
            };
            match polled {
                Ok(DevicePoll::Pending) => continue,
                Ok(DevicePoll::SlowDown) => {
                    interval += SLOW_DOWN_STEP;
                    debug!(interval_secs = interval.as_secs(), "Asked to slow down");
                }
                Ok(DevicePoll::Authorized(grant)) => return self.complete(grant).await,
                Ok(DevicePoll::Denied) => return SignInOutcome::Denied,
                Ok(DevicePoll::Expired) => return SignInOutcome::Expired,
                Ok(DevicePoll::Failed(message)) => return SignInOutcome::Failed(message),
                Err(e) => return SignInOutcome::Failed(e.to_string()),
            }
        }
    }

    async fn complete(&self, grant: crate::credentials::TokenGrant) -> SignInOutcome {
        if let Err(e) = self.credentials.sign_in(grant).await {
            return SignInOutcome::Failed(e.to_string());
        }
        match self.identity.current_user().await {
            Ok(identity) => {
                info!(login = %identity.login, "Device authorization complete");
                SignInOutcome::Authorized(identity)
            }
            Err(e) => SignInOutcome::Failed(e.to_string()),
        }
    }

    /// Clears the platform's credentials, in memory and in the store.
    pub async fn sign_out(&self) -> Result<()> {
        info!(platform = %self.credentials.platform(), "Signing out");
        self.credentials.clear().await
    }
}
