//! Single-flight token refresh coordination.
//!
//! DESIGN
//! ======
//! `refresh_in_flight` and the waiter queue live behind one mutex that is
//! never held across an await: the check-and-set that decides who performs
//! the exchange happens in a single synchronous critical section, so no two
//! tasks can both observe "no refresh running". The winner performs the
//! exchange; every later arrival parks on a oneshot and is replayed in FIFO
//! arrival order once the exchange settles.
//!
//! TRADE-OFFS
//! ==========
//! Waiter replay is sequential (awaited one by one by the settling task).
//! This serializes the replayed requests but makes resumption order
//! deterministic, which matters more here than replay throughput.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

use crate::config::AuthConfig;
use crate::effects::{Navigation, Navigator, Notifier, Severity};
use crate::error::AuthError;
use crate::session::{Session, SessionDto, SessionStore};
use crate::transport::{Method, Request, Response, Transport};

/// Outcome of asking the coordinator to deal with an expired credential.
#[derive(Debug)]
pub enum RefreshDecision {
    /// This caller initiated the refresh and it succeeded; the caller
    /// should retry its original request with the returned token.
    Refreshed(String),
    /// A refresh was already in flight; the original request was replayed
    /// by the coordinator after settlement and this is its result.
    Replayed(Result<Response, AuthError>),
    /// The refresh settled as a failure. The session is gone and the
    /// session-expired side effects have already been emitted (once).
    Failed(AuthError),
}

struct Waiter {
    request: Request,
    tx: oneshot::Sender<Result<Response, AuthError>>,
}

struct Inner {
    refresh_in_flight: bool,
    waiters: Vec<Waiter>,
}

/// Owns the single in-flight refresh and the queue of requests waiting on
/// it. One instance is shared by all interceptors of an application.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Mutex<Inner>>,
    transport: Arc<dyn Transport>,
    sessions: SessionStore,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    config: AuthConfig,
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        sessions: SessionStore,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        config: AuthConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner { refresh_in_flight: false, waiters: Vec::new() })),
            transport,
            sessions,
            notifier,
            navigator,
            config,
        }
    }

    /// Requests currently parked on the in-flight refresh.
    pub(crate) fn waiter_count(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Either initiate a refresh or wait on the one already running.
    ///
    /// Every caller gets a definitive resolution: a token to retry with, a
    /// replayed response, or a terminal failure. Nothing is left pending
    /// once the refresh settles.
    pub async fn refresh_or_wait(&self, request: Request) -> RefreshDecision {
        // Check-and-set in one critical section; an await between the check
        // and the set would let a second task start its own refresh.
        let rx = {
            let mut inner = self.lock();
            if inner.refresh_in_flight {
                let (tx, rx) = oneshot::channel();
                inner.waiters.push(Waiter { request, tx });
                Some(rx)
            } else {
                inner.refresh_in_flight = true;
                inner.waiters.clear();
                None
            }
        };

        if let Some(rx) = rx {
            tracing::debug!("refresh already in flight; request queued");
            return match rx.await {
                Ok(result) => RefreshDecision::Replayed(result),
                // Coordinator dropped mid-refresh (host teardown); the
                // originating request is moot.
                Err(_) => RefreshDecision::Replayed(Err(AuthError::RefreshFailed(
                    "refresh abandoned".to_owned(),
                ))),
            };
        }

        match self.exchange().await {
            Ok(token) => {
                self.settle_success(&token).await;
                RefreshDecision::Refreshed(token)
            }
            Err(err) => {
                self.settle_failure(&err);
                RefreshDecision::Failed(err)
            }
        }
    }

    /// Perform the remote exchange, short-circuiting without a network call
    /// when the refresh window has already elapsed.
    async fn exchange(&self) -> Result<String, AuthError> {
        if !self.sessions.has_valid_refresh_window() {
            return Err(AuthError::RefreshIneligible);
        }

        let access_token = self.sessions.access_token().unwrap_or_default();
        let mut request = Request::new(Method::Patch, self.config.refresh_url.clone())
            .with_body(serde_json::json!({ "accessToken": access_token }));
        request.set_bearer(&access_token);

        tracing::debug!(url = %self.config.refresh_url, "starting token refresh");
        let send = self.transport.send(request);
        let response = match tokio::time::timeout(self.config.refresh_timeout, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(failure)) => return Err(AuthError::RefreshFailed(failure.to_string())),
            Err(_) => return Err(AuthError::RefreshFailed("refresh request timed out".to_owned())),
        };

        let dto: SessionDto = serde_json::from_value(response.body)
            .map_err(|e| AuthError::RefreshFailed(format!("malformed refresh response: {e}")))?;
        let session = Session::try_from(dto)
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;
        let token = session.access_token.clone();
        self.sessions
            .write(&session)
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        tracing::debug!("access token refreshed");
        Ok(token)
    }

    /// Drain the queue and replay each waiter's original request with the
    /// new token, in the order the waiters arrived.
    async fn settle_success(&self, token: &str) {
        let waiters = self.take_waiters();
        for mut waiter in waiters {
            waiter.request.set_bearer(token);
            let result = self
                .transport
                .send(waiter.request)
                .await
                .map_err(AuthError::Http);
            // A dropped receiver means the originating request is moot.
            let _ = waiter.tx.send(result);
        }
    }

    /// Tear down the session, emit the session-expired side effects once,
    /// and resolve every waiter with a terminal failure.
    fn settle_failure(&self, err: &AuthError) {
        self.sessions.clear();
        match err {
            AuthError::RefreshIneligible => self.notifier.notify(
                Severity::Warning,
                "No valid refresh token - redirecting to login",
            ),
            _ => self
                .notifier
                .notify(Severity::Error, "Token refresh failed - redirecting to login"),
        }
        self.navigator.navigate(Navigation::session_expired());
        tracing::warn!(error = %err, "refresh settled as failure; session cleared");

        let waiters = self.take_waiters();
        for waiter in waiters {
            let _ = waiter.tx.send(Err(err.clone()));
        }
    }

    /// Reset the in-flight flag and take the queue in one critical section,
    /// so no waiter can slip in between the two.
    fn take_waiters(&self) -> Vec<Waiter> {
        let mut inner = self.lock();
        inner.refresh_in_flight = false;
        std::mem::take(&mut inner.waiters)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "refresh_test.rs"]
mod tests;
