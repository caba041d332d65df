//! Per-request authentication interception.
//!
//! State machine per request: attach a bearer token if a valid one is
//! persisted, forward, and on failure classify the status code. A 401 with
//! an open refresh window delegates to the [`RefreshCoordinator`]; every
//! other failure triggers its recommended side effect and propagates the
//! original transport failure untouched.

use std::sync::Arc;

use crate::classify::{Outcome, classify};
use crate::effects::{Navigation, Navigator, Notifier, Severity};
use crate::error::AuthError;
use crate::refresh::{RefreshCoordinator, RefreshDecision};
use crate::session::SessionStore;
use crate::transport::{Request, Response, Transport};

pub struct AuthInterceptor {
    transport: Arc<dyn Transport>,
    sessions: SessionStore,
    coordinator: RefreshCoordinator,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
}

impl AuthInterceptor {
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        sessions: SessionStore,
        coordinator: RefreshCoordinator,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self { transport, sessions, coordinator, notifier, navigator }
    }

    /// Send a request through the authentication layer.
    ///
    /// On success the response passes through unchanged. On failure the
    /// interceptor reacts (refresh, notification, navigation) but never
    /// manufactures a different error than the transport produced.
    pub async fn send(&self, mut request: Request) -> Result<Response, AuthError> {
        if !request.skip_auth && self.sessions.has_valid_access_token() {
            if let Some(token) = self.sessions.access_token() {
                request.set_bearer(&token);
            }
        }
        // No valid token: forward unauthenticated and let the backend
        // decide whether the endpoint requires auth.

        let failure = match self.transport.send(request.clone()).await {
            Ok(response) => return Ok(response),
            Err(failure) => failure,
        };

        let outcome = classify(failure.status);
        if outcome == Outcome::ExpiredOrInvalid {
            if request.skip_auth {
                // Public endpoints own their 401s (e.g. a rejected login).
                return Err(AuthError::Http(failure));
            }
            return self.handle_expired(request).await;
        }

        self.notifier.notify(outcome.severity(), outcome.message());
        if outcome == Outcome::Forbidden {
            self.navigator.navigate(Navigation::insufficient_permissions());
        }
        Err(AuthError::Http(failure))
    }

    /// 401 handling: refresh if eligible, otherwise tear the session down.
    async fn handle_expired(&self, request: Request) -> Result<Response, AuthError> {
        if self.sessions.has_valid_refresh_window() {
            return match self.coordinator.refresh_or_wait(request.clone()).await {
                RefreshDecision::Refreshed(token) => {
                    let mut retry = request;
                    retry.set_bearer(&token);
                    tracing::debug!(url = %retry.url, "retrying request with refreshed token");
                    // One retry only; a second failure propagates untouched.
                    self.transport.send(retry).await.map_err(AuthError::Http)
                }
                RefreshDecision::Replayed(result) => result,
                // Side effects already emitted once by the coordinator.
                RefreshDecision::Failed(err) => Err(err),
            };
        }

        if request.has_authorization() {
            // A credential was sent but the refresh window is gone.
            self.notifier.notify(
                Severity::Warning,
                "No valid refresh token - redirecting to login",
            );
            self.sessions.clear();
            self.navigator.navigate(Navigation::session_expired());
            Err(AuthError::RefreshIneligible)
        } else {
            self.notifier
                .notify(Severity::Warning, Outcome::Unauthenticated.message());
            self.sessions.clear();
            self.navigator.navigate(Navigation::session_expired());
            Err(AuthError::Unauthenticated)
        }
    }

    /// Explicit logout: drop all session facts and return to the login view.
    pub fn logout(&self) {
        self.sessions.clear();
        self.navigator.navigate(Navigation::login());
        tracing::debug!("logged out");
    }

    /// The session store shared with this interceptor.
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

#[cfg(test)]
#[path = "interceptor_test.rs"]
mod tests;
