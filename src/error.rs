//! Error taxonomy surfaced to request callers.
//!
//! Callers can distinguish "my own request failed" ([`AuthError::Http`],
//! carrying the transport failure untouched) from "the whole session is
//! gone" (the remaining variants).

use crate::transport::TransportFailure;

#[derive(Clone, Debug, thiserror::Error)]
pub enum AuthError {
    /// The original transport failure, propagated unchanged after any side
    /// effects have been emitted.
    #[error(transparent)]
    Http(#[from] TransportFailure),
    /// A 401 came back for a request that carried no credential.
    #[error("user is not authenticated")]
    Unauthenticated,
    /// The refresh window had already elapsed; no remote refresh was
    /// attempted.
    #[error("refresh window has expired")]
    RefreshIneligible,
    /// The refresh exchange was rejected, malformed, or timed out.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
}

impl AuthError {
    /// True when the error means the session has been torn down.
    #[must_use]
    pub fn is_session_ended(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated | Self::RefreshIneligible | Self::RefreshFailed(_)
        )
    }

    /// Status code of the underlying transport failure, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http(failure) => Some(failure.status),
            _ => None,
        }
    }
}
