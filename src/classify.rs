//! Failure classification.
//!
//! A pure lookup from a transport failure's status code to the outcome it
//! implies and the side effect recommended for it. The classifier performs
//! no side effects itself and is total over the status-code domain.

use crate::effects::{Destination, Severity};

/// What a failed request means for the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The failing request carried no credential at all. Never produced by
    /// [`classify`] from a status code alone; the interceptor selects it
    /// when a 401 comes back for a request it sent unauthenticated.
    Unauthenticated,
    /// 401 — the credential is expired or invalid; a refresh may help.
    ExpiredOrInvalid,
    /// 403 — authenticated but not allowed.
    Forbidden,
    /// 422 — the request body failed validation.
    Unprocessable,
    /// 429 — rate limited.
    RateLimited,
    /// 500 — server-side error.
    ServerError,
    /// 502/503/504 — upstream unavailable.
    Unavailable,
    /// Status 0 — the request never produced a response.
    NetworkError,
    /// Anything else.
    Unknown,
}

impl Outcome {
    /// Severity of the recommended notification.
    #[must_use]
    pub fn severity(self) -> Severity {
        match self {
            Self::Unauthenticated
            | Self::ExpiredOrInvalid
            | Self::Forbidden
            | Self::Unprocessable
            | Self::RateLimited => Severity::Warning,
            Self::ServerError | Self::Unavailable | Self::NetworkError | Self::Unknown => {
                Severity::Error
            }
        }
    }

    /// Recommended user-facing message.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Unauthenticated => "User not authenticated - redirecting to login",
            Self::ExpiredOrInvalid => "Session expired - please log in again",
            Self::Forbidden => "Access forbidden - Insufficient permissions",
            Self::Unprocessable => "Validation error",
            Self::RateLimited => "Too many requests - Please try again later",
            Self::ServerError => "Server error occurred",
            Self::Unavailable => "Service temporarily unavailable",
            Self::NetworkError => "Network error - Check your internet connection",
            Self::Unknown => "Unexpected HTTP error",
        }
    }

    /// Navigation target implied by the outcome, if any.
    #[must_use]
    pub fn destination(self) -> Option<Destination> {
        match self {
            Self::Unauthenticated | Self::ExpiredOrInvalid => Some(Destination::Login),
            Self::Forbidden => Some(Destination::AccessDenied),
            _ => None,
        }
    }
}

/// Map a transport failure's status code to an [`Outcome`].
#[must_use]
pub fn classify(status: u16) -> Outcome {
    match status {
        0 => Outcome::NetworkError,
        401 => Outcome::ExpiredOrInvalid,
        403 => Outcome::Forbidden,
        422 => Outcome::Unprocessable,
        429 => Outcome::RateLimited,
        500 => Outcome::ServerError,
        502 | 503 | 504 => Outcome::Unavailable,
        _ => Outcome::Unknown,
    }
}

#[cfg(test)]
#[path = "classify_test.rs"]
mod tests;
