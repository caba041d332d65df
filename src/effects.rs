//! Side-effect sinks — notifications and navigation.
//!
//! The core never renders anything itself: it asks the host application to
//! show a message or move the user somewhere via these traits. Hosts plug in
//! toasts, routers, redirects, or no-ops as appropriate.

/// Notification severity, mirroring the four toast levels of the host UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
    Info,
    Warning,
}

/// Sink for user-facing messages.
pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, message: &str);
}

/// Named navigation targets the core can request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Destination {
    Login,
    AccessDenied,
}

impl Destination {
    /// Conventional route path for the destination.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::AccessDenied => "/access-denied",
        }
    }
}

/// Reason carried to the login view when the session has ended.
pub const REASON_SESSION_EXPIRED: &str = "session_expired";
/// Reason carried to the access-denied view on a 403.
pub const REASON_INSUFFICIENT_PERMISSIONS: &str = "insufficient_permissions";

/// A navigation request with optional query parameters.
///
/// `return_url` is left empty by the core; the host's [`Navigator`] knows the
/// current location and may fill it in before redirecting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Navigation {
    pub destination: Destination,
    pub reason: Option<&'static str>,
    pub return_url: Option<String>,
}

impl Navigation {
    /// Plain trip to the login view (explicit logout).
    #[must_use]
    pub fn login() -> Self {
        Self { destination: Destination::Login, reason: None, return_url: None }
    }

    /// Login view carrying `reason=session_expired`.
    #[must_use]
    pub fn session_expired() -> Self {
        Self {
            destination: Destination::Login,
            reason: Some(REASON_SESSION_EXPIRED),
            return_url: None,
        }
    }

    /// Access-denied view carrying `reason=insufficient_permissions`.
    #[must_use]
    pub fn insufficient_permissions() -> Self {
        Self {
            destination: Destination::AccessDenied,
            reason: Some(REASON_INSUFFICIENT_PERMISSIONS),
            return_url: None,
        }
    }

    #[must_use]
    pub fn with_return_url(mut self, url: impl Into<String>) -> Self {
        self.return_url = Some(url.into());
        self
    }
}

/// Sink for navigation requests.
pub trait Navigator: Send + Sync {
    fn navigate(&self, navigation: Navigation);
}
