//! Client-side session and request-authorization layer.
//!
//! ARCHITECTURE
//! ============
//! Every outbound request passes through [`AuthInterceptor`]: it attaches
//! the bearer token held by [`SessionStore`], forwards the request, and
//! classifies any failure. A 401 with an open refresh window delegates to
//! [`RefreshCoordinator`], which guarantees at most one refresh exchange is
//! in flight and replays queued requests in arrival order once it settles;
//! a failed refresh tears the session down and resolves every queued
//! request with a terminal error — nothing is left hanging.
//!
//! The credential store, transport, and notification/navigation sinks are
//! traits so hosts can plug in cookies, their HTTP stack, and their UI;
//! in-memory and reqwest-backed implementations are provided.

pub mod classify;
pub mod config;
pub mod effects;
pub mod error;
pub mod interceptor;
pub mod refresh;
pub mod session;
pub mod store;
pub mod transport;

#[cfg(test)]
pub(crate) mod testutil;

pub use classify::{Outcome, classify};
pub use config::AuthConfig;
pub use effects::{Destination, Navigation, Navigator, Notifier, Severity};
pub use error::AuthError;
pub use interceptor::AuthInterceptor;
pub use refresh::{RefreshCoordinator, RefreshDecision};
pub use session::{Session, SessionDto, SessionError, SessionStore, UserProfile};
pub use store::{CredentialStore, MemoryStore};
pub use transport::{HttpTransport, Method, Request, Response, Transport, TransportFailure};
