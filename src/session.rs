//! Typed session persistence and the authenticated-state signal.
//!
//! DESIGN
//! ======
//! The credential store is the single source of truth. The `watch`-backed
//! authenticated flag is a derived cache: only [`SessionStore::write`] and
//! [`SessionStore::clear`] touch the sender, so the flag cannot drift from
//! the persisted facts. Decode failures of any persisted fact degrade to
//! "absent", never to an error.

use std::collections::BTreeSet;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::watch;

use crate::store::CredentialStore;

pub(crate) const ACCESS_TOKEN_KEY: &str = "access_token";
pub(crate) const USER_DATA_KEY: &str = "user_data";
pub(crate) const REFRESH_EXP_KEY: &str = "refresh_token_exp";

/// Profile facts persisted alongside the access token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub admin_permissions: BTreeSet<i32>,
    #[serde(default)]
    pub entity_permissions: BTreeSet<i32>,
}

/// A fully-formed session as held client-side.
///
/// The refresh credential itself is never held here; `refresh_expires_at` is
/// the only persisted fact about refresh eligibility.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub access_token_expires_at: OffsetDateTime,
    pub refresh_expires_at: Option<OffsetDateTime>,
    pub profile: UserProfile,
}

/// Wire shape of a login or refresh response.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDto {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub access_token_exp_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub refresh_token_exp_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub admin_permissions: BTreeSet<i32>,
    #[serde(default)]
    pub entity_permissions: BTreeSet<i32>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session payload is missing an access token or its expiry")]
    IncompletePayload,
    #[error("access token is empty")]
    EmptyToken,
    #[error("access token expiry is not in the future")]
    StaleExpiry,
    #[error("session could not be encoded: {0}")]
    Encode(String),
}

impl TryFrom<SessionDto> for Session {
    type Error = SessionError;

    fn try_from(dto: SessionDto) -> Result<Self, SessionError> {
        let access_token = dto
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(SessionError::IncompletePayload)?;
        let access_token_expires_at = dto
            .access_token_exp_date
            .ok_or(SessionError::IncompletePayload)?;
        Ok(Self {
            access_token,
            access_token_expires_at,
            refresh_expires_at: dto.refresh_token_exp_date,
            profile: UserProfile {
                user_id: dto.user_id,
                first_name: dto.first_name,
                email: dto.email,
                image_url: dto.image_url,
                admin_permissions: dto.admin_permissions,
                entity_permissions: dto.entity_permissions,
            },
        })
    }
}

// =============================================================================
// SESSION STORE
// =============================================================================

/// Typed facade over the credential store, plus the authenticated flag.
///
/// Cheap to clone; clones share the same underlying store and flag.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn CredentialStore>,
    authed: Arc<watch::Sender<bool>>,
}

impl SessionStore {
    /// Wrap a credential store. The authenticated flag is initialized from
    /// the validity of whatever token is already persisted.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        let valid = token_valid_at(
            store.get(ACCESS_TOKEN_KEY).as_deref(),
            OffsetDateTime::now_utc(),
        );
        let (authed, _) = watch::channel(valid);
        Self { store, authed: Arc::new(authed) }
    }

    /// Current value of the authenticated flag.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        *self.authed.borrow()
    }

    /// Observe authenticated-state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.authed.subscribe()
    }

    pub fn access_token(&self) -> Option<String> {
        self.store.get(ACCESS_TOKEN_KEY)
    }

    /// `"Bearer <token>"`, if a token is persisted.
    pub fn authorization_header(&self) -> Option<String> {
        self.access_token().map(|token| format!("Bearer {token}"))
    }

    /// The persisted profile; parse failure degrades to `None`.
    pub fn profile(&self) -> Option<UserProfile> {
        let raw = self.store.get(USER_DATA_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(error) => {
                tracing::warn!(%error, "stored profile is malformed; treating as absent");
                None
            }
        }
    }

    pub fn refresh_expires_at(&self) -> Option<OffsetDateTime> {
        let raw = self.store.get(REFRESH_EXP_KEY)?;
        OffsetDateTime::parse(&raw, &Rfc3339).ok()
    }

    /// Reconstruct the full session. Any missing or malformed fact yields
    /// `None`; this never fails.
    pub fn read(&self) -> Option<Session> {
        let access_token = self.access_token()?;
        let exp = decode_token_expiry(&access_token)?;
        let access_token_expires_at = OffsetDateTime::from_unix_timestamp(exp).ok()?;
        let profile = self.profile()?;
        Some(Session {
            access_token,
            access_token_expires_at,
            refresh_expires_at: self.refresh_expires_at(),
            profile,
        })
    }

    /// Persist a session atomically and flip the authenticated flag.
    ///
    /// Rejected (no-op, nothing partially written) when the token is empty
    /// or its expiry is not in the future.
    pub fn write(&self, session: &Session) -> Result<(), SessionError> {
        self.write_at(session, OffsetDateTime::now_utc())
    }

    pub(crate) fn write_at(
        &self,
        session: &Session,
        now: OffsetDateTime,
    ) -> Result<(), SessionError> {
        if session.access_token.is_empty() {
            return Err(SessionError::EmptyToken);
        }
        if session.access_token_expires_at <= now {
            return Err(SessionError::StaleExpiry);
        }

        // Encode everything before the first store mutation so a failure
        // cannot leave partial state behind.
        let profile_json = serde_json::to_string(&session.profile)
            .map_err(|e| SessionError::Encode(e.to_string()))?;
        let refresh_value = session
            .refresh_expires_at
            .map(|exp| exp.format(&Rfc3339))
            .transpose()
            .map_err(|e| SessionError::Encode(e.to_string()))?;

        // Token and profile share one expiry so they lapse together.
        self.store.set(
            ACCESS_TOKEN_KEY,
            &session.access_token,
            session.access_token_expires_at,
        );
        self.store
            .set(USER_DATA_KEY, &profile_json, session.access_token_expires_at);
        if let (Some(value), Some(expires_at)) = (refresh_value, session.refresh_expires_at) {
            self.store.set(REFRESH_EXP_KEY, &value, expires_at);
        }

        self.authed.send_replace(true);
        tracing::debug!(user_id = session.profile.user_id, "session written");
        Ok(())
    }

    /// Remove all session facts. Idempotent.
    pub fn clear(&self) {
        self.store.delete(ACCESS_TOKEN_KEY);
        self.store.delete(USER_DATA_KEY);
        self.store.delete(REFRESH_EXP_KEY);
        self.authed.send_replace(false);
        tracing::debug!("session cleared");
    }

    /// Decode the token's `exp` claim and compare it to the current time.
    /// Any decode failure yields `false`, not an error.
    #[must_use]
    pub fn has_valid_access_token(&self) -> bool {
        self.has_valid_access_token_at(OffsetDateTime::now_utc())
    }

    pub(crate) fn has_valid_access_token_at(&self, now: OffsetDateTime) -> bool {
        token_valid_at(self.access_token().as_deref(), now)
    }

    /// Whether the refresh window is still open.
    #[must_use]
    pub fn has_valid_refresh_window(&self) -> bool {
        self.has_valid_refresh_window_at(OffsetDateTime::now_utc())
    }

    pub(crate) fn has_valid_refresh_window_at(&self, now: OffsetDateTime) -> bool {
        self.refresh_expires_at().is_some_and(|exp| now < exp)
    }

    // -------------------------------------------------------------------------
    // Profile convenience accessors
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn has_admin_permission(&self, code: i32) -> bool {
        self.profile()
            .is_some_and(|p| p.admin_permissions.contains(&code))
    }

    #[must_use]
    pub fn has_entity_permission(&self, code: i32) -> bool {
        self.profile()
            .is_some_and(|p| p.entity_permissions.contains(&code))
    }

    pub fn current_user_id(&self) -> Option<i64> {
        self.profile().map(|p| p.user_id)
    }

    pub fn current_user_email(&self) -> Option<String> {
        self.profile().map(|p| p.email)
    }

    pub fn current_user_first_name(&self) -> Option<String> {
        self.profile().map(|p| p.first_name)
    }
}

/// Decode the `exp` claim from a JWT payload without verifying the
/// signature. The client only needs the expiry; the server validates.
pub(crate) fn decode_token_expiry(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_i64()
}

fn token_valid_at(token: Option<&str>, now: OffsetDateTime) -> bool {
    token
        .and_then(decode_token_expiry)
        .is_some_and(|exp| exp > now.unix_timestamp())
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
