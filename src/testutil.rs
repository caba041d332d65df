//! Shared fakes for exercising the interceptor and coordinator.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::Notify;

use crate::config::AuthConfig;
use crate::effects::{Navigation, Navigator, Notifier, Severity};
use crate::interceptor::AuthInterceptor;
use crate::refresh::RefreshCoordinator;
use crate::session::{Session, SessionStore, UserProfile};
use crate::store::MemoryStore;
use crate::transport::{Request, Response, Transport, TransportFailure};

pub(crate) const REFRESH_URL: &str = "/api/Auth/RefreshToken";

// =============================================================================
// SESSION FIXTURES
// =============================================================================

/// Build an unsigned JWT whose payload carries the given `exp` claim.
pub(crate) fn make_jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({ "exp": exp }).to_string());
    format!("{header}.{payload}.sig")
}

pub(crate) fn make_profile() -> UserProfile {
    UserProfile {
        user_id: 7,
        first_name: "Ada".to_owned(),
        email: "ada@example.com".to_owned(),
        image_url: None,
        admin_permissions: [1, 2].into(),
        entity_permissions: [10].into(),
    }
}

/// A session whose token is valid for an hour and whose refresh window is
/// open for a week.
pub(crate) fn make_session(now: OffsetDateTime) -> Session {
    let expires_at = now + time::Duration::hours(1);
    Session {
        access_token: make_jwt(expires_at.unix_timestamp()),
        access_token_expires_at: expires_at,
        refresh_expires_at: Some(now + time::Duration::days(7)),
        profile: make_profile(),
    }
}

/// JSON body of a successful refresh response carrying `token`.
pub(crate) fn refresh_body(now: OffsetDateTime, token: &str) -> Value {
    let access_exp = (now + time::Duration::hours(1)).format(&Rfc3339).unwrap();
    let refresh_exp = (now + time::Duration::days(7)).format(&Rfc3339).unwrap();
    json!({
        "accessToken": token,
        "accessTokenExpDate": access_exp,
        "refreshTokenExpDate": refresh_exp,
        "userId": 7,
        "firstName": "Ada",
        "email": "ada@example.com",
        "adminPermissions": [1, 2],
        "entityPermissions": [10],
    })
}

// =============================================================================
// FAKE TRANSPORT
// =============================================================================

pub(crate) fn ok(status: u16, body: Value) -> Result<Response, TransportFailure> {
    Ok(Response { status, body })
}

pub(crate) fn http_err(status: u16) -> Result<Response, TransportFailure> {
    Err(TransportFailure { status, message: "scripted failure".to_owned() })
}

struct Gate {
    entered: Notify,
    release: Notify,
}

#[derive(Default)]
struct FakeInner {
    scripts: HashMap<String, VecDeque<Result<Response, TransportFailure>>>,
    log: Vec<Request>,
}

/// Scripted transport: each URL holds a queue of outcomes consumed in call
/// order. URLs may be gated so a test can hold a response open while other
/// requests pile up behind it.
#[derive(Default)]
pub(crate) struct FakeTransport {
    inner: Mutex<FakeInner>,
    gates: Mutex<HashMap<String, Arc<Gate>>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue the next outcome for `url`.
    pub(crate) fn script(&self, url: &str, outcome: Result<Response, TransportFailure>) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.scripts.entry(url.to_owned()).or_default().push_back(outcome);
    }

    /// Hold responses for `url` until [`release`](Self::release) is called.
    pub(crate) fn gate(&self, url: &str) {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        gates.insert(
            url.to_owned(),
            Arc::new(Gate { entered: Notify::new(), release: Notify::new() }),
        );
    }

    /// Wait until a request for the gated `url` has arrived.
    pub(crate) async fn wait_entered(&self, url: &str) {
        let gate = {
            let gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
            gates.get(url).cloned().expect("url is not gated")
        };
        gate.entered.notified().await;
    }

    /// Let one held response for `url` proceed.
    pub(crate) fn release(&self, url: &str) {
        let gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(gate) = gates.get(url) {
            gate.release.notify_one();
        }
    }

    /// All requests sent so far, in order.
    pub(crate) fn sent(&self) -> Vec<Request> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.log.clone()
    }

    pub(crate) fn calls_to(&self, url: &str) -> usize {
        self.sent().iter().filter(|r| r.url == url).count()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportFailure> {
        let gate = {
            let gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
            gates.get(&request.url).cloned()
        };
        // Record and consume the script synchronously so call order is
        // observable even while the response is held at the gate.
        let outcome = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.log.push(request.clone());
            inner
                .scripts
                .get_mut(&request.url)
                .and_then(VecDeque::pop_front)
        };
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        outcome.unwrap_or_else(|| {
            Err(TransportFailure::network(format!(
                "no scripted response for {}",
                request.url
            )))
        })
    }
}

// =============================================================================
// RECORDING SINKS
// =============================================================================

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    messages: Mutex<Vec<(Severity, String)>>,
}

impl RecordingNotifier {
    pub(crate) fn messages(&self) -> Vec<(Severity, String)> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((severity, message.to_owned()));
    }
}

#[derive(Default)]
pub(crate) struct RecordingNavigator {
    navigations: Mutex<Vec<Navigation>>,
}

impl RecordingNavigator {
    pub(crate) fn navigations(&self) -> Vec<Navigation> {
        self.navigations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, navigation: Navigation) {
        self.navigations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(navigation);
    }
}

// =============================================================================
// HARNESS
// =============================================================================

/// A fully wired stack over fakes, shared by coordinator and interceptor
/// tests.
pub(crate) struct Harness {
    pub(crate) transport: Arc<FakeTransport>,
    pub(crate) sessions: SessionStore,
    pub(crate) notifier: Arc<RecordingNotifier>,
    pub(crate) navigator: Arc<RecordingNavigator>,
    pub(crate) coordinator: RefreshCoordinator,
    pub(crate) interceptor: AuthInterceptor,
}

pub(crate) fn harness() -> Harness {
    harness_with_config(AuthConfig::new(REFRESH_URL))
}

pub(crate) fn harness_with_config(config: AuthConfig) -> Harness {
    let transport = FakeTransport::new();
    let sessions = SessionStore::new(Arc::new(MemoryStore::new()));
    let notifier = Arc::new(RecordingNotifier::default());
    let navigator = Arc::new(RecordingNavigator::default());
    let coordinator = RefreshCoordinator::new(
        transport.clone(),
        sessions.clone(),
        notifier.clone(),
        navigator.clone(),
        config,
    );
    let interceptor = AuthInterceptor::new(
        transport.clone(),
        sessions.clone(),
        coordinator.clone(),
        notifier.clone(),
        navigator.clone(),
    );
    Harness { transport, sessions, notifier, navigator, coordinator, interceptor }
}

/// Spin until the coordinator holds `n` waiters (used to enqueue waiters in
/// a deterministic order).
pub(crate) async fn wait_for_waiters(coordinator: &RefreshCoordinator, n: usize) {
    while coordinator.waiter_count() < n {
        tokio::task::yield_now().await;
    }
}
