//! # Server-side sessions
//!
//! Sessions are kept by `tower-sessions` in memory. The session cookie carries only
//! the session id; what it holds depends on the [`SessionMode`]:
//!
//! | Mode | Session cookie | Holds |
//! |------|----------------|-------|
//! | `Opaque` | `session_token` | the [`PendingLogin`](auth::PendingLogin) while signing in, then the access token |
//! | `Bearer` | `oauth_state` | the pending login only; the token rides in its own `session_token` cookie |
//!
//! A browser has one session, so it has at most one pending login: starting a new
//! login replaces the previous one. [`CappedStore`] bounds how many sessions the
//! process keeps, evicting the oldest once the cap is reached.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use auth::{
    AccessToken, Authenticated, FlowController, SessionCredential, SessionMode, ACCESS_TOKEN_KEY,
    SESSION_COOKIE, STATE_COOKIE,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tower_sessions::cookie::SameSite as SessionSameSite;
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store::{self, SessionStore};
use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer};

/// Sessions kept before the oldest is evicted.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// In-memory session store holding at most `capacity` sessions.
#[derive(Debug, Clone)]
pub struct CappedStore {
    inner: MemoryStore,
    order: Arc<Mutex<VecDeque<Id>>>,
    capacity: usize,
}

impl CappedStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: MemoryStore::default(),
            order: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    fn order(&self) -> MutexGuard<'_, VecDeque<Id>> {
        self.order.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.order().len()
    }
}

#[async_trait]
impl SessionStore for CappedStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        self.inner.create(record).await?;
        let evicted = {
            let mut order = self.order();
            order.push_back(record.id);
            if order.len() > self.capacity {
                order.pop_front()
            } else {
                None
            }
        };
        if let Some(id) = evicted {
            tracing::debug!("session store full, evicting oldest session");
            self.inner.delete(&id).await?;
        }
        Ok(())
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        self.inner.save(record).await
    }

    async fn load(&self, id: &Id) -> session_store::Result<Option<Record>> {
        self.inner.load(id).await
    }

    async fn delete(&self, id: &Id) -> session_store::Result<()> {
        self.order().retain(|tracked| tracked != id);
        self.inner.delete(id).await
    }
}

/// Session layer for `mode`. Sessions idle out with the pending login unless a
/// sign-in gives them an absolute expiry.
pub fn layer(mode: SessionMode, secure: bool, capacity: usize) -> SessionManagerLayer<CappedStore> {
    let name = match mode {
        SessionMode::Opaque => SESSION_COOKIE,
        SessionMode::Bearer => STATE_COOKIE,
    };
    SessionManagerLayer::new(CappedStore::new(capacity))
        .with_name(name)
        .with_path("/")
        .with_http_only(true)
        .with_same_site(SessionSameSite::Lax)
        .with_secure(secure)
        .with_expiry(Expiry::OnInactivity(auth::state::STATE_TTL))
}

pub fn session_cookie(credential: &SessionCredential, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, credential.value.clone()))
        .path(credential.path)
        .http_only(credential.http_only)
        .same_site(SameSite::Lax)
        .secure(secure)
        .expires(credential.expires)
        .build()
}

/// Attach the signed-in session to the response.
pub async fn establish(
    flow: &FlowController,
    session: &Session,
    jar: CookieJar,
    secure: bool,
    auth: &Authenticated,
) -> Result<CookieJar, tower_sessions::session::Error> {
    match flow.session_mode() {
        SessionMode::Bearer => Ok(jar.add(session_cookie(&flow.bearer_credential(auth), secure))),
        SessionMode::Opaque => {
            session.cycle_id().await?;
            session.insert(ACCESS_TOKEN_KEY, auth.token.secret()).await?;
            session.set_expiry(Some(Expiry::AtDateTime(auth.expires())));
            Ok(jar)
        }
    }
}

/// Access token of the presented session, if it is live.
pub async fn current_token(
    flow: &FlowController,
    session: &Session,
    jar: &CookieJar,
) -> Option<AccessToken> {
    match flow.session_mode() {
        SessionMode::Bearer => jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| flow.authenticate(cookie.value())),
        SessionMode::Opaque => match session.get::<String>(ACCESS_TOKEN_KEY).await {
            Ok(token) => token.filter(|t| !t.is_empty()).map(AccessToken::new),
            Err(e) => {
                tracing::warn!(error = %e, "session lookup failed");
                None
            }
        },
    }
}

/// Forget the session and expire the `session_token` cookie.
pub async fn end(flow: &FlowController, session: &Session, jar: CookieJar, secure: bool) -> CookieJar {
    if flow.session_mode() == SessionMode::Opaque {
        if let Err(e) = session.flush().await {
            tracing::warn!(error = %e, "failed to drop session");
        }
    }
    jar.add(session_cookie(&flow.logout(), secure))
}
