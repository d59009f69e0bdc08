//! # Sign-in flow controller
//!
//! Drives the authorization-code dance:
//!
//! ```text
//! Anonymous --issue_login--> AwaitingCallback --receive_callback--> Authenticated
//!     ^                              |                                    |
//!     +------- any failure ----------+<------------- logout --------------+
//! ```
//!
//! Nothing here knows about HTTP. The web crate maps [`LoginRedirect`],
//! [`Authenticated`] and [`AuthError`] onto redirects, cookies and the session layer.
//!
//! `AwaitingCallback` is recorded only as the [`PendingLogin`] the caller keeps in
//! the browser's session; the controller itself holds no per-login state.

use std::sync::Arc;

use oauth2::url::Url;
use oauth2::AccessToken;
use time::OffsetDateTime;

use crate::error::{AuthError, Result};
use crate::profile::UserProfile;
use crate::provider::IdentityProvider;
use crate::session::{SessionCodec, SessionCredential, SessionMode, SESSION_TTL};
use crate::state::{AntiForgery, IssuedState, PendingLogin};

/// Where to send the browser to start a login, and the state that goes with it.
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    pub url: Url,
    pub state: IssuedState,
}

/// Outcome of a successful callback.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub token: AccessToken,
    pub issued_at: OffsetDateTime,
}

impl Authenticated {
    /// Absolute end of the session.
    pub fn expires(&self) -> OffsetDateTime {
        self.issued_at + SESSION_TTL
    }
}

/// Orchestrates login, callback, logout and profile retrieval.
pub struct FlowController {
    provider: Arc<dyn IdentityProvider>,
    anti_forgery: AntiForgery,
    mode: SessionMode,
    select_account: bool,
}

impl FlowController {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        anti_forgery: AntiForgery,
        mode: SessionMode,
    ) -> Self {
        Self {
            provider,
            anti_forgery,
            mode,
            select_account: true,
        }
    }

    /// Whether to force the provider's account picker (`prompt=select_account`).
    pub fn with_select_account(mut self, select_account: bool) -> Self {
        self.select_account = select_account;
        self
    }

    pub fn session_mode(&self) -> SessionMode {
        self.mode
    }

    /// Anonymous → AwaitingCallback.
    pub fn issue_login(&self) -> LoginRedirect {
        let state = self.anti_forgery.issue();
        let mut extra = Vec::new();
        if self.select_account {
            extra.push(("prompt".to_string(), "select_account".to_string()));
        }
        let url = self.provider.authorization_url(&state.token, &extra);
        tracing::debug!(per_login = state.pending.is_some(), "issued authorization request");
        LoginRedirect { url, state }
    }

    /// AwaitingCallback → Authenticated, or back to Anonymous on any error.
    ///
    /// `pending` is the login the browser's session was waiting on, already taken
    /// out of the session. The state is checked before anything else; on mismatch
    /// the provider is never contacted.
    pub async fn receive_callback(
        &self,
        state: Option<&str>,
        code: Option<&str>,
        pending: Option<&PendingLogin>,
    ) -> Result<Authenticated> {
        self.anti_forgery.redeem(state, pending)?;

        let code = code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::Exchange("callback carried no authorization code".into()))?;

        let token = self.provider.exchange_code(code).await?;
        tracing::info!(mode = ?self.mode, "session established");
        Ok(Authenticated {
            token,
            issued_at: OffsetDateTime::now_utc(),
        })
    }

    /// The `session_token` cookie value for `auth` in `Bearer` mode.
    pub fn bearer_credential(&self, auth: &Authenticated) -> SessionCredential {
        SessionCodec.encode_at(&auth.token, auth.issued_at)
    }

    /// Authenticated → Anonymous. Unconditional.
    pub fn logout(&self) -> SessionCredential {
        SessionCodec.revoke()
    }

    /// Token behind a presented bearer session cookie.
    pub fn authenticate(&self, presented: &str) -> Option<AccessToken> {
        SessionCodec.decode(presented)
    }

    pub async fn fetch_raw_profile(&self, token: &AccessToken) -> Result<Vec<u8>> {
        self.provider.fetch_profile(token).await
    }

    pub async fn fetch_profile(&self, token: &AccessToken) -> Result<UserProfile> {
        let raw = self.fetch_raw_profile(token).await?;
        UserProfile::parse(&raw)
    }
}
