//! # Anti-forgery state: correlating an authorization request with its callback
//!
//! The token issued at `/login` travels to the provider as the `state` parameter and
//! must come back unchanged on `/callback`. Comparison is exact string equality.
//!
//! - [`AntiForgery::Fixed`]: one token for the whole process. Kept for
//!   compatibility with deployments that pin the state value.
//! - [`AntiForgery::PerLogin`]: a fresh random token per login attempt. The issued
//!   [`PendingLogin`] is kept in the browser's server-side session under
//!   [`PENDING_LOGIN_KEY`], one slot per browser, and taken out again on the
//!   callback. A token is therefore accepted at most once and only from the browser
//!   that started the login.

use oauth2::CsrfToken;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::error::{AuthError, Result};

/// Cookie name of the pre-login session when the session cookie carries a bearer token.
pub const STATE_COOKIE: &str = "oauth_state";

/// Session key under which the pending login is stored.
pub const PENDING_LOGIN_KEY: &str = "pending_login";

/// How long an issued per-login state stays redeemable.
pub const STATE_TTL: Duration = Duration::minutes(10);

/// State value used by the fixed strategy unless configured otherwise.
pub const DEFAULT_FIXED_STATE: &str = "random";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateMode {
    Fixed,
    #[default]
    PerLogin,
}

/// A per-login state waiting for its callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLogin {
    pub state: String,
    #[serde(with = "time::serde::timestamp")]
    pub expires: OffsetDateTime,
}

impl PendingLogin {
    pub fn is_live_at(&self, now: OffsetDateTime) -> bool {
        self.expires > now
    }
}

/// A state token handed out by [`AntiForgery::issue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedState {
    pub token: String,
    /// Present for per-login tokens; must be stored in the browser's session.
    pub pending: Option<PendingLogin>,
}

/// Anti-forgery token strategy.
#[derive(Debug, Clone)]
pub enum AntiForgery {
    Fixed(String),
    PerLogin,
}

impl AntiForgery {
    pub fn fixed(token: impl Into<String>) -> Self {
        AntiForgery::Fixed(token.into())
    }

    pub fn from_mode(mode: StateMode, fixed_token: &str) -> Self {
        match mode {
            StateMode::Fixed => Self::fixed(fixed_token),
            StateMode::PerLogin => AntiForgery::PerLogin,
        }
    }

    pub fn issue(&self) -> IssuedState {
        self.issue_at(OffsetDateTime::now_utc())
    }

    pub fn issue_at(&self, now: OffsetDateTime) -> IssuedState {
        match self {
            AntiForgery::Fixed(token) => IssuedState {
                token: token.clone(),
                pending: None,
            },
            AntiForgery::PerLogin => {
                let token = CsrfToken::new_random().secret().clone();
                IssuedState {
                    pending: Some(PendingLogin {
                        state: token.clone(),
                        expires: now + STATE_TTL,
                    }),
                    token,
                }
            }
        }
    }

    pub fn redeem(&self, presented: Option<&str>, pending: Option<&PendingLogin>) -> Result<()> {
        self.redeem_at(presented, pending, OffsetDateTime::now_utc())
    }

    /// Validate the state echoed by the provider.
    ///
    /// `pending` is what the browser's session held for this login; the fixed
    /// strategy ignores it.
    pub fn redeem_at(
        &self,
        presented: Option<&str>,
        pending: Option<&PendingLogin>,
        now: OffsetDateTime,
    ) -> Result<()> {
        let presented = presented.ok_or(AuthError::StateMismatch)?;
        match self {
            AntiForgery::Fixed(token) if presented == token.as_str() => Ok(()),
            AntiForgery::Fixed(_) => Err(AuthError::StateMismatch),
            AntiForgery::PerLogin => match pending {
                Some(pending) if pending.state == presented && pending.is_live_at(now) => Ok(()),
                _ => Err(AuthError::StateMismatch),
            },
        }
    }
}
