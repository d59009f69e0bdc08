//! # Session materialization: token ⇄ cookie credential
//!
//! A successful code exchange yields an access token. How the browser proves it
//! holds a session depends on the [`SessionMode`]:
//!
//! | [`SessionMode`] | `session_token` cookie | Server-side state | Expiry checked by |
//! |-----------------|------------------------|-------------------|-------------------|
//! | `Bearer` | the raw access token | none | the browser only |
//! | `Opaque` (default) | session id issued by the web server's session layer | token stored under [`ACCESS_TOKEN_KEY`] | browser and server |
//!
//! [`SessionCodec`] is the bearer codec: it turns a token into a
//! [`SessionCredential`] and a presented cookie value back into the token. In both
//! modes sessions are `HttpOnly`, scoped to `/` and expire one hour after issue.
//! Revocation is a replacement credential with an empty value and a past expiry.

use oauth2::AccessToken;
use serde::Deserialize;
use time::{Duration, OffsetDateTime};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session_token";

/// Lifetime of a freshly issued session.
pub const SESSION_TTL: Duration = Duration::hours(1);

/// Path scope of the session cookie.
pub const SESSION_PATH: &str = "/";

/// Session key holding the access token in `Opaque` mode.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// The session as handed to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredential {
    pub value: String,
    pub expires: OffsetDateTime,
    pub http_only: bool,
    pub path: &'static str,
}

impl SessionCredential {
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires <= now
    }
}

/// How the session cookie relates to the provider token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Bearer,
    #[default]
    Opaque,
}

/// Converts access tokens to bearer session credentials and back.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionCodec;

impl SessionCodec {
    pub fn encode(&self, token: &AccessToken) -> SessionCredential {
        self.encode_at(token, OffsetDateTime::now_utc())
    }

    /// Wrap `token` in a credential issued at `now`.
    pub fn encode_at(&self, token: &AccessToken, now: OffsetDateTime) -> SessionCredential {
        SessionCredential {
            value: token.secret().clone(),
            expires: now + SESSION_TTL,
            http_only: true,
            path: SESSION_PATH,
        }
    }

    /// Recover the token behind a presented cookie value. Empty values are absent.
    pub fn decode(&self, presented: &str) -> Option<AccessToken> {
        if presented.is_empty() {
            None
        } else {
            Some(AccessToken::new(presented.to_string()))
        }
    }

    /// A credential that makes the client drop its session cookie.
    pub fn revoke(&self) -> SessionCredential {
        SessionCredential {
            value: String::new(),
            expires: OffsetDateTime::now_utc() - Duration::hours(1),
            http_only: true,
            path: SESSION_PATH,
        }
    }
}
