//! Error taxonomy for the sign-in flow.
//!
//! | Variant | Raised by | Handling |
//! |---------|-----------|----------|
//! | [`AuthError::Config`] | [`ClientCredentials`](crate::ClientCredentials) construction | fatal, the server never starts |
//! | [`AuthError::StateMismatch`] | [`AntiForgery::redeem`](crate::AntiForgery::redeem) | bounce back to `/` |
//! | [`AuthError::Exchange`] | [`IdentityProvider::exchange_code`](crate::IdentityProvider::exchange_code) | bounce back to `/` |
//! | [`AuthError::ProfileFetch`] | [`IdentityProvider::fetch_profile`](crate::IdentityProvider::fetch_profile) | display-layer error, session kept |
//! | [`AuthError::MalformedProfile`] | [`UserProfile::parse`](crate::UserProfile::parse) | display-layer error, session kept |

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("anti-forgery state does not match an issued token")]
    StateMismatch,

    #[error("authorization code exchange failed: {0}")]
    Exchange(String),

    #[error("profile fetch failed: {0}")]
    ProfileFetch(String),

    #[error("malformed profile: {0}")]
    MalformedProfile(#[from] serde_json::Error),
}

impl AuthError {
    /// Whether the error ends the login attempt (as opposed to a display-layer failure).
    pub fn is_flow_failure(&self) -> bool {
        matches!(self, AuthError::StateMismatch | AuthError::Exchange(_))
    }
}
