//! # Client credentials: the immutable OAuth client configuration
//!
//! [`ClientCredentials`] is built once at startup and shared read-only (behind an
//! `Arc`) by the provider client and the flow controller. It is never stored in a
//! global.
//!
//! The client id and secret come from the process environment
//! (`GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`, with `.env` loaded through `dotenvy`).
//! A missing or empty value is an [`AuthError::Config`] and must abort startup.
//!
//! [`ProviderEndpoints`] defaults to Google's endpoints but can point anywhere,
//! which is how the tests aim the client at a mock server.

use oauth2::{AuthUrl, ClientId, ClientSecret, RedirectUrl, Scope, TokenUrl};
use oauth2::url::Url;

use crate::error::{AuthError, Result};

pub const CLIENT_ID_VAR: &str = "GOOGLE_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "GOOGLE_CLIENT_SECRET";

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/userinfo.profile";

/// Identity provider endpoints.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub auth_url: AuthUrl,
    pub token_url: TokenUrl,
    pub userinfo_url: Url,
}

impl ProviderEndpoints {
    pub fn new(auth_url: &str, token_url: &str, userinfo_url: &str) -> Result<Self> {
        Ok(Self {
            auth_url: AuthUrl::new(auth_url.to_string())
                .map_err(|e| AuthError::Config(format!("invalid authorization url: {}", e)))?,
            token_url: TokenUrl::new(token_url.to_string())
                .map_err(|e| AuthError::Config(format!("invalid token url: {}", e)))?,
            userinfo_url: Url::parse(userinfo_url)
                .map_err(|e| AuthError::Config(format!("invalid userinfo url: {}", e)))?,
        })
    }

    pub fn google() -> Result<Self> {
        Self::new(GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL, GOOGLE_USERINFO_URL)
    }
}

/// OAuth client configuration.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: ClientId,
    pub client_secret: ClientSecret,
    pub redirect_url: RedirectUrl,
    pub scopes: Vec<Scope>,
    pub endpoints: ProviderEndpoints,
}

impl ClientCredentials {
    /// Create credentials with the default profile scope.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: &str,
        endpoints: ProviderEndpoints,
    ) -> Result<Self> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        if client_id.trim().is_empty() {
            return Err(AuthError::Config(format!("{} is empty", CLIENT_ID_VAR)));
        }
        if client_secret.trim().is_empty() {
            return Err(AuthError::Config(format!("{} is empty", CLIENT_SECRET_VAR)));
        }

        Ok(Self {
            client_id: ClientId::new(client_id),
            client_secret: ClientSecret::new(client_secret),
            redirect_url: RedirectUrl::new(redirect_url.to_string())
                .map_err(|e| AuthError::Config(format!("invalid redirect url: {}", e)))?,
            scopes: vec![Scope::new(DEFAULT_SCOPE.to_string())],
            endpoints,
        })
    }

    /// Create credentials from `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET`.
    pub fn from_env(redirect_url: &str, endpoints: ProviderEndpoints) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok(), redirect_url, endpoints)
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        redirect_url: &str,
        endpoints: ProviderEndpoints,
    ) -> Result<Self> {
        let client_id = lookup(CLIENT_ID_VAR)
            .ok_or_else(|| AuthError::Config(format!("{} not set", CLIENT_ID_VAR)))?;
        let client_secret = lookup(CLIENT_SECRET_VAR)
            .ok_or_else(|| AuthError::Config(format!("{} not set", CLIENT_SECRET_VAR)))?;
        Self::new(client_id, client_secret, redirect_url, endpoints)
    }

    /// Builder method to replace the requested scopes.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(|s| Scope::new(s.into())).collect();
        self
    }
}
