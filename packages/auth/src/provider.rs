//! # Identity provider client: the authorization-code grant
//!
//! [`ProviderClient`] wraps the three calls the sign-in flow makes against the
//! identity provider. They sit behind the [`IdentityProvider`] trait so the flow
//! controller can be driven by a substitute provider.
//!
//! 1. **[`authorization_url`](IdentityProvider::authorization_url)**: pure URL
//!    construction: client id, redirect URI, scopes, the anti-forgery token as
//!    `state`, plus any extra parameters (`prompt=select_account`).
//! 2. **[`exchange_code`](IdentityProvider::exchange_code)**: one POST to the token
//!    endpoint. Any failure is reported as [`AuthError::Exchange`]. Codes are single
//!    use, so nothing is retried here.
//! 3. **[`fetch_profile`](IdentityProvider::fetch_profile)**: GET on the userinfo
//!    endpoint with the access token. Returns the raw body; parsing belongs to
//!    [`UserProfile::parse`](crate::UserProfile::parse) so transport failures and
//!    shape failures stay distinguishable.
//!
//! Outbound requests share one `reqwest::Client` with a request timeout and
//! redirects disabled. Dropping the calling future aborts the request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::url::Url;
use oauth2::{
    AccessToken, AuthorizationCode, CsrfToken, EndpointNotSet, EndpointSet, TokenResponse,
};

use crate::config::ClientCredentials;
use crate::error::{AuthError, Result};

/// Default deadline for every outbound provider call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// The provider-facing half of the sign-in flow.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Build the URL the browser is redirected to. No side effects.
    fn authorization_url(&self, state: &str, extra_params: &[(String, String)]) -> Url;

    /// Exchange an authorization code for an access token.
    async fn exchange_code(&self, code: &str) -> Result<AccessToken>;

    /// Fetch the raw userinfo document for `token`.
    async fn fetch_profile(&self, token: &AccessToken) -> Result<Vec<u8>>;
}

/// HTTP implementation of [`IdentityProvider`].
#[derive(Debug, Clone)]
pub struct ProviderClient {
    credentials: Arc<ClientCredentials>,
    http: reqwest::Client,
}

impl ProviderClient {
    /// Create a client whose outbound calls give up after `timeout`.
    pub fn new(credentials: Arc<ClientCredentials>, timeout: Duration) -> Result<Self> {
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Config(format!("failed to build http client: {}", e)))?;
        Ok(Self { credentials, http })
    }

    fn oauth_client(&self) -> ConfiguredClient {
        let creds = &self.credentials;
        BasicClient::new(creds.client_id.clone())
            .set_client_secret(creds.client_secret.clone())
            .set_auth_uri(creds.endpoints.auth_url.clone())
            .set_token_uri(creds.endpoints.token_url.clone())
            .set_redirect_uri(creds.redirect_url.clone())
    }
}

#[async_trait]
impl IdentityProvider for ProviderClient {
    fn authorization_url(&self, state: &str, extra_params: &[(String, String)]) -> Url {
        let client = self.oauth_client();
        let mut request = client
            .authorize_url(|| CsrfToken::new(state.to_string()))
            .add_scopes(self.credentials.scopes.iter().cloned());
        for (name, value) in extra_params {
            request = request.add_extra_param(name.clone(), value.clone());
        }
        let (url, _) = request.url();
        url
    }

    async fn exchange_code(&self, code: &str) -> Result<AccessToken> {
        let client = self.oauth_client();
        let token = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| AuthError::Exchange(e.to_string()))?;

        tracing::debug!("authorization code exchanged");
        Ok(token.access_token().clone())
    }

    async fn fetch_profile(&self, token: &AccessToken) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(self.credentials.endpoints.userinfo_url.as_str())
            .query(&[("access_token", token.secret().as_str())])
            .send()
            .await
            .map_err(|e| AuthError::ProfileFetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| AuthError::ProfileFetch(e.to_string()))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| AuthError::ProfileFetch(e.to_string()))?;
        Ok(body.to_vec())
    }
}
