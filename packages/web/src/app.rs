//! Shared application state, built once from [`Settings`].

use std::sync::Arc;
use std::time::Duration;

use auth::{AntiForgery, ClientCredentials, FlowController, ProviderClient, ProviderEndpoints};
use tower_sessions::SessionManagerLayer;

use crate::sessions::{self, CappedStore, DEFAULT_MAX_SESSIONS};
use crate::settings::{PostLogin, Settings};
use crate::views::Views;

#[derive(Clone)]
pub struct AppState {
    pub flow: Arc<FlowController>,
    pub views: Arc<Views>,
    pub sessions: SessionManagerLayer<CappedStore>,
    pub cookie_secure: bool,
    pub post_login: PostLogin,
}

impl AppState {
    /// State with insecure (plain HTTP) cookies and the default session cap.
    pub fn new(flow: Arc<FlowController>, views: Arc<Views>, post_login: PostLogin) -> Self {
        Self::with_cookies(flow, views, post_login, false, DEFAULT_MAX_SESSIONS)
    }

    pub fn with_cookies(
        flow: Arc<FlowController>,
        views: Arc<Views>,
        post_login: PostLogin,
        cookie_secure: bool,
        max_sessions: usize,
    ) -> Self {
        Self {
            sessions: sessions::layer(flow.session_mode(), cookie_secure, max_sessions),
            flow,
            views,
            cookie_secure,
            post_login,
        }
    }

    /// Build the state from settings and the `GOOGLE_CLIENT_*` environment.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let endpoints = ProviderEndpoints::new(
            &settings.provider.auth_url,
            &settings.provider.token_url,
            &settings.provider.userinfo_url,
        )?;
        let credentials = ClientCredentials::from_env(&settings.auth.redirect_url, endpoints)?
            .with_scopes(settings.auth.scopes.iter().cloned());
        tracing::info!(client_id = %credentials.client_id.as_str(), "loaded client credentials");

        let provider = ProviderClient::new(
            Arc::new(credentials),
            Duration::from_secs(settings.provider.timeout_secs),
        )?;
        let flow = FlowController::new(
            Arc::new(provider),
            AntiForgery::from_mode(settings.auth.state_mode, &settings.auth.fixed_state),
            settings.auth.session_mode,
        )
        .with_select_account(settings.auth.select_account);

        let views = Views::new().map_err(|e| anyhow::anyhow!("failed to register templates: {}", e))?;
        Ok(Self::with_cookies(
            Arc::new(flow),
            Arc::new(views),
            settings.auth.post_login,
            settings.auth.cookie_secure,
            settings.auth.max_sessions,
        ))
    }
}
