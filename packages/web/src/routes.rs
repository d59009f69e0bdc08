//! # HTTP surface
//!
//! | Route | Behavior |
//! |-------|----------|
//! | `GET /` | entry page with a login link |
//! | `GET /login` | 307 to the provider; records the per-login state in the browser's session |
//! | `GET /callback` | validates `state`, exchanges `code`, sets `session_token`; any failure is a 307 back to `/` |
//! | `GET /logout` | expired `session_token`, 307 to `/` |
//! | `GET /dashboard` | behind [`require_session`]; profile fields, 500 when the profile cannot be loaded |
//! | `GET /healthz` | liveness check |

use auth::{PendingLogin, PENDING_LOGIN_KEY};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Extension, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tower_sessions::Session;

use crate::app::AppState;
use crate::guard::{require_session, SessionToken};
use crate::sessions;
use crate::settings::PostLogin;
use crate::views::Page;

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    state: Option<String>,
    code: Option<String>,
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/dashboard", get(dashboard))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/", get(home))
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/logout", get(logout))
        .route("/healthz", get(healthz))
        .merge(protected)
        .layer(state.sessions.clone())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn home(State(state): State<AppState>) -> Page {
    state.views.home()
}

async fn healthz() -> &'static str {
    "ok"
}

async fn login(State(state): State<AppState>, session: Session) -> Response {
    let login = state.flow.issue_login();
    if let Some(pending) = &login.state.pending {
        if let Err(e) = session.insert(PENDING_LOGIN_KEY, pending).await {
            tracing::error!(error = %e, "could not record pending login");
            return Redirect::temporary("/").into_response();
        }
    }
    Redirect::temporary(login.url.as_str()).into_response()
}

async fn callback(
    State(state): State<AppState>,
    session: Session,
    jar: CookieJar,
    query: Result<Query<CallbackParams>, QueryRejection>,
) -> Response {
    // Taken before anything else so a pending login is never redeemable twice.
    let pending = match session.remove::<PendingLogin>(PENDING_LOGIN_KEY).await {
        Ok(pending) => pending,
        Err(e) => {
            tracing::warn!(error = %e, "could not read pending login");
            None
        }
    };

    let params = match query {
        Ok(Query(params)) => params,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "malformed callback query, returning to entry page");
            return Redirect::temporary("/").into_response();
        }
    };

    let auth = match state
        .flow
        .receive_callback(
            params.state.as_deref(),
            params.code.as_deref(),
            pending.as_ref(),
        )
        .await
    {
        Ok(auth) => auth,
        Err(e) if e.is_flow_failure() => {
            tracing::warn!(error = %e, "login rejected, returning to entry page");
            return Redirect::temporary("/").into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "login failed, returning to entry page");
            return Redirect::temporary("/").into_response();
        }
    };

    let jar = match sessions::establish(&state.flow, &session, jar, state.cookie_secure, &auth).await {
        Ok(jar) => jar,
        Err(e) => {
            tracing::error!(error = %e, "could not establish session");
            return Redirect::temporary("/").into_response();
        }
    };

    match state.post_login {
        PostLogin::Dashboard => (jar, Redirect::temporary("/dashboard")).into_response(),
        PostLogin::Profile => {
            let page = match state.flow.fetch_raw_profile(&auth.token).await {
                Ok(raw) => state.views.profile(&raw),
                Err(e) => {
                    tracing::warn!(error = %e, "signed in but profile is unavailable");
                    state.views.profile_unavailable()
                }
            };
            (jar, page).into_response()
        }
    }
}

async fn logout(State(state): State<AppState>, session: Session, jar: CookieJar) -> (CookieJar, Redirect) {
    let jar = sessions::end(&state.flow, &session, jar, state.cookie_secure).await;
    tracing::info!("logged out");
    (jar, Redirect::temporary("/"))
}

async fn dashboard(
    State(state): State<AppState>,
    Extension(SessionToken(token)): Extension<SessionToken>,
) -> Response {
    match state.flow.fetch_profile(&token).await {
        Ok(profile) => state.views.dashboard(&profile).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "dashboard profile unavailable");
            (StatusCode::INTERNAL_SERVER_ERROR, "Could not load user profile").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use auth::url::Url;
    use auth::{
        AccessToken, AntiForgery, AuthError, FlowController, IdentityProvider, SessionMode,
        SESSION_COOKIE, STATE_COOKIE,
    };
    use axum::body::Body;
    use axum::http::{header, Request};
    use axum_extra::extract::cookie::Cookie;
    use std::sync::{Arc, Mutex};
    use time::{Duration, OffsetDateTime};
    use tower::ServiceExt;

    use crate::sessions::DEFAULT_MAX_SESSIONS;
    use crate::views::Views;

    #[derive(Default)]
    struct StubProvider {
        exchanged: Mutex<Vec<String>>,
        fail_exchange: bool,
        profile: Option<&'static str>,
    }

    #[async_trait]
    impl IdentityProvider for StubProvider {
        fn authorization_url(&self, state: &str, extra_params: &[(String, String)]) -> Url {
            let mut url = Url::parse("https://accounts.test/o/oauth2/auth").unwrap();
            url.query_pairs_mut().append_pair("state", state);
            for (k, v) in extra_params {
                url.query_pairs_mut().append_pair(k, v);
            }
            url
        }

        async fn exchange_code(&self, code: &str) -> auth::Result<AccessToken> {
            self.exchanged.lock().unwrap().push(code.to_string());
            if self.fail_exchange {
                Err(AuthError::Exchange("invalid_grant".into()))
            } else {
                Ok(AccessToken::new("tok123".to_string()))
            }
        }

        async fn fetch_profile(&self, _token: &AccessToken) -> auth::Result<Vec<u8>> {
            self.profile
                .map(|p| p.as_bytes().to_vec())
                .ok_or_else(|| AuthError::ProfileFetch("connection refused".into()))
        }
    }

    const PROFILE: &str = r#"{"id":"42","name":"Ada Lovelace","given_name":"Ada","family_name":"Lovelace","picture":"https://example.com/a.png"}"#;

    fn app_with_capacity(
        provider: Arc<StubProvider>,
        anti_forgery: AntiForgery,
        mode: SessionMode,
        post_login: PostLogin,
        max_sessions: usize,
    ) -> Router {
        let flow = FlowController::new(provider, anti_forgery, mode);
        router(AppState::with_cookies(
            Arc::new(flow),
            Arc::new(Views::new().unwrap()),
            post_login,
            false,
            max_sessions,
        ))
    }

    fn app_with(
        provider: Arc<StubProvider>,
        anti_forgery: AntiForgery,
        mode: SessionMode,
        post_login: PostLogin,
    ) -> Router {
        app_with_capacity(provider, anti_forgery, mode, post_login, DEFAULT_MAX_SESSIONS)
    }

    fn fixed_app(provider: Arc<StubProvider>, post_login: PostLogin) -> Router {
        app_with(provider, AntiForgery::fixed("random"), SessionMode::Bearer, post_login)
    }

    fn per_login_app(provider: Arc<StubProvider>) -> Router {
        app_with(provider, AntiForgery::PerLogin, SessionMode::Opaque, PostLogin::Dashboard)
    }

    async fn get(app: Router, uri: &str, cookie: Option<&str>) -> Response {
        let mut request = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        app.oneshot(request.body(Body::empty()).unwrap()).await.unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    fn set_cookie(response: &Response, name: &str) -> Option<Cookie<'static>> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| Cookie::parse(v.to_string()).ok())
            .find(|c| c.name() == name)
    }

    fn cookie_header(cookie: &Cookie<'_>) -> String {
        format!("{}={}", cookie.name(), cookie.value())
    }

    fn state_param(response: &Response) -> String {
        location(response)
            .split(['?', '&'])
            .find_map(|part| part.strip_prefix("state="))
            .unwrap()
            .to_string()
    }

    /// Start a login from a fresh browser; returns its session cookie and the state.
    async fn start_login(app: &Router) -> (String, String) {
        let response = get(app.clone(), "/login", None).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let cookie = set_cookie(&response, SESSION_COOKIE).unwrap();
        (cookie_header(&cookie), state_param(&response))
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_home_renders() {
        let app = fixed_app(Arc::new(StubProvider::default()), PostLogin::Profile);
        let response = get(app, "/", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("/login"));
    }

    #[tokio::test]
    async fn test_login_redirects_to_provider() {
        let app = fixed_app(Arc::new(StubProvider::default()), PostLogin::Profile);
        let response = get(app, "/login", None).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let target = location(&response);
        assert!(target.starts_with("https://accounts.test/o/oauth2/auth?"));
        assert!(target.contains("state=random"));
        assert!(target.contains("prompt=select_account"));
        assert!(set_cookie(&response, STATE_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_callback_sets_session_cookie() {
        let provider = Arc::new(StubProvider {
            profile: Some(PROFILE),
            ..Default::default()
        });
        let app = fixed_app(provider.clone(), PostLogin::Profile);

        let before = OffsetDateTime::now_utc();
        let response = get(app, "/callback?state=random&code=abc", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = set_cookie(&response, SESSION_COOKIE).unwrap();
        assert_eq!(cookie.value(), "tok123");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        let expires = cookie.expires_datetime().unwrap();
        let ttl = expires - before;
        assert!(ttl > Duration::seconds(3590) && ttl <= Duration::seconds(3605));

        let body = body_text(response).await;
        assert!(body.contains("Ada Lovelace"));
        assert!(body.contains("given_name"));
        assert_eq!(*provider.exchanged.lock().unwrap(), vec!["abc".to_string()]);
    }

    #[tokio::test]
    async fn test_callback_dashboard_variant_redirects() {
        let app = fixed_app(Arc::new(StubProvider::default()), PostLogin::Dashboard);
        let response = get(app, "/callback?state=random&code=abc", None).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/dashboard");
        assert!(set_cookie(&response, SESSION_COOKIE).is_some());
    }

    #[tokio::test]
    async fn test_callback_profile_failure_keeps_session() {
        let app = fixed_app(Arc::new(StubProvider::default()), PostLogin::Profile);
        let response = get(app, "/callback?state=random&code=abc", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(set_cookie(&response, SESSION_COOKIE).unwrap().value(), "tok123");
        assert!(body_text(response).await.contains("could not be loaded"));
    }

    #[tokio::test]
    async fn test_forged_state_redirects_without_exchange() {
        let provider = Arc::new(StubProvider::default());
        let app = fixed_app(provider.clone(), PostLogin::Profile);

        let response = get(app, "/callback?state=forged&code=abc", None).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/");
        assert!(set_cookie(&response, SESSION_COOKIE).is_none());
        assert!(provider.exchanged.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_callback_query_redirects_home() {
        let provider = Arc::new(StubProvider::default());
        let app = fixed_app(provider.clone(), PostLogin::Profile);

        for uri in [
            "/callback?state=forged&state=random&code=abc",
            "/callback?state=random&code=abc&code=def",
        ] {
            let response = get(app.clone(), uri, None).await;
            assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
            assert_eq!(location(&response), "/");
            assert!(set_cookie(&response, SESSION_COOKIE).is_none());
            assert!(body_text(response).await.is_empty());
        }
        assert!(provider.exchanged.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exchange_failure_redirects_without_cookie() {
        let provider = Arc::new(StubProvider {
            fail_exchange: true,
            ..Default::default()
        });
        let app = fixed_app(provider, PostLogin::Profile);

        let response = get(app, "/callback?state=random&code=abc", None).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/");
        assert!(set_cookie(&response, SESSION_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_logout_expires_cookie_idempotently() {
        let app = fixed_app(Arc::new(StubProvider::default()), PostLogin::Profile);
        let now = OffsetDateTime::now_utc();

        for cookie in [Some("session_token=tok123"), None] {
            let response = get(app.clone(), "/logout", cookie).await;
            assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
            assert_eq!(location(&response), "/");
            let revoked = set_cookie(&response, SESSION_COOKIE).unwrap();
            assert_eq!(revoked.value(), "");
            assert_eq!(revoked.path(), Some("/"));
            assert!(revoked.expires_datetime().unwrap() < now);
        }
    }

    #[tokio::test]
    async fn test_dashboard_without_cookie_redirects_to_login() {
        let app = fixed_app(Arc::new(StubProvider::default()), PostLogin::Profile);
        let response = get(app.clone(), "/dashboard", None).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/login");

        let response = get(app, "/dashboard", Some("session_token=")).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn test_dashboard_renders_profile() {
        let provider = Arc::new(StubProvider {
            profile: Some(PROFILE),
            ..Default::default()
        });
        let app = fixed_app(provider, PostLogin::Profile);
        let response = get(app, "/dashboard", Some("session_token=tok123")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("<strong>Given Name:</strong> Ada"));
        assert!(body.contains("<strong>Family Name:</strong> Lovelace"));
    }

    #[tokio::test]
    async fn test_dashboard_profile_failure_is_500() {
        let app = fixed_app(Arc::new(StubProvider::default()), PostLogin::Profile);
        let response = get(app, "/dashboard", Some("session_token=tok123")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_opaque_session_unknown_id_redirects() {
        let app = app_with(
            Arc::new(StubProvider::default()),
            AntiForgery::fixed("random"),
            SessionMode::Opaque,
            PostLogin::Profile,
        );
        let response = get(app, "/dashboard", Some("session_token=tok123")).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn test_per_login_round_trip() {
        let provider = Arc::new(StubProvider {
            profile: Some(PROFILE),
            ..Default::default()
        });
        let app = per_login_app(provider.clone());
        let (login_cookie, state) = start_login(&app).await;
        let uri = format!("/callback?state={}&code=abc", state);

        // Without the browser's session the callback is rejected.
        let response = get(app.clone(), &uri, None).await;
        assert_eq!(location(&response), "/");
        assert!(provider.exchanged.lock().unwrap().is_empty());

        let response = get(app.clone(), &uri, Some(&login_cookie)).await;
        assert_eq!(location(&response), "/dashboard");
        let session = set_cookie(&response, SESSION_COOKIE).unwrap();
        assert_eq!(session.http_only(), Some(true));
        assert_eq!(session.path(), Some("/"));
        assert_ne!(session.value(), "tok123");
        let session_header = cookie_header(&session);
        assert_ne!(session_header, login_cookie);

        // The state is single use.
        for cookie in [&login_cookie, &session_header] {
            let response = get(app.clone(), &uri, Some(cookie)).await;
            assert_eq!(location(&response), "/");
        }
        assert_eq!(provider.exchanged.lock().unwrap().len(), 1);

        let response = get(app.clone(), "/dashboard", Some(&session_header)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = get(app.clone(), "/logout", Some(&session_header)).await;
        assert_eq!(location(&response), "/");
        let response = get(app, "/dashboard", Some(&session_header)).await;
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn test_state_from_another_browser_rejected() {
        let provider = Arc::new(StubProvider::default());
        let app = per_login_app(provider.clone());
        let (_, state_a) = start_login(&app).await;
        let (cookie_b, _) = start_login(&app).await;

        let uri = format!("/callback?state={}&code=abc", state_a);
        let response = get(app, &uri, Some(&cookie_b)).await;
        assert_eq!(location(&response), "/");
        assert!(provider.exchanged.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_new_login_replaces_pending_state() {
        let provider = Arc::new(StubProvider::default());
        let app = per_login_app(provider.clone());
        let (cookie, first_state) = start_login(&app).await;

        let response = get(app.clone(), "/login", Some(&cookie)).await;
        assert_ne!(state_param(&response), first_state);

        let uri = format!("/callback?state={}&code=abc", first_state);
        let response = get(app, &uri, Some(&cookie)).await;
        assert_eq!(location(&response), "/");
        assert!(provider.exchanged.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pending_logins_are_bounded() {
        let provider = Arc::new(StubProvider::default());
        let app = app_with_capacity(
            provider.clone(),
            AntiForgery::PerLogin,
            SessionMode::Opaque,
            PostLogin::Dashboard,
            2,
        );
        let (oldest_cookie, oldest_state) = start_login(&app).await;
        start_login(&app).await;
        let (newest_cookie, newest_state) = start_login(&app).await;

        let uri = format!("/callback?state={}&code=abc", oldest_state);
        let response = get(app.clone(), &uri, Some(&oldest_cookie)).await;
        assert_eq!(location(&response), "/");
        assert!(provider.exchanged.lock().unwrap().is_empty());

        let uri = format!("/callback?state={}&code=abc", newest_state);
        let response = get(app, &uri, Some(&newest_cookie)).await;
        assert_eq!(location(&response), "/dashboard");
    }

    #[tokio::test]
    async fn test_bearer_mode_keeps_pending_state_in_its_own_cookie() {
        let provider = Arc::new(StubProvider::default());
        let app = app_with(
            provider.clone(),
            AntiForgery::PerLogin,
            SessionMode::Bearer,
            PostLogin::Dashboard,
        );

        let response = get(app.clone(), "/login", None).await;
        assert!(set_cookie(&response, SESSION_COOKIE).is_none());
        let pending = set_cookie(&response, STATE_COOKIE).unwrap();
        let uri = format!("/callback?state={}&code=abc", state_param(&response));

        let response = get(app, &uri, Some(&cookie_header(&pending))).await;
        assert_eq!(location(&response), "/dashboard");
        assert_eq!(set_cookie(&response, SESSION_COOKIE).unwrap().value(), "tok123");
        assert_eq!(provider.exchanged.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_healthz() {
        let app = fixed_app(Arc::new(StubProvider::default()), PostLogin::Profile);
        let response = get(app, "/healthz", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ok");
    }
}
