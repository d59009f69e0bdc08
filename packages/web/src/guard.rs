//! Session guard for protected routes.
//!
//! Attach with `route_layer(middleware::from_fn_with_state(state, require_session))`.
//! A request without a live session is redirected (307) to `/login` and never
//! reaches the handler. Otherwise the recovered access token is placed in the
//! request extensions as [`SessionToken`].

use auth::AccessToken;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use tower_sessions::Session;

use crate::app::AppState;
use crate::sessions;

/// Access token of the current session, inserted by [`require_session`].
#[derive(Debug, Clone)]
pub struct SessionToken(pub AccessToken);

pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    match sessions::current_token(&state.flow, &session, &jar).await {
        Some(token) => {
            request.extensions_mut().insert(SessionToken(token));
            next.run(request).await
        }
        None => {
            tracing::debug!(path = %request.uri().path(), "no session, redirecting to login");
            Redirect::temporary("/login").into_response()
        }
    }
}
