//! HTML pages, rendered with Handlebars (values are HTML-escaped).

use auth::UserProfile;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use handlebars::{Handlebars, RenderError, TemplateError};
use serde_json::json;

pub type Page = Result<Html<String>, ViewError>;

/// A template failed to render; answered with a bare 500.
#[derive(Debug)]
pub struct ViewError(RenderError);

impl IntoResponse for ViewError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "template rendering failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}

pub struct Views {
    registry: Handlebars<'static>,
}

impl Views {
    pub fn new() -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_partial("layout", include_str!("../../templates/layout.hbs"))?;
        registry.register_template_string("home", include_str!("../../templates/home.hbs"))?;
        registry.register_template_string("profile", include_str!("../../templates/profile.hbs"))?;
        registry.register_template_string("dashboard", include_str!("../../templates/dashboard.hbs"))?;
        Ok(Self { registry })
    }

    fn render(&self, name: &str, data: &serde_json::Value) -> Page {
        self.registry.render(name, data).map(Html).map_err(ViewError)
    }

    pub fn home(&self) -> Page {
        self.render("home", &json!({}))
    }

    /// The userinfo document as the provider sent it, pretty-printed when it is JSON.
    pub fn profile(&self, raw: &[u8]) -> Page {
        let text = match serde_json::from_slice::<serde_json::Value>(raw) {
            Ok(value) => serde_json::to_string_pretty(&value)
                .unwrap_or_else(|_| String::from_utf8_lossy(raw).into_owned()),
            Err(_) => String::from_utf8_lossy(raw).into_owned(),
        };
        self.render("profile", &json!({ "document": text }))
    }

    /// Profile page variant shown when the userinfo call failed after sign-in.
    pub fn profile_unavailable(&self) -> Page {
        self.render("profile", &json!({ "document": null }))
    }

    pub fn dashboard(&self, profile: &UserProfile) -> Page {
        self.render(
            "dashboard",
            &json!({
                "id": profile.id,
                "name": profile.name,
                "given_name": profile.given_name,
                "family_name": profile.family_name,
                "picture": profile.picture,
                "display_name": profile.display_name(),
            }),
        )
    }
}
