use auth::config::{DEFAULT_SCOPE, GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL, GOOGLE_USERINFO_URL};
use auth::state::DEFAULT_FIXED_STATE;
use auth::{SessionMode, StateMode};
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::sessions::DEFAULT_MAX_SESSIONS;

#[derive(Debug, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

impl Server {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// What the callback does once the session cookie is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostLogin {
    /// Render the raw profile document (200).
    Profile,
    /// Redirect to `/dashboard` (307).
    Dashboard,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub redirect_url: String,
    pub scopes: Vec<String>,
    pub select_account: bool,
    pub state_mode: StateMode,
    pub fixed_state: String,
    pub session_mode: SessionMode,
    pub post_login: PostLogin,
    pub cookie_secure: bool,
    /// Sessions kept in memory before the oldest is evicted.
    pub max_sessions: usize,
}

#[derive(Debug, Deserialize)]
pub struct Provider {
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub auth: Auth,
    pub provider: Provider,
}

impl Settings {
    /// Defaults, then `config.toml` if present, then `APP_*` environment variables
    /// (`APP_AUTH__SESSION_MODE=bearer` sets `auth.session_mode`).
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(Some("config.toml"), Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix("APP")
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("auth.scopes")
            .try_parsing(true)
    }

    fn load(file: Option<&str>, environment: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 9090)?
            .set_default("auth.redirect_url", "http://localhost:9090/callback")?
            .set_default("auth.scopes", vec![DEFAULT_SCOPE])?
            .set_default("auth.select_account", true)?
            .set_default("auth.state_mode", "per_login")?
            .set_default("auth.fixed_state", DEFAULT_FIXED_STATE)?
            .set_default("auth.session_mode", "opaque")?
            .set_default("auth.post_login", "profile")?
            .set_default("auth.cookie_secure", false)?
            .set_default("auth.max_sessions", DEFAULT_MAX_SESSIONS as i64)?
            .set_default("provider.auth_url", GOOGLE_AUTH_URL)?
            .set_default("provider.token_url", GOOGLE_TOKEN_URL)?
            .set_default("provider.userinfo_url", GOOGLE_USERINFO_URL)?
            .set_default("provider.timeout_secs", 10)?;

        if let Some(file) = file {
            builder = builder.add_source(File::with_name(file).format(FileFormat::Toml).required(false));
        }

        builder.add_source(environment).build()?.try_deserialize()
    }
}
