//! # auth: authorization-code sign-in against an identity provider
//!
//! This crate holds the sign-in state machine used by the `web` server. It is free of
//! any HTTP framework: the server maps its results onto redirects and cookies.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | [`ClientCredentials`] and provider endpoints, loaded once at startup |
//! | [`provider`] | [`ProviderClient`]: authorization URL, code exchange, userinfo fetch |
//! | [`state`] | [`AntiForgery`]: issue and redeem the `state` parameter, [`PendingLogin`] |
//! | [`session`] | [`SessionMode`] and the bearer [`SessionCodec`] for the `session_token` cookie |
//! | [`flow`] | [`FlowController`]: login, callback, logout, profile retrieval |
//! | [`profile`] | [`UserProfile`]: typed view of the userinfo document |
//! | [`error`] | [`AuthError`] taxonomy |

pub mod config;
pub mod error;
pub mod flow;
pub mod profile;
pub mod provider;
pub mod session;
pub mod state;

pub use config::{ClientCredentials, ProviderEndpoints};
pub use error::{AuthError, Result};
pub use flow::{Authenticated, FlowController, LoginRedirect};
pub use oauth2::url;
pub use oauth2::AccessToken;
pub use profile::UserProfile;
pub use provider::{IdentityProvider, ProviderClient};
pub use session::{SessionCodec, SessionCredential, SessionMode, ACCESS_TOKEN_KEY, SESSION_COOKIE};
pub use state::{AntiForgery, IssuedState, PendingLogin, StateMode, PENDING_LOGIN_KEY, STATE_COOKIE};
