//! User profile projection of the provider's userinfo document.

use serde::Deserialize;

use crate::error::Result;

/// Read-only view of the signed-in user, as reported by the provider.
///
/// `id` is mandatory. The name fields and picture are omitted by the provider for
/// some accounts and default to empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub picture: String,
}

impl UserProfile {
    /// Parse a raw userinfo body.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Display name, falling back to the given/family names and finally the id.
    pub fn display_name(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        let joined = format!("{} {}", self.given_name, self.family_name);
        let joined = joined.trim();
        if joined.is_empty() {
            self.id.clone()
        } else {
            joined.to_string()
        }
    }
}
