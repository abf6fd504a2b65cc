//! Authentication configuration.

use serde::Deserialize;

/// Configuration for bearer authentication.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Static bearer value that always resolves to a global admin.
    /// `None` disables the bootstrap admin.
    pub bootstrap_admin_token: Option<String>,
    /// Name reported for the bootstrap admin identity.
    pub bootstrap_admin_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bootstrap_admin_token: None,
            bootstrap_admin_name: "bootstrap-admin".into(),
        }
    }
}
