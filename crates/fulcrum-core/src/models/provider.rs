//! Provider domain model.
//!
//! Providers are the top-level tenants. A provider owns agents and the
//! tokens scoped to it, and may also act as a broker that owns service
//! groups.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Attributes;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ProviderState {
    #[default]
    Enabled,
    Disabled,
}

impl ProviderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderState::Enabled => "Enabled",
            ProviderState::Disabled => "Disabled",
        }
    }
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Enabled" => Ok(ProviderState::Enabled),
            "Disabled" => Ok(ProviderState::Disabled),
            other => Err(format!("unknown provider state: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: Uuid,
    pub name: String,
    pub state: ProviderState,
    pub country_code: Option<String>,
    pub attributes: Attributes,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProvider {
    pub name: String,
    #[serde(default)]
    pub state: ProviderState,
    pub country_code: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateProvider {
    pub name: Option<String>,
    pub state: Option<ProviderState>,
    pub country_code: Option<String>,
    pub attributes: Option<Attributes>,
}
