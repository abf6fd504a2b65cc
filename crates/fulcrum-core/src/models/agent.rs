//! Agent domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Attributes;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AgentState {
    New,
    Connected,
    Disconnected,
    Error,
    Disabled,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::New => "New",
            AgentState::Connected => "Connected",
            AgentState::Disconnected => "Disconnected",
            AgentState::Error => "Error",
            AgentState::Disabled => "Disabled",
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "New" => Ok(AgentState::New),
            "Connected" => Ok(AgentState::Connected),
            "Disconnected" => Ok(AgentState::Disconnected),
            "Error" => Ok(AgentState::Error),
            "Disabled" => Ok(AgentState::Disabled),
            other => Err(format!("unknown agent state: {other}")),
        }
    }
}

/// A worker bound to exactly one provider and one agent type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub provider_id: Uuid,
    pub agent_type_id: Uuid,
    pub state: AgentState,
    pub country_code: Option<String>,
    pub attributes: Attributes,
    /// SHA-256 hex digest of the agent's bearer token.
    #[serde(skip_serializing, default)]
    pub token_hash: String,
    pub last_status_update: Option<DateTime<Utc>>,
    /// Plain bearer token, only present right after create / rotate.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAgent {
    pub name: String,
    pub provider_id: Uuid,
    pub agent_type_id: Uuid,
    pub country_code: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
    /// Filled in by the commander; never taken from a request body.
    #[serde(skip)]
    pub token_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateAgent {
    pub name: Option<String>,
    pub agent_type_id: Option<Uuid>,
    pub country_code: Option<String>,
    pub attributes: Option<Attributes>,
}
