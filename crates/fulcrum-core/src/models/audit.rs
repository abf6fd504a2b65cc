//! Audit log domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Role;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthorityType {
    Admin,
    Participant,
    Agent,
    /// Background reconciliation (timeout sweep, agent health).
    System,
}

impl AuthorityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorityType::Admin => "Admin",
            AuthorityType::Participant => "Participant",
            AuthorityType::Agent => "Agent",
            AuthorityType::System => "System",
        }
    }
}

impl From<Role> for AuthorityType {
    fn from(role: Role) -> Self {
        match role {
            Role::Admin => AuthorityType::Admin,
            Role::Participant => AuthorityType::Participant,
            Role::Agent => AuthorityType::Agent,
        }
    }
}

impl FromStr for AuthorityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(AuthorityType::Admin),
            "Participant" => Ok(AuthorityType::Participant),
            "Agent" => Ok(AuthorityType::Agent),
            "System" => Ok(AuthorityType::System),
            other => Err(format!("unknown authority type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventType {
    ProviderCreated,
    ProviderUpdated,
    ProviderDeleted,
    AgentCreated,
    AgentUpdated,
    AgentDeleted,
    AgentStatusUpdated,
    AgentTokenRotated,
    AgentDisconnected,
    AgentTypeCreated,
    AgentTypeDeleted,
    ServiceTypeCreated,
    ServiceTypeDeleted,
    ServiceGroupCreated,
    ServiceGroupUpdated,
    ServiceGroupDeleted,
    ServiceCreated,
    ServiceUpdated,
    ServiceTransitioned,
    ServiceRetried,
    ServiceReleased,
    JobClaimed,
    JobCompleted,
    JobFailed,
    JobTimedOut,
    TokenCreated,
    TokenUpdated,
    TokenDeleted,
    TokenRegenerated,
    MetricTypeCreated,
    MetricTypeUpdated,
    MetricTypeDeleted,
}

impl EventType {
    const NAMES: [(EventType, &'static str); 32] = [
        (EventType::ProviderCreated, "ProviderCreated"),
        (EventType::ProviderUpdated, "ProviderUpdated"),
        (EventType::ProviderDeleted, "ProviderDeleted"),
        (EventType::AgentCreated, "AgentCreated"),
        (EventType::AgentUpdated, "AgentUpdated"),
        (EventType::AgentDeleted, "AgentDeleted"),
        (EventType::AgentStatusUpdated, "AgentStatusUpdated"),
        (EventType::AgentTokenRotated, "AgentTokenRotated"),
        (EventType::AgentDisconnected, "AgentDisconnected"),
        (EventType::AgentTypeCreated, "AgentTypeCreated"),
        (EventType::AgentTypeDeleted, "AgentTypeDeleted"),
        (EventType::ServiceTypeCreated, "ServiceTypeCreated"),
        (EventType::ServiceTypeDeleted, "ServiceTypeDeleted"),
        (EventType::ServiceGroupCreated, "ServiceGroupCreated"),
        (EventType::ServiceGroupUpdated, "ServiceGroupUpdated"),
        (EventType::ServiceGroupDeleted, "ServiceGroupDeleted"),
        (EventType::ServiceCreated, "ServiceCreated"),
        (EventType::ServiceUpdated, "ServiceUpdated"),
        (EventType::ServiceTransitioned, "ServiceTransitioned"),
        (EventType::ServiceRetried, "ServiceRetried"),
        (EventType::ServiceReleased, "ServiceReleased"),
        (EventType::JobClaimed, "JobClaimed"),
        (EventType::JobCompleted, "JobCompleted"),
        (EventType::JobFailed, "JobFailed"),
        (EventType::JobTimedOut, "JobTimedOut"),
        (EventType::TokenCreated, "TokenCreated"),
        (EventType::TokenUpdated, "TokenUpdated"),
        (EventType::TokenDeleted, "TokenDeleted"),
        (EventType::TokenRegenerated, "TokenRegenerated"),
        (EventType::MetricTypeCreated, "MetricTypeCreated"),
        (EventType::MetricTypeUpdated, "MetricTypeUpdated"),
        (EventType::MetricTypeDeleted, "MetricTypeDeleted"),
    ];

    pub fn as_str(&self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(event, _)| event == self)
            .map(|(_, name)| *name)
            .unwrap_or("Unknown")
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::NAMES
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(event, _)| *event)
            .ok_or_else(|| format!("unknown event type: {s}"))
    }
}

/// Immutable record of a state-changing action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub authority_type: AuthorityType,
    pub authority_id: String,
    pub event_type: EventType,
    pub properties: serde_json::Value,
    pub entity_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub broker_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditEntry {
    pub authority_type: AuthorityType,
    pub authority_id: String,
    pub event_type: EventType,
    pub properties: serde_json::Value,
    pub entity_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub broker_id: Option<Uuid>,
}
