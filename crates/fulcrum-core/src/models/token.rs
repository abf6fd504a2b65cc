//! Token domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Role;

/// An issued bearer credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    /// Provider id for participant tokens, agent id for agent tokens.
    pub scope_id: Option<Uuid>,
    /// Resolved ownership chain used for authorization.
    pub provider_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub expire_at: DateTime<Utc>,
    /// SHA-256 hex digest of the plain value.
    #[serde(skip_serializing, default)]
    pub hashed_value: String,
    /// Only populated on create and regenerate; never persisted.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub plain_value: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Token {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expire_at <= now
    }
}

/// Input for persisting a token; the hash is computed by the caller.
#[derive(Debug, Clone)]
pub struct CreateToken {
    pub name: String,
    pub role: Role,
    pub scope_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub expire_at: DateTime<Utc>,
    pub hashed_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateToken {
    pub name: Option<String>,
    pub expire_at: Option<DateTime<Utc>>,
}
