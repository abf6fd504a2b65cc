//! Agent type catalog model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A kind of agent and the service types it is able to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentType {
    pub id: Uuid,
    pub name: String,
    pub service_type_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentType {
    pub fn supports(&self, service_type_id: Uuid) -> bool {
        self.service_type_ids.contains(&service_type_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAgentType {
    pub name: String,
    #[serde(default)]
    pub service_type_ids: Vec<Uuid>,
}
