//! Service group domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Logical grouping of services owned by a broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceGroup {
    pub id: Uuid,
    pub name: String,
    pub broker_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateServiceGroup {
    pub name: String,
    pub broker_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateServiceGroup {
    pub name: Option<String>,
}
