//! Metric type and metric entry models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MetricEntityType {
    Agent,
    Service,
    Resource,
}

impl MetricEntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricEntityType::Agent => "Agent",
            MetricEntityType::Service => "Service",
            MetricEntityType::Resource => "Resource",
        }
    }
}

impl fmt::Display for MetricEntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricEntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Agent" => Ok(MetricEntityType::Agent),
            "Service" => Ok(MetricEntityType::Service),
            "Resource" => Ok(MetricEntityType::Resource),
            other => Err(format!("unknown metric entity type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricType {
    pub id: Uuid,
    pub name: String,
    pub entity_type: MetricEntityType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMetricType {
    pub name: String,
    pub entity_type: MetricEntityType,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateMetricType {
    pub name: Option<String>,
}

/// One measurement reported by an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricEntry {
    pub id: Uuid,
    pub type_id: Uuid,
    pub agent_id: Uuid,
    pub service_id: Uuid,
    pub provider_id: Uuid,
    pub broker_id: Uuid,
    pub resource_id: String,
    pub value: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMetricEntry {
    pub type_id: Uuid,
    pub agent_id: Uuid,
    pub service_id: Uuid,
    pub provider_id: Uuid,
    pub broker_id: Uuid,
    pub resource_id: String,
    pub value: f64,
}
