//! Service domain model and state machine.
//!
//! A service has a stable `current_state` and, while a job is in
//! flight, a `target_state`. The functions in this module decide which
//! transitions are legal; persisting them is done by the repository
//! with guarded updates so concurrent requests cannot both win.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Attributes;
use crate::error::{FulcrumError, FulcrumResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ServiceState {
    Created,
    Started,
    Stopped,
    Deleted,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Created => "Created",
            ServiceState::Started => "Started",
            ServiceState::Stopped => "Stopped",
            ServiceState::Deleted => "Deleted",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(ServiceState::Created),
            "Started" => Ok(ServiceState::Started),
            "Stopped" => Ok(ServiceState::Stopped),
            "Deleted" => Ok(ServiceState::Deleted),
            other => Err(format!("unknown service state: {other}")),
        }
    }
}

/// Work an agent performs to move a service between states.
/// Also used as the job action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ServiceAction {
    Create,
    Start,
    Stop,
    Delete,
    Update,
}

impl ServiceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceAction::Create => "Create",
            ServiceAction::Start => "Start",
            ServiceAction::Stop => "Stop",
            ServiceAction::Delete => "Delete",
            ServiceAction::Update => "Update",
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Create" => Ok(ServiceAction::Create),
            "Start" => Ok(ServiceAction::Start),
            "Stop" => Ok(ServiceAction::Stop),
            "Delete" => Ok(ServiceAction::Delete),
            "Update" => Ok(ServiceAction::Update),
            other => Err(format!("unknown service action: {other}")),
        }
    }
}

/// Externally visible lifecycle phase, derived from the persisted fields.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ServicePhase {
    Creating,
    Starting,
    Stopping,
    Deleting,
    Updating,
    Failed,
    Created,
    Started,
    Stopped,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub agent_id: Uuid,
    pub service_type_id: Uuid,
    pub group_id: Uuid,
    pub provider_id: Uuid,
    pub broker_id: Uuid,
    /// Identifier assigned by the agent once the service exists remotely.
    pub external_id: Option<String>,
    pub attributes: Attributes,
    pub current_state: ServiceState,
    /// Present only while a job is in flight.
    pub target_state: Option<ServiceState>,
    pub current_properties: Option<serde_json::Value>,
    pub target_properties: Option<serde_json::Value>,
    /// Agent-reported resources.
    pub resources: Option<serde_json::Value>,
    pub failed_action: Option<ServiceAction>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A legal transition computed from a service snapshot.
///
/// `expected_current` is used as the guard of the persisted update, so a
/// plan computed from a stale snapshot simply fails to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub action: ServiceAction,
    pub expected_current: ServiceState,
    pub target: ServiceState,
    pub target_properties: Option<serde_json::Value>,
}

fn transition_action(from: ServiceState, to: ServiceState) -> Option<ServiceAction> {
    use ServiceState::*;
    match (from, to) {
        (Created, Started) | (Stopped, Started) => Some(ServiceAction::Start),
        (Started, Stopped) => Some(ServiceAction::Stop),
        (Created, Deleted) | (Stopped, Deleted) => Some(ServiceAction::Delete),
        _ => None,
    }
}

impl Service {
    pub fn in_flight(&self) -> bool {
        self.target_state.is_some()
    }

    pub fn is_failed(&self) -> bool {
        self.failed_action.is_some()
    }

    pub fn phase(&self) -> ServicePhase {
        if let Some(target) = self.target_state {
            if self.target_properties.is_some() && target == self.current_state {
                return match self.current_state {
                    ServiceState::Created if self.current_properties.is_none() => {
                        ServicePhase::Creating
                    }
                    _ => ServicePhase::Updating,
                };
            }
            return match target {
                ServiceState::Created => ServicePhase::Creating,
                ServiceState::Started => ServicePhase::Starting,
                ServiceState::Stopped => ServicePhase::Stopping,
                ServiceState::Deleted => ServicePhase::Deleting,
            };
        }
        if self.is_failed() {
            return ServicePhase::Failed;
        }
        match self.current_state {
            ServiceState::Created => ServicePhase::Created,
            ServiceState::Started => ServicePhase::Started,
            ServiceState::Stopped => ServicePhase::Stopped,
            ServiceState::Deleted => ServicePhase::Deleted,
        }
    }

    /// The action of the transition in flight, if any.
    pub fn in_flight_action(&self) -> Option<ServiceAction> {
        match self.phase() {
            ServicePhase::Creating => Some(ServiceAction::Create),
            ServicePhase::Updating => Some(ServiceAction::Update),
            ServicePhase::Starting => Some(ServiceAction::Start),
            ServicePhase::Stopping => Some(ServiceAction::Stop),
            ServicePhase::Deleting => Some(ServiceAction::Delete),
            _ => None,
        }
    }

    fn ensure_idle(&self) -> FulcrumResult<()> {
        if let Some(target) = self.target_state {
            return Err(FulcrumError::invalid_state(format!(
                "service {} already has a transition to {target} in flight",
                self.id
            )));
        }
        if self.current_state == ServiceState::Deleted {
            return Err(FulcrumError::invalid_state(format!(
                "service {} is deleted",
                self.id
            )));
        }
        Ok(())
    }

    /// Plans a state change requested by a caller.
    pub fn plan_transition(&self, target: ServiceState) -> FulcrumResult<TransitionPlan> {
        self.ensure_idle()?;

        if self.failed_action == Some(ServiceAction::Create) && target != ServiceState::Deleted {
            return Err(FulcrumError::invalid_state(format!(
                "service {} was never provisioned; retry creation or delete it",
                self.id
            )));
        }

        let action = transition_action(self.current_state, target).ok_or_else(|| {
            FulcrumError::invalid_state(format!(
                "cannot transition service {} from {} to {target}",
                self.id, self.current_state
            ))
        })?;

        Ok(TransitionPlan {
            action,
            expected_current: self.current_state,
            target,
            target_properties: None,
        })
    }

    /// Plans a properties change that the agent has to reconcile.
    pub fn plan_update(&self, properties: serde_json::Value) -> FulcrumResult<TransitionPlan> {
        self.ensure_idle()?;

        if self.failed_action == Some(ServiceAction::Create) {
            return Err(FulcrumError::invalid_state(format!(
                "service {} was never provisioned; retry creation first",
                self.id
            )));
        }

        Ok(TransitionPlan {
            action: ServiceAction::Update,
            expected_current: self.current_state,
            target: self.current_state,
            target_properties: Some(properties),
        })
    }

    /// Plans a new attempt of the action that failed last.
    pub fn plan_retry(&self) -> FulcrumResult<TransitionPlan> {
        if let Some(target) = self.target_state {
            return Err(FulcrumError::invalid_state(format!(
                "service {} already has a transition to {target} in flight",
                self.id
            )));
        }
        let action = self.failed_action.ok_or_else(|| {
            FulcrumError::invalid_state(format!("service {} is not in a failed state", self.id))
        })?;

        let target = match action {
            ServiceAction::Create => ServiceState::Created,
            ServiceAction::Start => ServiceState::Started,
            ServiceAction::Stop => ServiceState::Stopped,
            ServiceAction::Delete => ServiceState::Deleted,
            ServiceAction::Update => self.current_state,
        };

        if action == ServiceAction::Update && self.target_properties.is_none() {
            return Err(FulcrumError::invalid_state(format!(
                "service {} has no pending properties to retry",
                self.id
            )));
        }

        Ok(TransitionPlan {
            action,
            expected_current: self.current_state,
            target,
            target_properties: self.target_properties.clone(),
        })
    }

    /// Payload handed to the agent with the job.
    pub fn job_request_data(&self, plan: &TransitionPlan) -> serde_json::Value {
        let properties = plan
            .target_properties
            .clone()
            .or_else(|| self.current_properties.clone());
        serde_json::json!({
            "properties": properties,
            "external_id": self.external_id,
        })
    }
}

/// Input for persisting a newly created service. The repository stores
/// it with `current_state = Created` and `target_state = Created`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateService {
    pub name: String,
    pub agent_id: Uuid,
    pub service_type_id: Uuid,
    pub group_id: Uuid,
    pub provider_id: Uuid,
    pub broker_id: Uuid,
    pub attributes: Attributes,
    pub properties: Option<serde_json::Value>,
}

/// Metadata-only changes.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateService {
    pub name: Option<String>,
    pub attributes: Option<Attributes>,
}

/// What an agent reported when it completed a job.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceCompletion {
    pub resources: Option<serde_json::Value>,
    pub external_id: Option<String>,
}
