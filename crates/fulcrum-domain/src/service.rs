//! Service commander.
//!
//! Turns caller requests into guarded target-state changes and enqueues
//! the job that asks the agent to do the work. The guarded update runs
//! first; if the job cannot be enqueued afterwards the transition is
//! released as failed so the service never stays in flight without a
//! job.

use fulcrum_core::auth::{Action, AuthIdentity, AuthTargetScope, Subject};
use fulcrum_core::error::{FulcrumError, FulcrumResult};
use fulcrum_core::models::Attributes;
use fulcrum_core::models::agent::AgentState;
use fulcrum_core::models::audit::EventType;
use fulcrum_core::models::job::{CreateJob, Job};
use fulcrum_core::models::service::{
    CreateService, Service, ServiceAction, ServiceState, TransitionPlan, UpdateService,
};
use fulcrum_core::models::{validate_attributes, validate_json_object, validate_name};
use fulcrum_core::repository::{
    AgentRepository, AgentTypeRepository, JobRepository, PaginatedResult, Pagination,
    ServiceGroupRepository, ServiceRepository, ServiceTypeRepository, Store,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::access::{authorize_resource, authorize_static, authorize_target, resolve_reference};
use crate::audit::AuditLog;
use crate::config::DomainConfig;

/// Request to create a service on an agent, inside a group.
#[derive(Debug, Clone, Deserialize)]
pub struct NewService {
    pub name: String,
    pub agent_id: Uuid,
    pub service_type_id: Uuid,
    pub group_id: Uuid,
    #[serde(default)]
    pub attributes: Attributes,
    pub properties: Option<serde_json::Value>,
}

/// Partial service update. A `properties` change is reconciled by the
/// agent through an `Update` job; the rest is metadata.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServiceChanges {
    pub name: Option<String>,
    pub attributes: Option<Attributes>,
    pub properties: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct ServiceCommander<S: Store> {
    store: S,
    config: DomainConfig,
    audit: AuditLog<S>,
}

impl<S: Store> ServiceCommander<S> {
    pub fn new(store: S, config: DomainConfig) -> Self {
        Self {
            audit: AuditLog::new(store.clone()),
            store,
            config,
        }
    }

    /// Creates the service in flight towards `Created` and enqueues the
    /// `Create` job.
    pub async fn create(&self, identity: &AuthIdentity, input: NewService) -> FulcrumResult<Service> {
        let agent = resolve_reference(
            identity,
            Subject::Service,
            Action::Create,
            self.store.agents().get_by_id(input.agent_id),
        )
        .await?;
        let group = resolve_reference(
            identity,
            Subject::Service,
            Action::Create,
            self.store.service_groups().get_by_id(input.group_id),
        )
        .await?;
        let target = AuthTargetScope::service(agent.provider_id, agent.id, group.broker_id);
        authorize_target(identity, Subject::Service, Action::Create, &target)?;

        validate_name("service", &input.name)?;
        validate_attributes(&input.attributes)?;
        let properties = input.properties.unwrap_or_else(|| json!({}));
        validate_json_object("properties", &properties)?;

        if !self.store.service_types().exists(input.service_type_id).await? {
            return Err(FulcrumError::validation(format!(
                "service type {} does not exist",
                input.service_type_id
            )));
        }
        let agent_type = self.store.agent_types().get_by_id(agent.agent_type_id).await?;
        if !agent_type.supports(input.service_type_id) {
            return Err(FulcrumError::validation(format!(
                "agent type {} cannot run service type {}",
                agent_type.name, input.service_type_id
            )));
        }
        if agent.state == AgentState::Disabled {
            return Err(FulcrumError::invalid_state(format!(
                "agent {} is disabled",
                agent.id
            )));
        }

        let service = self
            .store
            .services()
            .create(CreateService {
                name: input.name,
                agent_id: agent.id,
                service_type_id: input.service_type_id,
                group_id: group.id,
                provider_id: agent.provider_id,
                broker_id: group.broker_id,
                attributes: input.attributes,
                properties: Some(properties.clone()),
            })
            .await?;

        let plan = TransitionPlan {
            action: ServiceAction::Create,
            expected_current: ServiceState::Created,
            target: ServiceState::Created,
            target_properties: Some(properties),
        };
        let job = self.enqueue(&service, &plan).await?;
        tracing::info!(service_id = %service.id, job_id = %job.id, agent_id = %agent.id, "service created");

        self.audit
            .record(
                identity,
                EventType::ServiceCreated,
                service.id,
                target,
                json!({ "name": service.name, "job_id": job.id }),
            )
            .await;
        Ok(service)
    }

    pub async fn get(&self, identity: &AuthIdentity, id: Uuid) -> FulcrumResult<Service> {
        let services = self.store.services();
        authorize_resource(identity, Subject::Service, Action::Read, services.auth_scope(id))
            .await?;
        services.get_by_id(id).await
    }

    pub async fn list(
        &self,
        identity: &AuthIdentity,
        pagination: Pagination,
    ) -> FulcrumResult<PaginatedResult<Service>> {
        authorize_static(identity, Subject::Service, Action::List)?;
        self.store.services().list(identity.scope(), pagination).await
    }

    pub async fn update(
        &self,
        identity: &AuthIdentity,
        id: Uuid,
        changes: ServiceChanges,
    ) -> FulcrumResult<Service> {
        let services = self.store.services();
        let target =
            authorize_resource(identity, Subject::Service, Action::Update, services.auth_scope(id))
                .await?;

        if let Some(name) = &changes.name {
            validate_name("service", name)?;
        }
        if let Some(attributes) = &changes.attributes {
            validate_attributes(attributes)?;
        }
        if let Some(properties) = &changes.properties {
            validate_json_object("properties", properties)?;
        }

        let mut service = services.get_by_id(id).await?;
        // Reject an impossible properties change before touching metadata.
        let plan = changes
            .properties
            .map(|properties| service.plan_update(properties))
            .transpose()?;

        if changes.name.is_some() || changes.attributes.is_some() {
            service = services
                .update(
                    id,
                    UpdateService {
                        name: changes.name,
                        attributes: changes.attributes,
                    },
                )
                .await?;
        }

        let mut job_id = None;
        if let Some(plan) = plan {
            service = services
                .begin_transition(
                    id,
                    plan.expected_current,
                    plan.target,
                    plan.target_properties.clone(),
                )
                .await?;
            job_id = Some(self.enqueue(&service, &plan).await?.id);
        }

        self.audit
            .record(
                identity,
                EventType::ServiceUpdated,
                id,
                target,
                json!({ "name": service.name, "job_id": job_id }),
            )
            .await;
        Ok(service)
    }

    pub async fn start(&self, identity: &AuthIdentity, id: Uuid) -> FulcrumResult<Service> {
        self.transition(identity, id, Action::Start, ServiceState::Started)
            .await
    }

    pub async fn stop(&self, identity: &AuthIdentity, id: Uuid) -> FulcrumResult<Service> {
        self.transition(identity, id, Action::Stop, ServiceState::Stopped)
            .await
    }

    /// Requests deletion; the record stays until the agent confirms,
    /// after which it remains in `Deleted` state.
    pub async fn delete(&self, identity: &AuthIdentity, id: Uuid) -> FulcrumResult<Service> {
        self.transition(identity, id, Action::Delete, ServiceState::Deleted)
            .await
    }

    async fn transition(
        &self,
        identity: &AuthIdentity,
        id: Uuid,
        action: Action,
        target_state: ServiceState,
    ) -> FulcrumResult<Service> {
        let services = self.store.services();
        let target =
            authorize_resource(identity, Subject::Service, action, services.auth_scope(id)).await?;

        let plan = services.get_by_id(id).await?.plan_transition(target_state)?;
        let service = services
            .begin_transition(id, plan.expected_current, plan.target, None)
            .await?;
        let job = self.enqueue(&service, &plan).await?;
        tracing::info!(
            service_id = %id,
            job_id = %job.id,
            from = %plan.expected_current,
            to = %plan.target,
            "service transition requested"
        );

        self.audit
            .record(
                identity,
                EventType::ServiceTransitioned,
                id,
                target,
                json!({
                    "from": plan.expected_current,
                    "to": plan.target,
                    "job_id": job.id,
                }),
            )
            .await;
        Ok(service)
    }

    /// Re-attempts the action that failed last, with the retained
    /// target properties.
    pub async fn retry(&self, identity: &AuthIdentity, id: Uuid) -> FulcrumResult<Service> {
        let services = self.store.services();
        let target =
            authorize_resource(identity, Subject::Service, Action::Retry, services.auth_scope(id))
                .await?;

        let plan = services.get_by_id(id).await?.plan_retry()?;
        let service = services.begin_retry(id, plan.action, plan.target).await?;
        let job = self.enqueue(&service, &plan).await?;
        tracing::info!(
            service_id = %id,
            job_id = %job.id,
            action = %plan.action,
            retry_count = service.retry_count,
            "service retry requested"
        );

        self.audit
            .record(
                identity,
                EventType::ServiceRetried,
                id,
                target,
                json!({
                    "action": plan.action,
                    "retry_count": service.retry_count,
                    "job_id": job.id,
                }),
            )
            .await;
        Ok(service)
    }

    /// Enqueues the job for a transition that has just been begun. On
    /// failure the transition is released as failed with the same
    /// action, so it can be retried.
    async fn enqueue(&self, service: &Service, plan: &TransitionPlan) -> FulcrumResult<Job> {
        let input = CreateJob {
            service_id: service.id,
            agent_id: service.agent_id,
            provider_id: service.provider_id,
            broker_id: service.broker_id,
            action: plan.action,
            priority: self.config.default_job_priority,
            request_data: Some(service.job_request_data(plan)),
            retry_count: service.retry_count,
        };

        match self.store.jobs().create(input).await {
            Ok(job) => Ok(job),
            Err(e) => {
                tracing::error!(service_id = %service.id, error = %e, "failed to enqueue job");
                if let Err(release) = self
                    .store
                    .services()
                    .fail_transition(
                        service.id,
                        plan.target,
                        plan.action,
                        format!("job could not be enqueued: {e}"),
                    )
                    .await
                {
                    tracing::error!(
                        service_id = %service.id,
                        error = %release,
                        "failed to release transition"
                    );
                }
                Err(e)
            }
        }
    }
}
