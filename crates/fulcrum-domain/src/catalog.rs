//! Agent type and service type catalog.
//!
//! Catalog entries are global: admins write them, every authenticated
//! caller may read them.

use fulcrum_core::auth::{Action, AuthIdentity, AuthTargetScope, Subject};
use fulcrum_core::error::{FulcrumError, FulcrumResult};
use fulcrum_core::models::agent_type::{AgentType, CreateAgentType};
use fulcrum_core::models::audit::EventType;
use fulcrum_core::models::service_type::{CreateServiceType, ServiceType};
use fulcrum_core::models::validate_name;
use fulcrum_core::repository::{
    AgentTypeRepository, PaginatedResult, Pagination, ServiceTypeRepository, Store,
};
use serde_json::json;
use uuid::Uuid;

use crate::access::authorize_static;
use crate::audit::AuditLog;

#[derive(Clone)]
pub struct CatalogCommander<S: Store> {
    store: S,
    audit: AuditLog<S>,
}

impl<S: Store> CatalogCommander<S> {
    pub fn new(store: S) -> Self {
        Self {
            audit: AuditLog::new(store.clone()),
            store,
        }
    }

    // -- Service types ------------------------------------------------------

    pub async fn create_service_type(
        &self,
        identity: &AuthIdentity,
        input: CreateServiceType,
    ) -> FulcrumResult<ServiceType> {
        authorize_static(identity, Subject::ServiceType, Action::Create)?;
        validate_name("service type", &input.name)?;

        let service_type = self.store.service_types().create(input).await?;
        self.audit
            .record(
                identity,
                EventType::ServiceTypeCreated,
                service_type.id,
                AuthTargetScope::empty(),
                json!({ "name": service_type.name }),
            )
            .await;
        Ok(service_type)
    }

    pub async fn get_service_type(
        &self,
        identity: &AuthIdentity,
        id: Uuid,
    ) -> FulcrumResult<ServiceType> {
        authorize_static(identity, Subject::ServiceType, Action::Read)?;
        self.store.service_types().get_by_id(id).await
    }

    pub async fn delete_service_type(&self, identity: &AuthIdentity, id: Uuid) -> FulcrumResult<()> {
        authorize_static(identity, Subject::ServiceType, Action::Delete)?;
        let service_types = self.store.service_types();
        if !service_types.exists(id).await? {
            return Err(FulcrumError::not_found("service_type", id));
        }
        service_types.delete(id).await?;

        self.audit
            .record(
                identity,
                EventType::ServiceTypeDeleted,
                id,
                AuthTargetScope::empty(),
                json!({}),
            )
            .await;
        Ok(())
    }

    pub async fn list_service_types(
        &self,
        identity: &AuthIdentity,
        pagination: Pagination,
    ) -> FulcrumResult<PaginatedResult<ServiceType>> {
        authorize_static(identity, Subject::ServiceType, Action::List)?;
        self.store.service_types().list(pagination).await
    }

    // -- Agent types --------------------------------------------------------

    pub async fn create_agent_type(
        &self,
        identity: &AuthIdentity,
        mut input: CreateAgentType,
    ) -> FulcrumResult<AgentType> {
        authorize_static(identity, Subject::AgentType, Action::Create)?;
        validate_name("agent type", &input.name)?;

        input.service_type_ids.sort();
        input.service_type_ids.dedup();
        for service_type_id in &input.service_type_ids {
            if !self.store.service_types().exists(*service_type_id).await? {
                return Err(FulcrumError::validation(format!(
                    "service type {service_type_id} does not exist"
                )));
            }
        }

        let agent_type = self.store.agent_types().create(input).await?;
        self.audit
            .record(
                identity,
                EventType::AgentTypeCreated,
                agent_type.id,
                AuthTargetScope::empty(),
                json!({
                    "name": agent_type.name,
                    "service_type_ids": agent_type.service_type_ids,
                }),
            )
            .await;
        Ok(agent_type)
    }

    pub async fn get_agent_type(
        &self,
        identity: &AuthIdentity,
        id: Uuid,
    ) -> FulcrumResult<AgentType> {
        authorize_static(identity, Subject::AgentType, Action::Read)?;
        self.store.agent_types().get_by_id(id).await
    }

    pub async fn delete_agent_type(&self, identity: &AuthIdentity, id: Uuid) -> FulcrumResult<()> {
        authorize_static(identity, Subject::AgentType, Action::Delete)?;
        let agent_types = self.store.agent_types();
        if !agent_types.exists(id).await? {
            return Err(FulcrumError::not_found("agent_type", id));
        }
        agent_types.delete(id).await?;

        self.audit
            .record(
                identity,
                EventType::AgentTypeDeleted,
                id,
                AuthTargetScope::empty(),
                json!({}),
            )
            .await;
        Ok(())
    }

    pub async fn list_agent_types(
        &self,
        identity: &AuthIdentity,
        pagination: Pagination,
    ) -> FulcrumResult<PaginatedResult<AgentType>> {
        authorize_static(identity, Subject::AgentType, Action::List)?;
        self.store.agent_types().list(pagination).await
    }
}
