//! Service group commander.

use fulcrum_core::auth::{Action, AuthIdentity, AuthTargetScope, Subject};
use fulcrum_core::error::{FulcrumError, FulcrumResult};
use fulcrum_core::models::audit::EventType;
use fulcrum_core::models::service_group::{CreateServiceGroup, ServiceGroup, UpdateServiceGroup};
use fulcrum_core::models::validate_name;
use fulcrum_core::repository::{
    PaginatedResult, Pagination, ProviderRepository, ServiceGroupRepository, ServiceRepository,
    Store,
};
use serde_json::json;
use uuid::Uuid;

use crate::access::{authorize_resource, authorize_static, authorize_target, resolve_reference};
use crate::audit::AuditLog;

#[derive(Clone)]
pub struct ServiceGroupCommander<S: Store> {
    store: S,
    audit: AuditLog<S>,
}

impl<S: Store> ServiceGroupCommander<S> {
    pub fn new(store: S) -> Self {
        Self {
            audit: AuditLog::new(store.clone()),
            store,
        }
    }

    pub async fn create(
        &self,
        identity: &AuthIdentity,
        input: CreateServiceGroup,
    ) -> FulcrumResult<ServiceGroup> {
        // The broker is a provider; make sure it exists before
        // authorizing against it.
        resolve_reference(
            identity,
            Subject::ServiceGroup,
            Action::Create,
            self.store.providers().auth_scope(input.broker_id),
        )
        .await?;
        let target = AuthTargetScope::broker(input.broker_id);
        authorize_target(identity, Subject::ServiceGroup, Action::Create, &target)?;
        validate_name("service group", &input.name)?;

        let group = self.store.service_groups().create(input).await?;
        self.audit
            .record(
                identity,
                EventType::ServiceGroupCreated,
                group.id,
                target,
                json!({ "name": group.name }),
            )
            .await;
        Ok(group)
    }

    pub async fn get(&self, identity: &AuthIdentity, id: Uuid) -> FulcrumResult<ServiceGroup> {
        let groups = self.store.service_groups();
        authorize_resource(
            identity,
            Subject::ServiceGroup,
            Action::Read,
            groups.auth_scope(id),
        )
        .await?;
        groups.get_by_id(id).await
    }

    pub async fn update(
        &self,
        identity: &AuthIdentity,
        id: Uuid,
        input: UpdateServiceGroup,
    ) -> FulcrumResult<ServiceGroup> {
        let groups = self.store.service_groups();
        let target = authorize_resource(
            identity,
            Subject::ServiceGroup,
            Action::Update,
            groups.auth_scope(id),
        )
        .await?;
        if let Some(name) = &input.name {
            validate_name("service group", name)?;
        }

        let group = groups.update(id, input).await?;
        self.audit
            .record(
                identity,
                EventType::ServiceGroupUpdated,
                id,
                target,
                json!({ "name": group.name }),
            )
            .await;
        Ok(group)
    }

    pub async fn delete(&self, identity: &AuthIdentity, id: Uuid) -> FulcrumResult<()> {
        let groups = self.store.service_groups();
        let target = authorize_resource(
            identity,
            Subject::ServiceGroup,
            Action::Delete,
            groups.auth_scope(id),
        )
        .await?;

        let services = self.store.services().count_by_group(id).await?;
        if services > 0 {
            return Err(FulcrumError::conflict(format!(
                "service group {id} still contains {services} service(s)"
            )));
        }

        groups.delete(id).await?;
        self.audit
            .record(identity, EventType::ServiceGroupDeleted, id, target, json!({}))
            .await;
        Ok(())
    }

    pub async fn list(
        &self,
        identity: &AuthIdentity,
        pagination: Pagination,
    ) -> FulcrumResult<PaginatedResult<ServiceGroup>> {
        authorize_static(identity, Subject::ServiceGroup, Action::List)?;
        self.store
            .service_groups()
            .list(identity.scope(), pagination)
            .await
    }
}
