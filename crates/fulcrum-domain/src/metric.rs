//! Metric types and metric entries.

use fulcrum_core::auth::{Action, AuthIdentity, AuthTargetScope, Subject};
use fulcrum_core::error::{FulcrumError, FulcrumResult};
use fulcrum_core::models::audit::EventType;
use fulcrum_core::models::metric::{
    CreateMetricEntry, CreateMetricType, MetricEntry, MetricType, UpdateMetricType,
};
use fulcrum_core::models::validate_name;
use fulcrum_core::repository::{
    MetricEntryRepository, MetricTypeRepository, PaginatedResult, Pagination, ServiceRepository,
    Store,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::access::{authorize_static, authorize_target, resolve_reference};
use crate::audit::AuditLog;

/// A measurement reported by an agent about one of its services.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMetricEntry {
    pub type_id: Uuid,
    pub service_id: Uuid,
    pub resource_id: String,
    pub value: f64,
}

#[derive(Clone)]
pub struct MetricCommander<S: Store> {
    store: S,
    audit: AuditLog<S>,
}

impl<S: Store> MetricCommander<S> {
    pub fn new(store: S) -> Self {
        Self {
            audit: AuditLog::new(store.clone()),
            store,
        }
    }

    pub async fn create_type(
        &self,
        identity: &AuthIdentity,
        input: CreateMetricType,
    ) -> FulcrumResult<MetricType> {
        authorize_static(identity, Subject::MetricType, Action::Create)?;
        validate_name("metric type", &input.name)?;

        let metric_type = self.store.metric_types().create(input).await?;
        self.audit
            .record(
                identity,
                EventType::MetricTypeCreated,
                metric_type.id,
                AuthTargetScope::empty(),
                json!({ "name": metric_type.name, "entity_type": metric_type.entity_type }),
            )
            .await;
        Ok(metric_type)
    }

    pub async fn get_type(&self, identity: &AuthIdentity, id: Uuid) -> FulcrumResult<MetricType> {
        authorize_static(identity, Subject::MetricType, Action::Read)?;
        self.store.metric_types().get_by_id(id).await
    }

    pub async fn update_type(
        &self,
        identity: &AuthIdentity,
        id: Uuid,
        input: UpdateMetricType,
    ) -> FulcrumResult<MetricType> {
        authorize_static(identity, Subject::MetricType, Action::Update)?;
        if let Some(name) = &input.name {
            validate_name("metric type", name)?;
        }

        let metric_type = self.store.metric_types().update(id, input).await?;
        self.audit
            .record(
                identity,
                EventType::MetricTypeUpdated,
                id,
                AuthTargetScope::empty(),
                json!({ "name": metric_type.name }),
            )
            .await;
        Ok(metric_type)
    }

    pub async fn delete_type(&self, identity: &AuthIdentity, id: Uuid) -> FulcrumResult<()> {
        authorize_static(identity, Subject::MetricType, Action::Delete)?;
        let metric_types = self.store.metric_types();
        if !metric_types.exists(id).await? {
            return Err(FulcrumError::not_found("metric_type", id));
        }
        metric_types.delete(id).await?;

        self.audit
            .record(
                identity,
                EventType::MetricTypeDeleted,
                id,
                AuthTargetScope::empty(),
                json!({}),
            )
            .await;
        Ok(())
    }

    pub async fn list_types(
        &self,
        identity: &AuthIdentity,
        pagination: Pagination,
    ) -> FulcrumResult<PaginatedResult<MetricType>> {
        authorize_static(identity, Subject::MetricType, Action::List)?;
        self.store.metric_types().list(pagination).await
    }

    /// Records a measurement. The ownership chain is copied from the
    /// service, so only the service's own agent may report on it.
    pub async fn create_entry(
        &self,
        identity: &AuthIdentity,
        input: NewMetricEntry,
    ) -> FulcrumResult<MetricEntry> {
        let service = resolve_reference(
            identity,
            Subject::MetricEntry,
            Action::Create,
            self.store.services().get_by_id(input.service_id),
        )
        .await?;
        let target =
            AuthTargetScope::service(service.provider_id, service.agent_id, service.broker_id);
        authorize_target(identity, Subject::MetricEntry, Action::Create, &target)?;

        if !input.value.is_finite() {
            return Err(FulcrumError::validation("metric value must be finite"));
        }
        if input.resource_id.trim().is_empty() {
            return Err(FulcrumError::validation("resource_id cannot be empty"));
        }
        if !self.store.metric_types().exists(input.type_id).await? {
            return Err(FulcrumError::validation(format!(
                "metric type {} does not exist",
                input.type_id
            )));
        }

        self.store
            .metric_entries()
            .create(CreateMetricEntry {
                type_id: input.type_id,
                agent_id: service.agent_id,
                service_id: service.id,
                provider_id: service.provider_id,
                broker_id: service.broker_id,
                resource_id: input.resource_id,
                value: input.value,
            })
            .await
    }

    pub async fn list_entries(
        &self,
        identity: &AuthIdentity,
        pagination: Pagination,
    ) -> FulcrumResult<PaginatedResult<MetricEntry>> {
        authorize_static(identity, Subject::MetricEntry, Action::List)?;
        self.store
            .metric_entries()
            .list(identity.scope(), pagination)
            .await
    }
}
