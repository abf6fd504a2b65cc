//! SurrealDB implementation of [`ServiceRepository`].
//!
//! State changes are single guarded `UPDATE ... WHERE` statements. An
//! update that matches no row either lost a race or targeted a missing
//! record; the two cases are told apart with a follow-up existence check.

use chrono::{DateTime, Utc};
use fulcrum_core::auth::{AuthScope, AuthTargetScope};
use fulcrum_core::error::{FulcrumError, FulcrumResult};
use fulcrum_core::models::service::{
    CreateService, Service, ServiceAction, ServiceCompletion, ServiceState, UpdateService,
};
use fulcrum_core::repository::{PaginatedResult, Pagination, ServiceRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::support::{
    ScopeFilter, attributes_from_value, attributes_to_value, count_by, parse_enum,
    parse_opt_enum, parse_record_id, parse_uuid, record_exists,
};
use crate::error::DbError;

const ENTITY: &str = "service";

#[derive(Debug, SurrealValue)]
struct ServiceRow {
    record_id: Option<String>,
    name: String,
    agent_id: String,
    service_type_id: String,
    group_id: String,
    provider_id: String,
    broker_id: String,
    external_id: Option<String>,
    attributes: serde_json::Value,
    current_state: String,
    target_state: Option<String>,
    current_properties: Option<serde_json::Value>,
    target_properties: Option<serde_json::Value>,
    resources: Option<serde_json::Value>,
    failed_action: Option<String>,
    error_message: Option<String>,
    retry_count: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ServiceRow {
    fn into_service(self, id: Uuid) -> Result<Service, DbError> {
        Ok(Service {
            id,
            name: self.name,
            agent_id: parse_uuid(ENTITY, "agent_id", &self.agent_id)?,
            service_type_id: parse_uuid(ENTITY, "service_type_id", &self.service_type_id)?,
            group_id: parse_uuid(ENTITY, "group_id", &self.group_id)?,
            provider_id: parse_uuid(ENTITY, "provider_id", &self.provider_id)?,
            broker_id: parse_uuid(ENTITY, "broker_id", &self.broker_id)?,
            external_id: self.external_id,
            attributes: attributes_from_value(ENTITY, self.attributes)?,
            current_state: parse_enum(ENTITY, &self.current_state)?,
            target_state: parse_opt_enum(ENTITY, self.target_state)?,
            current_properties: self.current_properties,
            target_properties: self.target_properties,
            resources: self.resources,
            failed_action: parse_opt_enum(ENTITY, self.failed_action)?,
            error_message: self.error_message,
            retry_count: self.retry_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    fn try_into_service(self) -> Result<Service, DbError> {
        let id = parse_record_id(ENTITY, self.record_id.as_deref())?;
        self.into_service(id)
    }
}

#[derive(Debug, SurrealValue)]
struct ServiceScopeRow {
    provider_id: String,
    agent_id: String,
    broker_id: String,
}

/// SurrealDB implementation of the Service repository.
#[derive(Clone)]
pub struct SurrealServiceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealServiceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Maps the result of a guarded update. No row means either the
    /// record is gone or the guard did not hold.
    async fn guarded(
        &self,
        id: Uuid,
        rows: Vec<ServiceRow>,
        rejected: impl FnOnce() -> String,
    ) -> FulcrumResult<Service> {
        match rows.into_iter().next() {
            Some(row) => Ok(row.into_service(id)?),
            None if record_exists(&self.db, ENTITY, id).await? => {
                Err(FulcrumError::invalid_state(rejected()))
            }
            None => Err(DbError::not_found(ENTITY, id).into()),
        }
    }
}

impl<C: Connection> ServiceRepository for SurrealServiceRepository<C> {
    async fn create(&self, input: CreateService) -> FulcrumResult<Service> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('service', $id) SET \
                 name = $name, \
                 agent_id = $agent_id, \
                 service_type_id = $service_type_id, \
                 group_id = $group_id, \
                 provider_id = $provider_id, \
                 broker_id = $broker_id, \
                 attributes = $attributes, \
                 current_state = 'Created', \
                 target_state = 'Created', \
                 target_properties = $properties, \
                 retry_count = 0",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("agent_id", input.agent_id.to_string()))
            .bind(("service_type_id", input.service_type_id.to_string()))
            .bind(("group_id", input.group_id.to_string()))
            .bind(("provider_id", input.provider_id.to_string()))
            .bind(("broker_id", input.broker_id.to_string()))
            .bind(("attributes", attributes_to_value(&input.attributes)))
            .bind(("properties", input.properties))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(ENTITY, e))?;

        let rows: Vec<ServiceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_service(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> FulcrumResult<Service> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('service', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ServiceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_service(id)?)
    }

    async fn update(&self, id: Uuid, input: UpdateService) -> FulcrumResult<Service> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.attributes.is_some() {
            sets.push("attributes = $attributes");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('service', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(attributes) = input.attributes {
            builder = builder.bind(("attributes", attributes_to_value(&attributes)));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(ENTITY, e))?;

        let rows: Vec<ServiceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_service(id)?)
    }

    async fn list(
        &self,
        scope: &AuthScope,
        pagination: Pagination,
    ) -> FulcrumResult<PaginatedResult<Service>> {
        let filter = ScopeFilter::new(scope, &["provider_id", "broker_id"], Some("agent_id"));
        let (rows, total) = filter
            .page::<C, ServiceRow>(&self.db, ENTITY, &pagination)
            .await?;

        let items = rows
            .into_iter()
            .map(ServiceRow::try_into_service)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn count_by_group(&self, group_id: Uuid) -> FulcrumResult<u64> {
        Ok(count_by(
            &self.db,
            "SELECT count() AS total FROM service WHERE group_id = $id GROUP ALL",
            group_id,
        )
        .await?)
    }

    async fn count_live_by_agent(&self, agent_id: Uuid) -> FulcrumResult<u64> {
        Ok(count_by(
            &self.db,
            "SELECT count() AS total FROM service \
             WHERE agent_id = $id AND current_state != 'Deleted' GROUP ALL",
            agent_id,
        )
        .await?)
    }

    async fn begin_transition(
        &self,
        id: Uuid,
        expected_current: ServiceState,
        target: ServiceState,
        target_properties: Option<serde_json::Value>,
    ) -> FulcrumResult<Service> {
        let mut result = self
            .db
            .query(
                "UPDATE type::record('service', $id) SET \
                 target_state = $target, \
                 target_properties = $target_properties, \
                 failed_action = NONE, \
                 error_message = NONE, \
                 updated_at = time::now() \
                 WHERE target_state = NONE \
                 AND current_state = $expected \
                 AND current_state != 'Deleted'",
            )
            .bind(("id", id.to_string()))
            .bind(("target", target.as_str()))
            .bind(("target_properties", target_properties))
            .bind(("expected", expected_current.as_str()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement(ENTITY, e))?;

        let rows: Vec<ServiceRow> = result.take(0).map_err(DbError::from)?;
        self.guarded(id, rows, || {
            format!("service {id} is no longer {expected_current} or already has a transition in flight")
        })
        .await
    }

    async fn begin_retry(
        &self,
        id: Uuid,
        failed_action: ServiceAction,
        target: ServiceState,
    ) -> FulcrumResult<Service> {
        let mut result = self
            .db
            .query(
                "UPDATE type::record('service', $id) SET \
                 target_state = $target, \
                 failed_action = NONE, \
                 error_message = NONE, \
                 retry_count += 1, \
                 updated_at = time::now() \
                 WHERE target_state = NONE AND failed_action = $action",
            )
            .bind(("id", id.to_string()))
            .bind(("target", target.as_str()))
            .bind(("action", failed_action.as_str()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement(ENTITY, e))?;

        let rows: Vec<ServiceRow> = result.take(0).map_err(DbError::from)?;
        self.guarded(id, rows, || {
            format!("service {id} has no failed {failed_action} to retry")
        })
        .await
    }

    async fn complete_transition(
        &self,
        id: Uuid,
        expected_target: ServiceState,
        completion: ServiceCompletion,
    ) -> FulcrumResult<Service> {
        let mut result = self
            .db
            .query(
                "UPDATE type::record('service', $id) SET \
                 current_state = $target, \
                 current_properties = target_properties ?? current_properties, \
                 target_state = NONE, \
                 target_properties = NONE, \
                 resources = $resources ?? resources, \
                 external_id = external_id ?? $external_id, \
                 failed_action = NONE, \
                 error_message = NONE, \
                 retry_count = 0, \
                 updated_at = time::now() \
                 WHERE target_state = $target",
            )
            .bind(("id", id.to_string()))
            .bind(("target", expected_target.as_str()))
            .bind(("resources", completion.resources))
            .bind(("external_id", completion.external_id))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement(ENTITY, e))?;

        let rows: Vec<ServiceRow> = result.take(0).map_err(DbError::from)?;
        self.guarded(id, rows, || {
            format!("service {id} is not transitioning to {expected_target}")
        })
        .await
    }

    async fn fail_transition(
        &self,
        id: Uuid,
        expected_target: ServiceState,
        action: ServiceAction,
        error_message: String,
    ) -> FulcrumResult<Service> {
        let mut result = self
            .db
            .query(
                "UPDATE type::record('service', $id) SET \
                 target_state = NONE, \
                 failed_action = $action, \
                 error_message = $error_message, \
                 updated_at = time::now() \
                 WHERE target_state = $target",
            )
            .bind(("id", id.to_string()))
            .bind(("target", expected_target.as_str()))
            .bind(("action", action.as_str()))
            .bind(("error_message", error_message))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement(ENTITY, e))?;

        let rows: Vec<ServiceRow> = result.take(0).map_err(DbError::from)?;
        self.guarded(id, rows, || {
            format!("service {id} is not transitioning to {expected_target}")
        })
        .await
    }

    async fn list_in_flight_before(&self, cutoff: DateTime<Utc>) -> FulcrumResult<Vec<Service>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM service \
                 WHERE target_state != NONE AND updated_at < $cutoff \
                 ORDER BY updated_at ASC",
            )
            .bind(("cutoff", cutoff))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<ServiceRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(ServiceRow::try_into_service)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn auth_scope(&self, id: Uuid) -> FulcrumResult<AuthTargetScope> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT provider_id, agent_id, broker_id \
                 FROM type::record('service', $id)",
            )
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ServiceScopeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(AuthTargetScope::service(
            parse_uuid(ENTITY, "provider_id", &row.provider_id)?,
            parse_uuid(ENTITY, "agent_id", &row.agent_id)?,
            parse_uuid(ENTITY, "broker_id", &row.broker_id)?,
        ))
    }

    async fn exists(&self, id: Uuid) -> FulcrumResult<bool> {
        Ok(record_exists(&self.db, ENTITY, id).await?)
    }
}
