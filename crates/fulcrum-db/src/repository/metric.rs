//! SurrealDB implementations of [`MetricTypeRepository`] and
//! [`MetricEntryRepository`].

use chrono::{DateTime, Utc};
use fulcrum_core::auth::AuthScope;
use fulcrum_core::error::FulcrumResult;
use fulcrum_core::models::metric::{
    CreateMetricEntry, CreateMetricType, MetricEntry, MetricType, UpdateMetricType,
};
use fulcrum_core::repository::{
    MetricEntryRepository, MetricTypeRepository, PaginatedResult, Pagination,
};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::support::{ScopeFilter, parse_enum, parse_record_id, parse_uuid, record_exists};
use crate::error::DbError;

const TYPE_ENTITY: &str = "metric_type";
const ENTRY_ENTITY: &str = "metric_entry";

// ---------------------------------------------------------------------------
// Metric types
// ---------------------------------------------------------------------------

#[derive(Debug, SurrealValue)]
struct MetricTypeRow {
    record_id: Option<String>,
    name: String,
    entity_type: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MetricTypeRow {
    fn into_metric_type(self, id: Uuid) -> Result<MetricType, DbError> {
        Ok(MetricType {
            id,
            name: self.name,
            entity_type: parse_enum(TYPE_ENTITY, &self.entity_type)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    fn try_into_metric_type(self) -> Result<MetricType, DbError> {
        let id = parse_record_id(TYPE_ENTITY, self.record_id.as_deref())?;
        self.into_metric_type(id)
    }
}

/// SurrealDB implementation of the MetricType repository.
#[derive(Clone)]
pub struct SurrealMetricTypeRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealMetricTypeRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> MetricTypeRepository for SurrealMetricTypeRepository<C> {
    async fn create(&self, input: CreateMetricType) -> FulcrumResult<MetricType> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('metric_type', $id) SET \
                 name = $name, entity_type = $entity_type",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("entity_type", input.entity_type.as_str()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(TYPE_ENTITY, e))?;

        let rows: Vec<MetricTypeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(TYPE_ENTITY, &id_str))?;

        Ok(row.into_metric_type(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> FulcrumResult<MetricType> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('metric_type', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MetricTypeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(TYPE_ENTITY, &id_str))?;

        Ok(row.into_metric_type(id)?)
    }

    async fn update(&self, id: Uuid, input: UpdateMetricType) -> FulcrumResult<MetricType> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('metric_type', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(TYPE_ENTITY, e))?;

        let rows: Vec<MetricTypeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(TYPE_ENTITY, &id_str))?;

        Ok(row.into_metric_type(id)?)
    }

    async fn delete(&self, id: Uuid) -> FulcrumResult<()> {
        self.db
            .query("DELETE type::record('metric_type', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> FulcrumResult<PaginatedResult<MetricType>> {
        let (rows, total) = ScopeFilter::unscoped()
            .page::<C, MetricTypeRow>(&self.db, TYPE_ENTITY, &pagination)
            .await?;

        let items = rows
            .into_iter()
            .map(MetricTypeRow::try_into_metric_type)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn exists(&self, id: Uuid) -> FulcrumResult<bool> {
        Ok(record_exists(&self.db, TYPE_ENTITY, id).await?)
    }
}

// ---------------------------------------------------------------------------
// Metric entries
// ---------------------------------------------------------------------------

#[derive(Debug, SurrealValue)]
struct MetricEntryRow {
    record_id: Option<String>,
    type_id: String,
    agent_id: String,
    service_id: String,
    provider_id: String,
    broker_id: String,
    resource_id: String,
    value: f64,
    created_at: DateTime<Utc>,
}

impl MetricEntryRow {
    fn into_entry(self, id: Uuid) -> Result<MetricEntry, DbError> {
        Ok(MetricEntry {
            id,
            type_id: parse_uuid(ENTRY_ENTITY, "type_id", &self.type_id)?,
            agent_id: parse_uuid(ENTRY_ENTITY, "agent_id", &self.agent_id)?,
            service_id: parse_uuid(ENTRY_ENTITY, "service_id", &self.service_id)?,
            provider_id: parse_uuid(ENTRY_ENTITY, "provider_id", &self.provider_id)?,
            broker_id: parse_uuid(ENTRY_ENTITY, "broker_id", &self.broker_id)?,
            resource_id: self.resource_id,
            value: self.value,
            created_at: self.created_at,
        })
    }

    fn try_into_entry(self) -> Result<MetricEntry, DbError> {
        let id = parse_record_id(ENTRY_ENTITY, self.record_id.as_deref())?;
        self.into_entry(id)
    }
}

/// SurrealDB implementation of the MetricEntry repository.
#[derive(Clone)]
pub struct SurrealMetricEntryRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealMetricEntryRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> MetricEntryRepository for SurrealMetricEntryRepository<C> {
    async fn create(&self, input: CreateMetricEntry) -> FulcrumResult<MetricEntry> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('metric_entry', $id) SET \
                 type_id = $type_id, \
                 agent_id = $agent_id, \
                 service_id = $service_id, \
                 provider_id = $provider_id, \
                 broker_id = $broker_id, \
                 resource_id = $resource_id, \
                 value = $value",
            )
            .bind(("id", id_str.clone()))
            .bind(("type_id", input.type_id.to_string()))
            .bind(("agent_id", input.agent_id.to_string()))
            .bind(("service_id", input.service_id.to_string()))
            .bind(("provider_id", input.provider_id.to_string()))
            .bind(("broker_id", input.broker_id.to_string()))
            .bind(("resource_id", input.resource_id))
            .bind(("value", input.value))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(ENTRY_ENTITY, e))?;

        let rows: Vec<MetricEntryRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTRY_ENTITY, &id_str))?;

        Ok(row.into_entry(id)?)
    }

    async fn list(
        &self,
        scope: &AuthScope,
        pagination: Pagination,
    ) -> FulcrumResult<PaginatedResult<MetricEntry>> {
        let filter = ScopeFilter::new(scope, &["provider_id", "broker_id"], Some("agent_id"));
        let (rows, total) = filter
            .page::<C, MetricEntryRow>(&self.db, ENTRY_ENTITY, &pagination)
            .await?;

        let items = rows
            .into_iter()
            .map(MetricEntryRow::try_into_entry)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
