//! SurrealDB implementation of [`ServiceGroupRepository`].

use chrono::{DateTime, Utc};
use fulcrum_core::auth::{AuthScope, AuthTargetScope};
use fulcrum_core::error::FulcrumResult;
use fulcrum_core::models::service_group::{CreateServiceGroup, ServiceGroup, UpdateServiceGroup};
use fulcrum_core::repository::{PaginatedResult, Pagination, ServiceGroupRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::support::{ScopeFilter, parse_record_id, parse_uuid, record_exists};
use crate::error::DbError;

const ENTITY: &str = "service_group";

#[derive(Debug, SurrealValue)]
struct ServiceGroupRow {
    record_id: Option<String>,
    name: String,
    broker_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ServiceGroupRow {
    fn into_group(self, id: Uuid) -> Result<ServiceGroup, DbError> {
        Ok(ServiceGroup {
            id,
            name: self.name,
            broker_id: parse_uuid(ENTITY, "broker_id", &self.broker_id)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    fn try_into_group(self) -> Result<ServiceGroup, DbError> {
        let id = parse_record_id(ENTITY, self.record_id.as_deref())?;
        self.into_group(id)
    }
}

/// SurrealDB implementation of the ServiceGroup repository.
#[derive(Clone)]
pub struct SurrealServiceGroupRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealServiceGroupRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ServiceGroupRepository for SurrealServiceGroupRepository<C> {
    async fn create(&self, input: CreateServiceGroup) -> FulcrumResult<ServiceGroup> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('service_group', $id) SET \
                 name = $name, broker_id = $broker_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("broker_id", input.broker_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(ENTITY, e))?;

        let rows: Vec<ServiceGroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_group(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> FulcrumResult<ServiceGroup> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('service_group', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ServiceGroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_group(id)?)
    }

    async fn update(&self, id: Uuid, input: UpdateServiceGroup) -> FulcrumResult<ServiceGroup> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('service_group', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(ENTITY, e))?;

        let rows: Vec<ServiceGroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_group(id)?)
    }

    async fn delete(&self, id: Uuid) -> FulcrumResult<()> {
        self.db
            .query("DELETE type::record('service_group', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list(
        &self,
        scope: &AuthScope,
        pagination: Pagination,
    ) -> FulcrumResult<PaginatedResult<ServiceGroup>> {
        let filter = ScopeFilter::new(scope, &["broker_id"], None);
        let (rows, total) = filter
            .page::<C, ServiceGroupRow>(&self.db, ENTITY, &pagination)
            .await?;

        let items = rows
            .into_iter()
            .map(ServiceGroupRow::try_into_group)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn auth_scope(&self, id: Uuid) -> FulcrumResult<AuthTargetScope> {
        let group = self.get_by_id(id).await?;
        Ok(AuthTargetScope::broker(group.broker_id))
    }

    async fn exists(&self, id: Uuid) -> FulcrumResult<bool> {
        Ok(record_exists(&self.db, ENTITY, id).await?)
    }
}
