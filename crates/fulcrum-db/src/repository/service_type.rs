//! SurrealDB implementation of [`ServiceTypeRepository`].

use chrono::{DateTime, Utc};
use fulcrum_core::error::FulcrumResult;
use fulcrum_core::models::service_type::{CreateServiceType, ServiceType};
use fulcrum_core::repository::{PaginatedResult, Pagination, ServiceTypeRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::support::{ScopeFilter, parse_record_id, record_exists};
use crate::error::DbError;

const ENTITY: &str = "service_type";

#[derive(Debug, SurrealValue)]
struct ServiceTypeRow {
    record_id: Option<String>,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ServiceTypeRow {
    fn into_service_type(self, id: Uuid) -> ServiceType {
        ServiceType {
            id,
            name: self.name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn try_into_service_type(self) -> Result<ServiceType, DbError> {
        let id = parse_record_id(ENTITY, self.record_id.as_deref())?;
        Ok(self.into_service_type(id))
    }
}

/// SurrealDB implementation of the ServiceType repository.
#[derive(Clone)]
pub struct SurrealServiceTypeRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealServiceTypeRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ServiceTypeRepository for SurrealServiceTypeRepository<C> {
    async fn create(&self, input: CreateServiceType) -> FulcrumResult<ServiceType> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query("CREATE type::record('service_type', $id) SET name = $name")
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(ENTITY, e))?;

        let rows: Vec<ServiceTypeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_service_type(id))
    }

    async fn get_by_id(&self, id: Uuid) -> FulcrumResult<ServiceType> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('service_type', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ServiceTypeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_service_type(id))
    }

    async fn delete(&self, id: Uuid) -> FulcrumResult<()> {
        self.db
            .query("DELETE type::record('service_type', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> FulcrumResult<PaginatedResult<ServiceType>> {
        let filter = ScopeFilter::unscoped();
        let (rows, total) = filter
            .page::<C, ServiceTypeRow>(&self.db, ENTITY, &pagination)
            .await?;

        let items = rows
            .into_iter()
            .map(ServiceTypeRow::try_into_service_type)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn exists(&self, id: Uuid) -> FulcrumResult<bool> {
        Ok(record_exists(&self.db, ENTITY, id).await?)
    }
}
