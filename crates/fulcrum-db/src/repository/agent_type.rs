//! SurrealDB implementation of [`AgentTypeRepository`].

use chrono::{DateTime, Utc};
use fulcrum_core::error::FulcrumResult;
use fulcrum_core::models::agent_type::{AgentType, CreateAgentType};
use fulcrum_core::repository::{AgentTypeRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::support::{ScopeFilter, parse_record_id, parse_uuid, record_exists};
use crate::error::DbError;

const ENTITY: &str = "agent_type";

#[derive(Debug, SurrealValue)]
struct AgentTypeRow {
    record_id: Option<String>,
    name: String,
    service_type_ids: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AgentTypeRow {
    fn into_agent_type(self, id: Uuid) -> Result<AgentType, DbError> {
        let service_type_ids = self
            .service_type_ids
            .iter()
            .map(|s| parse_uuid(ENTITY, "service_type_id", s))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(AgentType {
            id,
            name: self.name,
            service_type_ids,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    fn try_into_agent_type(self) -> Result<AgentType, DbError> {
        let id = parse_record_id(ENTITY, self.record_id.as_deref())?;
        self.into_agent_type(id)
    }
}

/// SurrealDB implementation of the AgentType repository.
#[derive(Clone)]
pub struct SurrealAgentTypeRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAgentTypeRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AgentTypeRepository for SurrealAgentTypeRepository<C> {
    async fn create(&self, input: CreateAgentType) -> FulcrumResult<AgentType> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let service_type_ids: Vec<String> =
            input.service_type_ids.iter().map(Uuid::to_string).collect();

        let result = self
            .db
            .query(
                "CREATE type::record('agent_type', $id) SET \
                 name = $name, service_type_ids = $service_type_ids",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("service_type_ids", service_type_ids))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(ENTITY, e))?;

        let rows: Vec<AgentTypeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_agent_type(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> FulcrumResult<AgentType> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('agent_type', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AgentTypeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_agent_type(id)?)
    }

    async fn delete(&self, id: Uuid) -> FulcrumResult<()> {
        self.db
            .query("DELETE type::record('agent_type', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> FulcrumResult<PaginatedResult<AgentType>> {
        let filter = ScopeFilter::unscoped();
        let (rows, total) = filter
            .page::<C, AgentTypeRow>(&self.db, ENTITY, &pagination)
            .await?;

        let items = rows
            .into_iter()
            .map(AgentTypeRow::try_into_agent_type)
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
