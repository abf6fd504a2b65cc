//! SurrealDB implementation of [`AuditEntryRepository`].

use chrono::{DateTime, Utc};
use fulcrum_core::auth::AuthScope;
use fulcrum_core::error::FulcrumResult;
use fulcrum_core::models::audit::{AuditEntry, CreateAuditEntry};
use fulcrum_core::repository::{AuditEntryRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::support::{ScopeFilter, parse_enum, parse_opt_uuid, parse_record_id};
use crate::error::DbError;

const ENTITY: &str = "audit_entry";

#[derive(Debug, SurrealValue)]
struct AuditEntryRow {
    record_id: Option<String>,
    authority_type: String,
    authority_id: String,
    event_type: String,
    properties: serde_json::Value,
    entity_id: Option<String>,
    provider_id: Option<String>,
    agent_id: Option<String>,
    broker_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl AuditEntryRow {
    fn into_entry(self, id: Uuid) -> Result<AuditEntry, DbError> {
        Ok(AuditEntry {
            id,
            authority_type: parse_enum(ENTITY, &self.authority_type)?,
            authority_id: self.authority_id,
            event_type: parse_enum(ENTITY, &self.event_type)?,
            properties: self.properties,
            entity_id: parse_opt_uuid(ENTITY, "entity_id", self.entity_id)?,
            provider_id: parse_opt_uuid(ENTITY, "provider_id", self.provider_id)?,
            agent_id: parse_opt_uuid(ENTITY, "agent_id", self.agent_id)?,
            broker_id: parse_opt_uuid(ENTITY, "broker_id", self.broker_id)?,
            created_at: self.created_at,
        })
    }

    fn try_into_entry(self) -> Result<AuditEntry, DbError> {
        let id = parse_record_id(ENTITY, self.record_id.as_deref())?;
        self.into_entry(id)
    }
}

/// SurrealDB implementation of the append-only audit repository.
#[derive(Clone)]
pub struct SurrealAuditEntryRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditEntryRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditEntryRepository for SurrealAuditEntryRepository<C> {
    async fn append(&self, input: CreateAuditEntry) -> FulcrumResult<AuditEntry> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('audit_entry', $id) SET \
                 authority_type = $authority_type, \
                 authority_id = $authority_id, \
                 event_type = $event_type, \
                 properties = $properties, \
                 entity_id = $entity_id, \
                 provider_id = $provider_id, \
                 agent_id = $agent_id, \
                 broker_id = $broker_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("authority_type", input.authority_type.as_str()))
            .bind(("authority_id", input.authority_id))
            .bind(("event_type", input.event_type.as_str()))
            .bind(("properties", input.properties))
            .bind(("entity_id", input.entity_id.map(|v| v.to_string())))
            .bind(("provider_id", input.provider_id.map(|v| v.to_string())))
            .bind(("agent_id", input.agent_id.map(|v| v.to_string())))
            .bind(("broker_id", input.broker_id.map(|v| v.to_string())))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(ENTITY, e))?;

        let rows: Vec<AuditEntryRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_entry(id)?)
    }

    async fn list(
        &self,
        scope: &AuthScope,
        pagination: Pagination,
    ) -> FulcrumResult<PaginatedResult<AuditEntry>> {
        let filter = ScopeFilter::new(scope, &["provider_id", "broker_id"], Some("agent_id"));
        let (rows, total) = filter
            .page::<C, AuditEntryRow>(&self.db, ENTITY, &pagination)
            .await?;

        let items = rows
            .into_iter()
            .map(AuditEntryRow::try_into_entry)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
