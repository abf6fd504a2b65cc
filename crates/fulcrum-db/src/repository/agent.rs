//! SurrealDB implementation of [`AgentRepository`].

use chrono::{DateTime, Utc};
use fulcrum_core::auth::{AuthScope, AuthTargetScope};
use fulcrum_core::error::FulcrumResult;
use fulcrum_core::models::agent::{Agent, AgentState, CreateAgent, UpdateAgent};
use fulcrum_core::repository::{AgentRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::support::{
    IdRow, ScopeFilter, attributes_from_value, attributes_to_value, count_by, parse_enum,
    parse_record_id, parse_uuid, record_exists,
};
use crate::error::DbError;

const ENTITY: &str = "agent";

#[derive(Debug, SurrealValue)]
struct AgentRow {
    record_id: Option<String>,
    name: String,
    provider_id: String,
    agent_type_id: String,
    state: String,
    country_code: Option<String>,
    attributes: serde_json::Value,
    token_hash: String,
    last_status_update: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AgentRow {
    fn into_agent(self, id: Uuid) -> Result<Agent, DbError> {
        Ok(Agent {
            id,
            name: self.name,
            provider_id: parse_uuid(ENTITY, "provider_id", &self.provider_id)?,
            agent_type_id: parse_uuid(ENTITY, "agent_type_id", &self.agent_type_id)?,
            state: parse_enum(ENTITY, &self.state)?,
            country_code: self.country_code,
            attributes: attributes_from_value(ENTITY, self.attributes)?,
            token_hash: self.token_hash,
            last_status_update: self.last_status_update,
            token: None,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    fn try_into_agent(self) -> Result<Agent, DbError> {
        let id = parse_record_id(ENTITY, self.record_id.as_deref())?;
        self.into_agent(id)
    }
}

#[derive(Debug, SurrealValue)]
struct AgentScopeRow {
    provider_id: String,
}

/// SurrealDB implementation of the Agent repository.
#[derive(Clone)]
pub struct SurrealAgentRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAgentRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Runs an `UPDATE` on a single agent and maps the returned row.
    async fn update_one(
        &self,
        id: Uuid,
        query: &str,
        binds: Vec<(&'static str, String)>,
    ) -> FulcrumResult<Agent> {
        let id_str = id.to_string();
        let mut builder = self.db.query(query).bind(("id", id_str.clone()));
        for bind in binds {
            builder = builder.bind(bind);
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(ENTITY, e))?;

        let rows: Vec<AgentRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_agent(id)?)
    }
}

impl<C: Connection> AgentRepository for SurrealAgentRepository<C> {
    async fn create(&self, input: CreateAgent) -> FulcrumResult<Agent> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('agent', $id) SET \
                 name = $name, \
                 provider_id = $provider_id, \
                 agent_type_id = $agent_type_id, \
                 state = 'New', \
                 country_code = $country_code, \
                 attributes = $attributes, \
                 token_hash = $token_hash",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("provider_id", input.provider_id.to_string()))
            .bind(("agent_type_id", input.agent_type_id.to_string()))
            .bind(("country_code", input.country_code))
            .bind(("attributes", attributes_to_value(&input.attributes)))
            .bind(("token_hash", input.token_hash))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(ENTITY, e))?;

        let rows: Vec<AgentRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_agent(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> FulcrumResult<Agent> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('agent', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AgentRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_agent(id)?)
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> FulcrumResult<Agent> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM agent \
                 WHERE token_hash = $token_hash",
            )
            .bind(("token_hash", token_hash.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AgentRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, "token_hash"))?;

        Ok(row.try_into_agent()?)
    }

    async fn update(&self, id: Uuid, input: UpdateAgent) -> FulcrumResult<Agent> {
        let mut sets = Vec::new();
        let mut binds = Vec::new();
        if let Some(name) = input.name {
            sets.push("name = $name");
            binds.push(("name", name));
        }
        if let Some(agent_type_id) = input.agent_type_id {
            sets.push("agent_type_id = $agent_type_id");
            binds.push(("agent_type_id", agent_type_id.to_string()));
        }
        if let Some(country_code) = input.country_code {
            sets.push("country_code = $country_code");
            binds.push(("country_code", country_code));
        }
        if input.attributes.is_some() {
            sets.push("attributes = $attributes");
        }
        sets.push("updated_at = time::now()");

        let query = format!("UPDATE type::record('agent', $id) SET {}", sets.join(", "));

        // Attributes are bound as an object, not a string.
        let id_str = id.to_string();
        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));
        for bind in binds {
            builder = builder.bind(bind);
        }
        if let Some(attributes) = input.attributes {
            builder = builder.bind(("attributes", attributes_to_value(&attributes)));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(ENTITY, e))?;

        let rows: Vec<AgentRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_agent(id)?)
    }

    async fn update_state(&self, id: Uuid, state: AgentState) -> FulcrumResult<Agent> {
        self.update_one(
            id,
            "UPDATE type::record('agent', $id) SET \
             state = $state, \
             last_status_update = time::now(), \
             updated_at = time::now()",
            vec![("state", state.as_str().to_string())],
        )
        .await
    }

    async fn rotate_token_hash(&self, id: Uuid, token_hash: String) -> FulcrumResult<Agent> {
        self.update_one(
            id,
            "UPDATE type::record('agent', $id) SET \
             token_hash = $token_hash, updated_at = time::now()",
            vec![("token_hash", token_hash)],
        )
        .await
    }

    async fn delete(&self, id: Uuid) -> FulcrumResult<()> {
        self.db
            .query("DELETE type::record('agent', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list(
        &self,
        scope: &AuthScope,
        pagination: Pagination,
    ) -> FulcrumResult<PaginatedResult<Agent>> {
        let filter = ScopeFilter::new(scope, &["provider_id"], Some("meta::id(id)"));
        let (rows, total) = filter
            .page::<C, AgentRow>(&self.db, ENTITY, &pagination)
            .await?;

        let items = rows
            .into_iter()
            .map(AgentRow::try_into_agent)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn count_by_provider(&self, provider_id: Uuid) -> FulcrumResult<u64> {
        Ok(count_by(
            &self.db,
            "SELECT count() AS total FROM agent WHERE provider_id = $id GROUP ALL",
            provider_id,
        )
        .await?)
    }

    async fn disconnect_stale(&self, cutoff: DateTime<Utc>) -> FulcrumResult<Vec<Agent>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id FROM agent \
                 WHERE state = 'Connected' \
                 AND (last_status_update = NONE OR last_status_update < $cutoff)",
            )
            .bind(("cutoff", cutoff))
            .await
            .map_err(DbError::from)?;
        let candidates: Vec<IdRow> = result.take(0).map_err(DbError::from)?;

        let mut disconnected = Vec::new();
        for candidate in candidates {
            let id = parse_uuid(ENTITY, "record id", &candidate.record_id)?;

            // Re-check the guard so a concurrent heartbeat wins.
            let mut result = self
                .db
                .query(
                    "UPDATE type::record('agent', $id) SET \
                     state = 'Disconnected', updated_at = time::now() \
                     WHERE state = 'Connected' \
                     AND (last_status_update = NONE OR last_status_update < $cutoff)",
                )
                .bind(("id", candidate.record_id))
                .bind(("cutoff", cutoff))
                .await
                .map_err(DbError::from)?;
            let rows: Vec<AgentRow> = result.take(0).map_err(DbError::from)?;
            if let Some(row) = rows.into_iter().next() {
                disconnected.push(row.into_agent(id)?);
            }
        }

        Ok(disconnected)
    }

    async fn auth_scope(&self, id: Uuid) -> FulcrumResult<AuthTargetScope> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT provider_id FROM type::record('agent', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AgentScopeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        let provider_id = parse_uuid(ENTITY, "provider_id", &row.provider_id)?;
        Ok(AuthTargetScope::agent(provider_id, id))
    }

    async fn exists(&self, id: Uuid) -> FulcrumResult<bool> {
        Ok(record_exists(&self.db, ENTITY, id).await?)
    }
}
