//! SurrealDB implementation of [`TokenRepository`].

use chrono::{DateTime, Utc};
use fulcrum_core::auth::{AuthScope, AuthTargetScope};
use fulcrum_core::error::FulcrumResult;
use fulcrum_core::models::token::{CreateToken, Token, UpdateToken};
use fulcrum_core::repository::{PaginatedResult, Pagination, TokenRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::support::{ScopeFilter, parse_enum, parse_opt_uuid, parse_record_id, record_exists};
use crate::error::DbError;

const ENTITY: &str = "token";

#[derive(Debug, SurrealValue)]
struct TokenRow {
    record_id: Option<String>,
    name: String,
    role: String,
    scope_id: Option<String>,
    provider_id: Option<String>,
    agent_id: Option<String>,
    expire_at: DateTime<Utc>,
    hashed_value: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TokenRow {
    fn into_token(self, id: Uuid) -> Result<Token, DbError> {
        Ok(Token {
            id,
            name: self.name,
            role: parse_enum(ENTITY, &self.role)?,
            scope_id: parse_opt_uuid(ENTITY, "scope_id", self.scope_id)?,
            provider_id: parse_opt_uuid(ENTITY, "provider_id", self.provider_id)?,
            agent_id: parse_opt_uuid(ENTITY, "agent_id", self.agent_id)?,
            expire_at: self.expire_at,
            hashed_value: self.hashed_value,
            plain_value: None,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    fn try_into_token(self) -> Result<Token, DbError> {
        let id = parse_record_id(ENTITY, self.record_id.as_deref())?;
        self.into_token(id)
    }
}

/// SurrealDB implementation of the Token repository.
#[derive(Clone)]
pub struct SurrealTokenRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTokenRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn delete_where(&self, query: &'static str, id: Uuid) -> FulcrumResult<()> {
        self.db
            .query(query)
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }
}

impl<C: Connection> TokenRepository for SurrealTokenRepository<C> {
    async fn create(&self, input: CreateToken) -> FulcrumResult<Token> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('token', $id) SET \
                 name = $name, \
                 role = $role, \
                 scope_id = $scope_id, \
                 provider_id = $provider_id, \
                 agent_id = $agent_id, \
                 expire_at = $expire_at, \
                 hashed_value = $hashed_value",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("role", input.role.as_str()))
            .bind(("scope_id", input.scope_id.map(|v| v.to_string())))
            .bind(("provider_id", input.provider_id.map(|v| v.to_string())))
            .bind(("agent_id", input.agent_id.map(|v| v.to_string())))
            .bind(("expire_at", input.expire_at))
            .bind(("hashed_value", input.hashed_value))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(ENTITY, e))?;

        let rows: Vec<TokenRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_token(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> FulcrumResult<Token> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('token', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TokenRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_token(id)?)
    }

    async fn get_by_hash(&self, hashed_value: &str) -> FulcrumResult<Token> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM token \
                 WHERE hashed_value = $hashed_value",
            )
            .bind(("hashed_value", hashed_value.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TokenRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, "hashed_value"))?;

        Ok(row.try_into_token()?)
    }

    async fn update(&self, id: Uuid, input: UpdateToken) -> FulcrumResult<Token> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.expire_at.is_some() {
            sets.push("expire_at = $expire_at");
        }
        sets.push("updated_at = time::now()");

        let query = format!("UPDATE type::record('token', $id) SET {}", sets.join(", "));

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(expire_at) = input.expire_at {
            builder = builder.bind(("expire_at", expire_at));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(ENTITY, e))?;

        let rows: Vec<TokenRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_token(id)?)
    }

    async fn regenerate(&self, id: Uuid, hashed_value: String) -> FulcrumResult<Token> {
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('token', $id) SET \
                 hashed_value = $hashed_value, updated_at = time::now()",
            )
            .bind(("id", id_str.clone()))
            .bind(("hashed_value", hashed_value))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(ENTITY, e))?;

        let rows: Vec<TokenRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_token(id)?)
    }

    async fn delete(&self, id: Uuid) -> FulcrumResult<()> {
        self.delete_where("DELETE type::record('token', $id)", id)
            .await
    }

    async fn delete_by_provider(&self, provider_id: Uuid) -> FulcrumResult<()> {
        self.delete_where("DELETE token WHERE provider_id = $id", provider_id)
            .await
    }

    async fn delete_by_agent(&self, agent_id: Uuid) -> FulcrumResult<()> {
        self.delete_where("DELETE token WHERE agent_id = $id", agent_id)
            .await
    }

    async fn list(
        &self,
        scope: &AuthScope,
        pagination: Pagination,
    ) -> FulcrumResult<PaginatedResult<Token>> {
        let filter = ScopeFilter::new(scope, &["provider_id"], Some("agent_id"));
        let (rows, total) = filter
            .page::<C, TokenRow>(&self.db, ENTITY, &pagination)
            .await?;

        let items = rows
            .into_iter()
            .map(TokenRow::try_into_token)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn auth_scope(&self, id: Uuid) -> FulcrumResult<AuthTargetScope> {
        let token = self.get_by_id(id).await?;
        Ok(AuthTargetScope {
            provider_id: token.provider_id,
            agent_id: token.agent_id,
            broker_id: None,
        })
    }

    async fn exists(&self, id: Uuid) -> FulcrumResult<bool> {
        Ok(record_exists(&self.db, ENTITY, id).await?)
    }
}
