//! SurrealDB implementation of [`ProviderRepository`].

use chrono::{DateTime, Utc};
use fulcrum_core::auth::{AuthScope, AuthTargetScope};
use fulcrum_core::error::FulcrumResult;
use fulcrum_core::models::provider::{CreateProvider, Provider, UpdateProvider};
use fulcrum_core::repository::{PaginatedResult, Pagination, ProviderRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::support::{
    ScopeFilter, attributes_from_value, attributes_to_value, parse_enum, parse_record_id,
    record_exists,
};
use crate::error::DbError;

const ENTITY: &str = "provider";

/// DB-side row. `record_id` is only present when the query projects it.
#[derive(Debug, SurrealValue)]
struct ProviderRow {
    record_id: Option<String>,
    name: String,
    state: String,
    country_code: Option<String>,
    attributes: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProviderRow {
    fn into_provider(self, id: Uuid) -> Result<Provider, DbError> {
        Ok(Provider {
            id,
            name: self.name,
            state: parse_enum(ENTITY, &self.state)?,
            country_code: self.country_code,
            attributes: attributes_from_value(ENTITY, self.attributes)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    fn try_into_provider(self) -> Result<Provider, DbError> {
        let id = parse_record_id(ENTITY, self.record_id.as_deref())?;
        self.into_provider(id)
    }
}

/// SurrealDB implementation of the Provider repository.
#[derive(Clone)]
pub struct SurrealProviderRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealProviderRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ProviderRepository for SurrealProviderRepository<C> {
    async fn create(&self, input: CreateProvider) -> FulcrumResult<Provider> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('provider', $id) SET \
                 name = $name, state = $state, \
                 country_code = $country_code, \
                 attributes = $attributes",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("state", input.state.as_str()))
            .bind(("country_code", input.country_code))
            .bind(("attributes", attributes_to_value(&input.attributes)))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(ENTITY, e))?;

        let rows: Vec<ProviderRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_provider(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> FulcrumResult<Provider> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('provider', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ProviderRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_provider(id)?)
    }

    async fn update(&self, id: Uuid, input: UpdateProvider) -> FulcrumResult<Provider> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.state.is_some() {
            sets.push("state = $state");
        }
        if input.country_code.is_some() {
            sets.push("country_code = $country_code");
        }
        if input.attributes.is_some() {
            sets.push("attributes = $attributes");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('provider', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(state) = input.state {
            builder = builder.bind(("state", state.as_str()));
        }
        if let Some(country_code) = input.country_code {
            builder = builder.bind(("country_code", country_code));
        }
        if let Some(attributes) = input.attributes {
            builder = builder.bind(("attributes", attributes_to_value(&attributes)));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(ENTITY, e))?;

        let rows: Vec<ProviderRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_provider(id)?)
    }

    async fn delete(&self, id: Uuid) -> FulcrumResult<()> {
        self.db
            .query("DELETE type::record('provider', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list(
        &self,
        scope: &AuthScope,
        pagination: Pagination,
    ) -> FulcrumResult<PaginatedResult<Provider>> {
        let filter = ScopeFilter::new(scope, &["meta::id(id)"], None);
        let (rows, total) = filter
            .page::<C, ProviderRow>(&self.db, ENTITY, &pagination)
            .await?;

        let items = rows
            .into_iter()
            .map(ProviderRow::try_into_provider)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn auth_scope(&self, id: Uuid) -> FulcrumResult<AuthTargetScope> {
        if record_exists(&self.db, ENTITY, id).await? {
            Ok(AuthTargetScope::provider(id))
        } else {
            Err(DbError::not_found(ENTITY, id).into())
        }
    }

    async fn exists(&self, id: Uuid) -> FulcrumResult<bool> {
        Ok(record_exists(&self.db, ENTITY, id).await?)
    }
}
