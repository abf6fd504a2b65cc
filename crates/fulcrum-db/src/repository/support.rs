//! Helpers shared by the SurrealDB repositories.

use std::str::FromStr;

use fulcrum_core::auth::AuthScope;
use fulcrum_core::models::Attributes;
use fulcrum_core::repository::Pagination;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub(crate) total: u64,
}

/// Row struct for id-only projections.
#[derive(Debug, SurrealValue)]
pub(crate) struct IdRow {
    pub(crate) record_id: String,
}

pub(crate) fn parse_uuid(entity: &str, field: &str, value: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::decode(entity, format!("invalid {field}: {e}")))
}

pub(crate) fn parse_opt_uuid(
    entity: &str,
    field: &str,
    value: Option<String>,
) -> Result<Option<Uuid>, DbError> {
    value
        .map(|v| parse_uuid(entity, field, &v))
        .transpose()
}

/// Parses the `record_id` projection of a row, if the query selected it.
pub(crate) fn parse_record_id(entity: &str, record_id: Option<&str>) -> Result<Uuid, DbError> {
    let raw = record_id.ok_or_else(|| DbError::decode(entity, "missing record id"))?;
    parse_uuid(entity, "record id", raw)
}

pub(crate) fn parse_enum<T>(entity: &str, value: &str) -> Result<T, DbError>
where
    T: FromStr<Err = String>,
{
    value.parse().map_err(|e: String| DbError::decode(entity, e))
}

pub(crate) fn parse_opt_enum<T>(entity: &str, value: Option<String>) -> Result<Option<T>, DbError>
where
    T: FromStr<Err = String>,
{
    value.map(|v| parse_enum(entity, &v)).transpose()
}

pub(crate) fn attributes_to_value(attributes: &Attributes) -> serde_json::Value {
    serde_json::to_value(attributes).unwrap_or_else(|_| serde_json::json!({}))
}

pub(crate) fn attributes_from_value(
    entity: &str,
    value: serde_json::Value,
) -> Result<Attributes, DbError> {
    serde_json::from_value(value).map_err(|e| DbError::decode(entity, format!("attributes: {e}")))
}

/// `WHERE` clause confining a list query to the caller's scope.
///
/// `provider_fields` are compared against the caller's provider id
/// (joined with `OR`), `agent_field` against the caller's agent id. An
/// empty scope produces no clause; a scope that cannot be expressed on
/// the table matches nothing.
#[derive(Debug, Clone)]
pub(crate) struct ScopeFilter {
    clause: String,
    provider: Option<String>,
    agent: Option<String>,
}

impl ScopeFilter {
    pub(crate) fn new(scope: &AuthScope, provider_fields: &[&str], agent_field: Option<&str>) -> Self {
        let clause = match (scope.provider_id, scope.agent_id, agent_field) {
            (_, Some(_), Some(field)) => format!(" WHERE {field} = $scope_agent"),
            (Some(_), _, _) if !provider_fields.is_empty() => {
                let alternatives: Vec<String> = provider_fields
                    .iter()
                    .map(|f| format!("{f} = $scope_provider"))
                    .collect();
                format!(" WHERE ({})", alternatives.join(" OR "))
            }
            (None, None, _) => String::new(),
            _ => " WHERE false".to_string(),
        };

        Self {
            clause,
            provider: scope.provider_id.map(|id| id.to_string()),
            agent: scope.agent_id.map(|id| id.to_string()),
        }
    }

    /// Filter for global tables.
    pub(crate) fn unscoped() -> Self {
        Self {
            clause: String::new(),
            provider: None,
            agent: None,
        }
    }

    /// Runs the count and page queries for `table`.
    pub(crate) async fn page<C, R>(
        &self,
        db: &Surreal<C>,
        table: &str,
        pagination: &Pagination,
    ) -> Result<(Vec<R>, u64), DbError>
    where
        C: Connection,
        R: SurrealValue,
    {
        let mut count_result = db
            .query(format!(
                "SELECT count() AS total FROM {table}{} GROUP ALL",
                self.clause
            ))
            .bind(("scope_provider", self.provider.clone()))
            .bind(("scope_agent", self.agent.clone()))
            .await?;
        let count_rows: Vec<CountRow> = count_result.take(0)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM {table}{} \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
                self.clause
            ))
            .bind(("scope_provider", self.provider.clone()))
            .bind(("scope_agent", self.agent.clone()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await?;
        let rows: Vec<R> = result.take(0)?;

        Ok((rows, total))
    }
}

/// Whether a record with the given id exists in `table`.
pub(crate) async fn record_exists<C: Connection>(
    db: &Surreal<C>,
    table: &str,
    id: Uuid,
) -> Result<bool, DbError> {
    let mut result = db
        .query(format!(
            "SELECT meta::id(id) AS record_id FROM type::record('{table}', $id)"
        ))
        .bind(("id", id.to_string()))
        .await?;
    let rows: Vec<IdRow> = result.take(0)?;
    Ok(!rows.is_empty())
}

/// Runs a `SELECT count() AS total ... GROUP ALL` query with one `$id`
/// binding.
pub(crate) async fn count_by<C: Connection>(
    db: &Surreal<C>,
    query: &str,
    id: Uuid,
) -> Result<u64, DbError> {
    let mut result = db.query(query).bind(("id", id.to_string())).await?;
    let rows: Vec<CountRow> = result.take(0)?;
    Ok(rows.first().map(|r| r.total).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_scope_is_unfiltered() {
        let filter = ScopeFilter::new(&AuthScope::default(), &["provider_id"], Some("agent_id"));
        assert!(filter.clause.is_empty());
    }

    #[test]
    fn participant_scope_joins_provider_fields() {
        let scope = AuthScope {
            provider_id: Some(Uuid::new_v4()),
            agent_id: None,
        };
        let filter = ScopeFilter::new(&scope, &["provider_id", "broker_id"], Some("agent_id"));
        assert_eq!(
            filter.clause,
            " WHERE (provider_id = $scope_provider OR broker_id = $scope_provider)"
        );
    }

    #[test]
    fn agent_scope_prefers_agent_field() {
        let scope = AuthScope {
            provider_id: Some(Uuid::new_v4()),
            agent_id: Some(Uuid::new_v4()),
        };
        let filter = ScopeFilter::new(&scope, &["provider_id"], Some("agent_id"));
        assert_eq!(filter.clause, " WHERE agent_id = $scope_agent");

        let none = ScopeFilter::new(&scope, &[], None);
        assert_eq!(none.clause, " WHERE false");
    }

    #[test]
    fn attributes_round_trip_through_json() {
        let mut attrs = Attributes::new();
        attrs.insert("zone".into(), vec!["a".into(), "b".into()]);
        let value = attributes_to_value(&attrs);
        assert_eq!(attributes_from_value("agent", value).unwrap(), attrs);
    }
}
