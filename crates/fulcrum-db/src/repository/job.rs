//! SurrealDB implementation of [`JobRepository`].
//!
//! `claim`, `complete` and `fail` are compare-and-set updates on the
//! job's state and owning agent; losers of a race get `Conflict`.

use chrono::{DateTime, Utc};
use fulcrum_core::auth::{AuthScope, AuthTargetScope};
use fulcrum_core::error::{FulcrumError, FulcrumResult};
use fulcrum_core::models::job::{CreateJob, Job};
use fulcrum_core::repository::{JobRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::support::{
    ScopeFilter, count_by, parse_enum, parse_record_id, parse_uuid, record_exists,
};
use crate::error::DbError;

const ENTITY: &str = "job";

#[derive(Debug, SurrealValue)]
struct JobRow {
    record_id: Option<String>,
    service_id: String,
    agent_id: String,
    provider_id: String,
    broker_id: String,
    action: String,
    state: String,
    priority: i64,
    request_data: Option<serde_json::Value>,
    result_data: Option<serde_json::Value>,
    error_message: Option<String>,
    claimed_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    retry_count: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl JobRow {
    fn into_job(self, id: Uuid) -> Result<Job, DbError> {
        let priority = i32::try_from(self.priority)
            .map_err(|e| DbError::decode(ENTITY, format!("priority: {e}")))?;
        Ok(Job {
            id,
            service_id: parse_uuid(ENTITY, "service_id", &self.service_id)?,
            agent_id: parse_uuid(ENTITY, "agent_id", &self.agent_id)?,
            provider_id: parse_uuid(ENTITY, "provider_id", &self.provider_id)?,
            broker_id: parse_uuid(ENTITY, "broker_id", &self.broker_id)?,
            action: parse_enum(ENTITY, &self.action)?,
            state: parse_enum(ENTITY, &self.state)?,
            priority,
            request_data: self.request_data,
            result_data: self.result_data,
            error_message: self.error_message,
            claimed_at: self.claimed_at,
            completed_at: self.completed_at,
            retry_count: self.retry_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    fn try_into_job(self) -> Result<Job, DbError> {
        let id = parse_record_id(ENTITY, self.record_id.as_deref())?;
        self.into_job(id)
    }
}

#[derive(Debug, SurrealValue)]
struct JobScopeRow {
    provider_id: String,
    agent_id: String,
    broker_id: String,
}

/// SurrealDB implementation of the Job repository.
#[derive(Clone)]
pub struct SurrealJobRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealJobRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Maps the result of a compare-and-set update. No row means the
    /// job is missing or another writer got there first.
    async fn swapped(&self, id: Uuid, rows: Vec<JobRow>, operation: &str) -> FulcrumResult<Job> {
        match rows.into_iter().next() {
            Some(row) => Ok(row.into_job(id)?),
            None => {
                let current = self.get_by_id(id).await?;
                Err(FulcrumError::conflict(format!(
                    "cannot {operation} job {id}: job is {} and owned by agent {}",
                    current.state, current.agent_id
                )))
            }
        }
    }
}

impl<C: Connection> JobRepository for SurrealJobRepository<C> {
    async fn create(&self, input: CreateJob) -> FulcrumResult<Job> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('job', $id) SET \
                 service_id = $service_id, \
                 agent_id = $agent_id, \
                 provider_id = $provider_id, \
                 broker_id = $broker_id, \
                 action = $action, \
                 state = 'Pending', \
                 priority = $priority, \
                 request_data = $request_data, \
                 retry_count = $retry_count",
            )
            .bind(("id", id_str.clone()))
            .bind(("service_id", input.service_id.to_string()))
            .bind(("agent_id", input.agent_id.to_string()))
            .bind(("provider_id", input.provider_id.to_string()))
            .bind(("broker_id", input.broker_id.to_string()))
            .bind(("action", input.action.as_str()))
            .bind(("priority", i64::from(input.priority)))
            .bind(("request_data", input.request_data))
            .bind(("retry_count", input.retry_count))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(ENTITY, e))?;

        let rows: Vec<JobRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_job(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> FulcrumResult<Job> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('job', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<JobRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(ENTITY, &id_str))?;

        Ok(row.into_job(id)?)
    }

    async fn list(
        &self,
        scope: &AuthScope,
        pagination: Pagination,
    ) -> FulcrumResult<PaginatedResult<Job>> {
        let filter = ScopeFilter::new(scope, &["provider_id", "broker_id"], Some("agent_id"));
        let (rows, total) = filter
            .page::<C, JobRow>(&self.db, ENTITY, &pagination)
            .await?;

        let items = rows
            .into_iter()
            .map(JobRow::try_into_job)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_pending_for_agent(&self, agent_id: Uuid, limit: u64) -> FulcrumResult<Vec<Job>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM job \
                 WHERE agent_id = $agent_id AND state = 'Pending' \
                 ORDER BY priority ASC, created_at ASC \
                 LIMIT $limit",
            )
            .bind(("agent_id", agent_id.to_string()))
            .bind(("limit", limit))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<JobRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(JobRow::try_into_job)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn claim(&self, id: Uuid, agent_id: Uuid) -> FulcrumResult<Job> {
        let mut result = self
            .db
            .query(
                "UPDATE type::record('job', $id) SET \
                 state = 'Claimed', \
                 claimed_at = time::now(), \
                 updated_at = time::now() \
                 WHERE state = 'Pending' AND agent_id = $agent_id",
            )
            .bind(("id", id.to_string()))
            .bind(("agent_id", agent_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<JobRow> = result.take(0).map_err(DbError::from)?;
        self.swapped(id, rows, "claim").await
    }

    async fn complete(
        &self,
        id: Uuid,
        agent_id: Uuid,
        result_data: serde_json::Value,
    ) -> FulcrumResult<Job> {
        let mut result = self
            .db
            .query(
                "UPDATE type::record('job', $id) SET \
                 state = 'Completed', \
                 result_data = $result_data, \
                 completed_at = time::now(), \
                 updated_at = time::now() \
                 WHERE state = 'Claimed' AND agent_id = $agent_id",
            )
            .bind(("id", id.to_string()))
            .bind(("agent_id", agent_id.to_string()))
            .bind(("result_data", result_data))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<JobRow> = result.take(0).map_err(DbError::from)?;
        self.swapped(id, rows, "complete").await
    }

    async fn fail(
        &self,
        id: Uuid,
        agent_id: Option<Uuid>,
        error_message: String,
    ) -> FulcrumResult<Job> {
        let mut result = self
            .db
            .query(
                "UPDATE type::record('job', $id) SET \
                 state = 'Failed', \
                 error_message = $error_message, \
                 completed_at = time::now(), \
                 updated_at = time::now() \
                 WHERE state = 'Claimed' \
                 AND ($agent_id = NONE OR agent_id = $agent_id)",
            )
            .bind(("id", id.to_string()))
            .bind(("agent_id", agent_id.map(|a| a.to_string())))
            .bind(("error_message", error_message))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<JobRow> = result.take(0).map_err(DbError::from)?;
        self.swapped(id, rows, "fail").await
    }

    async fn list_timed_out(&self, cutoff: DateTime<Utc>) -> FulcrumResult<Vec<Job>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM job \
                 WHERE state = 'Claimed' AND claimed_at < $cutoff \
                 ORDER BY claimed_at ASC",
            )
            .bind(("cutoff", cutoff))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<JobRow> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(JobRow::try_into_job)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn delete_finished_before(&self, cutoff: DateTime<Utc>) -> FulcrumResult<u64> {
        let mut result = self
            .db
            .query(
                "DELETE job \
                 WHERE state IN ['Completed', 'Failed'] AND completed_at < $cutoff \
                 RETURN BEFORE",
            )
            .bind(("cutoff", cutoff))
            .await
            .map_err(DbError::from)?;
        let deleted: Vec<JobRow> = result.take(0).map_err(DbError::from)?;

        Ok(deleted.len() as u64)
    }

    async fn count_active_for_service(&self, service_id: Uuid) -> FulcrumResult<u64> {
        Ok(count_by(
            &self.db,
            "SELECT count() AS total FROM job \
             WHERE service_id = $id AND state IN ['Pending', 'Claimed'] GROUP ALL",
            service_id,
        )
        .await?)
    }

    async fn auth_scope(&self, id: Uuid) -> FulcrumResult<AuthTargetScope> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT provider_id, agent_id, broker_id \
                 FROM type::record('job', $id)",
            )
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<JobScopeRow> = result.take(0).map_err(DbError::from)?;
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
