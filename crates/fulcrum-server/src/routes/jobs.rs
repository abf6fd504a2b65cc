use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use fulcrum_core::models::job::{CompleteJob, FailJob, Job};
use fulcrum_core::repository::{PaginatedResult, Store};
use serde::Deserialize;
use uuid::Uuid;

use super::ListQuery;
use crate::error::ApiResult;
use crate::extract::{Caller, JsonBody};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct PendingQuery {
    limit: Option<u64>,
}

pub fn routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/jobs", get(list::<S>))
        .route("/jobs/pending", get(pending::<S>))
        .route("/jobs/{id}", get(read::<S>))
        .route("/jobs/{id}/claim", post(claim::<S>))
        .route("/jobs/{id}/complete", post(complete::<S>))
        .route("/jobs/{id}/fail", post(fail::<S>))
}

async fn list<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<Job>>> {
    Ok(Json(state.jobs.list(&caller, query.into()).await?))
}

async fn pending<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Query(query): Query<PendingQuery>,
) -> ApiResult<Json<Vec<Job>>> {
    Ok(Json(state.jobs.list_pending(&caller, query.limit).await?))
}

async fn read<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Job>> {
    Ok(Json(state.jobs.get(&caller, id).await?))
}

async fn claim<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Job>> {
    Ok(Json(state.jobs.claim(&caller, id).await?))
}

async fn complete<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
    JsonBody(report): JsonBody<CompleteJob>,
) -> ApiResult<Json<Job>> {
    Ok(Json(state.jobs.complete(&caller, id, report).await?))
}

async fn fail<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
    JsonBody(report): JsonBody<FailJob>,
) -> ApiResult<Json<Job>> {
    Ok(Json(state.jobs.fail(&caller, id, report).await?))
}
