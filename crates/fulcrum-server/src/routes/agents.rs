use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use fulcrum_core::models::agent::{Agent, AgentState, CreateAgent, UpdateAgent};
use fulcrum_core::repository::{PaginatedResult, Store};
use serde::Deserialize;
use uuid::Uuid;

use super::ListQuery;
use crate::error::ApiResult;
use crate::extract::{Caller, JsonBody};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct StatusReport {
    state: AgentState,
}

pub fn routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/agents", get(list::<S>).post(create::<S>))
        .route("/agents/me", get(me::<S>))
        .route("/agents/me/status", put(report_status::<S>))
        .route("/agents/me/rotate-token", post(rotate_own_token::<S>))
        .route(
            "/agents/{id}",
            get(read::<S>).patch(update::<S>).delete(remove::<S>),
        )
        .route("/agents/{id}/rotate-token", post(rotate_token::<S>))
        .route("/agents/{id}/state", put(set_state::<S>))
}

async fn create<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    JsonBody(input): JsonBody<CreateAgent>,
) -> ApiResult<(StatusCode, Json<Agent>)> {
    let agent = state.agents.create(&caller, input).await?;
    Ok((StatusCode::CREATED, Json(agent)))
}

async fn read<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Agent>> {
    Ok(Json(state.agents.get(&caller, id).await?))
}

async fn update<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
    JsonBody(input): JsonBody<UpdateAgent>,
) -> ApiResult<Json<Agent>> {
    Ok(Json(state.agents.update(&caller, id, input).await?))
}

async fn remove<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.agents.delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<Agent>>> {
    Ok(Json(state.agents.list(&caller, query.into()).await?))
}

async fn rotate_token<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Agent>> {
    Ok(Json(state.agents.rotate_token(&caller, id).await?))
}

async fn me<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
) -> ApiResult<Json<Agent>> {
    Ok(Json(state.agents.me(&caller).await?))
}

async fn report_status<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    JsonBody(report): JsonBody<StatusReport>,
) -> ApiResult<Json<Agent>> {
    Ok(Json(state.agents.update_status(&caller, report.state).await?))
}

async fn rotate_own_token<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
) -> ApiResult<Json<Agent>> {
    Ok(Json(state.agents.rotate_own_token(&caller).await?))
}

async fn set_state<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
    JsonBody(report): JsonBody<StatusReport>,
) -> ApiResult<Json<Agent>> {
    Ok(Json(state.agents.set_state(&caller, id, report.state).await?))
}
