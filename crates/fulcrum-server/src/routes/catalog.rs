//! Agent types and service types.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use fulcrum_core::models::agent_type::{AgentType, CreateAgentType};
use fulcrum_core::models::service_type::{CreateServiceType, ServiceType};
use fulcrum_core::repository::{PaginatedResult, Store};
use uuid::Uuid;

use super::ListQuery;
use crate::error::ApiResult;
use crate::extract::{Caller, JsonBody};
use crate::state::AppState;

pub fn routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route(
            "/agent-types",
            get(list_agent_types::<S>).post(create_agent_type::<S>),
        )
        .route(
            "/agent-types/{id}",
            get(read_agent_type::<S>).delete(remove_agent_type::<S>),
        )
        .route(
            "/service-types",
            get(list_service_types::<S>).post(create_service_type::<S>),
        )
        .route(
            "/service-types/{id}",
            get(read_service_type::<S>).delete(remove_service_type::<S>),
        )
}

async fn create_agent_type<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    JsonBody(input): JsonBody<CreateAgentType>,
) -> ApiResult<(StatusCode, Json<AgentType>)> {
    let agent_type = state.catalog.create_agent_type(&caller, input).await?;
    Ok((StatusCode::CREATED, Json(agent_type)))
}

async fn read_agent_type<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AgentType>> {
    Ok(Json(state.catalog.get_agent_type(&caller, id).await?))
}

async fn remove_agent_type<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.catalog.delete_agent_type(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_agent_types<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<AgentType>>> {
    Ok(Json(
        state.catalog.list_agent_types(&caller, query.into()).await?,
    ))
}

async fn create_service_type<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    JsonBody(input): JsonBody<CreateServiceType>,
) -> ApiResult<(StatusCode, Json<ServiceType>)> {
    let service_type = state.catalog.create_service_type(&caller, input).await?;
    Ok((StatusCode::CREATED, Json(service_type)))
}

async fn read_service_type<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ServiceType>> {
    Ok(Json(state.catalog.get_service_type(&caller, id).await?))
}

async fn remove_service_type<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.catalog.delete_service_type(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_service_types<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<ServiceType>>> {
    Ok(Json(
        state
            .catalog
            .list_service_types(&caller, query.into())
            .await?,
    ))
}
