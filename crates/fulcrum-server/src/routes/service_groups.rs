use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use fulcrum_core::models::service_group::{
    CreateServiceGroup, ServiceGroup, UpdateServiceGroup,
};
use fulcrum_core::repository::{PaginatedResult, Store};
use uuid::Uuid;

use super::ListQuery;
use crate::error::ApiResult;
use crate::extract::{Caller, JsonBody};
use crate::state::AppState;

pub fn routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/service-groups", get(list::<S>).post(create::<S>))
        .route(
            "/service-groups/{id}",
            get(read::<S>).patch(update::<S>).delete(remove::<S>),
        )
}

async fn create<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    JsonBody(input): JsonBody<CreateServiceGroup>,
) -> ApiResult<(StatusCode, Json<ServiceGroup>)> {
    let group = state.service_groups.create(&caller, input).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

async fn read<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ServiceGroup>> {
    Ok(Json(state.service_groups.get(&caller, id).await?))
}

async fn update<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
    JsonBody(input): JsonBody<UpdateServiceGroup>,
) -> ApiResult<Json<ServiceGroup>> {
    Ok(Json(state.service_groups.update(&caller, id, input).await?))
}

async fn remove<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.service_groups.delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<ServiceGroup>>> {
    Ok(Json(state.service_groups.list(&caller, query.into()).await?))
}
