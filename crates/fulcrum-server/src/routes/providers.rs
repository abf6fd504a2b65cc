use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use fulcrum_core::models::provider::{CreateProvider, Provider, UpdateProvider};
use fulcrum_core::repository::{PaginatedResult, Store};
use uuid::Uuid;

use super::ListQuery;
use crate::error::ApiResult;
use crate::extract::{Caller, JsonBody};
use crate::state::AppState;

pub fn routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/providers", get(list::<S>).post(create::<S>))
        .route(
            "/providers/{id}",
            get(read::<S>).patch(update::<S>).delete(remove::<S>),
        )
}

async fn create<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    JsonBody(input): JsonBody<CreateProvider>,
) -> ApiResult<(StatusCode, Json<Provider>)> {
    let provider = state.providers.create(&caller, input).await?;
    Ok((StatusCode::CREATED, Json(provider)))
}

async fn read<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Provider>> {
    Ok(Json(state.providers.get(&caller, id).await?))
}

async fn update<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
    JsonBody(input): JsonBody<UpdateProvider>,
) -> ApiResult<Json<Provider>> {
    Ok(Json(state.providers.update(&caller, id, input).await?))
}

async fn remove<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.providers.delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<Provider>>> {
    Ok(Json(state.providers.list(&caller, query.into()).await?))
}
