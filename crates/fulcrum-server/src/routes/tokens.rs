use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use fulcrum_core::models::token::{Token, UpdateToken};
use fulcrum_core::repository::{PaginatedResult, Store};
use fulcrum_domain::token::NewToken;
use uuid::Uuid;

use super::ListQuery;
use crate::error::ApiResult;
use crate::extract::{Caller, JsonBody};
use crate::state::AppState;

pub fn routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/tokens", get(list::<S>).post(create::<S>))
        .route(
            "/tokens/{id}",
            get(read::<S>).patch(update::<S>).delete(remove::<S>),
        )
        .route("/tokens/{id}/regenerate", post(regenerate::<S>))
}

async fn create<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    JsonBody(input): JsonBody<NewToken>,
) -> ApiResult<(StatusCode, Json<Token>)> {
    let token = state.tokens.create(&caller, input).await?;
    Ok((StatusCode::CREATED, Json(token)))
}

async fn read<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Token>> {
    Ok(Json(state.tokens.get(&caller, id).await?))
}

async fn update<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
    JsonBody(input): JsonBody<UpdateToken>,
) -> ApiResult<Json<Token>> {
    Ok(Json(state.tokens.update(&caller, id, input).await?))
}

async fn remove<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.tokens.delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn regenerate<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Token>> {
    Ok(Json(state.tokens.regenerate(&caller, id).await?))
}

async fn list<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<Token>>> {
    Ok(Json(state.tokens.list(&caller, query.into()).await?))
}
