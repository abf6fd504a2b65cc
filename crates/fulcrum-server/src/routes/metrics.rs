//! Metric types and metric entries.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use fulcrum_core::models::metric::{
    CreateMetricType, MetricEntry, MetricType, UpdateMetricType,
};
use fulcrum_core::repository::{PaginatedResult, Store};
use fulcrum_domain::metric::NewMetricEntry;
use uuid::Uuid;

use super::ListQuery;
use crate::error::ApiResult;
use crate::extract::{Caller, JsonBody};
use crate::state::AppState;

pub fn routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/metric-types", get(list_types::<S>).post(create_type::<S>))
        .route(
            "/metric-types/{id}",
            get(read_type::<S>)
                .patch(update_type::<S>)
                .delete(remove_type::<S>),
        )
        .route(
            "/metric-entries",
            get(list_entries::<S>).post(create_entry::<S>),
        )
}

async fn create_type<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    JsonBody(input): JsonBody<CreateMetricType>,
) -> ApiResult<(StatusCode, Json<MetricType>)> {
    let metric_type = state.metrics.create_type(&caller, input).await?;
    Ok((StatusCode::CREATED, Json(metric_type)))
}

async fn read_type<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MetricType>> {
    Ok(Json(state.metrics.get_type(&caller, id).await?))
}

async fn update_type<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
    JsonBody(input): JsonBody<UpdateMetricType>,
) -> ApiResult<Json<MetricType>> {
    Ok(Json(state.metrics.update_type(&caller, id, input).await?))
}

async fn remove_type<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.metrics.delete_type(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_types<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<MetricType>>> {
    Ok(Json(state.metrics.list_types(&caller, query.into()).await?))
}

async fn create_entry<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    JsonBody(input): JsonBody<NewMetricEntry>,
) -> ApiResult<(StatusCode, Json<MetricEntry>)> {
    let entry = state.metrics.create_entry(&caller, input).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn list_entries<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<MetricEntry>>> {
    Ok(Json(state.metrics.list_entries(&caller, query.into()).await?))
}
