//! Services. State changes answer 202: the returned service shows the
//! transition in flight, the agent finishes it later.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use fulcrum_core::models::service::{Service, ServicePhase};
use fulcrum_core::repository::{PaginatedResult, Store};
use fulcrum_domain::service::{NewService, ServiceChanges};
use serde::Serialize;
use uuid::Uuid;

use super::ListQuery;
use crate::error::ApiResult;
use crate::extract::{Caller, JsonBody};
use crate::state::AppState;

/// A service together with its derived lifecycle phase.
#[derive(Debug, Serialize)]
pub struct ServiceView {
    #[serde(flatten)]
    pub service: Service,
    pub phase: ServicePhase,
}

impl From<Service> for ServiceView {
    fn from(service: Service) -> Self {
        Self {
            phase: service.phase(),
            service,
        }
    }
}

pub fn routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/services", get(list::<S>).post(create::<S>))
        .route(
            "/services/{id}",
            get(read::<S>).patch(update::<S>).delete(remove::<S>),
        )
        .route("/services/{id}/start", post(start::<S>))
        .route("/services/{id}/stop", post(stop::<S>))
        .route("/services/{id}/retry", post(retry::<S>))
}

async fn create<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    JsonBody(input): JsonBody<NewService>,
) -> ApiResult<(StatusCode, Json<ServiceView>)> {
    let service = state.services.create(&caller, input).await?;
    Ok((StatusCode::CREATED, Json(service.into())))
}

async fn read<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ServiceView>> {
    Ok(Json(state.services.get(&caller, id).await?.into()))
}

async fn update<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
    JsonBody(changes): JsonBody<ServiceChanges>,
) -> ApiResult<(StatusCode, Json<ServiceView>)> {
    let status = if changes.properties.is_some() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    let service = state.services.update(&caller, id, changes).await?;
    Ok((status, Json(service.into())))
}

async fn remove<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<ServiceView>)> {
    let service = state.services.delete(&caller, id).await?;
    Ok((StatusCode::ACCEPTED, Json(service.into())))
}

async fn list<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<ServiceView>>> {
    let page = state.services.list(&caller, query.into()).await?;
    Ok(Json(PaginatedResult {
        items: page.items.into_iter().map(ServiceView::from).collect(),
        total: page.total,
        offset: page.offset,
        limit: page.limit,
    }))
}

async fn start<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<ServiceView>)> {
    let service = state.services.start(&caller, id).await?;
    Ok((StatusCode::ACCEPTED, Json(service.into())))
}

async fn stop<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<ServiceView>)> {
    let service = state.services.stop(&caller, id).await?;
    Ok((StatusCode::ACCEPTED, Json(service.into())))
}

async fn retry<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<ServiceView>)> {
    let service = state.services.retry(&caller, id).await?;
    Ok((StatusCode::ACCEPTED, Json(service.into())))
}
