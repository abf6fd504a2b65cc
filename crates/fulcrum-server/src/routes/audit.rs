use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use fulcrum_core::models::audit::AuditEntry;
use fulcrum_core::repository::{PaginatedResult, Store};

use super::ListQuery;
use crate::error::ApiResult;
use crate::extract::Caller;
use crate::state::AppState;

pub fn routes<S: Store>() -> Router<AppState<S>> {
    Router::new().route("/audit-entries", get(list::<S>))
}

async fn list<S: Store>(
    State(state): State<AppState<S>>,
    Caller(caller): Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<PaginatedResult<AuditEntry>>> {
    Ok(Json(state.audit.list(&caller, query.into()).await?))
}
