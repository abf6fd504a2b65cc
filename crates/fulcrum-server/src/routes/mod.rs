//! HTTP routes, mounted under `/api/v1`.

mod agents;
mod audit;
mod catalog;
mod jobs;
mod metrics;
mod providers;
mod service_groups;
mod services;
mod tokens;

use axum::Router;
use axum::routing::get;
use fulcrum_core::repository::{Pagination, Store};
use serde::Deserialize;

use crate::state::AppState;

pub const MAX_PAGE_SIZE: u64 = 200;

/// `offset` / `limit` query parameters accepted by every list endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl From<ListQuery> for Pagination {
    fn from(query: ListQuery) -> Self {
        let defaults = Pagination::default();
        Pagination {
            offset: query.offset.unwrap_or(defaults.offset),
            limit: query
                .limit
                .unwrap_or(defaults.limit)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }
}

/// The full application router.
pub fn router<S: Store>(state: AppState<S>) -> Router {
    let api = Router::new()
        .merge(providers::routes())
        .merge(agents::routes())
        .merge(catalog::routes())
        .merge(service_groups::routes())
        .merge(services::routes())
        .merge(jobs::routes())
        .merge(tokens::routes())
        .merge(metrics::routes())
        .merge(audit::routes());

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api/v1", api)
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_is_clamped() {
        let p: Pagination = ListQuery {
            offset: Some(10),
            limit: Some(10_000),
        }
        .into();
        assert_eq!(p.offset, 10);
        assert_eq!(p.limit, MAX_PAGE_SIZE);

        let p: Pagination = ListQuery {
            offset: None,
            limit: Some(0),
        }
        .into();
        assert_eq!(p.limit, 1);

        let p: Pagination = ListQuery::default().into();
        assert_eq!(p.offset, 0);
        assert_eq!(p.limit, 50);
    }
}
