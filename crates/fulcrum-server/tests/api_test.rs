//! HTTP surface tests driving the router in-process.

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use fulcrum_auth::AuthConfig;
use fulcrum_db::SurrealStore;
use fulcrum_domain::DomainConfig;
use fulcrum_server::{AppState, router};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use tower::ServiceExt;
use uuid::Uuid;

const ADMIN: &str = "bootstrap-secret";

async fn app() -> Router {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    fulcrum_db::run_migrations(&db).await.unwrap();

    let auth = AuthConfig {
        bootstrap_admin_token: Some(ADMIN.into()),
        ..AuthConfig::default()
    };
    router(AppState::new(
        SurrealStore::new(db),
        auth,
        DomainConfig::default(),
    ))
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn post(app: &Router, uri: &str, token: &str, body: Value) -> Value {
    let (status, value) = call(app, Method::POST, uri, Some(token), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "POST {uri}: {value}");
    value
}

/// Provider P with one agent, broker B with one group, and a
/// participant token for B.
struct Tenants {
    agent_id: String,
    agent_token: String,
    broker_token: String,
    group_id: String,
    service_type_id: String,
}

async fn tenants(app: &Router) -> Tenants {
    let p = post(app, "/api/v1/providers", ADMIN, json!({"name": "P"})).await;
    let b = post(app, "/api/v1/providers", ADMIN, json!({"name": "B"})).await;
    let st = post(app, "/api/v1/service-types", ADMIN, json!({"name": "pg"})).await;
    let at = post(
        app,
        "/api/v1/agent-types",
        ADMIN,
        json!({"name": "k8s", "service_type_ids": [st["id"]]}),
    )
    .await;
    let agent = post(
        app,
        "/api/v1/agents",
        ADMIN,
        json!({"name": "edge", "provider_id": p["id"], "agent_type_id": at["id"]}),
    )
    .await;
    let token = post(
        app,
        "/api/v1/tokens",
        ADMIN,
        json!({"name": "broker", "role": "Participant", "scope_id": b["id"]}),
    )
    .await;
    let broker_token = token["plain_value"].as_str().unwrap().to_string();
    let group = post(
        app,
        "/api/v1/service-groups",
        &broker_token,
        json!({"name": "shop", "broker_id": b["id"]}),
    )
    .await;

    Tenants {
        agent_id: agent["id"].as_str().unwrap().to_string(),
        agent_token: agent["token"].as_str().unwrap().to_string(),
        broker_token,
        group_id: group["id"].as_str().unwrap().to_string(),
        service_type_id: st["id"].as_str().unwrap().to_string(),
    }
}

#[tokio::test]
async fn healthz_needs_no_credentials() {
    let app = app().await;
    let response = app
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_or_unknown_credentials_are_rejected() {
    let app = app().await;
    let (status, body) = call(&app, Method::GET, "/api/v1/providers", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");

    let (status, _) = call(&app, Method::GET, "/api/v1/providers", Some("nope"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn service_round_trip_over_http() {
    let app = app().await;
    let t = tenants(&app).await;

    let service = post(
        &app,
        "/api/v1/services",
        &t.broker_token,
        json!({
            "name": "db",
            "agent_id": t.agent_id,
            "service_type_id": t.service_type_id,
            "group_id": t.group_id,
            "properties": {"size": 1},
        }),
    )
    .await;
    assert_eq!(service["phase"], "Creating");
    let service_uri = format!("/api/v1/services/{}", service["id"].as_str().unwrap());

    let (status, jobs) = call(
        &app,
        Method::GET,
        "/api/v1/jobs/pending?limit=10",
        Some(&t.agent_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(jobs.as_array().unwrap().len(), 1);
    let job_id = jobs[0]["id"].as_str().unwrap().to_string();
    assert_eq!(jobs[0]["action"], "Create");

    let claim_uri = format!("/api/v1/jobs/{job_id}/claim");
    let (status, job) = call(&app, Method::POST, &claim_uri, Some(&t.agent_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["state"], "Claimed");

    let (status, _) = call(&app, Method::POST, &claim_uri, Some(&t.agent_token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/v1/jobs/{job_id}/complete"),
        Some(&t.agent_token),
        Some(json!({"resources": {"host": "10.0.0.1"}, "external_id": "pg-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, service) = call(&app, Method::GET, &service_uri, Some(&t.broker_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(service["phase"], "Created");
    assert_eq!(service["current_state"], "Created");
    assert_eq!(service["resources"]["host"], "10.0.0.1");

    let (status, service) = call(
        &app,
        Method::POST,
        &format!("{service_uri}/start"),
        Some(&t.broker_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(service["phase"], "Starting");

    // Only one transition at a time.
    let (status, body) = call(
        &app,
        Method::DELETE,
        &service_uri,
        Some(&t.broker_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");
}

#[tokio::test]
async fn foreign_tenant_gets_forbidden_not_missing() {
    let app = app().await;
    let t = tenants(&app).await;
    let agent_uri = format!("/api/v1/agents/{}", t.agent_id);

    // B brokers for P but does not own P's agents.
    let (status, _) = call(&app, Method::GET, &agent_uri, Some(&t.broker_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let missing = format!("/api/v1/agents/{}", Uuid::new_v4());
    let (status, _) = call(&app, Method::GET, &missing, Some(&t.broker_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&app, Method::GET, &missing, Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, me) = call(
        &app,
        Method::GET,
        "/api/v1/agents/me",
        Some(&t.agent_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], t.agent_id.as_str());
    assert!(me.get("token_hash").is_none());
}

#[tokio::test]
async fn agent_reports_status_and_rotates_its_token() {
    let app = app().await;
    let t = tenants(&app).await;

    let (status, agent) = call(
        &app,
        Method::PUT,
        "/api/v1/agents/me/status",
        Some(&t.agent_token),
        Some(json!({"state": "Connected"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(agent["state"], "Connected");

    let (status, rotated) = call(
        &app,
        Method::POST,
        "/api/v1/agents/me/rotate-token",
        Some(&t.agent_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let new_token = rotated["token"].as_str().unwrap();

    let (status, _) = call(&app, Method::GET, "/api/v1/agents/me", Some(&t.agent_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&app, Method::GET, "/api/v1/agents/me", Some(new_token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn invalid_input_and_conflicts_map_to_status_codes() {
    let app = app().await;
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/providers",
        Some(ADMIN),
        Some(json!({"name": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");

    let t = tenants(&app).await;
    let (status, providers) = call(&app, Method::GET, "/api/v1/providers?limit=1", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(providers["total"], 2);
    assert_eq!(providers["limit"], 1);
    assert_eq!(providers["items"].as_array().unwrap().len(), 1);

    // The group still holds nothing, but the provider still has an agent.
    let (_, agent) = call(
        &app,
        Method::GET,
        &format!("/api/v1/agents/{}", t.agent_id),
        Some(ADMIN),
        None,
    )
    .await;
    let provider_uri = format!("/api/v1/providers/{}", agent["provider_id"].as_str().unwrap());
    let (status, body) = call(&app, Method::DELETE, &provider_uri, Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let group_uri = format!("/api/v1/service-groups/{}", t.group_id);
    let (status, _) = call(&app, Method::DELETE, &group_uri, Some(&t.broker_token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

async fn post_raw(app: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn malformed_bodies_are_invalid_input() {
    let app = app().await;
    for body in [r#"{"name": 42}"#, "{}", "{not json"] {
        let (status, value) = post_raw(&app, "/api/v1/providers", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(value["error"], "invalid_input");
        assert!(value["message"].as_str().is_some_and(|m| !m.is_empty()));
    }

    // A body without the JSON content type is rejected the same way.
    let request = Request::post("/api/v1/providers")
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN}"))
        .body(Body::from(r#"{"name": "P"}"#))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn disabled_agents_and_providers_lose_access() {
    let app = app().await;
    let t = tenants(&app).await;
    let state_uri = format!("/api/v1/agents/{}/state", t.agent_id);

    let (status, _) = call(
        &app,
        Method::PUT,
        &state_uri,
        Some(&t.agent_token),
        Some(json!({"state": "Disabled"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, agent) = call(
        &app,
        Method::PUT,
        &state_uri,
        Some(ADMIN),
        Some(json!({"state": "Disabled"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(agent["state"], "Disabled");

    let (status, _) = call(&app, Method::GET, "/api/v1/agents/me", Some(&t.agent_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Broker B's participant token stops working once B is disabled.
    let (_, group) = call(
        &app,
        Method::GET,
        &format!("/api/v1/service-groups/{}", t.group_id),
        Some(&t.broker_token),
        None,
    )
    .await;
    let broker_uri = format!("/api/v1/providers/{}", group["broker_id"].as_str().unwrap());
    let disable = json!({"state": "Disabled"});
    let (status, _) = call(&app, Method::PATCH, &broker_uri, Some(&t.broker_token), Some(disable.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, Method::PATCH, &broker_uri, Some(ADMIN), Some(disable)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, Method::GET, "/api/v1/providers", Some(&t.broker_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
