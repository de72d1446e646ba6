// In-process API integration tests, driven with `tower::ServiceExt::oneshot`
// against an `axum::Router` built over an in-memory sqlite database. No
// bound socket, no `reqwest` against a running process.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use server::{ServerConfig, ServerContext};

async fn test_context() -> ServerContext {
    let config = ServerConfig {
        http_port: 0,
        db_path: "sqlite::memory:".to_string(),
        scheduler_db_path: "sqlite::memory:".to_string(),
        workflow_db_path: "sqlite::memory:".to_string(),
        jwt_secret: "test-secret".to_string(),
        scheduler_enabled: false,
    };
    ServerContext::bootstrap(&config).await.expect("bootstrap server context")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

async fn issue_token(app: axum::Router, user_id: Uuid) -> String {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/token")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "user_id": user_id }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    body["token"].as_str().unwrap().to_string()
}

fn authed(method: &str, uri: &str, token: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri).header(header::AUTHORIZATION, format!("Bearer {token}"))
}

#[tokio::test]
async fn health_check_reports_ok() {
    let app = server::app(test_context().await);

    let response = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn auth_token_round_trips_and_rejects_missing_bearer() {
    let app = server::app(test_context().await);
    let user_id = Uuid::now_v7();

    let token = issue_token(app.clone(), user_id).await;
    assert!(!token.is_empty());

    // No Authorization header at all is unauthorized.
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/tasks").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A garbage bearer token is also rejected.
    let response = app
        .oneshot(authed("GET", "/api/tasks", "not-a-real-jwt").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_task_then_list_and_get_and_cancel() {
    let app = server::app(test_context().await);
    let user_id = Uuid::now_v7();
    let token = issue_token(app.clone(), user_id).await;

    // `SimulatedProvider` echoes a non-JSON message, which falls back to a
    // task-intent classification, so this always produces a persisted task.
    let response = app
        .clone()
        .oneshot(
            authed("POST", "/api/tasks", &token)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "message": "research the latest rust release" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_json(response).await;
    let task_id = created["task_id"].as_str().expect("task_id present").to_string();

    let response = app
        .clone()
        .oneshot(authed("GET", "/api/tasks", &token).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = body_json(response).await;
    let tasks = listed.as_array().unwrap();
    assert!(tasks.iter().any(|t| t["id"] == task_id));

    let response = app
        .clone()
        .oneshot(authed("GET", &format!("/api/tasks/{task_id}"), &token).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await;
    assert_eq!(fetched["id"], task_id);

    // The task has already run to completion by the time the response
    // comes back, so cancelling it now finds nothing running.
    let response = app
        .oneshot(authed("POST", &format!("/api/tasks/{task_id}/cancel"), &token).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_task_rejects_empty_message() {
    let app = server::app(test_context().await);
    let token = issue_token(app.clone(), Uuid::now_v7()).await;

    let response = app
        .oneshot(
            authed("POST", "/api/tasks", &token)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "message": "   " }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn task_belonging_to_another_user_is_forbidden() {
    let ctx = test_context().await;
    let app = server::app(ctx.clone());
    let owner_token = issue_token(app.clone(), Uuid::now_v7()).await;
    let other_token = issue_token(app.clone(), Uuid::now_v7()).await;

    let response = app
        .clone()
        .oneshot(
            authed("POST", "/api/tasks", &owner_token)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "message": "summarize this document" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let created = body_json(response).await;
    let task_id = created["task_id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(authed("GET", &format!("/api/tasks/{task_id}"), &other_token).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn get_missing_task_is_not_found() {
    let app = server::app(test_context().await);
    let token = issue_token(app.clone(), Uuid::now_v7()).await;

    let response = app
        .oneshot(authed("GET", &format!("/api/tasks/{}", Uuid::now_v7()), &token).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn scheduler_job_crud_round_trip() {
    let app = server::app(test_context().await);
    let token = issue_token(app.clone(), Uuid::now_v7()).await;

    let response = app
        .clone()
        .oneshot(
            authed("POST", "/api/scheduler/jobs", &token)
                .header(header::CONTENT_TYPE, "application/json")
                .body(
                    Body::from(
                        json!({
                            "name": "nightly digest",
                            "schedule": { "kind": "cron", "expression": "0 9 * * *" },
                            "config": { "kind": "task", "message": "summarize today's tasks" }
                        })
                        .to_string(),
                    ),
                )
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let job = body_json(response).await;
    let job_id = job["id"].as_str().unwrap().to_string();
    assert_eq!(job["enabled"], true);

    let response = app
        .clone()
        .oneshot(
            authed("POST", &format!("/api/scheduler/jobs/{job_id}/toggle"), &token)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "enabled": false }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let toggled = body_json(response).await;
    assert_eq!(toggled["enabled"], false);

    let response = app
        .clone()
        .oneshot(authed("GET", "/api/scheduler/jobs", &token).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let jobs = body_json(response).await;
    assert_eq!(jobs.as_array().unwrap().len(), 1);

    let response = app
        .oneshot(authed("DELETE", &format!("/api/scheduler/jobs/{job_id}"), &token).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn invalid_cron_expression_is_rejected() {
    let app = server::app(test_context().await);
    let token = issue_token(app.clone(), Uuid::now_v7()).await;

    let response = app
        .oneshot(
            authed("POST", "/api/scheduler/jobs", &token)
                .header(header::CONTENT_TYPE, "application/json")
                .body(
                    Body::from(
                        json!({
                            "name": "broken",
                            "schedule": { "kind": "cron", "expression": "not a cron" },
                            "config": { "kind": "task", "message": "x" }
                        })
                        .to_string(),
                    ),
                )
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn workflow_create_execute_and_templates() {
    let app = server::app(test_context().await);
    let token = issue_token(app.clone(), Uuid::now_v7()).await;

    let response = app
        .clone()
        .oneshot(
            authed("POST", "/api/workflows", &token)
                .header(header::CONTENT_TYPE, "application/json")
                .body(
                    Body::from(
                        json!({
                            "name": "approval flow",
                            "nodes": [
                                { "id": "start", "config": { "type": "start" } },
                                { "id": "end", "config": { "type": "end" } }
                            ],
                            "edges": [
                                { "id": "start_to_end", "source": "start", "target": "end", "condition": null }
                            ]
                        })
                        .to_string(),
                    ),
                )
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let workflow = body_json(response).await;
    let workflow_id = workflow["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            authed("POST", &format!("/api/workflows/{workflow_id}/execute"), &token)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "input": {} }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(authed("GET", &format!("/api/workflows/{workflow_id}/executions"), &token).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let executions = body_json(response).await;
    assert_eq!(executions.as_array().unwrap().len(), 1);

    let response = app
        .oneshot(authed("GET", "/api/workflow-templates", &token).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let templates = body_json(response).await;
    assert!(!templates.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn workflow_without_a_start_node_is_rejected() {
    let app = server::app(test_context().await);
    let token = issue_token(app.clone(), Uuid::now_v7()).await;

    let response = app
        .oneshot(
            authed("POST", "/api/workflows", &token)
                .header(header::CONTENT_TYPE, "application/json")
                .body(
                    Body::from(
                        json!({
                            "name": "no start node",
                            "nodes": [ { "id": "end", "config": { "type": "end" } } ],
                            "edges": []
                        })
                        .to_string(),
                    ),
                )
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn agents_endpoint_lists_built_ins() {
    let app = server::app(test_context().await);
    let token = issue_token(app.clone(), Uuid::now_v7()).await;

    let response =
        app.oneshot(authed("GET", "/api/agents", &token).body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let agents = body_json(response).await;
    assert_eq!(agents.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn stats_endpoint_reflects_persisted_state() {
    let app = server::app(test_context().await);
    let token = issue_token(app.clone(), Uuid::now_v7()).await;

    app.clone()
        .oneshot(
            authed("POST", "/api/tasks", &token)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "message": "write a changelog entry" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let response =
        app.oneshot(authed("GET", "/api/stats", &token).body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stats = body_json(response).await;
    assert_eq!(stats["tasks"]["total"], 1);
    assert_eq!(stats["agents"]["total"], 3);
}

#[tokio::test]
async fn swagger_ui_and_openapi_doc_are_served() {
    let app = server::app(test_context().await);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api-doc/openapi.json").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let spec = body_json(response).await;
    assert_eq!(spec["info"]["title"], "Meridian API");
}
