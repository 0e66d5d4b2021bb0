mod common;

use std::sync::{Arc, Mutex};

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use marduk_portal::api::{create_router, SESSION_HEADER};
use marduk_portal::app_state::{AppState, Status};
use marduk_portal::config::AppConfig;
use marduk_portal::storage::SessionStore;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

fn app(dir: &TempDir) -> Router {
    let ai = common::ai_client("http://127.0.0.1:9", None, None);
    let state = AppState {
        config: AppConfig::default(),
        assist: common::assist(dir.path(), ai, false),
        sessions: Arc::new(Mutex::new(SessionStore::default())),
        status: Arc::new(Mutex::new(Status::default())),
        shutdown_sender: Arc::new(Mutex::new(None)),
    };
    create_router(state)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>, session: Option<Uuid>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(session) = session {
        builder = builder.header(SESSION_HEADER, session.to_string());
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

#[tokio::test]
async fn search_reports_exact_matches() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);

    let (status, body) = call(&app, Method::GET, "/api/search?q=JudiCalc", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "exactMatch");
    assert_eq!(body["solutionId"], "judicalc");
    assert_eq!(body["result"]["type"], "solution");
    assert_eq!(body["result"]["matchScore"], 100.0);

    let (_, body) = call(&app, Method::GET, "/api/search?q=zzz", None, None).await;
    assert_eq!(body["kind"], "empty");
}

#[tokio::test]
async fn assist_validates_and_echoes_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);

    let (status, body) = call(&app, Method::POST, "/api/assist", Some(json!({"query": "   "})), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let session = Uuid::new_v4();
    let (status, body) =
        call(&app, Method::POST, "/api/assist", Some(json!({"query": "plazos"})), Some(session)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"], session.to_string());
    assert_eq!(body["kind"], "results");
    assert_eq!(body["results"][0]["solution"]["id"], "judicalc");

    let (_, body) =
        call(&app, Method::POST, "/api/assist", Some(json!({"query": "teletransporte"})), Some(session)).await;
    assert_eq!(body["kind"], "noResults");
    assert_eq!(body["query"], "teletransporte");

    let (_, body) = call(&app, Method::GET, "/api/history", None, Some(session)).await;
    assert_eq!(body["searches"], json!(["teletransporte", "plazos"]));
}

#[tokio::test]
async fn settings_round_trip_and_drive_the_dashboard() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);

    let (_, body) = call(&app, Method::GET, "/api/settings", None, None).await;
    assert_eq!(body["role"], "ciudadano");
    assert_eq!(body["model"], "openai/gpt-3.5-turbo");
    assert_eq!(body["hasApiKey"], false);

    let update = json!({
        "role": "investigador",
        "darkMode": true,
        "model": "anthropic/claude-3-haiku",
        "aiSearchEnabled": true
    });
    let (status, body) = call(&app, Method::PUT, "/api/settings", Some(update), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "investigador");
    assert_eq!(body["darkMode"], true);
    assert_eq!(body["model"], "anthropic/claude-3-haiku");
    assert_eq!(body["aiSearchEnabled"], true);

    let (_, body) = call(&app, Method::GET, "/api/dashboard", None, None).await;
    assert_eq!(body["role"], "investigador");

    let (_, body) = call(&app, Method::GET, "/api/dashboard?role=funcionario", None, None).await;
    assert_eq!(body["role"], "funcionario");
    assert!(body["metrics"].as_array().is_some_and(|m| !m.is_empty()));

    let (_, body) = call(&app, Method::GET, "/api/dashboard?role=desconocido", None, None).await;
    assert_eq!(body["role"], "ciudadano");
}

#[tokio::test]
async fn views_follow_the_url_and_record_navigation() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);
    let session = Uuid::new_v4();

    let (_, body) = call(&app, Method::GET, "/api/view?app=judicalc&tab=features", None, Some(session)).await;
    assert_eq!(body["request"]["view"], "solution");
    assert_eq!(body["request"]["tab"], "features");
    assert_eq!(body["content"], "solution");
    assert_eq!(body["solution"]["name"], "JudiCalc");

    let (_, body) = call(&app, Method::GET, "/api/view?category=case-management", None, Some(session)).await;
    assert_eq!(body["content"], "category");
    assert_eq!(body["solutions"][0]["id"], "expedia");

    let (_, body) = call(&app, Method::GET, "/api/view?app=no-existe", None, Some(session)).await;
    assert_eq!(body["content"], "notFound");
    assert_eq!(body["id"], "no-existe");

    let (_, body) = call(&app, Method::GET, "/api/view", None, Some(session)).await;
    assert_eq!(body["content"], "home");
    assert_eq!(body["siteName"], "Marduk Ecosystem");

    let (_, body) = call(&app, Method::GET, "/api/history", None, Some(session)).await;
    assert_eq!(
        body["navigation"],
        json!([
            "/?app=judicalc&tab=features",
            "/?category=case-management",
            "/?app=no-existe",
            "/?"
        ])
    );
}

#[tokio::test]
async fn solutions_resolve_catalog_entries_or_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);

    let (status, body) = call(&app, Method::GET, "/api/solutions/expedia", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "ExpediA");

    let (status, _) = call(&app, Method::GET, "/api/solutions/ai-solution-1", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = call(&app, Method::GET, "/api/solutions/generated", None, None).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn chat_without_credentials_answers_in_demo_mode() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);

    let (status, _) = call(&app, Method::POST, "/api/chat", Some(json!({"prompt": ""})), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&app, Method::POST, "/api/chat", Some(json!({"prompt": "hola"})), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "demo");
    assert!(body["text"].as_str().is_some_and(|t| t.starts_with("¡Hola!")));

    let (status, _) = call(&app, Method::POST, "/api/auth/validate", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_counts_the_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);

    let (_, body) = call(&app, Method::GET, "/api/status", None, None).await;
    assert_eq!(body["siteName"], "Marduk Ecosystem");
    assert_eq!(body["solutions"], 3);
    assert_eq!(body["forums"], 1);
    assert_eq!(body["aiSearchEnabled"], false);
    assert_eq!(body["demoMode"], false);
}
