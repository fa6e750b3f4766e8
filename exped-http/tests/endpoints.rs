use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use exped_core::FormService;
use exped_http::{app, state::AppState};
use exped_store::{InMemoryRecordStore, RecordStore};
use exped_types::{CaseId, CaseRecord, TokenRow};

const CASE: i64 = 31;

async fn store_with(tokens: &[(&str, Duration, bool)], case: Value) -> Arc<InMemoryRecordStore> {
    let store = Arc::new(InMemoryRecordStore::new());
    let now = Utc::now();
    for (token, ttl, used) in tokens {
        store
            .insert_token(TokenRow {
                token: token.to_string(),
                expediente_id: CaseId::from(CASE),
                expires_at: now + *ttl,
                used_at: used.then_some(now - Duration::minutes(5)),
            })
            .await
            .unwrap();
    }
    let Value::Object(map) = case else { panic!("object expected") };
    store.insert_case(CaseRecord::new(map)).await.unwrap();
    store
}

fn router(store: Arc<InMemoryRecordStore>) -> Router {
    app(AppState::new(FormService::new(store)))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn fetch(token: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("/api/expediente?token={token}"))
        .body(Body::empty())
        .unwrap()
}

fn submit(body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/expediente_submit")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn standard_tokens() -> Vec<(&'static str, Duration, bool)> {
    vec![
        ("live", Duration::days(3), false),
        ("used", Duration::days(3), true),
        ("stale", Duration::minutes(-1), false),
    ]
}

#[tokio::test]
async fn unknown_token_is_404_on_both_endpoints() {
    let app = router(store_with(&standard_tokens(), json!({"id_": CASE})).await);

    let (status, body) = send(&app, fetch("ghost")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Invalid token"}));

    let (status, _) = send(&app, submit(json!({"token": "ghost", "data": {}}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn used_token_is_410_on_both_endpoints() {
    let app = router(store_with(&standard_tokens(), json!({"id_": CASE})).await);

    let (status, body) = send(&app, fetch("used")).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"], "Link already used");

    let (status, _) = send(&app, submit(json!({"token": "used", "data": {"nif_entidad": "B1"}}))).await;
    assert_eq!(status, StatusCode::GONE);
}

#[tokio::test]
async fn expired_token_is_410_on_both_endpoints() {
    let app = router(store_with(&standard_tokens(), json!({"id_": CASE})).await);

    let (status, body) = send(&app, fetch("stale")).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"], "Link expired");

    let (status, _) = send(&app, submit(json!({"token": "stale", "data": {}}))).await;
    assert_eq!(status, StatusCode::GONE);
}

#[tokio::test]
async fn fetch_returns_case_id_and_pending_fields() {
    let app = router(store_with(&standard_tokens(), json!({"id_": CASE, "nif_entidad": "B99"})).await);

    let (status, body) = send(&app, fetch("live")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expediente_id"], json!(CASE));

    let fields = body["fields"].as_array().unwrap();
    assert_eq!(fields.len(), 26);
    assert_eq!(fields[0], json!({"name": "comunidad_autonoma", "label": "Comunidad autónoma", "type": "text"}));
    assert!(fields.iter().all(|f| f["name"] != "nif_entidad"));
}

#[tokio::test]
async fn request_shape_errors_are_400() {
    let app = router(store_with(&standard_tokens(), json!({"id_": CASE})).await);

    let (status, body) = send(&app, fetch("")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing token");

    let (status, body) = send(&app, submit(json!({"token": "live"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing data");

    let broken = Request::builder()
        .method(Method::POST)
        .uri("/api/expediente_submit")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, broken).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn wrong_method_is_405() {
    let app = router(store_with(&standard_tokens(), json!({"id_": CASE})).await);

    let req = Request::builder()
        .method(Method::DELETE)
        .uri("/api/expediente?token=live")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, json!({"error": "Method not allowed"}));
}

#[tokio::test]
async fn submit_never_overwrites_filled_fields() {
    let store = store_with(
        &standard_tokens(),
        json!({"id_": CASE, "ayuda_rehab": "Original", "cuantia_ayuda": 10}),
    )
    .await;
    let app = router(store.clone());

    let data = json!({"ayuda_rehab": "Replacement", "cuantia_ayuda": "99", "ent_ayuda": "Ayuntamiento"});
    let (status, body) = send(&app, submit(json!({"token": "live", "data": data}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true, "updated": ["ent_ayuda"]}));

    let case = store.find_case(&CaseId::from(CASE)).await.unwrap().unwrap();
    assert_eq!(case.get("ayuda_rehab"), Some(&json!("Original")));
    assert_eq!(case.get("cuantia_ayuda"), Some(&json!(10)));
}

#[tokio::test]
async fn end_to_end_single_use_submission() {
    let store = store_with(&standard_tokens(), json!({"id_": CASE})).await;
    let app = router(store.clone());

    let (status, body) = send(
        &app,
        submit(json!({
            "token": "live",
            "data": {"ayuda_rehab": "Plan X", "cuantia_ayuda": "1.000,50", "ayuda_bisrehab": "maybe"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
    let updated: Vec<&str> = body["updated"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(updated.contains(&"ayuda_rehab"));
    assert!(updated.contains(&"cuantia_ayuda"));
    assert!(!updated.contains(&"ayuda_bisrehab"));

    let case = store.find_case(&CaseId::from(CASE)).await.unwrap().unwrap();
    assert_eq!(case.get("cuantia_ayuda"), Some(&json!(1000.5)));
    assert_eq!(case.get("ayuda_rehab"), Some(&json!("Plan X")));

    let (status, body) = send(&app, submit(json!({"token": "live", "data": {"nif_entidad": "B1"}}))).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"], "Link already used");

    let (status, _) = send(&app, fetch("live")).await;
    assert_eq!(status, StatusCode::GONE);
}

#[tokio::test]
async fn healthz_is_plain_ok() {
    let app = router(store_with(&[], json!({"id_": CASE})).await);
    let resp = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}
