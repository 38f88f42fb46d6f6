use super::*;
use crate::auth::{NewApiKey, SecurityService, TokenSigner};
use crate::storage::SqliteKeyStorage;
use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tower::ServiceExt;

struct TestApp {
    ctx: Arc<AppContext>,
    admin_key: String,
    reader_key: String,
    _temp_file: NamedTempFile,
}

async fn setup_app() -> TestApp {
    let temp_file = NamedTempFile::new().unwrap();
    let db_url = format!("sqlite:{}?mode=rwc", temp_file.path().display());
    let storage = SqliteKeyStorage::new(&db_url).await.unwrap();
    let security = SecurityService::new(Arc::new(storage), TokenSigner::new("test-secret"), 4);

    let (admin_key, _) = security
        .create_api_key(NewApiKey::new("Admin", vec!["*".to_string()], "bootstrap"))
        .await
        .unwrap();
    let (reader_key, _) = security
        .create_api_key(NewApiKey::new("Reader", vec!["forms:read".to_string()], "bootstrap"))
        .await
        .unwrap();

    TestApp {
        ctx: Arc::new(AppContext { security: Arc::new(security) }),
        admin_key,
        reader_key,
        _temp_file: temp_file,
    }
}

async fn send(app: &TestApp, method: &str, uri: &str, key: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header("Authorization", format!("Bearer {}", key));
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router(app.ctx.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_verify_endpoint() {
    let app = setup_app().await;

    let (status, body) = send(&app, "POST", "/auth/verify", Some(&app.reader_key), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Reader");
    assert!(body["data"].get("key_hash").is_none());

    let (status, body) = send(&app, "POST", "/auth/verify", Some("ck_wrong"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid API key");
}

#[tokio::test]
async fn test_bearer_scheme_is_case_insensitive() {
    let app = setup_app().await;

    for scheme in ["Bearer", "bearer", "BEARER"] {
        let request = Request::builder()
            .method("POST")
            .uri("/auth/verify")
            .header("Authorization", format!("{} {}", scheme, app.reader_key))
            .body(Body::empty())
            .unwrap();
        let response = router(app.ctx.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "scheme {:?}", scheme);
    }

    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, app.reader_key.parse().unwrap());
    assert_eq!(presented_key(&headers), Some(app.reader_key.as_str()));
    headers.insert(header::AUTHORIZATION, format!("bearer \t{}", app.reader_key).parse().unwrap());
    assert_eq!(presented_key(&headers), Some(app.reader_key.as_str()));
}

#[tokio::test]
async fn test_admin_routes_require_permission() {
    let app = setup_app().await;

    let (status, _) = send(&app, "GET", "/keys", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, "GET", "/keys", Some(&app.reader_key), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["message"].as_str().unwrap().contains("keys:admin"));

    let (status, body) = send(&app, "GET", "/keys?limit=1", Some(&app.admin_key), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "GET", "/keys?limit=18446744073709551615", Some(&app.admin_key), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, "GET", "/keys?offset=18446744073709551615", Some(&app.admin_key), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_key_administration_over_http() {
    let app = setup_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/keys",
        Some(&app.admin_key),
        Some(json!({"name": "Ingest", "permissions": ["submissions:write"], "rate_limit_per_hour": 500})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let new_key = body["data"]["key"].as_str().unwrap().to_string();
    let id = body["data"]["record"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["record"]["rate_limit_per_hour"], 500);

    let (status, _) = send(&app, "POST", "/auth/verify", Some(&new_key), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "PATCH", &format!("/keys/{}", id), Some(&app.admin_key), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("no fields"));

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/keys/{}", id),
        Some(&app.admin_key),
        Some(json!({"key_hash": "overwritten"})),
    )
    .await;
    assert!(status.is_client_error());

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/keys/{}", id),
        Some(&app.admin_key),
        Some(json!({"name": "Ingest v2"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Ingest v2");

    let (status, _) = send(&app, "POST", &format!("/keys/{}/deactivate", id), Some(&app.admin_key), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "POST", "/auth/verify", Some(&new_key), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "DELETE", &format!("/keys/{}", id), Some(&app.admin_key), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", &format!("/keys/{}", id), Some(&app.admin_key), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_token_endpoints() {
    let app = setup_app().await;
    let claims = json!({"sub": "user-7", "forms": [1, 2]});

    let (status, _) = send(&app, "POST", "/tokens", Some(&app.reader_key), Some(json!({"claims": claims}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "POST",
        "/tokens",
        Some(&app.admin_key),
        Some(json!({"claims": claims, "expiry": "15m"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "POST", "/tokens/verify", None, Some(json!({"token": token}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], claims);

    let (status, _) = send(&app, "POST", "/tokens/verify", None, Some(json!({"token": "garbage"}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/tokens",
        Some(&app.admin_key),
        Some(json!({"claims": claims, "expiry": "soon"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
