use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use crate::auth::{ApiKeyRecord, ApiKeyUpdate, NewApiKey};
use crate::utils::http::HttpResponse;
use crate::web::{authorize, error_response, presented_key, service_error};
use crate::AppContext;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Permission required for every key administration route.
pub const KEYS_ADMIN_PERMISSION: &str = "keys:admin";

pub fn keys_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/auth/verify", post(verify_key))
        .route("/keys", get(list_keys).post(create_key))
        .route("/keys/:id", get(get_key).patch(update_key).delete(delete_key))
        .route("/keys/:id/deactivate", post(deactivate_key))
        .with_state(ctx)
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub rate_limit_per_hour: Option<i32>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateKeyResponse {
    /// Shown once; only the hash is kept.
    pub key: String,
    pub record: ApiKeyRecord,
}

pub async fn verify_key(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let Some(candidate) = presented_key(&headers) else {
        return error_response(StatusCode::UNAUTHORIZED, "Missing API key");
    };

    match ctx.security.authenticate(candidate).await {
        Ok(result) if result.is_valid => {
            let response = HttpResponse::new(0, "API key is valid".to_string(), result.record);
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(result) => error_response(
            StatusCode::UNAUTHORIZED,
            result.error_message.unwrap_or_else(|| "Invalid API key".to_string()),
        ),
        Err(e) => service_error(e),
    }
}

pub async fn list_keys(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    if let Err(response) = authorize(&ctx, &headers, KEYS_ADMIN_PERMISSION).await {
        return response;
    }

    match ctx.security.list_api_keys(params.limit, params.offset).await {
        Ok(keys) => (StatusCode::OK, Json(HttpResponse::new(0, "ok".to_string(), keys))).into_response(),
        Err(e) => service_error(e),
    }
}

pub async fn create_key(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(req): Json<CreateKeyRequest>,
) -> impl IntoResponse {
    let caller = match authorize(&ctx, &headers, KEYS_ADMIN_PERMISSION).await {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    let new_key = NewApiKey {
        name: req.name,
        permissions: req.permissions,
        rate_limit_per_hour: req.rate_limit_per_hour,
        expires_at: req.expires_at,
        created_by: caller.id,
    };

    match ctx.security.create_api_key(new_key).await {
        Ok((key, record)) => {
            info!("API key {} created over HTTP", record.id);
            let response = HttpResponse::new(0, "API key created".to_string(), CreateKeyResponse { key, record });
            (StatusCode::CREATED, Json(response)).into_response()
        }
        Err(e) => service_error(e),
    }
}

pub async fn get_key(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Err(response) = authorize(&ctx, &headers, KEYS_ADMIN_PERMISSION).await {
        return response;
    }

    match ctx.security.get_api_key_by_id(&id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(HttpResponse::new(0, "ok".to_string(), record))).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("API key {} not found", id)),
        Err(e) => service_error(e),
    }
}

pub async fn update_key(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(update): Json<ApiKeyUpdate>,
) -> impl IntoResponse {
    if let Err(response) = authorize(&ctx, &headers, KEYS_ADMIN_PERMISSION).await {
        return response;
    }

    match ctx.security.update_api_key(&id, update).await {
        Ok(Some(record)) => (StatusCode::OK, Json(HttpResponse::new(0, "API key updated".to_string(), record))).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("API key {} not found", id)),
        Err(e) => service_error(e),
    }
}

pub async fn deactivate_key(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Err(response) = authorize(&ctx, &headers, KEYS_ADMIN_PERMISSION).await {
        return response;
    }

    match ctx.security.deactivate_api_key(&id).await {
        Ok(true) => (StatusCode::OK, Json(HttpResponse::new(0, "API key deactivated".to_string(), id))).into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, format!("API key {} not found", id)),
        Err(e) => service_error(e),
    }
}

pub async fn delete_key(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Err(response) = authorize(&ctx, &headers, KEYS_ADMIN_PERMISSION).await {
        return response;
    }

    match ctx.security.delete_api_key(&id).await {
        Ok(true) => (StatusCode::OK, Json(HttpResponse::new(0, "API key deleted".to_string(), id))).into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, format!("API key {} not found", id)),
        Err(e) => service_error(e),
    }
}
