pub mod handlers;

#[cfg(test)]
mod tests;

use crate::auth::{ApiKeyRecord, SecurityError};
use crate::utils::http::HttpResponse;
use crate::AppContext;
use anyhow::Result;
use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .merge(handlers::keys::keys_router(ctx.clone()))
        .merge(handlers::tokens::tokens_router(ctx))
}

pub async fn start_server(ctx: Arc<AppContext>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let response = HttpResponse::new(status.as_u16() as i32, message.into(), ());
    (status, Json(response)).into_response()
}

pub(crate) fn service_error(e: SecurityError) -> Response {
    match e {
        SecurityError::Validation(msg) => error_response(StatusCode::BAD_REQUEST, msg),
        other => {
            error!("Security service failure: {}", other);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// Accepts `Authorization: Bearer <key>` (scheme matched case-insensitively) or the bare key.
pub(crate) fn presented_key(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let key = match value.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ => value,
    };
    (!key.is_empty()).then_some(key)
}

/// Authenticates the caller's key and requires `permission` on it.
pub(crate) async fn authorize(
    ctx: &AppContext,
    headers: &HeaderMap,
    permission: &str,
) -> std::result::Result<ApiKeyRecord, Response> {
    let Some(candidate) = presented_key(headers) else {
        return Err(error_response(StatusCode::UNAUTHORIZED, "Missing API key"));
    };

    let result = ctx.security.authenticate(candidate).await.map_err(service_error)?;
    let record = match result.record {
        Some(record) if result.is_valid => record,
        _ => {
            let message = result.error_message.unwrap_or_else(|| "Invalid API key".to_string());
            return Err(error_response(StatusCode::UNAUTHORIZED, message));
        }
    };

    let check = ctx.security.check_permission(&record, permission);
    if !check.has_permission {
        let message = check.error_message.unwrap_or_else(|| "Permission denied".to_string());
        return Err(error_response(StatusCode::FORBIDDEN, message));
    }
    Ok(record)
}
