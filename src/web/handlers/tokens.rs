use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use crate::auth::{parse_expiry, DEFAULT_TOKEN_EXPIRY};
use crate::utils::http::HttpResponse;
use crate::web::{authorize, error_response, service_error};
use crate::AppContext;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub const TOKENS_ISSUE_PERMISSION: &str = "tokens:issue";

pub fn tokens_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/tokens", post(issue_token))
        .route("/tokens/verify", post(verify_token))
        .with_state(ctx)
}

#[derive(Debug, Deserialize)]
pub struct IssueTokenRequest {
    pub claims: Value,
    pub expiry: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IssueTokenResponse {
    pub token: String,
    pub expiry: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyTokenRequest {
    pub token: String,
}

pub async fn issue_token(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(req): Json<IssueTokenRequest>,
) -> impl IntoResponse {
    if let Err(response) = authorize(&ctx, &headers, TOKENS_ISSUE_PERMISSION).await {
        return response;
    }

    let expiry = req.expiry.unwrap_or_else(|| DEFAULT_TOKEN_EXPIRY.to_string());
    let token = parse_expiry(&expiry)
        .and_then(|expires_in| ctx.security.issue_token_with_expiry(&req.claims, expires_in));

    match token {
        Ok(token) => {
            let response = HttpResponse::new(0, "Token issued".to_string(), IssueTokenResponse { token, expiry });
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => service_error(e),
    }
}

pub async fn verify_token(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<VerifyTokenRequest>,
) -> impl IntoResponse {
    match ctx.security.verify_token::<Value>(&req.token) {
        Some(claims) => (StatusCode::OK, Json(HttpResponse::new(0, "Token is valid".to_string(), claims))).into_response(),
        None => error_response(StatusCode::UNAUTHORIZED, "Invalid or expired token"),
    }
}
