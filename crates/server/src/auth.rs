// Bearer-JWT authentication: token issuance (`POST /auth/token`, a stand-in
// for the out-of-scope OAuth flow per spec.md §1) plus an extractor that
// every authenticated route pulls an `AuthUser` from. Simplified from the
// teacher's `control-plane` auth stack to bearer-only — no API keys,
// cookies, or OAuth, all out of scope here.

use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::Json;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::ServerContext;
use crate::error::ApiError;

const TOKEN_LIFETIME_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
    iat: i64,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct TokenRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TokenResponse {
    pub token: String,
    pub expires_in: i64,
}

pub fn issue_token(secret: &str, user_id: Uuid) -> Result<TokenResponse, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(TOKEN_LIFETIME_SECS)).timestamp(),
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| ApiError::internal(format!("failed to sign token: {e}")))?;
    Ok(TokenResponse { token, expires_in: TOKEN_LIFETIME_SECS })
}

#[utoipa::path(
    post,
    path = "/auth/token",
    request_body = TokenRequest,
    responses((status = 200, description = "Issued bearer token", body = TokenResponse)),
    tag = "auth"
)]
pub async fn auth_token(
    State(ctx): State<ServerContext>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    Ok(Json(issue_token(&ctx.jwt_secret, req.user_id)?))
}

/// Decodes and validates a bearer token, returning the authenticated user id.
pub fn verify_token(secret: &str, token: &str) -> Result<Uuid, ApiError> {
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map_err(|_| ApiError::unauthorized("invalid or expired token"))?;
    Uuid::parse_str(&data.claims.sub).map_err(|_| ApiError::unauthorized("invalid token subject"))
}

/// The authenticated caller, extracted from `Authorization: Bearer <jwt>`.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
}

impl FromRequestParts<ServerContext> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, ctx: &ServerContext) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("expected a Bearer authorization header"))?;

        let user_id = verify_token(&ctx.jwt_secret, token)?;
        Ok(AuthUser { user_id })
    }
}
