//! Signup/login (spec.md §3 auth boundary concession) and the
//! `AuthedUser` extractor every other handler depends on.

use axum::Json;
use axum::extract::{FromRequestParts, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use chat_protocol::User;
use serde::{Deserialize, Serialize};

use crate::auth::{TokenValidator, hash_password, verify_password};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::store::NewUser;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub phone: String,
    pub password: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub user: User,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<Json<TokenResponse>> {
    if req.name.trim().is_empty() || req.phone.trim().is_empty() || req.password.len() < 8 {
        return Err(ApiError::Validation(
            "name and phone must not be empty and password must be at least 8 characters".into(),
        ));
    }

    let password_hash = hash_password(req.password)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let user = state
        .dispatcher
        .store()
        .users()
        .create(NewUser {
            name: &req.name,
            phone: &req.phone,
            email: req.email.as_deref(),
            password_hash: &password_hash,
        })
        .await?;

    let token = state
        .jwt
        .issue(&user.id)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(TokenResponse { token, user }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let (user, password_hash) = state
        .dispatcher
        .store()
        .users()
        .find_by_phone_with_hash(&req.phone)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    let ok = verify_password(req.password, password_hash)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !ok {
        return Err(ApiError::Unauthenticated);
    }

    let token = state
        .jwt
        .issue(&user.id)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(TokenResponse { token, user }))
}

/// Resolves the bearer token in `Authorization: Bearer <token>` into a user
/// id (spec.md §5 auth boundary).
pub struct AuthedUser(pub String);

impl FromRequestParts<AppState> for AuthedUser {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or((StatusCode::UNAUTHORIZED, "expected a Bearer token"))?;

        state
            .jwt
            .validate(token)
            .map(AuthedUser)
            .map_err(|_| (StatusCode::UNAUTHORIZED, "invalid or expired token"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_protocol::PresenceStatus;

    #[test]
    fn token_response_serializes_the_user_camel_case() {
        let response = TokenResponse {
            token: "t".into(),
            user: User {
                id: "u1".into(),
                name: "Alice".into(),
                phone: "+15550001111".into(),
                email: None,
                status: PresenceStatus::Offline,
                last_seen: chrono::Utc::now(),
                profile_picture: None,
            },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["user"]["id"], serde_json::json!("u1"));
        assert_eq!(json["user"]["profilePicture"], serde_json::Value::Null);
    }
}
