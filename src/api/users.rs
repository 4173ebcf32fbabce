//! User profile/presence/search handlers (spec.md §6.1).

use axum::Json;
use axum::extract::{Query, State};
use chat_protocol::{PresenceStatus, User};
use serde::{Deserialize, Serialize};

use super::auth::AuthedUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::store::ProfileUpdate;

pub async fn me(State(state): State<AppState>, AuthedUser(caller): AuthedUser) -> ApiResult<Json<User>> {
    let user = state
        .dispatcher
        .store()
        .users()
        .find_by_id(&caller)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {caller}")))?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "profilePicture")]
    pub profile_picture: Option<String>,
}

pub async fn update_me(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    let user = state
        .dispatcher
        .store()
        .users()
        .update_profile(
            &caller,
            ProfileUpdate {
                name: req.name.as_deref(),
                email: req.email.as_deref(),
                profile_picture: req.profile_picture.as_deref(),
            },
        )
        .await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

const SEARCH_LIMIT: i64 = 25;

pub async fn search(
    State(state): State<AppState>,
    AuthedUser(_caller): AuthedUser,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<User>>> {
    if query.q.trim().is_empty() {
        return Ok(Json(Vec::new()));
    }
    let users = state.dispatcher.store().users().search(query.q.trim(), SEARCH_LIMIT).await?;
    Ok(Json(users))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: PresenceStatus,
}

pub async fn update_status(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<()> {
    state.dispatcher.store().users().set_status(&caller, req.status).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct UploadUrlRequest {
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "fileType")]
    pub file_type: String,
}

#[derive(Debug, Serialize)]
pub struct UploadUrlResponse {
    #[serde(rename = "uploadUrl")]
    pub upload_url: String,
    #[serde(rename = "mediaUrl")]
    pub media_url: String,
}

/// Issues a pre-signed-style upload target (spec.md §6.1). Blob storage
/// itself is an explicit non-goal (spec.md §1); this hands back an opaque
/// reference the media non-goal says the core only ever stores.
pub async fn upload_url(
    AuthedUser(caller): AuthedUser,
    Json(req): Json<UploadUrlRequest>,
) -> ApiResult<Json<UploadUrlResponse>> {
    if req.file_name.trim().is_empty() {
        return Err(ApiError::Validation("fileName must not be empty".into()));
    }
    let object_id = uuid::Uuid::new_v4();
    let media_url = format!("media://{caller}/{object_id}/{}", req.file_name);
    Ok(Json(UploadUrlResponse {
        upload_url: format!("{media_url}?upload=1&contentType={}", req.file_type),
        media_url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_profile_request_accepts_partial_json() {
        let req: UpdateProfileRequest = serde_json::from_str(r#"{"name":"Alice"}"#).unwrap();
        assert_eq!(req.name.as_deref(), Some("Alice"));
        assert!(req.email.is_none());
        assert!(req.profile_picture.is_none());
    }

    #[test]
    fn update_status_request_deserializes_lowercase_status() {
        let req: UpdateStatusRequest = serde_json::from_str(r#"{"status":"online"}"#).unwrap();
        assert_eq!(req.status, PresenceStatus::Online);
    }

    #[test]
    fn upload_url_response_uses_camel_case_field_names() {
        let resp = UploadUrlResponse {
            upload_url: "media://u1/obj/name?upload=1".into(),
            media_url: "media://u1/obj/name".into(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("uploadUrl").is_some());
        assert!(json.get("mediaUrl").is_some());
    }
}
