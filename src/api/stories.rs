//! Story handlers (spec.md §4.3 `CreateStory`/`ListActiveStories`).

use axum::Json;
use axum::extract::State;
use chat_protocol::Story;
use serde::Deserialize;

use super::auth::AuthedUser;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateStoryRequest {
    #[serde(rename = "mediaUrl")]
    pub media_url: String,
}

pub async fn create(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Json(req): Json<CreateStoryRequest>,
) -> ApiResult<Json<Story>> {
    let story = state.dispatcher.create_story(&caller, &req.media_url).await?;
    Ok(Json(story))
}

pub async fn list_active(
    State(state): State<AppState>,
    AuthedUser(_caller): AuthedUser,
) -> ApiResult<Json<Vec<Story>>> {
    let stories = state.dispatcher.list_active_stories().await?;
    Ok(Json(stories))
}
