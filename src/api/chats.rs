//! Chat/message handlers (spec.md §4.3, §5).

use axum::Json;
use axum::extract::{Path, Query, State};
use chat_protocol::{Chat, Message, MessageKind};
use serde::{Deserialize, Serialize};

use super::auth::AuthedUser;
use crate::error::{ApiError, ApiResult, ForbiddenKind};
use crate::state::AppState;

pub async fn list_chats(State(state): State<AppState>, AuthedUser(caller): AuthedUser) -> ApiResult<Json<Vec<Chat>>> {
    let chats = state.dispatcher.store().chats().list_for_user(&caller).await?;
    Ok(Json(chats))
}

pub async fn get_chat(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(chat_id): Path<String>,
) -> ApiResult<Json<Chat>> {
    state
        .dispatcher
        .store()
        .chats()
        .get_membership(&chat_id, &caller)
        .await?
        .ok_or(ApiError::Forbidden(ForbiddenKind::NotAMember))?;

    let chat = state
        .dispatcher
        .store()
        .chats()
        .get(&chat_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("chat {chat_id}")))?;
    Ok(Json(chat))
}

#[derive(Debug, Deserialize)]
pub struct CreatePersonalChatRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
}

pub async fn create_personal_chat(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Json(req): Json<CreatePersonalChatRequest>,
) -> ApiResult<Json<Chat>> {
    let chat = state
        .dispatcher
        .create_personal_chat(&caller, &req.user_id)
        .await?;
    Ok(Json(chat))
}

#[derive(Debug, Deserialize)]
pub struct CreateChannelRequest {
    pub name: String,
}

pub async fn create_channel(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Json(req): Json<CreateChannelRequest>,
) -> ApiResult<Json<Chat>> {
    let chat = state.dispatcher.create_channel(&caller, &req.name).await?;
    Ok(Json(chat))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(rename = "type", default = "default_message_kind")]
    pub kind: MessageKind,
    pub content: String,
    #[serde(rename = "mediaUrl")]
    pub media_url: Option<String>,
}

fn default_message_kind() -> MessageKind {
    MessageKind::Text
}

pub async fn send_to_chat(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(chat_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Json<Message>> {
    let message = state
        .dispatcher
        .send_to_chat(
            &caller,
            &chat_id,
            req.kind,
            &req.content,
            req.media_url.as_deref(),
        )
        .await?;
    Ok(Json(message))
}

pub async fn send_to_user(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(recipient_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Json<Message>> {
    let message = state
        .dispatcher
        .send_to_user(
            &caller,
            &recipient_id,
            req.kind,
            &req.content,
            req.media_url.as_deref(),
        )
        .await?;
    Ok(Json(message))
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub before: Option<chrono::DateTime<chrono::Utc>>,
    pub limit: Option<i64>,
}

pub async fn list_messages(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(chat_id): Path<String>,
    Query(query): Query<ListMessagesQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    state
        .dispatcher
        .store()
        .chats()
        .get_membership(&chat_id, &caller)
        .await?
        .ok_or(ApiError::Forbidden(ForbiddenKind::NotAMember))?;

    let messages = state
        .dispatcher
        .store()
        .messages()
        .list_page(&chat_id, query.before, query.limit)
        .await?;
    Ok(Json(messages))
}

#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
}

pub async fn mark_read(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path((chat_id, message_id)): Path<(String, String)>,
) -> ApiResult<Json<Ack>> {
    state.dispatcher.mark_read(&caller, &chat_id, &message_id).await?;
    Ok(Json(Ack { success: true }))
}

pub async fn block(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(chat_id): Path<String>,
) -> ApiResult<Json<Ack>> {
    state.dispatcher.set_blocked(&caller, &chat_id, true).await?;
    Ok(Json(Ack { success: true }))
}

pub async fn unblock(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(chat_id): Path<String>,
) -> ApiResult<Json<Ack>> {
    state.dispatcher.set_blocked(&caller, &chat_id, false).await?;
    Ok(Json(Ack { success: true }))
}
