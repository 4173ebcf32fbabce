//! Decodes frames the client sends up over its WebSocket (spec.md §6.2).

use serde::Deserialize;

use super::Dispatcher;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
struct ClientFrame {
    #[serde(rename = "type")]
    kind: String,
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TypingIndicatorRequest {
    #[serde(rename = "chatId")]
    chat_id: String,
    #[serde(rename = "isTyping")]
    is_typing: bool,
}

#[derive(Debug, Deserialize)]
struct MarkReadRequest {
    #[serde(rename = "chatId")]
    chat_id: String,
    #[serde(rename = "messageId")]
    message_id: String,
}

pub(super) async fn handle(dispatcher: &Dispatcher, user_id: &str, raw: &str) -> Result<(), ApiError> {
    let frame: ClientFrame = serde_json::from_str(raw)
        .map_err(|e| ApiError::Validation(format!("malformed client frame: {e}")))?;

    match frame.kind.as_str() {
        "TYPING_INDICATOR" => {
            let req: TypingIndicatorRequest = serde_json::from_value(frame.payload)
                .map_err(|e| ApiError::Validation(format!("bad TYPING_INDICATOR payload: {e}")))?;
            dispatcher
                .send_typing_indicator(user_id, &req.chat_id, req.is_typing)
                .await
        }
        "MESSAGE_READ" => {
            let req: MarkReadRequest = serde_json::from_value(frame.payload)
                .map_err(|e| ApiError::Validation(format!("bad MESSAGE_READ payload: {e}")))?;
            dispatcher.mark_read(user_id, &req.chat_id, &req.message_id).await
        }
        other => Err(ApiError::Validation(format!(
            "client frames of type {other} are not accepted"
        ))),
    }
}
