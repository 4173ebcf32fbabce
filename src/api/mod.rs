//! The HTTP/WebSocket surface (spec.md §5): routes request bodies into
//! Dispatcher calls and upgrades `/ws` into a Hub session.

mod auth;
mod chats;
mod stories;
mod users;
mod ws;

use axum::Router;
use axum::routing::{get, patch, post};

use crate::state::AppState;

async fn health() -> &'static str {
    "ok"
}

async fn metrics() -> String {
    crate::metrics::gather_metrics()
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::upgrade))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/users/me", get(users::me).patch(users::update_me))
        .route("/api/users/me/status", patch(users::update_status))
        .route("/api/users/search", get(users::search))
        .route("/api/chats", get(chats::list_chats))
        .route("/api/chats/:chatId", get(chats::get_chat))
        .route("/api/chats/personal", post(chats::create_personal_chat))
        .route("/api/chats/channel", post(chats::create_channel))
        .route(
            "/api/chats/:chatId/messages",
            get(chats::list_messages).post(chats::send_to_chat),
        )
        .route(
            "/api/chats/:chatId/messages/:msgId/read",
            post(chats::mark_read),
        )
        .route("/api/chats/:chatId/block", post(chats::block))
        .route("/api/chats/:chatId/unblock", post(chats::unblock))
        .route("/api/users/:userId/messages", post(chats::send_to_user))
        .route("/api/stories", post(stories::create).get(stories::list_active))
        .route("/api/media/upload-url", post(users::upload_url))
        .with_state(state)
}
