//! `/ws?token=` upgrade (spec.md §4.4, §5): authenticates via the same
//! bearer token scheme as the HTTP API, then hands the socket to the Hub.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::auth::TokenValidator;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
}

pub async fn upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let user_id = match state.jwt.validate(&query.token) {
        Ok(user_id) => user_id,
        Err(_) => return (StatusCode::UNAUTHORIZED, "invalid or expired token").into_response(),
    };

    let queue_capacity = state.hub_config.session_queue_capacity;
    let ping_interval = std::time::Duration::from_secs(state.hub_config.ping_interval_secs);

    ws.on_upgrade(move |socket| async move {
        crate::hub::handle_socket(
            socket,
            user_id,
            state.registry.clone(),
            state.dispatcher.clone(),
            queue_capacity,
            ping_interval,
        )
        .await;
    })
}
