//! Shared application state handed to every axum handler (spec.md §4).
//!
//! Deliberately thin: the Dispatcher already bundles Store/Bus/PubSub/Hub,
//! so `AppState` only adds what the HTTP/WebSocket layer itself needs —
//! the registry (for WebSocket upgrades), the auth boundary, and the Hub's
//! tunables.

use std::sync::Arc;

use crate::auth::JwtIssuer;
use crate::config::HubConfig;
use crate::dispatcher::Dispatcher;
use crate::hub::Registry;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub registry: Arc<Registry>,
    pub jwt: Arc<JwtIssuer>,
    pub hub_config: HubConfig,
}
