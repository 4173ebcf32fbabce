//! The Consumer: the background loops that turn Bus and PubSub traffic into
//! local deliveries (spec.md §4.2/§4.3). One of each runs per node.

use std::sync::Arc;

use chat_protocol::Frame;

use crate::bus::BusConsumer;
use crate::dispatcher::Dispatcher;
use crate::pubsub::PubSubSubscriber;

/// Drains the Bus forever, resolving each event's recipients from the Store
/// and delivering to whichever of them have a session on this node. Exits
/// only on an unrecoverable Bus error; the caller restarts it with backoff.
pub async fn run_bus_consumer(consumer: BusConsumer, dispatcher: Arc<Dispatcher>) {
    loop {
        let message = match consumer.recv().await {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(error = %err, "bus consumer error, backing off");
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                continue;
            }
        };

        crate::metrics::BUS_EVENTS_CONSUMED.inc();
        if let Err(err) = deliver_bus_frame(&dispatcher, message.frame).await {
            tracing::warn!(error = %err, "failed to deliver bus frame");
        }
    }
}

async fn deliver_bus_frame(dispatcher: &Dispatcher, frame: Frame) -> Result<(), crate::error::ApiError> {
    let recipients = recipients_for_frame(dispatcher, &frame).await?;
    for user_id in recipients {
        dispatcher.deliver_local(&user_id, frame.clone());
    }
    Ok(())
}

/// Works out who a given Bus frame is destined for, by re-reading the
/// chat's membership list — the Bus only ever carries a `chatId`, not a
/// resolved recipient set, so every node resolves it the same way.
///
/// Exclusions follow spec.md §4.6 exactly: `message.sent` skips the sender,
/// `typing.indicator` skips the typist, `message.read` excludes no one.
async fn recipients_for_frame(
    dispatcher: &Dispatcher,
    frame: &Frame,
) -> Result<Vec<String>, crate::error::ApiError> {
    let chat_id = match frame.payload.get("chatId").and_then(|v| v.as_str()) {
        Some(id) => id,
        None => return Ok(Vec::new()),
    };

    let exclude = match frame.kind.as_str() {
        "MESSAGE_SENT" => frame.payload.get("senderId").and_then(|v| v.as_str()),
        "TYPING_INDICATOR" => frame.payload.get("userId").and_then(|v| v.as_str()),
        _ => None,
    };

    let members = dispatcher.store().chats().list_members(chat_id).await?;
    Ok(members
        .into_iter()
        .filter(|m| Some(m.user_id.as_str()) != exclude)
        .map(|m| m.user_id)
        .collect())
}

/// Drains PubSub forever, delivering straight to the registry — PubSub
/// envelopes already name their one target user, no Store lookup needed.
pub async fn run_pubsub_subscriber(subscriber: PubSubSubscriber, dispatcher: Arc<Dispatcher>) {
    loop {
        let dispatcher = dispatcher.clone();
        let result = subscriber
            .run(move |msg| {
                dispatcher.deliver_local(&msg.user_id, msg.envelope.frame);
            })
            .await;

        if let Err(err) = result {
            tracing::error!(error = %err, "pubsub subscriber error, backing off");
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
    }
}
