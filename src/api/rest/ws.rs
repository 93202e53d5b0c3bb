use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::event::DispatchEvent;
use crate::models::id::RecordId;
use crate::state::AppState;

/// Narrows the feed to one order (customer tracking view) or one driver
/// (driver app). Both unset means everything.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub order_id: Option<RecordId>,
    pub driver_id: Option<Uuid>,
}

impl Subscription {
    pub fn wants(&self, event: &DispatchEvent) -> bool {
        let order_ok = self
            .order_id
            .as_ref()
            .is_none_or(|wanted| event.order_id() == Some(wanted));
        let driver_ok = self
            .driver_id
            .is_none_or(|wanted| event.driver_id() == Some(wanted));
        order_ok && driver_ok
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(subscription): Query<Subscription>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state, subscription))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, subscription: Subscription) {
    let (sender, receiver) = socket.split();

    info!(order_id = ?subscription.order_id, driver_id = ?subscription.driver_id, "websocket client connected");
    forward_events(sender, receiver, state.events().subscribe(), &subscription).await;
    info!("websocket client disconnected");
}

/// Pushes matching events to the client until either side goes away. Both
/// halves are driven from one loop so a quiet filtered feed still notices a
/// closed socket and drops its broadcast receiver.
async fn forward_events<S, R>(
    mut sender: S,
    mut receiver: R,
    events: broadcast::Receiver<DispatchEvent>,
    subscription: &Subscription,
) where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let mut events = BroadcastStream::new(events);

    loop {
        tokio::select! {
            next = events.next() => {
                let event = match next {
                    Some(Ok(event)) => event,
                    Some(Err(err)) => {
                        warn!(error = %err, "websocket subscriber lagged, events skipped");
                        continue;
                    }
                    None => break,
                };

                if !subscription.wants(&event) {
                    continue;
                }

                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(err) => {
                        warn!(error = %err, "failed to serialize event for ws");
                        continue;
                    }
                };

                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
