use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use herald_notify::dispatcher::Dispatcher;
use herald_types::events::NotifyEvent;

/// Server sends a Ping this often; two missed Pongs drop the connection.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Serve one user's event stream until either side goes away.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, user_id: String) {
    let (sender, mut receiver) = socket.split();

    let (conn_id, user_rx) = dispatcher.register_user_channel(&user_id).await;
    let broadcast_rx = dispatcher.subscribe();
    info!(user_id = %user_id, "connected to event stream");

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_recv = pong_received.clone();

    let mut send_task = tokio::spawn(relay_events(sender, broadcast_rx, user_rx, pong_received));

    // Clients only talk back with control frames
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Pong(_) => pong_flag_recv.store(true, Ordering::Release),
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unregister_user_channel(&user_id, conn_id).await;
    info!(user_id = %user_id, "disconnected from event stream");
}

/// Forward broadcasts and targeted events to `sink` as JSON text frames.
/// Returns the sink once the user channel closes, the sink fails or the
/// heartbeat times out.
pub async fn relay_events<S>(
    mut sink: S,
    mut broadcast_rx: broadcast::Receiver<NotifyEvent>,
    mut user_rx: mpsc::UnboundedReceiver<NotifyEvent>,
    pong_received: Arc<AtomicBool>,
) -> S
where
    S: Sink<Message> + Unpin,
{
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut missed_heartbeats: u8 = 0;

    loop {
        let event = tokio::select! {
            result = broadcast_rx.recv() => match result {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event stream lagged by {} events", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            result = user_rx.recv() => match result {
                Some(event) => event,
                None => break,
            },
            _ = heartbeat.tick() => {
                if pong_received.swap(false, Ordering::Acquire) {
                    missed_heartbeats = 0;
                } else {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= 2 {
                        warn!("Heartbeat timeout (missed {} pongs), dropping event stream", missed_heartbeats);
                        break;
                    }
                }
                if sink.send(Message::Ping(Vec::<u8>::new().into())).await.is_err() {
                    break;
                }
                continue;
            }
        };

        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode event: {}", e);
                continue;
            }
        };
        if sink.send(Message::Text(text.into())).await.is_err() {
            break;
        }
    }

    sink
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(frames: &[Message]) -> Vec<serde_json::Value> {
        frames
            .iter()
            .filter_map(|frame| match frame {
                Message::Text(text) => Some(serde_json::from_str(text.as_str()).unwrap()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn relays_targeted_events_until_replaced() {
        let dispatcher = Dispatcher::new();
        let (_conn, user_rx) = dispatcher.register_user_channel("bob").await;
        let relay = tokio::spawn(relay_events(
            Vec::<Message>::new(),
            dispatcher.subscribe(),
            user_rx,
            Arc::new(AtomicBool::new(true)),
        ));

        dispatcher
            .send_to_users(
                &["bob".to_string()],
                NotifyEvent::ThreadReply {
                    thread_id: "p1".into(),
                    room_id: "r1".into(),
                    message_id: "m2".into(),
                    sender_id: "carol".into(),
                },
            )
            .await;

        // A newer connection for bob closes this one's channel
        let _replacement = dispatcher.register_user_channel("bob").await;
        let frames = relay.await.unwrap();

        let events = texts(&frames);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["type"], "ThreadReply");
        assert_eq!(events[0]["data"]["message_id"], "m2");
    }
}
