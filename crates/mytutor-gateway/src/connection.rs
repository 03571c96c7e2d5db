use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, trace, warn};

use mytutor_types::events::InboundFrame;

use crate::relay::MessageRelay;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Drive one WebSocket session until either side goes away.
///
/// `user_id` comes from the handshake query string. Without it the session
/// still works but is never registered as online.
pub async fn handle_connection(socket: WebSocket, relay: MessageRelay, user_id: Option<String>) {
    let (mut sender, mut receiver) = socket.split();
    let dispatcher = relay.dispatcher().clone();

    let label = user_id.clone().unwrap_or_else(|| "anonymous".to_string());
    let (session_id, mut session_rx) = dispatcher.open_session(user_id).await;
    info!("{} connected to gateway (session {})", label, session_id);

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward session events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = session_rx.recv() => {
                    let Some(event) = event else { break };

                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to encode {:?}: {}", event, e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read events from client. Frames are handled one at a time so a
    // socket's events keep their order.
    let label_recv = label.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match text.parse::<InboundFrame>() {
                    Ok(frame) => {
                        trace!("{} -> {}", label_recv, frame.event.name());
                        relay.handle(session_id, frame).await;
                    }
                    Err(e) => {
                        warn!(
                            "{} bad frame: {} -- raw: {}",
                            label_recv,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.close_session(session_id).await;
    info!("{} disconnected from gateway (session {})", label, session_id);
}
