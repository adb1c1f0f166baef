//! Live log stream over WebSocket (GET /ws/logs)

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use super::state::AppState;
use crate::broadcast::{ChannelSink, Connection, ConnectionFilter, new_connection_id};

pub async fn ws_logs(
    ws: WebSocketUpgrade,
    Query(filter): Query<ConnectionFilter>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let filter = filter.normalized();
    ws.on_upgrade(move |socket| handle_connection(socket, state, filter))
}

async fn handle_connection(mut socket: WebSocket, state: AppState, filter: ConnectionFilter) {
    let connection_id = new_connection_id();
    let (sink, mut outbound) = ChannelSink::channel(state.config.broadcast.channel_capacity);

    if let Err(e) = state
        .connections
        .register(connection_id.clone(), Connection::new(Arc::new(sink), filter))
        .await
    {
        warn!(%connection_id, error = %e, "Rejected live connection");
        return;
    }

    let heartbeat = state.config.broadcast.heartbeat_interval.as_duration();
    let idle_timeout = state.config.broadcast.idle_timeout.as_duration();
    let mut ticker = interval_at(Instant::now() + heartbeat, heartbeat);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            next = outbound.recv() => {
                // None: the registry dropped this connection
                let Some(entry) = next else { break };
                let payload = match serde_json::to_string(&entry) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(%connection_id, error = %e, "Failed to encode log entry");
                        continue;
                    }
                };
                if socket.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
            }
            _ = ticker.tick() => {
                if last_seen.elapsed() >= idle_timeout {
                    info!(%connection_id, "Closing idle live connection");
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
                if socket.send(Message::Ping(Default::default())).await.is_err() {
                    debug!(%connection_id, "Heartbeat send failed");
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(frame))) => {
                    debug!(%connection_id, ?frame, "Client closed connection");
                    break;
                }
                // Pongs and anything else the client sends count as liveness
                Some(Ok(_)) => last_seen = Instant::now(),
                Some(Err(e)) => {
                    debug!(%connection_id, error = %e, "Connection read failed");
                    break;
                }
                None => break,
            },
        }
    }

    state.connections.unregister(&connection_id).await;
    info!(%connection_id, "Live connection closed");
}
