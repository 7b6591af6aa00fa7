//! `WebSocket` session lifecycle: a single connection from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use signaro_core::{
    CloseReason, ConnectionHandle, ConnectionRejected, MessageRouter, PeerRole, PeerSession,
};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, field, info, instrument, warn, Instrument, Span};

use crate::config::ServerConfig;
use crate::connection::WsConnection;
use crate::metrics::{
    WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_CONNECTION_DURATION_SECONDS,
    WS_DISCONNECTIONS_TOTAL, WS_HEARTBEAT_TIMEOUTS_TOTAL,
};

/// How long a rejected peer gets to answer the close frame.
const REJECT_LINGER: Duration = Duration::from_secs(1);

/// Upper bound on flushing the writer after the reader loop ends.
const WRITER_DRAIN: Duration = Duration::from_secs(2);

/// `tokio::time::interval` panics on a zero period.
const MIN_HEARTBEAT: Duration = Duration::from_millis(1);

/// Run a registered session.
///
/// 1. Registers the connection under `role` (last writer wins)
/// 2. Routes every inbound text frame (and UTF-8 binary frame)
/// 3. Forwards queued outbound text and pings from a writer task
/// 4. On disconnect, heartbeat timeout or shutdown: deregisters, then
///    closes the socket
#[instrument(skip_all, fields(conn_id = field::Empty, role = %role))]
pub async fn run_ws_session(
    ws: WebSocket,
    role: PeerRole,
    router: Arc<MessageRouter>,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,
) {
    let (ws_tx, mut ws_rx) = ws.split();
    let (connection, send_rx) = WsConnection::channel(config.send_queue_capacity);
    let _ = Span::current().record("conn_id", field::display(connection.id()));

    let session = PeerSession::new(connection.id(), role);
    let registry = router.registry().clone();
    let _ = registry.register(&session.role, connection.shared());

    let kind = session.role.kind();
    info!("connection registered");
    counter!(WS_CONNECTIONS_TOTAL, "role" => kind).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let mut writer = tokio::spawn(
        write_loop(
            ws_tx,
            send_rx,
            connection.clone(),
            config.heartbeat_interval,
            config.pong_timeout,
        )
        .in_current_span(),
    );

    loop {
        tokio::select! {
            frame = ws_rx.next() => {
                let frame = match frame {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => {
                        debug!(error = %e, "websocket read failed");
                        break;
                    }
                    None => break,
                };
                connection.touch();
                match frame {
                    Message::Text(text) => {
                        let _ = router.route(&session, text.as_str());
                    }
                    Message::Binary(data) => match std::str::from_utf8(&data) {
                        Ok(text) => {
                            let _ = router.route(&session, text);
                        }
                        Err(_) => debug!(len = data.len(), "ignoring non-UTF-8 binary frame"),
                    },
                    Message::Close(frame) => {
                        debug!(?frame, "peer sent close frame");
                        break;
                    }
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
            () = connection.closed() => break,
            () = shutdown.cancelled() => {
                connection.close(CloseReason::going_away());
                break;
            }
        }
    }

    // Deregister before the handle reports closed so nothing routes to a
    // half-torn-down connection.
    let _ = registry.deregister(connection.id());
    connection.close(CloseReason::normal());

    if tokio::time::timeout(WRITER_DRAIN, &mut writer).await.is_err() {
        debug!("writer did not drain in time, aborting");
        writer.abort();
    }

    let lifetime = connection.age();
    info!(
        lifetime_ms = u64::try_from(lifetime.as_millis()).unwrap_or(u64::MAX),
        dropped = connection.drop_count(),
        "connection closed"
    );
    counter!(WS_DISCONNECTIONS_TOTAL, "role" => kind).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(lifetime.as_secs_f64());
}

/// Close a connection that failed classification. It never reaches the
/// registry.
#[instrument(skip_all, fields(reason = rejection.label()))]
pub async fn reject_ws_session(mut ws: WebSocket, rejection: ConnectionRejected) {
    let reason = CloseReason::from(&rejection);
    if let Err(e) = ws.send(Message::Close(Some(close_frame(&reason)))).await {
        debug!(error = %e, "failed to send rejection close frame");
        return;
    }
    // Give the peer a moment to acknowledge before the socket drops.
    let _ = tokio::time::timeout(REJECT_LINGER, async {
        while let Some(Ok(_)) = ws.recv().await {}
    })
    .await;
}

/// Drain the outbound queue into the socket and send periodic pings.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<String>,
    connection: Arc<WsConnection>,
    heartbeat: Duration,
    pong_timeout: Duration,
) {
    let mut ping = tokio::time::interval(heartbeat.max(MIN_HEARTBEAT));
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the immediate first tick
    let _ = ping.tick().await;

    loop {
        tokio::select! {
            biased;
            msg = rx.recv() => {
                let Some(text) = msg else { break };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    connection.close(CloseReason::normal());
                    return;
                }
            }
            () = connection.closed() => break,
            _ = ping.tick() => {
                let idle = connection.idle_for();
                if idle > pong_timeout {
                    warn!(idle_ms = u64::try_from(idle.as_millis()).unwrap_or(u64::MAX), "heartbeat timeout, closing connection");
                    counter!(WS_HEARTBEAT_TIMEOUTS_TOTAL).increment(1);
                    connection.close(CloseReason::new(1001, "Heartbeat timeout"));
                    break;
                }
                if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                    connection.close(CloseReason::normal());
                    return;
                }
            }
        }
    }

    // Messages queued before the close still go out.
    while let Ok(text) = rx.try_recv() {
        if sink.send(Message::Text(text.into())).await.is_err() {
            return;
        }
    }
    let reason = connection.close_reason().unwrap_or_else(CloseReason::normal);
    let _ = sink.send(Message::Close(Some(close_frame(&reason)))).await;
    let _ = sink.close().await;
}

/// Convert a [`CloseReason`] into an axum close frame.
pub fn close_frame(reason: &CloseReason) -> CloseFrame {
    CloseFrame {
        code: reason.code,
        reason: reason.reason.to_string().into(),
    }
}
