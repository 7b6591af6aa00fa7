//! End-to-end tests over real WebSockets.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use signaro_core::{ConnectPolicy, ConnectionHandle, PeerIdentity, SessionRegistry, StaticTokens};
use signaro_server::{RelayServer, ServerConfig};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

struct TestRelay {
    server: RelayServer,
    listener: JoinHandle<()>,
    base: String,
    http: String,
}

impl TestRelay {
    fn registry(&self) -> &Arc<SessionRegistry> {
        self.server.registry()
    }

    async fn connect(&self, query: &str) -> WsStream {
        let url = format!("{}/stream?{query}", self.base);
        let (ws, _) = timeout(TIMEOUT, connect_async(url))
            .await
            .expect("connect timed out")
            .expect("connect failed");
        ws
    }

    async fn controller(&self) -> WsStream {
        let ws = self.connect("client=python").await;
        wait_until(|| self.registry().has_controller()).await;
        ws
    }

    async fn client(&self, id: &str) -> WsStream {
        let ws = self.connect(&format!("client=js&id={id}")).await;
        let identity = PeerIdentity::new(id);
        wait_until(|| self.registry().client(&identity).is_some()).await;
        ws
    }
}

async fn boot(policy: ConnectPolicy, tokens: Option<&[&str]>) -> TestRelay {
    boot_with(ServerConfig::ephemeral(), policy, tokens).await
}

async fn boot_with(config: ServerConfig, policy: ConnectPolicy, tokens: Option<&[&str]>) -> TestRelay {
    let mut server = RelayServer::new(config, Arc::new(SessionRegistry::new()), policy);
    if let Some(tokens) = tokens {
        server = server.with_verifier(Arc::new(StaticTokens::new(tokens.iter().copied())));
    }
    let (addr, listener) = server.listen().await.unwrap();
    TestRelay {
        server,
        listener,
        base: format!("ws://{addr}"),
        http: format!("http://{addr}"),
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    timeout(TIMEOUT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn send_json(ws: &mut WsStream, value: &Value) {
    ws.send(Message::text(value.to_string())).await.unwrap();
}

/// Next text payload, skipping control frames.
async fn recv_text(ws: &mut WsStream) -> String {
    timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return text.to_string(),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                other => panic!("expected text frame, got {other:?}"),
            }
        }
    })
    .await
    .expect("no message in time")
}

/// Close code of the next close frame.
async fn recv_close(ws: &mut WsStream) -> (u16, String) {
    timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(Some(frame)))) => {
                    return (u16::from(frame.code), frame.reason.to_string());
                }
                Some(Ok(_)) => {}
                other => panic!("expected close frame, got {other:?}"),
            }
        }
    })
    .await
    .expect("no close frame in time")
}

/// Assert nothing but control frames arrive for a short while.
async fn assert_silent(ws: &mut WsStream) {
    let result = timeout(Duration::from_millis(200), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                other => return other,
            }
        }
    })
    .await;
    assert!(result.is_err(), "unexpected frame: {result:?}");
}

// ── Routing ──

#[tokio::test]
async fn client_message_reaches_controller_with_sender() {
    let relay = boot(ConnectPolicy::default(), None).await;
    let mut controller = relay.controller().await;
    let mut client = relay.client("peer-1").await;

    send_json(&mut client, &json!({"type": "offer", "sdp": "v=0"})).await;

    let received = recv_text(&mut controller).await;
    assert_eq!(received, r#"{"type":"offer","sdp":"v=0","from":"peer-1"}"#);
}

#[tokio::test]
async fn client_cannot_spoof_sender() {
    let relay = boot(ConnectPolicy::default(), None).await;
    let mut controller = relay.controller().await;
    let mut client = relay.client("peer-1").await;

    send_json(&mut client, &json!({"from": "someone-else", "type": "ice"})).await;

    let received: Value = serde_json::from_str(&recv_text(&mut controller).await).unwrap();
    assert_eq!(received["from"], "peer-1");
    assert_eq!(received["type"], "ice");
}

#[tokio::test]
async fn controller_addresses_client_by_to_field() {
    let relay = boot(ConnectPolicy::default(), None).await;
    let mut controller = relay.controller().await;
    let mut first = relay.client("peer-1").await;
    let mut second = relay.client("peer-2").await;

    let payload = r#"{"to":"peer-2","type":"answer","sdp":"v=0"}"#;
    controller.send(Message::text(payload.to_string())).await.unwrap();

    assert_eq!(recv_text(&mut second).await, payload);
    assert_silent(&mut first).await;
}

#[tokio::test]
async fn controller_falls_back_to_default_client() {
    let policy = ConnectPolicy {
        default_client: Some(PeerIdentity::new("a89das687cz")),
        ..ConnectPolicy::default()
    };
    let relay = boot(policy, None).await;
    let mut controller = relay.controller().await;
    // No id and no token: the default identity is assigned
    let mut client = relay.connect("client=js").await;
    let identity = PeerIdentity::new("a89das687cz");
    wait_until(|| relay.registry().client(&identity).is_some()).await;

    send_json(&mut controller, &json!({"type": "offer"})).await;
    assert_eq!(recv_text(&mut client).await, r#"{"type":"offer"}"#);
}

#[tokio::test]
async fn binary_utf8_frame_is_relayed_as_text() {
    let relay = boot(ConnectPolicy::default(), None).await;
    let mut controller = relay.controller().await;
    let mut client = relay.client("peer-1").await;

    client
        .send(Message::binary(br#"{"type":"ice"}"#.to_vec()))
        .await
        .unwrap();

    let received = recv_text(&mut controller).await;
    assert_eq!(received, r#"{"type":"ice","from":"peer-1"}"#);
}

#[tokio::test]
async fn non_utf8_binary_frame_is_ignored() {
    let relay = boot(ConnectPolicy::default(), None).await;
    let mut controller = relay.controller().await;
    let mut client = relay.client("peer-1").await;

    client.send(Message::binary(vec![0xff])).await.unwrap();

    assert_silent(&mut controller).await;
    assert!(relay.registry().client(&PeerIdentity::new("peer-1")).is_some());
    send_json(&mut client, &json!({"type": "ice"})).await;
    assert_eq!(
        recv_text(&mut controller).await,
        r#"{"type":"ice","from":"peer-1"}"#
    );
}

#[tokio::test]
async fn messages_from_one_sender_arrive_in_order() {
    let relay = boot(ConnectPolicy::default(), None).await;
    let mut controller = relay.controller().await;
    let mut client = relay.client("peer-1").await;

    for seq in 0..20 {
        send_json(&mut client, &json!({"seq": seq})).await;
    }
    for seq in 0..20 {
        let received: Value = serde_json::from_str(&recv_text(&mut controller).await).unwrap();
        assert_eq!(received["seq"], seq);
    }
}

#[tokio::test]
async fn message_without_controller_is_dropped() {
    let relay = boot(ConnectPolicy::default(), None).await;
    let mut client = relay.client("peer-1").await;

    send_json(&mut client, &json!({"type": "offer"})).await;

    // The sender hears nothing back and stays connected.
    assert_silent(&mut client).await;
    let mut controller = relay.controller().await;
    send_json(&mut client, &json!({"type": "ice"})).await;
    assert_eq!(
        recv_text(&mut controller).await,
        r#"{"type":"ice","from":"peer-1"}"#
    );
}

// ── Registration lifecycle ──

#[tokio::test]
async fn disconnect_removes_registration() {
    let relay = boot(ConnectPolicy::default(), None).await;
    let controller = relay.controller().await;
    let client = relay.client("peer-1").await;

    drop(client);
    let identity = PeerIdentity::new("peer-1");
    wait_until(|| relay.registry().client(&identity).is_none()).await;

    drop(controller);
    wait_until(|| !relay.registry().has_controller()).await;
}

#[tokio::test]
async fn newer_client_replaces_older_and_survives_its_disconnect() {
    let relay = boot(ConnectPolicy::default(), None).await;
    let mut controller = relay.controller().await;
    let old = relay.client("peer-1").await;
    let old_id = relay.registry().client(&PeerIdentity::new("peer-1")).unwrap().id();

    let mut new = relay.connect("client=js&id=peer-1").await;
    wait_until(|| {
        relay
            .registry()
            .client(&PeerIdentity::new("peer-1"))
            .is_some_and(|h| h.id() != old_id)
    })
    .await;

    drop(old);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(relay.registry().client(&PeerIdentity::new("peer-1")).is_some());

    send_json(&mut controller, &json!({"to": "peer-1", "type": "answer"})).await;
    assert_eq!(
        recv_text(&mut new).await,
        r#"{"to":"peer-1","type":"answer"}"#
    );
}

#[tokio::test]
async fn newer_controller_receives_client_messages() {
    let relay = boot(ConnectPolicy::default(), None).await;
    let mut old = relay.controller().await;
    let old_id = relay.registry().controller().unwrap().id();

    let mut new = relay.connect("client=python").await;
    wait_until(|| relay.registry().controller().is_some_and(|h| h.id() != old_id)).await;

    let mut client = relay.client("peer-1").await;
    send_json(&mut client, &json!({"type": "offer"})).await;

    assert_eq!(
        recv_text(&mut new).await,
        r#"{"type":"offer","from":"peer-1"}"#
    );
    assert_silent(&mut old).await;
}

// ── Rejections ──

#[tokio::test]
async fn missing_role_connects_as_client() {
    let relay = boot(ConnectPolicy::default(), None).await;
    let mut controller = relay.controller().await;
    let mut client = relay.connect("id=peer-1").await;
    wait_until(|| relay.registry().client(&PeerIdentity::new("peer-1")).is_some()).await;

    send_json(&mut client, &json!({"type": "offer"})).await;
    assert_eq!(
        recv_text(&mut controller).await,
        r#"{"type":"offer","from":"peer-1"}"#
    );
}

#[tokio::test]
async fn missing_role_without_identity_is_rejected() {
    let relay = boot(ConnectPolicy::default(), None).await;
    let mut ws = relay.connect("client=").await;

    let (code, reason) = recv_close(&mut ws).await;
    assert_eq!(code, 1008);
    assert_eq!(reason, "Missing client identity");
    assert_eq!(relay.registry().client_count(), 0);
}

#[tokio::test]
async fn missing_identity_is_rejected() {
    let relay = boot(ConnectPolicy::default(), None).await;
    let mut ws = relay.connect("client=js").await;

    let (code, reason) = recv_close(&mut ws).await;
    assert_eq!(code, 1008);
    assert_eq!(reason, "Missing client identity");
    assert_eq!(relay.registry().client_count(), 0);
}

#[tokio::test]
async fn invalid_token_is_rejected() {
    let relay = boot(ConnectPolicy::default(), Some(&["secret"])).await;
    let mut ws = relay.connect("client=js&id=peer-1&token=wrong").await;

    let (code, reason) = recv_close(&mut ws).await;
    assert_eq!(code, 1003);
    assert_eq!(reason, "Invalid token");
    assert_eq!(relay.registry().client_count(), 0);
}

#[tokio::test]
async fn valid_token_is_accepted() {
    let relay = boot(ConnectPolicy::default(), Some(&["secret"])).await;
    let _controller = relay.connect("client=python&token=secret").await;
    wait_until(|| relay.registry().has_controller()).await;

    // Without `id` the token doubles as the identity
    let _client = relay.connect("client=js&token=secret").await;
    let identity = PeerIdentity::new("secret");
    wait_until(|| relay.registry().client(&identity).is_some()).await;
}

// ── HTTP ──

#[tokio::test]
async fn health_reports_live_connections() {
    let relay = boot(ConnectPolicy::default(), None).await;
    let _controller = relay.controller().await;
    let _a = relay.client("peer-1").await;
    let _b = relay.client("peer-2").await;

    let body: Value = reqwest::get(format!("{}/health", relay.http))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["controller_connected"], true);
    assert_eq!(body["clients"], 2);
    assert_eq!(body["client_ids"], json!(["peer-1", "peer-2"]));
    assert_eq!(body["sessions"], 3);
}

// ── Shutdown & heartbeat ──

#[tokio::test]
async fn shutdown_closes_connections_with_going_away() {
    let relay = boot(ConnectPolicy::default(), None).await;
    let mut controller = relay.controller().await;

    relay.server.shutdown().shutdown();

    let (code, _) = recv_close(&mut controller).await;
    assert_eq!(code, 1001);
    wait_until(|| !relay.registry().has_controller()).await;
}

#[tokio::test]
async fn graceful_shutdown_returns_after_sessions_close() {
    let relay = boot(ConnectPolicy::default(), None).await;
    let mut controller = relay.controller().await;
    let mut client = relay.client("peer-1").await;
    let TestRelay { server, listener, .. } = relay;
    assert_eq!(server.shutdown().session_count(), 2);

    server.shutdown().graceful_shutdown(listener, Some(TIMEOUT)).await;

    // Sessions have finished, so nothing is left registered.
    assert_eq!(server.shutdown().session_count(), 0);
    assert!(!server.registry().has_controller());
    assert_eq!(server.registry().client_count(), 0);
    assert_eq!(recv_close(&mut controller).await.0, 1001);
    assert_eq!(recv_close(&mut client).await.0, 1001);
}

#[tokio::test]
async fn silent_connection_is_dropped_after_pong_timeout() {
    let config = ServerConfig {
        heartbeat_interval: Duration::from_millis(50),
        pong_timeout: Duration::from_millis(150),
        ..ServerConfig::ephemeral()
    };
    let relay = boot_with(config, ConnectPolicy::default(), None).await;
    // Never polled, so pings go unanswered.
    let _controller = relay.controller().await;

    wait_until(|| !relay.registry().has_controller()).await;
}
