use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use relay_api::config::Config;
use relay_api::AppState;

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

/// Default config with a short write deadline so stuck tests fail fast.
pub fn test_config() -> Config {
    Config {
        write_timeout: Some(Duration::from_secs(2)),
        ..Config::default()
    }
}

/// Build the full application router wired to a fresh state.
pub fn test_app(config: Config) -> (Router, AppState) {
    let state = AppState::new(config);
    let app = relay_api::routes::router().with_state(state.clone());
    (app, state)
}

/// Start an actual TCP server for WebSocket testing.
pub async fn start_ws_server(config: Config) -> (SocketAddr, AppState) {
    let (app, state) = test_app(config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// Connect a WebSocket client to `path` (e.g. `/ws` or `/ws/room`).
pub async fn connect(addr: SocketAddr, path: &str) -> WsClient {
    let url = format!("ws://{addr}{path}");
    let (ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("ws connect");
    ws
}

/// Poll until the room's hub reports `expected` registered sessions.
pub async fn wait_for_sessions(state: &AppState, room: &str, expected: usize) {
    let reached = time::timeout(WAIT, async {
        loop {
            let count = state
                .rooms
                .get(room)
                .map(|hub| hub.session_count())
                .unwrap_or(0);
            if count == expected {
                return;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "room {room} never reached {expected} sessions");
}

pub async fn next_message(ws: &mut WsClient) -> Message {
    time::timeout(WAIT, ws.next())
        .await
        .expect("timeout waiting for message")
        .expect("stream ended")
        .expect("ws read error")
}

pub async fn next_text(ws: &mut WsClient) -> String {
    match next_message(ws).await {
        Message::Text(text) => text.to_string(),
        other => panic!("Expected text frame, got: {other:?}"),
    }
}

pub async fn send_text(ws: &mut WsClient, text: &str) {
    ws.send(Message::Text(text.into())).await.expect("send text");
}
