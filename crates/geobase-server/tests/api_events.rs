//! Integration tests for the `/events` WebSocket endpoint.
//!
//! Each test starts a real server on an ephemeral port and talks to it with
//! `tokio-tungstenite`, the way a browser client would.

use futures_util::{SinkExt, StreamExt};
use geobase_server::config::Config;
use geobase_server::{app, AppState};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Long enough that only the initial `PING 0` shows up during a test.
const QUIET_PING_MS: u64 = 60_000;

async fn setup_test_server(ping_interval_ms: u64) -> (SocketAddr, AppState) {
    let mut config = Config::default();
    config.connection.ping_interval_ms = ping_interval_ms;
    setup_with_config(config).await
}

async fn setup_with_config(mut config: Config) -> (SocketAddr, AppState) {
    config.static_files.dir = "does-not-exist".to_string();

    let state = AppState::new(&config);
    let app = app(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    (addr, state)
}

/// Connects and consumes the `HELLO` greeting.
async fn connect(addr: SocketAddr) -> Client {
    let (mut ws, _) = connect_async(format!("ws://{}/events", addr))
        .await
        .expect("failed to connect");
    assert_eq!(next_frame(&mut ws).await, "HELLO");
    ws
}

async fn next_raw(ws: &mut Client) -> String {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for frame")
            .expect("connection closed")
            .expect("frame error");
        if let Message::Text(text) = msg {
            return text.to_string();
        }
    }
}

/// Next text frame that is not a keepalive `PING`.
async fn next_frame(ws: &mut Client) -> String {
    loop {
        let text = next_raw(ws).await;
        if !text.starts_with("PING ") {
            return text;
        }
    }
}

async fn send(ws: &mut Client, text: &str) {
    ws.send(Message::Text(text.to_string().into()))
        .await
        .expect("failed to send");
}

/// Splits `"CMD {...}"` into the command and its parsed body.
fn split(frame: &str) -> (String, Value) {
    match frame.split_once(' ') {
        Some((command, body)) => (
            command.to_string(),
            serde_json::from_str(body).expect("strict json body"),
        ),
        None => (frame.to_string(), Value::Null),
    }
}

#[tokio::test]
async fn greets_then_pings_with_increasing_counter() {
    let (addr, _state) = setup_test_server(50).await;
    let (mut ws, _) = connect_async(format!("ws://{}/events", addr))
        .await
        .expect("failed to connect");

    assert_eq!(next_raw(&mut ws).await, "HELLO");
    assert_eq!(next_raw(&mut ws).await, "PING 0");
    assert_eq!(next_raw(&mut ws).await, "PING 1");
}

#[tokio::test]
async fn client_ping_is_answered_with_pong() {
    let (addr, _state) = setup_test_server(QUIET_PING_MS).await;
    let mut ws = connect(addr).await;

    send(&mut ws, "PING 42").await;
    assert_eq!(next_frame(&mut ws).await, "PONG");
}

#[tokio::test]
async fn listener_sees_create_update_and_delete_from_another_client() {
    let (addr, _state) = setup_test_server(QUIET_PING_MS).await;
    let mut listener = connect(addr).await;
    let mut writer = connect(addr).await;

    send(
        &mut listener,
        "LISTEN {type: 'bus', minLat: 0, maxLat: 10, minLong: 0, maxLong: 10}",
    )
    .await;
    assert_eq!(next_frame(&mut listener).await, "OK");

    send(
        &mut writer,
        "UPDATE {type: 'bus', id: 55, lat: 5, long: 5, v: 1, line: '55'}",
    )
    .await;
    let (command, body) = split(&next_frame(&mut writer).await);
    assert_eq!(command, "OK");
    assert_eq!(body["created"], true);

    let (command, body) = split(&next_frame(&mut listener).await);
    assert_eq!(command, "CREATE");
    assert_eq!(
        body,
        json!({ "type": "bus", "id": 55, "lat": 5, "long": 5, "v": 1, "line": "55" })
    );

    send(&mut writer, "UPDATE {type: 'bus', id: 55, lat: 6}").await;
    let (_, body) = split(&next_frame(&mut writer).await);
    assert_eq!(body["moved"], true);

    let (command, body) = split(&next_frame(&mut listener).await);
    assert_eq!(command, "UPDATE");
    assert_eq!(body, json!({ "type": "bus", "id": 55, "lat": 6 }));

    send(&mut writer, "DELETE {type: 'bus', id: 55}").await;
    let (_, body) = split(&next_frame(&mut writer).await);
    assert_eq!(body, json!({ "deleted": true }));

    let (command, body) = split(&next_frame(&mut listener).await);
    assert_eq!(command, "DELETE");
    assert_eq!(body["id"], 55);
    assert_eq!(body["lat"], 6);
}

#[tokio::test]
async fn listen_backfills_existing_objects_before_ok() {
    let (addr, _state) = setup_test_server(QUIET_PING_MS).await;
    let mut writer = connect(addr).await;

    send(&mut writer, "UPDATE {type: 'tram', id: 1, lat: 1, long: 1, v: 1}").await;
    next_frame(&mut writer).await;
    send(&mut writer, "UPDATE {type: 'tram', id: 2, lat: 50, long: 50, v: 1}").await;
    next_frame(&mut writer).await;

    let mut listener = connect(addr).await;
    send(
        &mut listener,
        "LISTEN {type: 'tram', minLat: 0, maxLat: 10, minLong: 0, maxLong: 10}",
    )
    .await;

    let (command, body) = split(&next_frame(&mut listener).await);
    assert_eq!(command, "UPDATE");
    assert_eq!(body, json!({ "type": "tram", "id": 1, "lat": 1, "long": 1, "v": 1 }));
    assert_eq!(next_frame(&mut listener).await, "OK");

    send(&mut listener, "PROFILE {type: 'tram'}").await;
    let (command, body) = split(&next_frame(&mut listener).await);
    assert_eq!(command, "PROFILE");
    assert_eq!(body, json!({ "minLat": 0, "maxLat": 10, "minLong": 0, "maxLong": 10 }));

    send(&mut listener, "TYPES").await;
    assert_eq!(next_frame(&mut listener).await, r#"TYPES ["tram"]"#);
}

#[tokio::test]
async fn invalid_requests_get_error_frames_and_connection_stays_open() {
    let (addr, _state) = setup_test_server(QUIET_PING_MS).await;
    let mut ws = connect(addr).await;

    send(&mut ws, "LISTEN {type: 'bus', minLat: 5.55}").await;
    let (command, body) = split(&next_frame(&mut ws).await);
    assert_eq!(command, "ERROR");
    assert_eq!(body["message"], "maxLat is not of type number: undefined");

    send(&mut ws, "UPDATE {type: 'bus', id: 'seven'}").await;
    let (command, body) = split(&next_frame(&mut ws).await);
    assert_eq!(command, "ERROR");
    assert_eq!(body["message"], "id is not of type integer: seven");

    send(&mut ws, "UPDATE {type: ").await;
    let (command, _) = split(&next_frame(&mut ws).await);
    assert_eq!(command, "ERROR");

    send(&mut ws, "PING").await;
    assert_eq!(next_frame(&mut ws).await, "PONG");
}

#[tokio::test]
async fn closing_a_connection_removes_it() {
    let (addr, state) = setup_test_server(QUIET_PING_MS).await;
    let mut ws = connect(addr).await;

    send(
        &mut ws,
        "LISTEN {type: 'bus', minLat: 0, maxLat: 10, minLong: 0, maxLong: 10}",
    )
    .await;
    assert_eq!(next_frame(&mut ws).await, "OK");
    assert_eq!(state.connection_manager.connected().await, 1);

    ws.close(None).await.expect("failed to close");

    tokio::time::timeout(Duration::from_secs(5), async {
        while state.connection_manager.connected().await > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection was not removed");

    // The subscription went with it: writes reach no one and nothing breaks.
    let mut writer = connect(addr).await;
    send(&mut writer, "UPDATE {type: 'bus', id: 1, lat: 5, long: 5}").await;
    let (command, _) = split(&next_frame(&mut writer).await);
    assert_eq!(command, "OK");
    assert!(state.store.list_known_types().contains("bus"));
}

async fn store_buses(ws: &mut Client, count: usize) {
    for id in 0..count {
        send(ws, &format!("UPDATE {{type: 'bus', id: {id}, lat: 5, long: 5}}")).await;
        let (command, _) = split(&next_frame(ws).await);
        assert_eq!(command, "OK");
    }
}

#[tokio::test]
async fn backfill_larger_than_a_socket_buffer_is_delivered_in_full() {
    let (addr, _state) = setup_test_server(QUIET_PING_MS).await;
    let mut writer = connect(addr).await;
    store_buses(&mut writer, 300).await;

    let mut listener = connect(addr).await;
    send(
        &mut listener,
        "LISTEN {type: 'bus', minLat: 0, maxLat: 10, minLong: 0, maxLong: 10}",
    )
    .await;

    let mut ids = Vec::new();
    loop {
        let (command, body) = split(&next_frame(&mut listener).await);
        if command == "OK" {
            break;
        }
        assert_eq!(command, "UPDATE");
        ids.push(body["id"].as_i64().unwrap());
    }
    ids.sort_unstable();
    assert_eq!(ids, (0..300).collect::<Vec<i64>>());
}

#[tokio::test]
async fn client_that_falls_behind_is_disconnected_not_silently_skipped() {
    let mut config = Config::default();
    config.connection.ping_interval_ms = QUIET_PING_MS;
    config.connection.max_queued_frames = 8;
    let (addr, state) = setup_with_config(config).await;

    let mut writer = connect(addr).await;
    store_buses(&mut writer, 50).await;

    let mut listener = connect(addr).await;
    send(
        &mut listener,
        "LISTEN {type: 'bus', minLat: 0, maxLat: 10, minLong: 0, maxLong: 10}",
    )
    .await;

    // The stream ends instead of carrying on with frames missing.
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match listener.next().await {
                Some(Ok(Message::Text(text))) => assert_ne!(text.as_str(), "OK"),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await
    .expect("lagging connection was not closed");

    tokio::time::timeout(Duration::from_secs(5), async {
        while state.connection_manager.connected().await > 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("lagging connection was not removed");

    // The writer is unaffected.
    send(&mut writer, "PING").await;
    assert_eq!(next_frame(&mut writer).await, "PONG");
}
