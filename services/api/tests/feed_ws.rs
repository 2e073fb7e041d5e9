//! services/api/tests/feed_ws.rs
//!
//! The live feed over a real socket: the router is served on a local port
//! and a WebSocket client connects with a session cookie.

mod common;

use axum::http::StatusCode;
use common::{test_app, TestApp};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, Message},
    MaybeTlsStream, WebSocketStream,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(app: &TestApp) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, cookie: &str) -> Socket {
    let mut request = format!("ws://{}/feed/ws", addr)
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("cookie", cookie.parse().unwrap());
    let (socket, _) = connect_async(request).await.unwrap();
    socket
}

/// Next JSON text frame, failing the test if none arrives in time.
async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("no message from the feed")
            .expect("feed closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn add_plant(app: &TestApp, cookie: &str, name: &str) {
    let reply = app
        .call(
            "POST",
            "/garden",
            Some(cookie),
            Some(json!({ "name": name, "watering_frequency": 5 })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
}

#[tokio::test]
async fn feed_streams_friend_activities_only() {
    let app = test_app();
    let (ada_id, ada) = app.signup("Ada").await;
    let (bob_id, bob) = app.signup("Bob").await;
    let (_, carol) = app.signup("Carol").await;

    let asked = app
        .call("POST", "/friends/requests", Some(&ada), Some(json!({ "pseudo": "Bob" })))
        .await;
    assert_eq!(asked.status, StatusCode::CREATED);
    let accepted = app
        .call(
            "POST",
            &format!("/friends/requests/{}/accept", ada_id),
            Some(&bob),
            None,
        )
        .await;
    assert_eq!(accepted.status, StatusCode::NO_CONTENT);

    let addr = serve(&app).await;
    let mut socket = connect(addr, &ada).await;

    // 1. The subscription is confirmed first
    let subscribed = next_json(&mut socket).await;
    assert_eq!(subscribed["type"], "subscribed");
    assert_eq!(subscribed["user_id"], ada_id.as_str());

    // 2. A stranger acts, then a friend does
    add_plant(&app, &carol, "Cactus").await;
    add_plant(&app, &bob, "Ficus").await;

    // Activities are forwarded in order, so Carol's would show up before Bob's plant
    loop {
        let message = next_json(&mut socket).await;
        assert_eq!(message["type"], "activity");
        assert_eq!(message["activity"]["user_id"], bob_id.as_str());
        assert_eq!(message["activity"]["pseudo"], "Bob");
        if message["activity"]["kind"]["type"] == "ADDED_PLANT" {
            assert_eq!(message["activity"]["kind"]["plant_name"], "Ficus");
            break;
        }
    }

    // 3. Keep-alive
    socket
        .send(Message::Text(json!({ "type": "ping" }).to_string()))
        .await
        .unwrap();
    loop {
        let message = next_json(&mut socket).await;
        if message["type"] == "pong" {
            break;
        }
        assert_eq!(message["activity"]["pseudo"], "Bob");
    }

    // 4. Garbage is reported without closing the connection
    socket
        .send(Message::Text("not json".to_string()))
        .await
        .unwrap();
    let error = next_json(&mut socket).await;
    assert_eq!(error["type"], "error");

    socket.close(None).await.unwrap();
}

#[tokio::test]
async fn feed_requires_a_session() {
    let app = test_app();
    let addr = serve(&app).await;

    let request = format!("ws://{}/feed/ws", addr)
        .into_client_request()
        .unwrap();
    assert!(connect_async(request).await.is_err());
}
