//! Realtime store over the wire: the core `ApiClient` and the `/ws` protocol
//! against a served app

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Map, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use barangay_core::{ApiClient, ClientConfig, Error, RemoteStore, Subscription};

use common::*;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn client(addr: SocketAddr) -> ApiClient {
    ApiClient::new(&ClientConfig::new("127.0.0.1", addr.port(), false)).unwrap()
}

async fn next_value(sub: &mut Subscription) -> Value {
    tokio::time::timeout(Duration::from_secs(5), sub.next())
        .await
        .expect("no delivery within 5s")
        .expect("subscription closed")
}

async fn open_socket(addr: SocketAddr) -> Socket {
    let (socket, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    socket
}

async fn send_json(socket: &mut Socket, message: Value) {
    socket.send(Message::Text(message.to_string())).await.unwrap();
}

async fn recv_json(socket: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("no frame within 5s")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn test_api_client_requires_sign_in() {
    let addr = serve().await;
    let client = client(addr);

    assert!(matches!(client.get("users").await, Err(Error::NotLoggedIn)));
    assert!(matches!(
        client.set("users/u1/name", json!("Ana")).await,
        Err(Error::NotLoggedIn)
    ));
    assert!(matches!(
        client.login("admin", "wrong").await,
        Err(Error::InvalidCredentials)
    ));
    assert!(matches!(client.subscribe("users").await, Err(Error::NotLoggedIn)));
}

#[tokio::test]
async fn test_api_client_subscription_follows_writes() {
    let addr = serve().await;
    let client = client(addr);
    let session = client.login("admin", PASSWORD).await.unwrap();
    assert_eq!(session.email, "admin@barangay.local");

    let mut sub = client.subscribe("users").await.unwrap();
    assert_eq!(next_value(&mut sub).await, Value::Null);

    let chat = "users/u1/userComplaints/c1/chat";
    let id = client
        .push(chat, json!({ "senderId": "u1", "body": "Loud videoke", "read": false }))
        .await
        .unwrap();
    assert_eq!(id.len(), 20);

    let users = next_value(&mut sub).await;
    assert_eq!(users["u1"]["userComplaints"]["c1"]["chat"][&id]["body"], "Loud videoke");

    let mut updates = Map::new();
    updates.insert(format!("{}/{}/read", chat, id), json!(true));
    updates.insert("users/u1/name".to_string(), json!("Ana Reyes"));
    client.update_many(updates).await.unwrap();

    // One delivery for the whole multi-path update.
    let users = next_value(&mut sub).await;
    assert_eq!(users["u1"]["name"], "Ana Reyes");
    assert_eq!(users["u1"]["userComplaints"]["c1"]["chat"][&id]["read"], true);

    // Writes elsewhere in the tree are not delivered to `users` watchers.
    client.set("officials/o1/name", json!("Kap. Santos")).await.unwrap();
    client.remove("users/u1").await.unwrap();
    assert_eq!(next_value(&mut sub).await, Value::Null);

    assert_eq!(client.get("users").await.unwrap(), None);
    assert_eq!(
        client.get("officials/o1/name").await.unwrap(),
        Some(json!("Kap. Santos"))
    );
}

#[tokio::test]
async fn test_socket_protocol() {
    let addr = serve().await;
    let client = client(addr);
    let token = client.login("admin", PASSWORD).await.unwrap().token;
    client.set("users/u1/name", json!("Ana")).await.unwrap();

    let mut socket = open_socket(addr).await;

    send_json(&mut socket, json!({ "type": "subscribe", "payload": { "path": "users" } })).await;
    let reply = recv_json(&mut socket).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["payload"]["code"], "UNAUTHORIZED");

    send_json(&mut socket, json!({ "type": "authenticate", "payload": { "token": "nope" } })).await;
    let reply = recv_json(&mut socket).await;
    assert_eq!(reply["payload"]["code"], "AUTH_FAILED");

    send_json(&mut socket, json!({ "type": "authenticate", "payload": { "token": token } })).await;
    let reply = recv_json(&mut socket).await;
    assert_eq!(reply["type"], "authenticated");
    assert_eq!(reply["payload"]["email"], "admin@barangay.local");

    send_json(&mut socket, json!({ "type": "subscribe", "payload": { "path": "/users/" } })).await;
    let reply = recv_json(&mut socket).await;
    assert_eq!(reply["type"], "value");
    assert_eq!(reply["payload"]["path"], "users");
    assert_eq!(reply["payload"]["value"], json!({ "u1": { "name": "Ana" } }));

    // A second authenticate is refused and keeps the subscription alive.
    send_json(&mut socket, json!({ "type": "authenticate", "payload": { "token": token } })).await;
    let reply = recv_json(&mut socket).await;
    assert_eq!(reply["payload"]["code"], "ALREADY_AUTHENTICATED");

    client.set("users/u1/purok", json!("Purok 2")).await.unwrap();
    let reply = recv_json(&mut socket).await;
    assert_eq!(reply["type"], "value");
    assert_eq!(reply["payload"]["value"]["u1"]["purok"], "Purok 2");

    send_json(&mut socket, json!({ "type": "ping" })).await;
    assert_eq!(recv_json(&mut socket).await["type"], "pong");

    send_json(&mut socket, json!({ "type": "unsubscribe", "payload": { "path": "users" } })).await;
    let reply = recv_json(&mut socket).await;
    assert_eq!(reply["type"], "unsubscribed");

    client.set("users/u1/purok", json!("Purok 3")).await.unwrap();
    send_json(&mut socket, json!({ "type": "ping" })).await;
    // Nothing was queued for the unsubscribed path ahead of the pong.
    assert_eq!(recv_json(&mut socket).await["type"], "pong");

    send_json(&mut socket, json!({ "type": "shout" })).await;
    assert_eq!(recv_json(&mut socket).await["payload"]["code"], "PARSE_ERROR");
}
