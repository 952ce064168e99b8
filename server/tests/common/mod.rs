use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tower::ServiceExt;

use barangay_server::{build_router, config::Config, crypto, storage::Storage, AppState};

pub const PASSWORD: &str = "desk-pass";

#[allow(dead_code)]
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.admin.password_hash = crypto::hash_secret(PASSWORD);
    config.limits.max_message_length = 200;
    config
}

/// Router over a fresh in-memory database.
#[allow(dead_code)]
pub async fn test_app() -> Router {
    let storage = Storage::in_memory()
        .await
        .expect("Failed to open in-memory database");
    build_router(AppState::new(Arc::new(test_config()), storage))
}

/// Serve a fresh app on an ephemeral local port.
#[allow(dead_code)]
pub async fn serve() -> SocketAddr {
    let app = test_app().await;
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server failed");
    });
    addr
}

/// Send a request, optionally with a bearer token and a JSON body, and
/// return (status, parsed body). An empty body parses as `null`.
#[allow(dead_code)]
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).to_string())
        })
    };
    (status, value)
}

/// Sign in as the configured admin and return the session token.
#[allow(dead_code)]
pub async fn login(app: &Router) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(serde_json::json!({ "username": "admin", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}

/// A small barangay: two residents, three complaints, a roster and some
/// complaint feedback.
#[allow(dead_code)]
pub fn seed() -> Value {
    serde_json::json!({
        "users": {
            "u1": {
                "name": "Ana Reyes",
                "contact": "09171234567",
                "purok": "Purok 1",
                "address": "12 Mabini St",
                "idVerificationImage": "https://img.example/ana.png",
                "idstatus": "pending",
                "userComplaints": {
                    "c1": {
                        "type": "Noise",
                        "message": "Videoke past midnight",
                        "status": "pending",
                        "label": "urgent",
                        "timestamp": "05/03/2024, 23:10:00",
                        "chat": {
                            "m1": { "senderId": "u1", "body": "Still loud", "timestamp": "05/03/2024, 23:15:00", "read": false },
                            "m2": { "senderId": "u1", "body": "Please help", "timestamp": "05/03/2024, 23:20:00", "read": false }
                        }
                    },
                    "c2": {
                        "type": "Garbage",
                        "message": "Uncollected trash",
                        "status": "in-progress",
                        "label": "non-urgent",
                        "timestamp": "20/03/2024, 08:00:00"
                    }
                }
            },
            "u2": {
                "name": "Ben Cruz",
                "purok": "",
                "idstatus": "approved",
                "userComplaints": {
                    "c3": {
                        "type": "Noise",
                        "message": "Barking dogs",
                        "status": "resolved",
                        "label": "non-urgent",
                        "timestamp": "not a date"
                    }
                }
            }
        },
        "officials": {
            "o1": {
                "name": "Kap. Santos",
                "position": "Captain",
                "feedback": {
                    "f1": { "rating": "5", "comment": "Quick", "citizen": "u1" },
                    "f2": { "rating": 4, "comment": "Good", "citizen": "u2" },
                    "f3": { "rating": "0", "comment": "", "citizen": "u2" }
                }
            },
            "o2": { "name": "Kgd. Lim", "position": "Kagawad" }
        },
        "complaintFeedback": {
            "k1": { "userId": "u2", "complaintId": "c3", "rating": 5, "comment": "Thanks" },
            "k2": { "userId": "u1", "complaintId": "c2", "rating": "3", "comment": "Slow" }
        }
    })
}

/// App with the seed tree loaded, plus a signed-in token.
#[allow(dead_code)]
pub async fn seeded_app() -> (Router, String) {
    let app = test_app().await;
    let token = login(&app).await;
    for (root, value) in seed().as_object().unwrap() {
        let (status, _) = send(
            &app,
            "PUT",
            &format!("/api/v1/db/{}", root),
            Some(&token),
            Some(value.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    (app, token)
}
