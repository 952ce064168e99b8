//! Network layer - HTTP API and WebSocket subscriptions against the desk server

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use url::Url;

use crate::error::{Error, Result};
use crate::store::{RemoteStore, Subscription};
use crate::tree;
use crate::ClientConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub email: String,
    pub expires_at: i64,
}

// ============================================================================
// HTTP API Client
// ============================================================================

pub struct ApiClient {
    client: Client,
    config: ClientConfig,
    token: Mutex<Option<String>>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            config: config.clone(),
            token: Mutex::new(None),
        })
    }

    /// Reuse a token from an earlier session.
    pub fn with_token(self, token: &str) -> Self {
        *self.token.lock() = Some(token.to_string());
        self
    }

    pub fn token(&self) -> Option<String> {
        self.token.lock().clone()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self
            .client
            .request(method, format!("{}{}", self.config.http_url(), path));

        match self.token() {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    fn db_path(path: &str) -> String {
        format!("/api/v1/db/{}", tree::segments(path).join("/"))
    }

    /// Map non-success statuses onto library errors, keeping the server's
    /// error message.
    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body: Value = resp.json().await.unwrap_or(Value::Null);
        let message = body["error"]["message"]
            .as_str()
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"))
            .to_string();

        Err(match status {
            StatusCode::UNAUTHORIZED => Error::NotLoggedIn,
            StatusCode::NOT_FOUND => Error::NotFound(message),
            StatusCode::BAD_REQUEST => Error::Validation(message),
            _ => Error::Store(format!("{}: {}", status.as_u16(), message)),
        })
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<AuthSession> {
        let resp = self
            .request(Method::POST, "/api/v1/auth/login")
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(Error::InvalidCredentials);
        }

        let session: AuthSession = Self::check(resp).await?.json().await?;
        *self.token.lock() = Some(session.token.clone());
        log::debug!("Signed in as {}", session.email);

        Ok(session)
    }

    pub async fn logout(&self) -> Result<()> {
        if self.token().is_none() {
            return Ok(());
        }
        let resp = self.request(Method::POST, "/api/v1/auth/logout").send().await?;
        Self::check(resp).await?;
        *self.token.lock() = None;
        Ok(())
    }

    /// Ask for a password reset; returns the address the link goes to.
    pub async fn request_password_reset(&self, username: &str) -> Result<String> {
        let resp = self
            .request(Method::POST, "/api/v1/auth/password-reset")
            .json(&json!({ "username": username }))
            .send()
            .await?;

        let data: Value = Self::check(resp).await?.json().await?;
        Ok(data["email"].as_str().unwrap_or_default().to_string())
    }

    pub async fn check_health(&self) -> Result<bool> {
        let resp = self.client.get(format!("{}/health", self.config.http_url())).send().await;

        match resp {
            Ok(r) => Ok(r.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

impl RemoteStore for ApiClient {
    async fn get(&self, path: &str) -> Result<Option<Value>> {
        let resp = self.request(Method::GET, &Self::db_path(path)).send().await?;
        let value: Value = Self::check(resp).await?.json().await?;
        Ok(if value.is_null() { None } else { Some(value) })
    }

    async fn set(&self, path: &str, value: Value) -> Result<()> {
        let resp = self
            .request(Method::PUT, &Self::db_path(path))
            .json(&value)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<()> {
        let resp = self
            .request(Method::PATCH, &Self::db_path(path))
            .json(&fields)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn update_many(&self, updates: Map<String, Value>) -> Result<()> {
        let resp = self
            .request(Method::POST, "/api/v1/db")
            .json(&updates)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> Result<String> {
        let resp = self
            .request(Method::POST, &Self::db_path(path))
            .json(&value)
            .send()
            .await?;
        let data: Value = Self::check(resp).await?.json().await?;
        data["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Store("push response carried no id".to_string()))
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let resp = self.request(Method::DELETE, &Self::db_path(path)).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn subscribe(&self, root: &str) -> Result<Subscription> {
        let token = self.token().ok_or(Error::NotLoggedIn)?;
        let root = tree::segments(root).join("/");
        let url = Url::parse(&self.config.ws_url())?;

        let (ws_stream, _) = connect_async(url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();

        write
            .send(WsMessage::Text(
                json!({ "type": "authenticate", "payload": { "token": token } }).to_string(),
            ))
            .await?;
        write
            .send(WsMessage::Text(
                json!({ "type": "subscribe", "payload": { "path": root } }).to_string(),
            ))
            .await?;

        let (tx, rx) = mpsc::unbounded_channel::<Value>();
        let watched = root.clone();

        // Receive task; ends when the socket closes or the subscription is dropped.
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(WsMessage::Text(text)) => {
                        let Ok(data) = serde_json::from_str::<Value>(&text) else {
                            continue;
                        };
                        match data["type"].as_str() {
                            Some("value") if data["payload"]["path"] == watched => {
                                if tx.send(data["payload"]["value"].clone()).is_err() {
                                    break;
                                }
                            }
                            Some("error") => {
                                log::warn!(
                                    "Subscription {} rejected: {}",
                                    watched,
                                    data["payload"]["message"]
                                );
                                break;
                            }
                            _ => {}
                        }
                    }
                    Ok(WsMessage::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }
            let _ = write.close().await;
        });

        Ok(Subscription::new(&root, rx))
    }
}
