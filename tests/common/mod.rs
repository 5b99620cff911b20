//! In-process chat server for integration tests.
//!
//! Serves the REST endpoints under `/api` and the room websocket under
//! `/ws/{room_id}`. Text sent on a socket is echoed to every socket as a
//! pending `message` frame, like the real server does before moderation.
//! The echo goes out before the message is stored, so it has no timestamp.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use roomsync::{Credentials, Message, ModerationStatus, Room, UNSET_TIMESTAMP, User};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

pub const TOKEN: &str = "test-token";
pub const PASSWORD: &str = "hunter2";

#[derive(Debug, Clone)]
pub enum ServerFrame {
    Text(String),
    Close,
}

pub struct ServerState {
    backlog: Mutex<HashMap<String, Vec<Message>>>,
    backlog_open: watch::Sender<bool>,
    tx: broadcast::Sender<ServerFrame>,
    user: User,
}

pub struct FakeServer {
    pub api_url: String,
    pub ws_url: String,
    state: Arc<ServerState>,
}

impl FakeServer {
    pub async fn start() -> FakeServer {
        let (backlog_open, _) = watch::channel(true);
        let state = Arc::new(ServerState {
            backlog: Mutex::new(HashMap::new()),
            backlog_open,
            tx: broadcast::channel(64).0,
            user: User {
                id: "u-ada".to_string(),
                email: "ada@example.com".to_string(),
                username: "ada".to_string(),
            },
        });

        let app = Router::new()
            .route("/api/login", post(login))
            .route("/api/rooms", get(rooms))
            .route("/api/rooms/{room_id}/messages", get(messages))
            .route("/ws/{room_id}", get(room_ws))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        FakeServer {
            api_url: format!("http://{addr}/api"),
            ws_url: format!("ws://{addr}"),
            state,
        }
    }

    pub fn set_backlog(&self, room_id: &str, messages: Vec<Message>) {
        self.state
            .backlog
            .lock()
            .unwrap()
            .insert(room_id.to_string(), messages);
    }

    /// Make backlog requests wait until [`FakeServer::release_backlog`].
    pub fn hold_backlog(&self) {
        self.state.backlog_open.send_replace(false);
    }

    pub fn release_backlog(&self) {
        self.state.backlog_open.send_replace(true);
    }

    pub fn push_frame(&self, frame: serde_json::Value) {
        let _ = self.state.tx.send(ServerFrame::Text(frame.to_string()));
    }

    pub fn moderate(&self, message_id: &str, status: &str) {
        self.push_frame(json!({
            "type": "moderation_update",
            "payload": { "message_id": message_id, "status": status },
        }));
    }

    /// Close every open socket from the server side.
    pub fn close_sockets(&self) {
        let _ = self.state.tx.send(ServerFrame::Close);
    }
}

pub fn message(id: &str, room_id: &str, secs: i64, content: &str) -> Message {
    Message {
        id: id.to_string(),
        room_id: room_id.to_string(),
        user_id: "u-bob".to_string(),
        username: "bob".to_string(),
        content: content.to_string(),
        moderation_status: ModerationStatus::Pending,
        created_at: OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(secs),
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" }))).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(State(state): State<Arc<ServerState>>, Json(body): Json<LoginBody>) -> Response {
    if body.email != state.user.email || body.password != PASSWORD {
        let body = Json(json!({ "error": "invalid credentials" }));
        return (StatusCode::UNAUTHORIZED, body).into_response();
    }
    Json(Credentials {
        token: TOKEN.to_string(),
        user: state.user.clone(),
    })
    .into_response()
}

async fn rooms(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(vec![Room {
        id: "lobby".to_string(),
        name: "Lobby".to_string(),
        created_by: "u-ada".to_string(),
        created_at: OffsetDateTime::UNIX_EPOCH,
    }])
    .into_response()
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn messages(
    Path(room_id): Path<String>,
    Query(LimitQuery { limit }): Query<LimitQuery>,
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }

    let mut open = state.backlog_open.subscribe();
    let _ = open.wait_for(|open| *open).await;

    let mut messages = state
        .backlog
        .lock()
        .unwrap()
        .get(&room_id)
        .cloned()
        .unwrap_or_default();
    messages.truncate(limit.unwrap_or(50));
    Json(messages).into_response()
}

#[derive(Deserialize)]
struct TokenQuery {
    token: String,
}

#[derive(Deserialize)]
struct SendMessageQuery {
    content: String,
}

async fn room_ws(
    Path(room_id): Path<String>,
    Query(TokenQuery { token }): Query<TokenQuery>,
    State(state): State<Arc<ServerState>>,
    ws: WebSocketUpgrade,
) -> Response {
    if token != TOKEN {
        return unauthorized();
    }

    // subscribe before the upgrade so frames pushed right after the client
    // sees the handshake are not lost
    let rx = state.tx.subscribe();
    ws.on_upgrade(move |socket| serve_socket(socket, rx, room_id, state))
}

async fn serve_socket(
    socket: WebSocket,
    mut rx: broadcast::Receiver<ServerFrame>,
    room_id: String,
    state: Arc<ServerState>,
) {
    let (mut sender, mut receiver) = socket.split();

    let mut broadcast_task = tokio::spawn(async move {
        while let Ok(frame) = rx.recv().await {
            let msg = match frame {
                ServerFrame::Text(text) => WsMessage::Text(text.into()),
                ServerFrame::Close => {
                    let _ = sender.send(WsMessage::Close(None)).await;
                    break;
                }
            };
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut broadcast_task => break,
            msg = receiver.next() => {
                let Some(Ok(msg)) = msg else {
                    break;
                };
                let WsMessage::Text(text) = msg else {
                    continue;
                };
                let Ok(SendMessageQuery { content }) = serde_json::from_str(text.as_str()) else {
                    continue;
                };

                let message = Message {
                    id: Uuid::now_v7().to_string(),
                    room_id: room_id.clone(),
                    user_id: state.user.id.clone(),
                    username: state.user.username.clone(),
                    content,
                    moderation_status: ModerationStatus::Pending,
                    created_at: UNSET_TIMESTAMP,
                };
                let _ = state.tx.send(ServerFrame::Text(
                    json!({ "type": "message", "payload": message }).to_string(),
                ));
            }
        }
    }

    broadcast_task.abort();
}
