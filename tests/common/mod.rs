//! In-process board backend for integration tests.
//!
//! Serves a subset of the REST surface under `/api` plus the `/ws` event
//! stream, keeping its authoritative state in a `BoardStore` so positions
//! are renumbered the way the real server does. Every mutation is
//! broadcast to connected streams, including the caller's own.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use taskboard::store::BoardStore;
use taskboard_common::{Board, Card, Comment, List, MoveCardRequest, NewCard, NewComment};
use tokio::sync::broadcast;

pub const TOKEN: &str = "secret";

#[derive(Clone)]
struct AppState {
    board: Arc<Mutex<BoardStore>>,
    events: broadcast::Sender<String>,
    next_id: Arc<AtomicU64>,
}

impl AppState {
    fn id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn publish(&self, kind: &str, payload: serde_json::Value) {
        let message = json!({"type": kind, "payload": payload}).to_string();
        let _ = self.events.send(message);
    }
}

pub struct TestServer {
    pub api_url: String,
    pub ws_url: String,
    events: broadcast::Sender<String>,
}

impl TestServer {
    /// Push a raw message to every connected stream.
    pub fn push(&self, message: &str) {
        let _ = self.events.send(message.to_string());
    }
}

/// Board 1 "Sprint": L1 "Todo" with A(100), B(101); L2 "Done" empty.
pub fn seed_board() -> Board {
    Board::new(1, "Sprint").with_lists(vec![
        List::new(1, 1, "Todo", 1)
            .with_cards(vec![Card::new(100, 1, "A", 1), Card::new(101, 1, "B", 2)]),
        List::new(2, 1, "Done", 2).with_cards(vec![]),
    ])
}

pub async fn spawn_server() -> TestServer {
    let mut store = BoardStore::new();
    store.set_user_boards(vec![Board::new(1, "Sprint")]);
    store.load_board(seed_board());
    let (events, _) = broadcast::channel(64);
    let state = AppState {
        board: Arc::new(Mutex::new(store)),
        events: events.clone(),
        next_id: Arc::new(AtomicU64::new(500)),
    };

    let app = Router::new()
        .route("/api/boards", get(list_boards))
        .route("/api/boards/{id}", get(get_board).delete(delete_board))
        .route("/api/lists/{id}/cards", post(create_card))
        .route("/api/cards/{id}/move", patch(move_card))
        .route("/api/cards/{id}/comments", post(add_comment))
        .route("/api/cards/{id}", delete(delete_card))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        api_url: format!("http://{addr}"),
        ws_url: format!("ws://{addr}/ws"),
        events,
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

fn ok<T: Serialize>(message: &str, data: T) -> Response {
    Json(json!({"status": "success", "message": message, "data": data})).into_response()
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"status": "error", "message": message}))).into_response()
}

fn unauthorized() -> Response {
    error(StatusCode::UNAUTHORIZED, "Unauthorized: missing or invalid token")
}

async fn list_boards(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let boards = state.board.lock().unwrap().user_boards().to_vec();
    ok("Boards retrieved", boards)
}

async fn get_board(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<u64>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    match state.board.lock().unwrap().snapshot().filter(|b| b.id == id) {
        Some(board) => ok("Board retrieved", board),
        None => error(StatusCode::NOT_FOUND, "Board not found"),
    }
}

async fn delete_board(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<u64>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    state.board.lock().unwrap().evict_board(id);
    state.publish("BOARD_DELETED", json!({"id": id}));
    ok("Board deleted", serde_json::Value::Null)
}

async fn create_card(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(list_id): Path<u64>,
    Json(new): Json<NewCard>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let card = Card::new(state.id(), list_id, new.title, new.position.unwrap_or(0));
    let created = {
        let mut store = state.board.lock().unwrap();
        store.apply_card_upsert(card.clone());
        store.card(card.id).cloned()
    };
    match created {
        Some(card) => {
            state.publish("CARD_CREATED", serde_json::to_value(&card).unwrap());
            ok("Card created", card)
        }
        None => error(StatusCode::NOT_FOUND, "List not found"),
    }
}

async fn move_card(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(card_id): Path<u64>,
    Json(request): Json<MoveCardRequest>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let moved = {
        let mut store = state.board.lock().unwrap();
        let Some(mut card) = store.card(card_id).cloned() else {
            return error(StatusCode::NOT_FOUND, "Card not found");
        };
        let (old_list, old_position) = (card.list_id, card.position);
        card.list_id = request.target_list_id;
        card.position = request.new_position;
        store.apply_card_upsert(card);
        store
            .card(card_id)
            .cloned()
            .map(|card| (card, old_list, old_position))
    };
    let Some((card, old_list, old_position)) = moved else {
        return error(StatusCode::NOT_FOUND, "List not found");
    };
    state.publish(
        "CARD_MOVED",
        json!({
            "cardId": card.id,
            "oldListId": old_list,
            "newListId": card.list_id,
            "oldPosition": old_position,
            "newPosition": card.position,
            "boardId": 1,
        }),
    );
    ok("Card moved", card)
}

async fn delete_card(State(state): State<AppState>, headers: HeaderMap, Path(card_id): Path<u64>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let list_id = {
        let mut store = state.board.lock().unwrap();
        let Some(list_id) = store.current().and_then(|b| b.list_of_card(card_id)) else {
            return error(StatusCode::NOT_FOUND, "Card not found");
        };
        store.remove_card(card_id, list_id);
        list_id
    };
    state.publish("CARD_DELETED", json!({"id": card_id, "listId": list_id, "boardId": 1}));
    ok("Card deleted", serde_json::Value::Null)
}

/// Comment creation answers with the bare entity, no envelope.
async fn add_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(card_id): Path<u64>,
    Json(new): Json<NewComment>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let comment = Comment {
        id: state.id(),
        card_id,
        user_id: 1,
        user: None,
        content: new.content,
        created_at: None,
    };
    (StatusCode::CREATED, Json(comment)).into_response()
}

async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    if params.get("token").map(String::as_str) != Some(TOKEN) || !params.contains_key("boardID") {
        return unauthorized();
    }
    // Subscribe before the handshake completes so nothing published after
    // the client sees the stream open is missed.
    let rx = state.events.subscribe();
    ws.on_upgrade(move |socket| forward_events(socket, rx))
}

async fn forward_events(mut socket: WebSocket, mut rx: broadcast::Receiver<String>) {
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(text) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
