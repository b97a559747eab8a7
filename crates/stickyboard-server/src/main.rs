//! StickyBoard Presence Relay Server
//!
//! Relays ephemeral traffic between clients on the same board: cursor
//! positions, presence rosters and live note drag positions. Persistent
//! board content never passes through here; clients write that to the
//! document store directly.
//!
//! ## Protocol
//!
//! Messages are JSON with the following format:
//! ```json
//! { "type": "join", "board": "<uuid>", "user": "<uuid>", "name": "ana" }
//! { "type": "cursor", "x": 100.0, "y": 200.0 }
//! { "type": "note_position", "note": "<uuid>", "x": 40.0, "y": 50.0 }
//! ```

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, net::SocketAddr, sync::Arc};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

/// A message from a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a board room.
    Join {
        board: Uuid,
        user: Uuid,
        name: String,
    },
    /// Leave the current room.
    Leave,
    /// Cursor moved.
    Cursor { x: f64, y: f64 },
    /// Live position of a note being dragged.
    NotePosition { note: Uuid, x: f64, y: f64 },
}

/// A message broadcast to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirm room join with the current roster.
    Joined { board: Uuid, peers: Vec<PeerInfo> },
    PeerJoined { user: Uuid, name: String },
    PeerLeft { user: Uuid },
    Cursor {
        from: Uuid,
        name: String,
        x: f64,
        y: f64,
    },
    NotePosition {
        from: Uuid,
        note: Uuid,
        x: f64,
        y: f64,
    },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerInfo {
    pub user: Uuid,
    pub name: String,
}

/// Room state for one board.
struct Room {
    /// Broadcast channel, keyed by the sending connection.
    tx: broadcast::Sender<(Uuid, ServerMessage)>,
    /// Connected users by connection id.
    peers: HashMap<Uuid, PeerInfo>,
}

impl Room {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            peers: HashMap::new(),
        }
    }
}

/// Shared application state.
struct AppState {
    rooms: DashMap<Uuid, Room>,
}

impl AppState {
    fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Add a connection to a board room, returning its receiver and the
    /// roster as of joining (including the joiner).
    fn join_room(
        &self,
        board: Uuid,
        conn: Uuid,
        peer: PeerInfo,
    ) -> (broadcast::Receiver<(Uuid, ServerMessage)>, Vec<PeerInfo>) {
        let mut room = self.rooms.entry(board).or_insert_with(Room::new);
        room.peers.insert(conn, peer);
        let rx = room.tx.subscribe();
        let mut roster: Vec<PeerInfo> = room.peers.values().cloned().collect();
        roster.sort_by_key(|p| p.user);
        (rx, roster)
    }

    /// Remove a connection from a room, dropping the room once empty.
    fn leave_room(&self, board: Uuid, conn: Uuid) {
        if let Some(mut room) = self.rooms.get_mut(&board) {
            room.peers.remove(&conn);
            if room.peers.is_empty() {
                drop(room);
                self.rooms.remove(&board);
            }
        }
    }

    fn broadcast(&self, board: Uuid, from: Uuid, msg: ServerMessage) {
        if let Some(room) = self.rooms.get(&board) {
            let _ = room.tx.send((from, msg));
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stickyboard_server=info,tower_http=info".into()),
        )
        .init();

    let state = Arc::new(AppState::new());

    let app = Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3030));
    info!("StickyBoard relay server listening on {}", addr);
    info!("WebSocket endpoint: ws://localhost:3030/ws");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn index() -> &'static str {
    "StickyBoard Relay Server - Connect via WebSocket at /ws"
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let conn = Uuid::new_v4();
    info!("New connection: {}", conn);

    let (mut sender, mut receiver) = socket.split();
    let mut current: Option<(Uuid, PeerInfo)> = None;
    let mut room_rx: Option<broadcast::Receiver<(Uuid, ServerMessage)>> = None;

    loop {
        tokio::select! {
            // Incoming messages from this client.
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                match client_msg {
                                    ClientMessage::Join { board, user, name } => {
                                        // Leave the previous room first.
                                        if let Some((old_board, ref peer)) = current {
                                            state.leave_room(old_board, conn);
                                            state.broadcast(old_board, conn, ServerMessage::PeerLeft {
                                                user: peer.user,
                                            });
                                        }

                                        let peer = PeerInfo { user, name: name.clone() };
                                        let (rx, peers) = state.join_room(board, conn, peer.clone());
                                        room_rx = Some(rx);
                                        current = Some((board, peer));

                                        let joined = ServerMessage::Joined { board, peers };
                                        if sender.send(Message::Text(serde_json::to_string(&joined).unwrap().into())).await.is_err() {
                                            break;
                                        }

                                        state.broadcast(board, conn, ServerMessage::PeerJoined { user, name });
                                        info!("User {} joined board {}", user, board);
                                    }
                                    ClientMessage::Leave => {
                                        if let Some((board, ref peer)) = current {
                                            state.leave_room(board, conn);
                                            state.broadcast(board, conn, ServerMessage::PeerLeft {
                                                user: peer.user,
                                            });
                                            info!("User {} left board {}", peer.user, board);
                                        }
                                        current = None;
                                        room_rx = None;
                                    }
                                    ClientMessage::Cursor { x, y } => {
                                        if let Some((board, ref peer)) = current {
                                            state.broadcast(board, conn, ServerMessage::Cursor {
                                                from: peer.user,
                                                name: peer.name.clone(),
                                                x,
                                                y,
                                            });
                                        }
                                    }
                                    ClientMessage::NotePosition { note, x, y } => {
                                        if let Some((board, ref peer)) = current {
                                            state.broadcast(board, conn, ServerMessage::NotePosition {
                                                from: peer.user,
                                                note,
                                                x,
                                                y,
                                            });
                                        }
                                    }
                                }
                            }
                            Err(e) => {
                                warn!("Invalid message from {}: {}", conn, e);
                                let err = ServerMessage::Error {
                                    message: format!("Invalid message: {}", e),
                                };
                                let _ = sender.send(Message::Text(serde_json::to_string(&err).unwrap().into())).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {} // Ignore binary, ping, pong.
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", conn, e);
                        break;
                    }
                }
            }

            // Broadcast traffic from the room.
            msg = async {
                match &mut room_rx {
                    Some(rx) => rx.recv().await.ok(),
                    None => {
                        // Not in a room yet; park until a Join arrives.
                        std::future::pending::<Option<(Uuid, ServerMessage)>>().await
                    }
                }
            } => {
                if let Some((from, server_msg)) = msg {
                    // Never echo back to the sender.
                    if from != conn {
                        let json = serde_json::to_string(&server_msg).unwrap();
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }

    // An abrupt disconnect clears presence for the remaining peers just
    // like an explicit Leave.
    if let Some((board, peer)) = current {
        state.leave_room(board, conn);
        state.broadcast(board, conn, ServerMessage::PeerLeft { user: peer.user });
    }
    info!("Connection closed: {}", conn);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_room_returns_full_roster() {
        let state = AppState::new();
        let board = Uuid::new_v4();
        let (c1, c2) = (Uuid::new_v4(), Uuid::new_v4());
        let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());

        let (_rx1, roster1) = state.join_room(
            board,
            c1,
            PeerInfo { user: u1, name: "ana".into() },
        );
        assert_eq!(roster1.len(), 1);

        let (_rx2, roster2) = state.join_room(
            board,
            c2,
            PeerInfo { user: u2, name: "ben".into() },
        );
        assert_eq!(roster2.len(), 2);
        assert!(roster2.iter().any(|p| p.user == u1));
        assert!(roster2.iter().any(|p| p.user == u2));
    }

    #[test]
    fn test_empty_room_is_dropped() {
        let state = AppState::new();
        let board = Uuid::new_v4();
        let conn = Uuid::new_v4();
        let user = Uuid::new_v4();

        state.join_room(board, conn, PeerInfo { user, name: "ana".into() });
        assert!(state.rooms.contains_key(&board));

        state.leave_room(board, conn);
        assert!(!state.rooms.contains_key(&board));
    }

    #[test]
    fn test_broadcast_reaches_subscribers() {
        let state = AppState::new();
        let board = Uuid::new_v4();
        let (c1, c2) = (Uuid::new_v4(), Uuid::new_v4());
        let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());

        let (mut rx1, _) = state.join_room(board, c1, PeerInfo { user: u1, name: "ana".into() });
        let (_rx2, _) = state.join_room(board, c2, PeerInfo { user: u2, name: "ben".into() });

        state.broadcast(board, c2, ServerMessage::Cursor {
            from: u2,
            name: "ben".into(),
            x: 1.0,
            y: 2.0,
        });

        let (from, msg) = rx1.try_recv().unwrap();
        assert_eq!(from, c2);
        assert!(matches!(msg, ServerMessage::Cursor { x, .. } if x == 1.0));
    }

    #[test]
    fn test_client_message_wire_format() {
        let json = r#"{"type":"note_position","note":"6f9b07a4-6f53-4b38-9d8c-111111111111","x":40.0,"y":50.0}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::NotePosition { x, y, .. } if x == 40.0 && y == 50.0));
    }
}
