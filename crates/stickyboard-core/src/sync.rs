//! WebSocket client for the ephemeral relay.
//!
//! Carries the presence channel only (cursors, rosters, live note motion);
//! persistent documents go through the store, never through the relay.

use crate::ephemeral::{EphemeralEvent, EphemeralStore};
use crate::model::{BoardId, CursorEntry, NoteId, PresenceEntry, UserId};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tungstenite::{connect, Message};
use url::Url;

/// Messages sent to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a board room.
    Join {
        board: BoardId,
        user: UserId,
        name: String,
    },
    /// Leave the current room.
    Leave,
    /// Cursor moved.
    Cursor { x: f64, y: f64 },
    /// Live position of a note being dragged.
    NotePosition { note: NoteId, x: f64, y: f64 },
}

/// Messages received from the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirm room join with the current roster.
    Joined {
        board: BoardId,
        peers: Vec<PeerInfo>,
    },
    PeerJoined { user: UserId, name: String },
    PeerLeft { user: UserId },
    Cursor {
        from: UserId,
        name: String,
        x: f64,
        y: f64,
    },
    NotePosition {
        from: UserId,
        note: NoteId,
        x: f64,
        y: f64,
    },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerInfo {
    pub user: UserId,
    pub name: String,
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events from the relay client.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Connected,
    Disconnected,
    Joined {
        board: BoardId,
        peers: Vec<PeerInfo>,
    },
    PeerJoined { user: UserId, name: String },
    PeerLeft { user: UserId },
    CursorReceived {
        from: UserId,
        name: String,
        position: Point,
    },
    NotePositionReceived {
        from: UserId,
        note: NoteId,
        position: Point,
    },
    Error { message: String },
}

fn event_from_server(msg: ServerMessage) -> SyncEvent {
    match msg {
        ServerMessage::Joined { board, peers } => SyncEvent::Joined { board, peers },
        ServerMessage::PeerJoined { user, name } => SyncEvent::PeerJoined { user, name },
        ServerMessage::PeerLeft { user } => SyncEvent::PeerLeft { user },
        ServerMessage::Cursor { from, name, x, y } => SyncEvent::CursorReceived {
            from,
            name,
            position: Point::new(x, y),
        },
        ServerMessage::NotePosition { from, note, x, y } => SyncEvent::NotePositionReceived {
            from,
            note,
            position: Point::new(x, y),
        },
        ServerMessage::Error { message } => SyncEvent::Error { message },
    }
}

/// Commands sent to the WebSocket thread.
enum WsCommand {
    Send(String),
    Close,
}

/// Relay client for native platforms.
///
/// Uses a background thread for non-blocking operation; events are drained
/// via [`RelayClient::poll_events`].
pub struct RelayClient {
    state: ConnectionState,
    events: Vec<SyncEvent>,
    cmd_tx: Option<Sender<WsCommand>>,
    event_rx: Option<Receiver<SyncEvent>>,
    _thread: Option<JoinHandle<()>>,
}

impl RelayClient {
    /// Create a new disconnected client.
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            events: Vec::new(),
            cmd_tx: None,
            event_rx: None,
            _thread: None,
        }
    }

    /// Connect to a relay server.
    pub fn connect(&mut self, url: &str) -> Result<(), String> {
        if self.cmd_tx.is_some() {
            return Err("Already connected".to_string());
        }

        let parsed_url = Url::parse(url).map_err(|e| format!("Invalid URL: {}", e))?;
        if parsed_url.scheme() != "ws" && parsed_url.scheme() != "wss" {
            return Err(format!(
                "Invalid WebSocket URL scheme: {}",
                parsed_url.scheme()
            ));
        }

        self.state = ConnectionState::Connecting;

        let (cmd_tx, cmd_rx) = channel::<WsCommand>();
        let (event_tx, event_rx) = channel::<SyncEvent>();

        let url = url.to_string();

        let handle = thread::spawn(move || {
            log::info!("relay thread: connecting to {}", url);

            match connect(&url) {
                Ok((mut socket, response)) => {
                    log::info!("relay connected, status: {}", response.status());
                    let _ = event_tx.send(SyncEvent::Connected);

                    // Short read timeout on the TCP stream keeps the loop
                    // responsive to outgoing commands.
                    {
                        let stream = socket.get_mut();
                        match stream {
                            tungstenite::stream::MaybeTlsStream::Plain(tcp) => {
                                let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
                                let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
                            }
                            #[allow(unreachable_patterns)]
                            _ => {
                                log::debug!("non-plain stream, default timeout handling");
                            }
                        }
                    }

                    loop {
                        match cmd_rx.try_recv() {
                            Ok(WsCommand::Send(msg)) => {
                                if let Err(e) = socket.send(Message::Text(msg)) {
                                    log::error!("relay send error: {}", e);
                                    break;
                                }
                            }
                            Ok(WsCommand::Close) => {
                                let _ = socket.close(None);
                                break;
                            }
                            Err(TryRecvError::Disconnected) => break,
                            Err(TryRecvError::Empty) => {}
                        }

                        match socket.read() {
                            Ok(Message::Text(txt)) => {
                                match serde_json::from_str::<ServerMessage>(&txt) {
                                    Ok(server_msg) => {
                                        let _ = event_tx.send(event_from_server(server_msg));
                                    }
                                    Err(_) => {
                                        log::warn!("unparseable relay message: {}", txt);
                                    }
                                }
                            }
                            Ok(Message::Ping(data)) => {
                                let _ = socket.send(Message::Pong(data));
                            }
                            Ok(Message::Close(_)) => break,
                            Ok(_) => {}
                            Err(tungstenite::Error::Io(ref e))
                                if e.kind() == std::io::ErrorKind::WouldBlock
                                    || e.kind() == std::io::ErrorKind::TimedOut =>
                            {
                                continue;
                            }
                            Err(e) => {
                                log::error!("relay read error: {}", e);
                                break;
                            }
                        }
                    }

                    log::info!("relay thread exiting");
                    let _ = event_tx.send(SyncEvent::Disconnected);
                }
                Err(e) => {
                    log::error!("relay connection failed: {}", e);
                    let _ = event_tx.send(SyncEvent::Error {
                        message: format!("Connection failed: {}", e),
                    });
                }
            }
        });

        self.cmd_tx = Some(cmd_tx);
        self.event_rx = Some(event_rx);
        self._thread = Some(handle);

        Ok(())
    }

    /// Disconnect from the relay. The server clears this client's presence
    /// for the remaining peers whether or not `Leave` was sent first.
    pub fn disconnect(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(WsCommand::Close);
        }
        self.event_rx = None;
        self._thread = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Send a message to the relay.
    pub fn send(&self, msg: &ClientMessage) -> Result<(), String> {
        let json = serde_json::to_string(msg).map_err(|e| format!("Encode failed: {}", e))?;
        if let Some(ref tx) = self.cmd_tx {
            tx.send(WsCommand::Send(json))
                .map_err(|e| format!("Send failed: {}", e))
        } else {
            Err("Not connected".to_string())
        }
    }

    /// Poll for pending events (non-blocking).
    pub fn poll_events(&mut self) -> Vec<SyncEvent> {
        if let Some(ref rx) = self.event_rx {
            while let Ok(event) = rx.try_recv() {
                match &event {
                    SyncEvent::Connected => self.state = ConnectionState::Connected,
                    SyncEvent::Disconnected => self.state = ConnectionState::Disconnected,
                    SyncEvent::Error { .. } => self.state = ConnectionState::Error,
                    _ => {}
                }
                self.events.push(event);
            }
        }

        std::mem::take(&mut self.events)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

impl Default for RelayClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// [`EphemeralStore`] backed by a [`RelayClient`] connection.
///
/// Tracks the roster locally from join/leave traffic so presence events can
/// carry the full participant list the way the in-memory backend does.
pub struct RelayEphemeral {
    client: RelayClient,
    board: BoardId,
    roster: HashMap<UserId, String>,
}

impl RelayEphemeral {
    pub fn new(client: RelayClient, board: BoardId) -> Self {
        Self {
            client,
            board,
            roster: HashMap::new(),
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.client.state()
    }

    fn roster_entries(&self) -> Vec<PresenceEntry> {
        let now = crate::ephemeral::epoch_ms();
        let mut entries: Vec<PresenceEntry> = self
            .roster
            .iter()
            .map(|(&user_id, name)| PresenceEntry {
                user_id,
                name: name.clone(),
                last_active_ms: now,
            })
            .collect();
        entries.sort_by_key(|e| e.user_id);
        entries
    }
}

impl EphemeralStore for RelayEphemeral {
    fn announce(&mut self, user: UserId, name: &str) {
        self.roster.insert(user, name.to_string());
        if let Err(e) = self.client.send(&ClientMessage::Join {
            board: self.board,
            user,
            name: name.to_string(),
        }) {
            log::warn!("relay join failed: {}", e);
        }
    }

    fn set_cursor(&mut self, position: Point) {
        let _ = self.client.send(&ClientMessage::Cursor {
            x: position.x,
            y: position.y,
        });
    }

    fn publish_note_position(&mut self, note: NoteId, position: Point) {
        let _ = self.client.send(&ClientMessage::NotePosition {
            note,
            x: position.x,
            y: position.y,
        });
    }

    fn remove_own(&mut self) {
        let _ = self.client.send(&ClientMessage::Leave);
    }

    fn poll(&mut self) -> Vec<EphemeralEvent> {
        let mut out = Vec::new();
        for event in self.client.poll_events() {
            match event {
                SyncEvent::Joined { peers, .. } => {
                    for peer in peers {
                        self.roster.insert(peer.user, peer.name);
                    }
                    out.push(EphemeralEvent::Presence(self.roster_entries()));
                }
                SyncEvent::PeerJoined { user, name } => {
                    self.roster.insert(user, name);
                    out.push(EphemeralEvent::Presence(self.roster_entries()));
                }
                SyncEvent::PeerLeft { user } => {
                    self.roster.remove(&user);
                    out.push(EphemeralEvent::PeerLeft(user));
                    out.push(EphemeralEvent::Presence(self.roster_entries()));
                }
                SyncEvent::CursorReceived {
                    from,
                    name,
                    position,
                } => {
                    out.push(EphemeralEvent::Cursor(CursorEntry {
                        user_id: from,
                        name,
                        position,
                    }));
                }
                SyncEvent::NotePositionReceived {
                    from,
                    note,
                    position,
                } => {
                    out.push(EphemeralEvent::NotePosition {
                        note,
                        position,
                        author: from,
                    });
                }
                SyncEvent::Error { message } => {
                    log::warn!("relay error: {}", message);
                }
                SyncEvent::Connected | SyncEvent::Disconnected => {}
            }
        }
        out
    }
}

impl Drop for RelayEphemeral {
    fn drop(&mut self) {
        self.remove_own();
    }
}
