// Session state for the world server.
//
// `SessionRegistry` is the central data structure that `server.rs` drives. It
// tracks every live connection and where it sits in the login state machine.
// All mutation happens through methods called from the server's
// single-threaded main loop — no internal locking.
//
// Key responsibilities:
// - Session management: admit connections, assign IDs, remove on disconnect.
// - State machine bookkeeping: `CONNECTING → AUTHENTICATED → IN_GAME`, with
//   the username, appearance, and position a session accumulates on the way.
// - Snapshot + broadcast: build the GAME_STATE map over exactly the in-game
//   sessions, serialize it once, and fan it out to every in-game connection.
//
// Writing to client streams: the registry holds cloned `TcpStream` write
// halves wrapped in `BufWriter`. Write errors on a single client are recorded
// on that session and do not crash the server — the reader thread for that
// client will detect the broken pipe and send a `Disconnected` event, after
// which the session is removed.

use std::collections::BTreeMap;
use std::io::BufWriter;
use std::net::TcpStream;

use aldervale_protocol::framing::write_frame;
use aldervale_protocol::message::{PlayerSnapshot, ServerMessage};
use aldervale_protocol::types::{Appearance, Position, SPAWN_POS, SessionId};

/// Login progress of one connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, not yet authenticated. Accepts LOGIN and REGISTER.
    Connecting,
    /// Credentials accepted, no character in the world yet.
    Authenticated,
    /// Character attached; visible to every other in-game session.
    InGame,
}

/// One live client connection and the state it has accumulated.
pub struct Session {
    pub state: SessionState,
    /// Set on successful LOGIN.
    pub username: Option<String>,
    /// Set on LOGIN (existing character) or CREATE_CHARACTER.
    pub appearance: Option<Appearance>,
    pub pos: Position,
    /// A failed write marks the session; further sends to it are skipped
    /// until the reader thread confirms the disconnect.
    send_failed: bool,
    writer: BufWriter<TcpStream>,
}

/// All live sessions, keyed by server-assigned ID. Owned exclusively by the
/// server's main loop, which serializes every read and write.
pub struct SessionRegistry {
    sessions: BTreeMap<SessionId, Session>,
    next_session_id: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: BTreeMap::new(),
            next_session_id: 1,
        }
    }

    /// Admit a new connection in the `Connecting` state. The stream is the
    /// write half; the caller keeps a clone for the reader thread.
    pub fn add_session(&mut self, stream: TcpStream) -> SessionId {
        let id = SessionId(self.next_session_id);
        self.next_session_id += 1;
        self.sessions.insert(
            id,
            Session {
                state: SessionState::Connecting,
                username: None,
                appearance: None,
                pos: SPAWN_POS,
                send_failed: false,
                writer: BufWriter::new(stream),
            },
        );
        id
    }

    /// Remove a session, returning it so the caller can log who left.
    pub fn remove_session(&mut self, id: SessionId) -> Option<Session> {
        self.sessions.remove(&id)
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn in_game_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.state == SessionState::InGame)
            .count()
    }

    /// Build the GAME_STATE map over exactly the in-game sessions.
    pub fn snapshot(&self) -> BTreeMap<SessionId, PlayerSnapshot> {
        self.sessions
            .iter()
            .filter_map(|(id, session)| {
                if session.state != SessionState::InGame {
                    return None;
                }
                let username = session.username.clone()?;
                let appearance = session.appearance?;
                Some((
                    *id,
                    PlayerSnapshot {
                        pos: session.pos,
                        appearance,
                        username,
                    },
                ))
            })
            .collect()
    }

    /// Send a message to one session. A write failure marks the session and
    /// is otherwise ignored (the reader thread will detect the broken pipe).
    pub fn send_to(&mut self, id: SessionId, msg: &ServerMessage) {
        let Some(session) = self.sessions.get_mut(&id) else {
            return;
        };
        if session.send_failed {
            return;
        }
        match serde_json::to_vec(msg) {
            Ok(json) => {
                if let Err(e) = write_frame(&mut session.writer, &json) {
                    log::warn!("session {id}: send failed: {e}");
                    session.send_failed = true;
                }
            }
            Err(e) => log::error!("serialize server message: {e}"),
        }
    }

    /// Broadcast the current snapshot to every in-game session. The snapshot
    /// is serialized once; a failed write to one recipient marks that session
    /// and never aborts delivery to the rest.
    pub fn broadcast_game_state(&mut self) {
        let msg = ServerMessage::GameState {
            data: self.snapshot(),
        };
        let json = match serde_json::to_vec(&msg) {
            Ok(json) => json,
            Err(e) => {
                log::error!("serialize GAME_STATE: {e}");
                return;
            }
        };
        let ids: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.state == SessionState::InGame)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            if let Some(session) = self.sessions.get_mut(&id) {
                if session.send_failed {
                    continue;
                }
                if let Err(e) = write_frame(&mut session.writer, &json) {
                    log::warn!("session {id}: broadcast failed: {e}");
                    session.send_failed = true;
                }
            }
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
