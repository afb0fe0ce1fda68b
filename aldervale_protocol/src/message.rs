// Protocol messages for client-server communication.
//
// Two enums define the full protocol vocabulary:
// - `ClientMessage`: sent by game clients to the world server.
// - `ServerMessage`: sent by the world server to game clients.
//
// Messages serialize as JSON objects with a SCREAMING_SNAKE_CASE `type` tag
// (`{"type":"LOGIN","username":...}`), so the wire format stays readable in a
// packet capture and trivially extensible. `PlayerSnapshot` is the per-session
// entry inside a GAME_STATE broadcast.
//
// `ServerMessage::Disconnect` never crosses the wire: the client's reader
// thread synthesizes it into the inbound queue when the server closes the
// stream, so the frame loop observes connection loss in-band with ordinary
// messages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Appearance, Position, SessionId};

/// Messages sent by a client to the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Authenticate an existing account.
    Login { username: String, password: String },
    /// Create a new account. Allowed before authentication.
    Register { username: String, password: String },
    /// Persist an avatar look and enter the world. Requires authentication.
    CreateCharacter { appearance: Appearance },
    /// Position update. Requires an in-game session; triggers a broadcast.
    Move { pos: Position },
}

/// Messages sent by the server to a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// Credentials accepted. `appearance` is present iff `has_character`.
    LoginSuccess {
        username: String,
        has_character: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        appearance: Option<Appearance>,
    },
    /// Credentials rejected.
    LoginFail { message: String },
    /// Account created.
    RegisterSuccess,
    /// Account not created (taken / missing info).
    RegisterFail { message: String },
    /// Character persisted; the session is now in-game.
    CreateCharSuccess { appearance: Appearance },
    /// Character not persisted. Carries no payload on the wire.
    CreateCharFail,
    /// World snapshot: every in-game session's visible state.
    GameState {
        data: BTreeMap<SessionId, PlayerSnapshot>,
    },
    /// Synthetic, local only: the peer closed the stream.
    Disconnect,
}

/// One in-game session's visible state inside a GAME_STATE broadcast.
///
/// Only in-game sessions appear in snapshots, and reaching in-game requires a
/// character, so `appearance` is never optional here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub pos: Position,
    pub appearance: Appearance,
    pub username: String,
}
