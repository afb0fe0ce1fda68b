// aldervale_protocol — wire protocol for world-server communication.
//
// This crate defines the message types, framing, and serialization used by the
// world server (`aldervale_server`) and game clients to communicate over TCP.
// It is shared between both sides and has no dependency on the world or client
// crates.
//
// Module overview:
// - `types.rs`:    Core value types — `SessionId`, `Position`, `Appearance`.
// - `message.rs`:  Client-to-server and server-to-client message enums, plus
//                  the `PlayerSnapshot` entry used in GAME_STATE broadcasts.
// - `framing.rs`:  Length-delimited framing over any `Read`/`Write` stream:
//                  4-byte big-endian length prefix, then JSON payload, with an
//                  incremental `FrameDecoder` for connection reader loops.
//
// Design decisions:
// - **JSON serialization with a `type` tag.** Frames stay human-readable and
//   match the protocol table one-to-one; binary framing can be swapped in
//   later if bandwidth matters.
// - **Length-prefix framing, not delimiter scanning.** A decoder must survive
//   payloads containing `}{`, frames split across reads, and back-to-back
//   arrivals; only self-delimiting frames do.
// - **No async runtime.** Uses `std::io::Read`/`Write`, compatible with both
//   blocking TCP streams and buffered wrappers.

pub mod framing;
pub mod message;
pub mod types;

pub use framing::{FrameDecoder, MAX_FRAME_SIZE, ProtocolError, read_frame, write_frame};
pub use message::{ClientMessage, PlayerSnapshot, ServerMessage};
pub use types::{Appearance, Position, SPAWN_POS, SessionId};

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::Cursor;

    use super::*;

    /// Serialize a ClientMessage to JSON, frame it, read it back, deserialize.
    fn client_roundtrip(msg: &ClientMessage) {
        let json = serde_json::to_vec(msg).unwrap();
        let mut wire = Vec::new();
        write_frame(&mut wire, &json).unwrap();

        let mut cursor = Cursor::new(&wire);
        let recovered_json = read_frame(&mut cursor).unwrap();
        let recovered: ClientMessage = serde_json::from_slice(&recovered_json).unwrap();
        assert_eq!(&recovered, msg);
    }

    /// Serialize a ServerMessage to JSON, frame it, read it back, deserialize.
    fn server_roundtrip(msg: &ServerMessage) {
        let json = serde_json::to_vec(msg).unwrap();
        let mut wire = Vec::new();
        write_frame(&mut wire, &json).unwrap();

        let mut cursor = Cursor::new(&wire);
        let recovered_json = read_frame(&mut cursor).unwrap();
        let recovered: ServerMessage = serde_json::from_slice(&recovered_json).unwrap();
        assert_eq!(&recovered, msg);
    }

    fn appearance() -> Appearance {
        Appearance {
            body: 1,
            hair: 2,
            shirt: 3,
            pants: 0,
            eyes: 4,
        }
    }

    #[test]
    fn roundtrip_login() {
        client_roundtrip(&ClientMessage::Login {
            username: "mira".into(),
            password: "hunter2".into(),
        });
    }

    #[test]
    fn roundtrip_login_with_brace_pair_in_password() {
        // `}{` inside a string value must survive framing untouched.
        client_roundtrip(&ClientMessage::Login {
            username: "mira".into(),
            password: "}{deep}{".into(),
        });
    }

    #[test]
    fn roundtrip_register() {
        client_roundtrip(&ClientMessage::Register {
            username: "newcomer".into(),
            password: "s3cret".into(),
        });
    }

    #[test]
    fn roundtrip_create_character() {
        client_roundtrip(&ClientMessage::CreateCharacter {
            appearance: appearance(),
        });
    }

    #[test]
    fn roundtrip_move() {
        client_roundtrip(&ClientMessage::Move {
            pos: Position::new(400.0, 300.0),
        });
    }

    #[test]
    fn roundtrip_login_success_with_character() {
        server_roundtrip(&ServerMessage::LoginSuccess {
            username: "mira".into(),
            has_character: true,
            appearance: Some(appearance()),
        });
    }

    #[test]
    fn roundtrip_login_success_without_character() {
        server_roundtrip(&ServerMessage::LoginSuccess {
            username: "mira".into(),
            has_character: false,
            appearance: None,
        });
    }

    #[test]
    fn roundtrip_login_fail() {
        server_roundtrip(&ServerMessage::LoginFail {
            message: "Invalid credentials".into(),
        });
    }

    #[test]
    fn roundtrip_register_success() {
        server_roundtrip(&ServerMessage::RegisterSuccess);
    }

    #[test]
    fn roundtrip_register_fail() {
        server_roundtrip(&ServerMessage::RegisterFail {
            message: "Username taken".into(),
        });
    }

    #[test]
    fn roundtrip_create_char_success() {
        server_roundtrip(&ServerMessage::CreateCharSuccess {
            appearance: appearance(),
        });
    }

    #[test]
    fn roundtrip_create_char_fail() {
        server_roundtrip(&ServerMessage::CreateCharFail);
    }

    #[test]
    fn roundtrip_game_state() {
        let mut data = BTreeMap::new();
        data.insert(
            SessionId(1),
            PlayerSnapshot {
                pos: Position::new(400.0, 300.0),
                appearance: appearance(),
                username: "mira".into(),
            },
        );
        data.insert(
            SessionId(2),
            PlayerSnapshot {
                pos: Position::new(-64.5, 1024.0),
                appearance: appearance(),
                username: "rook".into(),
            },
        );
        server_roundtrip(&ServerMessage::GameState { data });
    }

    #[test]
    fn roundtrip_game_state_empty() {
        server_roundtrip(&ServerMessage::GameState {
            data: BTreeMap::new(),
        });
    }

    #[test]
    fn roundtrip_disconnect() {
        server_roundtrip(&ServerMessage::Disconnect);
    }

    #[test]
    fn wire_tags_use_screaming_snake_case() {
        let login = serde_json::to_value(ClientMessage::Login {
            username: "a".into(),
            password: "b".into(),
        })
        .unwrap();
        assert_eq!(login["type"], "LOGIN");

        let create = serde_json::to_value(ClientMessage::CreateCharacter {
            appearance: appearance(),
        })
        .unwrap();
        assert_eq!(create["type"], "CREATE_CHARACTER");

        let success = serde_json::to_value(ServerMessage::CreateCharSuccess {
            appearance: appearance(),
        })
        .unwrap();
        assert_eq!(success["type"], "CREATE_CHAR_SUCCESS");

        let state = serde_json::to_value(ServerMessage::GameState {
            data: BTreeMap::new(),
        })
        .unwrap();
        assert_eq!(state["type"], "GAME_STATE");
    }

    #[test]
    fn game_state_keys_are_session_id_strings() {
        let mut data = BTreeMap::new();
        data.insert(
            SessionId(9),
            PlayerSnapshot {
                pos: Position::new(0.0, 0.0),
                appearance: appearance(),
                username: "x".into(),
            },
        );
        let value = serde_json::to_value(ServerMessage::GameState { data }).unwrap();
        assert!(value["data"].get("9").is_some());
    }

    #[test]
    fn create_char_fail_is_a_bare_tag() {
        let value = serde_json::to_value(ServerMessage::CreateCharFail).unwrap();
        assert_eq!(value, serde_json::json!({ "type": "CREATE_CHAR_FAIL" }));

        let decoded: ServerMessage = serde_json::from_slice(br#"{"type":"CREATE_CHAR_FAIL"}"#)
            .unwrap();
        assert_eq!(decoded, ServerMessage::CreateCharFail);
    }

    #[test]
    fn login_success_omits_absent_appearance() {
        let value = serde_json::to_value(ServerMessage::LoginSuccess {
            username: "mira".into(),
            has_character: false,
            appearance: None,
        })
        .unwrap();
        assert!(value.get("appearance").is_none());
    }
}
