// Core value types for the wire protocol.
//
// These are shared by `message.rs` (protocol messages), the server's session
// management (`aldervale_server::session`) and the client's world view. The
// server assigns compact integer session IDs — they are connection-scoped,
// never account identifiers, and are reallocated freely across server runs.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Server-assigned session ID (compact u64, unique per live connection).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

// Custom serde: serialize as a decimal string so SessionId can be used as a
// JSON map key (serde_json requires string keys) — GAME_STATE's `data` map is
// keyed by session id.
impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<u64>()
            .map(SessionId)
            .map_err(|_| serde::de::Error::custom("invalid session id"))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A position in world units. The world plane is unbounded; tiles are 64 units
/// on a side and Y grows downward (screen convention).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Where newly created characters enter the world. Shared knowledge: the
/// server places fresh sessions here, and clients assume it until the first
/// GAME_STATE arrives.
pub const SPAWN_POS: Position = Position { x: 400.0, y: 300.0 };

/// Avatar look, five integer-coded slots. The slot values index client-side
/// sprite variants; the server stores and relays them without interpretation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appearance {
    pub body: u8,
    pub hair: u8,
    pub shirt: u8,
    pub pants: u8,
    pub eyes: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_serializes_as_string() {
        let json = serde_json::to_string(&SessionId(42)).unwrap();
        assert_eq!(json, r#""42""#);
    }

    #[test]
    fn session_id_roundtrip() {
        let id = SessionId(u64::MAX);
        let json = serde_json::to_string(&id).unwrap();
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn session_id_rejects_non_numeric() {
        let err = serde_json::from_str::<SessionId>(r#""abc""#);
        assert!(err.is_err());
    }

    #[test]
    fn session_id_usable_as_map_key() {
        use std::collections::BTreeMap;
        let mut map = BTreeMap::new();
        map.insert(SessionId(7), "seven");
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"7":"seven"}"#);
        let back: BTreeMap<SessionId, String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(&SessionId(7)).map(String::as_str), Some("seven"));
    }
}
