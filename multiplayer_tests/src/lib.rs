// Test-only player harness for multiplayer integration tests.
//
// Wraps the real `NetClient` (from `aldervale_client::net`) to provide a
// synchronous, test-friendly API for exercising the full pipeline:
// register → login → create character → move → broadcast → shared view.
//
// The only test-specific code here is the synchronous polling wrappers
// (blocking loops around `NetClient::poll()`). All networking uses the same
// code paths as the real game client.
//
// See also: `tests/full_pipeline.rs` for the integration test scenarios.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

use aldervale_client::NetClient;
use aldervale_protocol::message::{ClientMessage, PlayerSnapshot, ServerMessage};
use aldervale_protocol::types::{Appearance, Position, SessionId};
use aldervale_server::server::{ServerConfig, ServerHandle, start_server};

/// Default timeout for blocking poll operations.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep duration between poll attempts.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Start a world server on a random port with an in-memory account store.
pub fn start_test_server() -> (ServerHandle, SocketAddr) {
    let config = ServerConfig {
        bind: "127.0.0.1:0".into(),
        accounts_path: None,
        max_sessions: 16,
    };
    start_server(config).expect("start_test_server failed")
}

/// A distinct appearance per test player, so assertions can tell avatars
/// apart by more than username.
pub fn test_appearance(body: u8) -> Appearance {
    Appearance {
        body,
        hair: body.wrapping_add(1),
        shirt: 2,
        pants: 3,
        eyes: 1,
    }
}

/// A test player wrapping a real `NetClient`.
///
/// Messages the caller has not asked for yet stay in `pending`, so waiting
/// for a LOGIN_SUCCESS never swallows the GAME_STATE that may follow it:
/// each `wait_for` removes exactly the first matching message and keeps the
/// rest in arrival order.
pub struct TestPlayer {
    client: NetClient,
    pending: Vec<ServerMessage>,
}

impl TestPlayer {
    /// Connect to a world server.
    pub fn connect(addr: SocketAddr) -> Self {
        let client = NetClient::connect(&addr.to_string()).expect("TestPlayer::connect failed");
        Self {
            client,
            pending: Vec::new(),
        }
    }

    /// Send a raw protocol message.
    pub fn send(&mut self, msg: &ClientMessage) {
        self.client.send(msg).expect("send failed");
    }

    pub fn register(&mut self, username: &str, password: &str) {
        self.send(&ClientMessage::Register {
            username: username.into(),
            password: password.into(),
        });
    }

    pub fn login(&mut self, username: &str, password: &str) {
        self.send(&ClientMessage::Login {
            username: username.into(),
            password: password.into(),
        });
    }

    pub fn create_character(&mut self, appearance: Appearance) {
        self.send(&ClientMessage::CreateCharacter { appearance });
    }

    pub fn send_move(&mut self, x: f32, y: f32) {
        self.send(&ClientMessage::Move {
            pos: Position::new(x, y),
        });
    }

    /// Register, log in, and create a character — the full path onto the map.
    pub fn enter_game(&mut self, username: &str, password: &str, appearance: Appearance) {
        self.register(username, password);
        self.wait_for("REGISTER_SUCCESS", |m| {
            matches!(m, ServerMessage::RegisterSuccess)
        });
        self.login(username, password);
        self.wait_for("LOGIN_SUCCESS", |m| {
            matches!(m, ServerMessage::LoginSuccess { .. })
        });
        self.create_character(appearance);
        self.wait_for("CREATE_CHAR_SUCCESS", |m| {
            matches!(m, ServerMessage::CreateCharSuccess { .. })
        });
    }

    /// Blocking poll until a message matching `predicate` arrives; returns it
    /// and leaves every other message pending. Panics after `POLL_TIMEOUT`.
    pub fn wait_for(
        &mut self,
        what: &str,
        mut predicate: impl FnMut(&ServerMessage) -> bool,
    ) -> ServerMessage {
        let start = Instant::now();
        loop {
            self.pending.extend(self.client.poll());
            if let Some(i) = self.pending.iter().position(|m| predicate(m)) {
                return self.pending.remove(i);
            }
            assert!(
                start.elapsed() < POLL_TIMEOUT,
                "timed out waiting for {what}; pending: {:?}",
                self.pending
            );
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Blocking poll until the next GAME_STATE broadcast; returns its data.
    pub fn wait_game_state(&mut self) -> BTreeMap<SessionId, PlayerSnapshot> {
        let msg = self.wait_for("GAME_STATE", |m| {
            matches!(m, ServerMessage::GameState { .. })
        });
        match msg {
            ServerMessage::GameState { data } => data,
            other => panic!("wait_for returned a non-matching message: {other:?}"),
        }
    }

    /// Discard everything received so far, so the next `wait_game_state`
    /// observes only what happens after this call.
    pub fn drain(&mut self) {
        self.pending.clear();
        let _ = self.client.poll();
    }

    /// Assert that nothing arrives for `window`. Callers drain first; this is
    /// how tests prove the server is ignoring a message.
    pub fn assert_silent(&mut self, window: Duration) {
        let deadline = Instant::now() + window;
        while Instant::now() < deadline {
            self.pending.extend(self.client.poll());
            assert!(
                self.pending.is_empty(),
                "expected silence, got {:?}",
                self.pending
            );
            thread::sleep(POLL_INTERVAL);
        }
    }
}
