// Client frame loop: connection lifecycle, phase machine, input, world view.
//
// `GameClient` is the embedder-facing core of the client: a UI shell owns
// one, forwards sampled input each frame via `tick`, and draws whatever
// `render` returns. All networking is non-blocking from the frame loop's
// perspective:
//
// - Connection attempts run on a detached thread (`connect_and_login` /
//   `connect_and_register`); the outcome comes back over a channel and is
//   collected by a later `tick`. A `connecting` flag suppresses duplicate
//   attempts while one is in flight.
// - Server messages drain from the `NetClient` inbox once per tick and drive
//   the phase machine: Login → CreateCharacter (fresh accounts) → InGame.
//   The synthetic `Disconnect` pushed by the reader thread on stream loss
//   arrives through the same path and returns the client to Login.
// - Movement integrates locally at `MOVE_SPEED` world units per second with
//   normalized diagonals, and a MOVE is sent only on ticks where the position
//   actually changed. The camera follows the result and eases its zoom.
//
// The local avatar's position is locally authoritative: GAME_STATE echoes of
// our own session are filtered out by username, so a stale broadcast never
// yanks the avatar backwards mid-stride. Remote players are always replaced
// wholesale by the latest snapshot — it lists every in-game session, so a
// player missing from it has left the world.

use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use aldervale_protocol::message::{ClientMessage, PlayerSnapshot, ServerMessage};
use aldervale_protocol::types::{Appearance, Position, SPAWN_POS, SessionId};
use aldervale_world::camera::Camera;
use aldervale_world::render::{Avatar, FrameScene, build_scene};
use aldervale_world::terrain::{ChunkStore, DEFAULT_WORLD_SEED};

use crate::net::NetClient;

/// Viewport size the camera is built with. An embedder with a different
/// window size can construct its own `Camera`; nothing on the wire depends
/// on these.
pub const VIEWPORT_W: f32 = 800.0;
pub const VIEWPORT_H: f32 = 600.0;

/// Avatar movement speed, world units per second.
pub const MOVE_SPEED: f32 = 240.0;

/// Target-zoom change per mouse-wheel notch.
pub const ZOOM_STEP: f32 = 0.1;

/// Which screen the client is on. Drives which inputs are meaningful and
/// whether a local avatar exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Entering credentials; also the state after a connection drop.
    Login,
    /// Authenticated, but the account has no character yet.
    CreateCharacter,
    /// In the world: moving, broadcasting, rendering.
    InGame,
}

/// Input sampled by the embedder for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InputState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    /// Mouse-wheel notches this frame; positive zooms in.
    pub wheel: i32,
}

impl InputState {
    /// Unit movement direction, or `None` when no net movement is held.
    /// Diagonals are normalized so they are no faster than cardinals; Y grows
    /// downward, so "up" is negative.
    fn direction(&self) -> Option<(f32, f32)> {
        let mut dx = 0.0_f32;
        let mut dy = 0.0_f32;
        if self.left {
            dx -= 1.0;
        }
        if self.right {
            dx += 1.0;
        }
        if self.up {
            dy -= 1.0;
        }
        if self.down {
            dy += 1.0;
        }
        if dx == 0.0 && dy == 0.0 {
            return None;
        }
        let len = (dx * dx + dy * dy).sqrt();
        Some((dx / len, dy / len))
    }
}

/// Another session's avatar as last seen in a GAME_STATE broadcast.
#[derive(Clone, Debug, PartialEq)]
pub struct RemotePlayer {
    pub pos: Position,
    pub appearance: Appearance,
    pub username: String,
}

/// The client frame loop: owns the connection, the phase machine, the local
/// avatar, the remote-player view, and the camera/chunk state.
pub struct GameClient {
    phase: Phase,
    net: Option<NetClient>,
    connecting: bool,
    connect_rx: Option<Receiver<Result<NetClient, String>>>,
    status: String,
    username: String,
    appearance: Option<Appearance>,
    pos: Position,
    remote_players: BTreeMap<SessionId, RemotePlayer>,
    camera: Camera,
    chunks: ChunkStore,
}

impl GameClient {
    pub fn new() -> Self {
        Self {
            phase: Phase::Login,
            net: None,
            connecting: false,
            connect_rx: None,
            status: String::new(),
            username: String::new(),
            appearance: None,
            pos: SPAWN_POS,
            remote_players: BTreeMap::new(),
            camera: Camera::new(VIEWPORT_W, VIEWPORT_H),
            chunks: ChunkStore::new(DEFAULT_WORLD_SEED),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Status line for the UI ("Connecting...", server failure messages).
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn connected(&self) -> bool {
        self.net.is_some()
    }

    /// True while a connection attempt is in flight on a background thread.
    pub fn connecting(&self) -> bool {
        self.connecting
    }

    /// Server-confirmed identity; empty before the first LOGIN_SUCCESS.
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn position(&self) -> Position {
        self.pos
    }

    pub fn appearance(&self) -> Option<Appearance> {
        self.appearance
    }

    pub fn remote_players(&self) -> &BTreeMap<SessionId, RemotePlayer> {
        &self.remote_players
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Connect (if not already connected) and send LOGIN.
    pub fn connect_and_login(&mut self, addr: &str, username: &str, password: &str) {
        self.start_attempt(
            addr,
            ClientMessage::Login {
                username: username.into(),
                password: password.into(),
            },
        );
    }

    /// Connect (if not already connected) and send REGISTER.
    pub fn connect_and_register(&mut self, addr: &str, username: &str, password: &str) {
        self.start_attempt(
            addr,
            ClientMessage::Register {
                username: username.into(),
                password: password.into(),
            },
        );
    }

    /// Send CREATE_CHARACTER. Only meaningful from the character screen.
    pub fn create_character(&mut self, appearance: Appearance) {
        if self.phase != Phase::CreateCharacter {
            return;
        }
        self.send_or_drop(&ClientMessage::CreateCharacter { appearance });
    }

    /// Advance one frame: collect connection outcomes, drain server messages,
    /// integrate input, and move the camera.
    pub fn tick(&mut self, input: &InputState, dt: f32) {
        self.drain_connect_outcome();
        self.drain_messages();
        self.integrate_input(input, dt);
        if input.wheel != 0 {
            self.camera.adjust_target_zoom(input.wheel as f32 * ZOOM_STEP);
        }
        self.camera.follow(self.pos);
        self.camera.tick();
    }

    /// Build this frame's draw lists: terrain around the camera, remote
    /// avatars, and (when in-game) the local avatar drawn above equal-Y pairs.
    pub fn render(&mut self) -> FrameScene {
        let mut avatars = Vec::with_capacity(self.remote_players.len() + 1);
        for player in self.remote_players.values() {
            avatars.push(Avatar {
                pos: player.pos,
                appearance: player.appearance,
                username: player.username.clone(),
                local: false,
            });
        }
        if self.phase == Phase::InGame {
            if let Some(appearance) = self.appearance {
                avatars.push(Avatar {
                    pos: self.pos,
                    appearance,
                    username: self.username.clone(),
                    local: true,
                });
            }
        }
        build_scene(&self.camera, &mut self.chunks, &avatars)
    }

    /// Kick off a connection attempt whose first message is `first`, or send
    /// it inline when a connection is already up (retrying credentials).
    fn start_attempt(&mut self, addr: &str, first: ClientMessage) {
        if self.connecting {
            return;
        }
        self.status = "Connecting...".into();
        if self.net.is_some() {
            self.send_or_drop(&first);
            return;
        }

        log::debug!("connecting to {addr}");
        let addr = addr.to_string();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let outcome = NetClient::connect(&addr).and_then(|mut net| {
                net.send(&first)?;
                Ok(net)
            });
            let _ = tx.send(outcome);
        });
        self.connecting = true;
        self.connect_rx = Some(rx);
    }

    /// Collect the outcome of an in-flight connection attempt, if any.
    fn drain_connect_outcome(&mut self) {
        let Some(rx) = self.connect_rx.take() else {
            return;
        };
        match rx.try_recv() {
            Ok(Ok(net)) => {
                // The first message is already on the wire; the status stays
                // "Connecting..." until the server answers it.
                self.net = Some(net);
                self.connecting = false;
            }
            Ok(Err(e)) => {
                self.connecting = false;
                self.status = e;
            }
            Err(mpsc::TryRecvError::Empty) => {
                self.connect_rx = Some(rx);
            }
            Err(mpsc::TryRecvError::Disconnected) => {
                self.connecting = false;
                self.status = "Connection attempt failed".into();
            }
        }
    }

    /// Drain and apply every queued server message.
    fn drain_messages(&mut self) {
        let Some(net) = &self.net else {
            return;
        };
        let messages = net.poll();
        for msg in messages {
            self.apply_message(msg);
        }
    }

    fn apply_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::LoginSuccess {
                username,
                has_character,
                appearance,
            } => {
                self.username = username;
                match appearance {
                    Some(appearance) if has_character => self.enter_world(appearance),
                    _ => {
                        self.phase = Phase::CreateCharacter;
                        self.status.clear();
                    }
                }
            }
            ServerMessage::LoginFail { message } => {
                self.status = message;
            }
            ServerMessage::RegisterSuccess => {
                self.status = "Registration Success! Please Login.".into();
            }
            ServerMessage::RegisterFail { message } => {
                self.status = message;
            }
            ServerMessage::CreateCharSuccess { appearance } => {
                self.enter_world(appearance);
            }
            ServerMessage::CreateCharFail => {
                self.status = "Character creation failed.".into();
            }
            ServerMessage::GameState { data } => {
                self.merge_snapshot(data);
            }
            ServerMessage::Disconnect => {
                self.drop_connection("Lost connection to server.".into());
            }
        }
    }

    /// Enter the in-game phase at the spawn point.
    fn enter_world(&mut self, appearance: Appearance) {
        self.appearance = Some(appearance);
        self.pos = SPAWN_POS;
        self.camera.follow(self.pos);
        self.phase = Phase::InGame;
        self.status.clear();
        log::info!("entered the world as {}", self.username);
    }

    /// Replace the remote-player view with a GAME_STATE snapshot, skipping
    /// the entry that echoes our own session.
    fn merge_snapshot(&mut self, data: BTreeMap<SessionId, PlayerSnapshot>) {
        self.remote_players.clear();
        for (id, snap) in data {
            if snap.username == self.username {
                continue;
            }
            self.remote_players.insert(
                id,
                RemotePlayer {
                    pos: snap.pos,
                    appearance: snap.appearance,
                    username: snap.username,
                },
            );
        }
    }

    /// Apply held movement keys and broadcast the result when it changed.
    fn integrate_input(&mut self, input: &InputState, dt: f32) {
        if self.phase != Phase::InGame {
            return;
        }
        let Some((dx, dy)) = input.direction() else {
            return;
        };
        let before = self.pos;
        self.pos.x += dx * MOVE_SPEED * dt;
        self.pos.y += dy * MOVE_SPEED * dt;
        if self.pos != before {
            self.send_or_drop(&ClientMessage::Move { pos: self.pos });
        }
    }

    /// Send on the live connection, dropping it if the write fails.
    fn send_or_drop(&mut self, msg: &ClientMessage) {
        let result = match self.net.as_mut() {
            Some(net) => net.send(msg),
            None => return,
        };
        if let Err(e) = result {
            self.drop_connection(format!("Connection lost: {e}"));
        }
    }

    /// Tear down the connection and return to the login screen.
    fn drop_connection(&mut self, reason: String) {
        log::info!("connection dropped: {reason}");
        self.net = None;
        self.connecting = false;
        self.connect_rx = None;
        self.remote_players.clear();
        self.appearance = None;
        self.phase = Phase::Login;
        self.status = reason;
    }
}

impl Default for GameClient {
    fn default() -> Self {
        Self::new()
    }
}
