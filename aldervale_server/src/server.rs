// TCP server and main event loop for the world server.
//
// Architecture: thread-per-reader with a central `mpsc` channel.
//
// - **Listener thread** (`TcpListener::accept()` loop): accepts new TCP
//   connections and sends `InternalEvent::NewConnection` to the main thread.
// - **Reader threads** (one per client): feed raw socket reads through a
//   `FrameDecoder`, deserialize `ClientMessage`, and send
//   `InternalEvent::MessageFrom` to the main thread. A frame that fails to
//   decode is logged and skipped — the connection stays up. On read error or
//   EOF, send `InternalEvent::Disconnected`.
// - **Main thread**: owns the `SessionRegistry` and the account store,
//   receives events from the channel, and dispatches them through the message
//   router below. Uses `recv_timeout` so shutdown is noticed even when no
//   client is talking.
//
// The main thread is the only writer to client TCP streams (via
// `SessionRegistry::broadcast_game_state`/`send_to`). Reader threads only
// read. Funneling every MOVE through one thread both serializes registry
// mutation and guarantees two snapshots are never interleaved mid-write on
// the same stream.
//
// Shutdown: the main thread checks a `keep_running` flag (set to false by
// `ServerHandle::stop`) and breaks out of the event loop.

use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use aldervale_protocol::framing::FrameDecoder;
use aldervale_protocol::message::{ClientMessage, ServerMessage};
use aldervale_protocol::types::{Appearance, Position, SessionId};

use crate::accounts::{AccountError, AccountStore, FileAccountStore, MemoryAccountStore};
use crate::session::{SessionRegistry, SessionState};

/// Events sent from listener/reader threads to the main thread.
enum InternalEvent {
    NewConnection {
        stream: TcpStream,
    },
    MessageFrom {
        session_id: SessionId,
        message: ClientMessage,
    },
    Disconnected {
        session_id: SessionId,
    },
}

/// Errors from starting the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("server I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Accounts(#[from] AccountError),
}

/// Handle returned by `start_server` to control the running server.
pub struct ServerHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ServerHandle {
    /// Signal the server to stop and wait for it to shut down.
    pub fn stop(self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread {
            let _ = handle.join();
        }
    }
}

/// Configuration for starting a world server.
pub struct ServerConfig {
    /// Listen address, e.g. `127.0.0.1:5555`. Port 0 lets the OS pick.
    pub bind: String,
    /// Account file location. `None` runs with an ephemeral in-memory store.
    pub accounts_path: Option<PathBuf>,
    /// Connections beyond this are refused at accept time.
    pub max_sessions: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5555".into(),
            accounts_path: None,
            max_sessions: 64,
        }
    }
}

/// Start the world server on a background thread. Returns a handle for
/// stopping it and the actual bound address (useful when port 0 is used to
/// let the OS pick a free port).
pub fn start_server(
    config: ServerConfig,
) -> Result<(ServerHandle, std::net::SocketAddr), ServerError> {
    let accounts: Box<dyn AccountStore> = match &config.accounts_path {
        Some(path) => Box::new(FileAccountStore::open(path)?),
        None => Box::new(MemoryAccountStore::new()),
    };

    let listener = TcpListener::bind(&config.bind)?;
    let addr = listener.local_addr()?;
    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_clone = keep_running.clone();

    let max_sessions = config.max_sessions;
    let thread = thread::spawn(move || {
        run_server(listener, max_sessions, accounts, keep_running_clone);
    });

    Ok((
        ServerHandle {
            keep_running,
            thread: Some(thread),
        },
        addr,
    ))
}

/// Main server loop. Runs until `keep_running` is set to false.
fn run_server(
    listener: TcpListener,
    max_sessions: u32,
    mut accounts: Box<dyn AccountStore>,
    keep_running: Arc<AtomicBool>,
) {
    let mut registry = SessionRegistry::new();

    let (tx, rx): (Sender<InternalEvent>, Receiver<InternalEvent>) = mpsc::channel();

    // Set the listener to non-blocking so the accept thread can check
    // keep_running periodically.
    listener.set_nonblocking(true).ok();

    // Listener thread: accepts new connections.
    let keep_running_listener = keep_running.clone();
    let tx_listener = tx.clone();
    thread::spawn(move || {
        while keep_running_listener.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, _addr)) => {
                    stream.set_nonblocking(false).ok();
                    let _ = tx_listener.send(InternalEvent::NewConnection { stream });
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(50));
                }
                Err(e) => {
                    log::error!("accept failed: {e}");
                    break;
                }
            }
        }
    });

    // Main event loop. Broadcasts are event-driven (per accepted MOVE), so
    // the timeout exists only to re-check the shutdown flag while idle.
    while keep_running.load(Ordering::SeqCst) {
        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(event) => {
                let accounts = accounts.as_mut();
                handle_event(&mut registry, accounts, max_sessions, event, &tx, &keep_running);
                // Drain any additional events that arrived during handling.
                while let Ok(event) = rx.try_recv() {
                    handle_event(&mut registry, accounts, max_sessions, event, &tx, &keep_running);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Dispatch a single event to the registry.
fn handle_event(
    registry: &mut SessionRegistry,
    accounts: &mut dyn AccountStore,
    max_sessions: u32,
    event: InternalEvent,
    tx: &Sender<InternalEvent>,
    keep_running: &Arc<AtomicBool>,
) {
    match event {
        InternalEvent::NewConnection { stream } => {
            handle_new_connection(registry, max_sessions, stream, tx, keep_running);
        }
        InternalEvent::MessageFrom {
            session_id,
            message,
        } => {
            handle_message(registry, accounts, session_id, message);
        }
        InternalEvent::Disconnected { session_id } => {
            if let Some(session) = registry.remove_session(session_id) {
                log::info!(
                    "session {session_id} disconnected ({})",
                    session.username.as_deref().unwrap_or("unauthenticated")
                );
            }
        }
    }
}

/// Handle a new TCP connection: admit it to the registry in the `Connecting`
/// state and spawn a reader thread. There is no handshake — the first thing a
/// client sends is an ordinary LOGIN or REGISTER message.
fn handle_new_connection(
    registry: &mut SessionRegistry,
    max_sessions: u32,
    stream: TcpStream,
    tx: &Sender<InternalEvent>,
    keep_running: &Arc<AtomicBool>,
) {
    if registry.session_count() as u32 >= max_sessions {
        // Dropping the stream closes the connection.
        log::warn!(
            "refusing connection: {} sessions connected",
            registry.session_count()
        );
        return;
    }

    // The original stream becomes the write half; the clone feeds the reader.
    let reader_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            log::warn!("clone accepted stream: {e}");
            return;
        }
    };

    let session_id = registry.add_session(stream);
    log::info!("session {session_id} connected");

    let tx_reader = tx.clone();
    let keep_running_reader = keep_running.clone();
    thread::spawn(move || {
        reader_loop(reader_stream, session_id, tx_reader, keep_running_reader);
    });
}

/// Reader loop for a single client. Runs in its own thread.
///
/// Raw socket reads are fed through a `FrameDecoder` so a frame split across
/// reads, or several frames arriving back-to-back, decode correctly. A frame
/// whose payload fails to parse is dropped without closing the connection.
fn reader_loop(
    mut stream: TcpStream,
    session_id: SessionId,
    tx: Sender<InternalEvent>,
    keep_running: Arc<AtomicBool>,
) {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 4096];

    while keep_running.load(Ordering::SeqCst) {
        let n = match stream.read(&mut buf) {
            Ok(0) => break, // EOF: the peer closed the connection.
            Ok(n) => n,
            Err(e) => {
                log::debug!("session {session_id}: read failed: {e}");
                break;
            }
        };
        decoder.extend(&buf[..n]);

        loop {
            match decoder.next_message::<ClientMessage>() {
                Ok(Some(message)) => {
                    if tx
                        .send(InternalEvent::MessageFrom {
                            session_id,
                            message,
                        })
                        .is_err()
                    {
                        return; // Main loop gone.
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    // One bad frame; the decoder already consumed it.
                    log::warn!("session {session_id}: dropped frame: {e}");
                }
            }
        }
    }
    let _ = tx.send(InternalEvent::Disconnected { session_id });
}

/// The message router: walk one client message through the session state
/// machine. Messages arriving in a state that does not accept them are
/// silently ignored apart from a log line.
fn handle_message(
    registry: &mut SessionRegistry,
    accounts: &mut dyn AccountStore,
    session_id: SessionId,
    message: ClientMessage,
) {
    match message {
        ClientMessage::Login { username, password } => {
            handle_login(registry, accounts, session_id, username, &password);
        }
        ClientMessage::Register { username, password } => {
            handle_register(registry, accounts, session_id, &username, &password);
        }
        ClientMessage::CreateCharacter { appearance } => {
            handle_create_character(registry, accounts, session_id, appearance);
        }
        ClientMessage::Move { pos } => {
            handle_move(registry, session_id, pos);
        }
    }
}

fn handle_login(
    registry: &mut SessionRegistry,
    accounts: &mut dyn AccountStore,
    session_id: SessionId,
    username: String,
    password: &str,
) {
    let Some(session) = registry.get(session_id) else {
        return;
    };
    if session.state != SessionState::Connecting {
        log::warn!("session {session_id}: LOGIN in {:?} ignored", session.state);
        return;
    }

    if let Err(e) = accounts.authenticate(&username, password) {
        log::info!("session {session_id}: login as {username:?} failed: {e}");
        registry.send_to(
            session_id,
            &ServerMessage::LoginFail {
                message: e.to_string(),
            },
        );
        return;
    }

    let character = match accounts.get_character(&username) {
        Ok(character) => character,
        Err(e) => {
            // Authenticated but unreadable character record: treat as none.
            log::error!("session {session_id}: character lookup for {username}: {e}");
            None
        }
    };

    let Some(session) = registry.get_mut(session_id) else {
        return;
    };
    session.username = Some(username.clone());
    match character {
        Some(appearance) => {
            // Returning player: straight into the world with the saved look.
            session.appearance = Some(appearance);
            session.state = SessionState::InGame;
        }
        None => session.state = SessionState::Authenticated,
    }
    log::info!(
        "session {session_id}: {username} logged in (has_character={})",
        character.is_some()
    );
    registry.send_to(
        session_id,
        &ServerMessage::LoginSuccess {
            username,
            has_character: character.is_some(),
            appearance: character,
        },
    );
}

fn handle_register(
    registry: &mut SessionRegistry,
    accounts: &mut dyn AccountStore,
    session_id: SessionId,
    username: &str,
    password: &str,
) {
    let Some(session) = registry.get(session_id) else {
        return;
    };
    if session.state != SessionState::Connecting {
        log::warn!("session {session_id}: REGISTER in {:?} ignored", session.state);
        return;
    }

    match accounts.register(username, password) {
        Ok(()) => {
            log::info!("session {session_id}: registered account {username}");
            registry.send_to(session_id, &ServerMessage::RegisterSuccess);
        }
        Err(e) => {
            log::info!("session {session_id}: registration of {username:?} failed: {e}");
            registry.send_to(
                session_id,
                &ServerMessage::RegisterFail {
                    message: e.to_string(),
                },
            );
        }
    }
}

fn handle_create_character(
    registry: &mut SessionRegistry,
    accounts: &mut dyn AccountStore,
    session_id: SessionId,
    appearance: Appearance,
) {
    let Some(session) = registry.get(session_id) else {
        return;
    };
    if session.state != SessionState::Authenticated {
        log::warn!(
            "session {session_id}: CREATE_CHARACTER in {:?} ignored",
            session.state
        );
        return;
    }
    let Some(username) = session.username.clone() else {
        // Authenticated always carries a username; bail rather than guess.
        log::error!("session {session_id}: authenticated without username");
        return;
    };

    match accounts.save_character(&username, appearance) {
        Ok(()) => {
            if let Some(session) = registry.get_mut(session_id) {
                session.appearance = Some(appearance);
                session.state = SessionState::InGame;
            }
            log::info!("session {session_id}: {username} created a character");
            registry.send_to(session_id, &ServerMessage::CreateCharSuccess { appearance });
        }
        Err(e) => {
            log::error!("session {session_id}: saving character for {username}: {e}");
            registry.send_to(session_id, &ServerMessage::CreateCharFail);
        }
    }
}

fn handle_move(registry: &mut SessionRegistry, session_id: SessionId, pos: Position) {
    let Some(session) = registry.get_mut(session_id) else {
        return;
    };
    if session.state != SessionState::InGame {
        log::debug!("session {session_id}: MOVE in {:?} ignored", session.state);
        return;
    }
    session.pos = pos;
    registry.broadcast_game_state();
}
