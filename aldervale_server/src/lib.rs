// aldervale_server — authoritative login and world-state server for Aldervale.
//
// The server is the only holder of account credentials and live session
// state. It accepts TCP connections from game clients, walks each through
// the login state machine (connecting → authenticated → in-game), and after
// every accepted position update broadcasts a snapshot of all in-game
// players to all in-game players. It never generates terrain or renders —
// the world is reproduced client-side from a shared seed.
//
// Module overview:
// - `accounts.rs`: Credential and character persistence — salted SHA-256
//                  password digests, a JSON-file-backed store, and an
//                  in-memory store used by tests and store-less runs.
// - `session.rs`:  Per-connection state and the `SessionRegistry` that
//                  `server.rs` drives. All writes to client sockets happen
//                  through the registry.
// - `server.rs`:   TCP listener, reader threads (one per client), the main
//                  event loop, and the message router. Uses `std::net` with
//                  a thread-per-reader architecture and an `mpsc` channel to
//                  funnel events into the single-threaded registry.
//
// Dependencies: `aldervale_protocol` (shared message types and framing),
// `aldervale_prng` (salt generation), `sha2` (password digests).
//
// The server can run as a standalone binary (`main.rs`) or be embedded in a
// test harness via the library API (`start_server`).

pub mod accounts;
pub mod server;
pub mod session;

pub use server::start_server;
