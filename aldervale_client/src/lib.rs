// aldervale_client — game client runtime for Aldervale.
//
// The client connects the wire protocol to the world view: log in, create a
// character, move through a shared world, and see everyone else move. The
// heavy lifting lives in `aldervale_protocol` (framing and message types)
// and `aldervale_world` (terrain, camera, draw order); no drawing backend
// lives here. An embedder (a windowing shell, or the integration harness)
// owns a `GameClient`, feeds it input each frame, and draws the `FrameScene`
// that `render` returns.
//
// Module overview:
// - `net.rs`:  TCP client — blocking connect with a timeout, framed sends,
//              a background reader thread, and a non-blocking `poll` inbox.
//              Stream loss surfaces as a synthetic `Disconnect` message.
// - `game.rs`: `GameClient` — the frame loop, the login → character-creation
//              → in-game phase machine, input integration, camera, and scene
//              assembly.
//
// Dependencies: `aldervale_protocol`, `aldervale_world`. No async runtime:
// one reader thread per connection, same as the server side.

pub mod game;
pub mod net;

pub use game::{
    GameClient, InputState, MOVE_SPEED, Phase, RemotePlayer, VIEWPORT_H, VIEWPORT_W, ZOOM_STEP,
};
pub use net::NetClient;
