// CLI entry point for the Aldervale world server.
//
// Starts a standalone server that game clients connect to. The server owns
// the account store and all session state; clients render and generate
// terrain locally. See `server.rs` for the networking architecture and
// `session.rs` for the session state machine.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use aldervale_server::server::{ServerConfig, start_server};

#[derive(Parser, Debug)]
#[command(name = "aldervale-server", about = "Aldervale world server", version)]
struct Args {
    /// Listen address
    #[arg(long, env = "ALDERVALE_BIND", default_value = "127.0.0.1:5555")]
    bind: String,

    /// Account file (JSON). Created on first registration if absent.
    #[arg(long, env = "ALDERVALE_ACCOUNTS", default_value = "accounts.json")]
    accounts: PathBuf,

    /// Maximum concurrent connections
    #[arg(long, env = "ALDERVALE_MAX_SESSIONS", default_value_t = 64)]
    max_sessions: u32,
}

fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("aldervale_server=info".parse()?),
        )
        .init();

    let args = Args::parse();

    log::info!(
        "Starting aldervale-server (bind={}, accounts={}, max_sessions={})",
        args.bind,
        args.accounts.display(),
        args.max_sessions,
    );

    let config = ServerConfig {
        bind: args.bind,
        accounts_path: Some(args.accounts),
        max_sessions: args.max_sessions,
    };
    let (_handle, addr) = start_server(config)?;
    log::info!("Listening on {addr}");

    // All work happens on the listener, reader, and main-loop threads. The
    // process exits on SIGINT/SIGTERM, which tears those down with it.
    loop {
        thread::sleep(Duration::from_secs(3600));
    }
}
