//! natvis-server
//!
//! JSON-RPC server that lets debugger scripts print values through Natvis
//! visualizers. Communicates via stdin/stdout, one message per line.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use natvis_core::protocol::RpcMessage;
use natvis_core::{Config, Request, Response};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod handler;

#[derive(Parser, Debug)]
#[command(name = "natvis-server", version, about = "Natvis visualizer engine over JSON-RPC")]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "NATVIS_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    // Logging goes to stderr, stdout is for JSON-RPC
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .init();

    info!("natvis-server starting...");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handler = handler::Handler::new(config);

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to read line: {}", e);
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        debug!("Received: {} bytes", line.len());

        let (response, shutdown) = match serde_json::from_str::<RpcMessage<Request>>(&line) {
            Ok(msg) => {
                let shutdown = matches!(msg.content, Request::Shutdown);
                let result = handler.handle(&msg.content);
                (RpcMessage::new(msg.id.unwrap_or(0), result), shutdown)
            }
            Err(e) => (
                RpcMessage::new(0, Response::error(format!("Parse error: {}", e))),
                false,
            ),
        };

        let response_json =
            serde_json::to_string(&response).context("Failed to serialize response")?;
        debug!("Sending: {}", response_json);
        writeln!(stdout, "{}", response_json).context("Failed to write response")?;
        stdout.flush()?;

        if shutdown {
            break;
        }
    }

    info!("natvis-server shutting down");
    Ok(())
}
