mod analytics;
mod config;
mod db;
mod error;
mod ipc;
mod ledger;
mod marks;
mod model;
mod predict;
mod roster;
mod store;

use anyhow::Context;
use clap::Parser;
use std::io::{self, BufRead, Write};
use tracing::info;

fn main() -> anyhow::Result<()> {
    let cli = config::Cli::parse();
    config::init_tracing(&cli.log_filter);

    let mut state = ipc::AppState::default();
    if let Some(path) = cli.workspace {
        let store = store::SqliteStore::open(&path)
            .with_context(|| format!("failed to open workspace {}", path.display()))?;
        info!(workspace = %path.display(), "workspace selected at startup");
        state.select_workspace(path, store);
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                let _ = writeln!(
                    stdout,
                    "{}",
                    serde_json::json!({
                        "ok": false,
                        "error": { "code": "bad_json", "message": e.to_string() }
                    })
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        // Events always follow the response line that caused them.
        for event in ipc::drain_events(&mut state) {
            let _ = writeln!(stdout, "{}", event);
        }
        let _ = stdout.flush();
    }

    info!("stdin closed, shutting down");
    Ok(())
}
