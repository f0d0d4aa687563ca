use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rollcalld")]
#[command(about = "Attendance ledger and exam prediction sidecar (JSON lines on stdin/stdout)", long_about = None)]
pub struct Cli {
    /// Open this workspace at startup instead of waiting for `workspace.select`
    #[arg(long, env = "ROLLCALL_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Log filter, e.g. `info` or `rollcalld=debug`. Logs go to stderr.
    #[arg(long = "log", env = "ROLLCALL_LOG", default_value = "info")]
    pub log_filter: String,
}

/// stdout carries the IPC stream, so logs must only ever go to stderr.
pub fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_args() {
        let cli = Cli::try_parse_from(["rollcalld"]).expect("parse");
        assert_eq!(cli.log_filter, "info");
    }

    #[test]
    fn workspace_and_log_flags() {
        let cli = Cli::try_parse_from(["rollcalld", "--workspace", "/tmp/ws", "--log", "debug"])
            .expect("parse");
        assert_eq!(cli.workspace, Some(PathBuf::from("/tmp/ws")));
        assert_eq!(cli.log_filter, "debug");
    }
}
