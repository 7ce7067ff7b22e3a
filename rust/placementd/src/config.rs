use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Internship placement sidecar: newline-delimited JSON requests on stdin,
/// one JSON response per line on stdout.
#[derive(Parser, Debug, Clone)]
#[command(name = "placementd", version, about)]
pub struct Args {
    /// Workspace directory to open at startup (same as `workspace.select`)
    #[arg(long, env = "PLACEMENTD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// How long a write waits for another process holding the database lock
    #[arg(long, env = "PLACEMENTD_BUSY_TIMEOUT_MS", default_value_t = 5000)]
    pub busy_timeout_ms: u64,

    /// Log filter directives, e.g. `info` or `placementd=debug`. Falls back
    /// to RUST_LOG, then `info`.
    #[arg(long, env = "PLACEMENTD_LOG")]
    pub log_filter: Option<String>,
}

impl Args {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
