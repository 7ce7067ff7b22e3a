use std::path::PathBuf;
use std::time::Duration;

use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub busy_timeout: Duration,
}

impl AppState {
    pub fn new(busy_timeout: Duration) -> Self {
        AppState {
            workspace: None,
            db: None,
            busy_timeout,
        }
    }
}
