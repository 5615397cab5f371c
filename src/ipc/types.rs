use std::collections::HashMap;
use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::cache::QueryCache;
use crate::config::Config;
use crate::import::{ImportSession, Role};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// Role of the signed-in operator, set by the frontend after login.
    pub actor: Option<Role>,
    pub sessions: HashMap<String, ImportSession>,
    pub cache: QueryCache,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            workspace: None,
            db: None,
            actor: None,
            sessions: HashMap::new(),
            cache: QueryCache::default(),
        }
    }
}
