use rusqlite::Connection;
use serde_json::Value;

use crate::access::{can_access, Screen};
use crate::import::Role;
use crate::ipc::error::HandlerErr;
use crate::ipc::types::AppState;

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn get_optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn parse_role_param(params: &Value, key: &str) -> Result<Option<Role>, HandlerErr> {
    match get_optional_str(params, key) {
        None => Ok(None),
        Some(raw) => Role::parse(&raw)
            .map(Some)
            .ok_or_else(|| HandlerErr::new("bad_params", format!("unknown {}: {}", key, raw))),
    }
}

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

/// The operator must be signed in with a role that may open `screen`.
pub fn require_screen(state: &AppState, screen: Screen) -> Result<Role, HandlerErr> {
    let Some(role) = state.actor else {
        return Err(HandlerErr::new("no_actor", "set the signed-in role first"));
    };
    if !can_access(role, screen) {
        return Err(HandlerErr::new(
            "forbidden",
            format!("{} may not access {}", role.as_str(), screen.as_str()),
        ));
    }
    Ok(role)
}
