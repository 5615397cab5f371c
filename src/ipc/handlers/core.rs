use crate::access::allowed_screens;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::parse_role_param;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::{Path, PathBuf};

/// Opens (creating if needed) the workspace database. Cached queries and open
/// import sessions belong to the previous workspace and are dropped.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    let conn = db::open_db(path)?;
    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    state.cache.clear();
    state.sessions.clear();
    tracing::info!(workspace = %path.display(), "workspace opened");
    Ok(())
}

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "actorRole": state.actor.map(|r| r.as_str()),
            "openImports": state.sessions.len()
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, &path) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => {
            tracing::warn!(workspace = %path.display(), error = %e, "workspace open failed");
            err(&req.id, "db_open_failed", format!("{e:?}"), None)
        }
    }
}

fn handle_actor_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let role = match parse_role_param(&req.params, "role") {
        Ok(Some(r)) => r,
        Ok(None) => return err(&req.id, "bad_params", "missing role", None),
        Err(e) => return e.response(&req.id),
    };
    state.actor = Some(role);
    ok(&req.id, json!({ "role": role.as_str() }))
}

fn handle_nav_screens(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(role) = state.actor else {
        return err(&req.id, "no_actor", "set the signed-in role first", None);
    };
    let screens = allowed_screens(role)
        .into_iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>();
    ok(&req.id, json!({ "role": role.as_str(), "screens": screens }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "actor.set" => Some(handle_actor_set(state, req)),
        "nav.screens" => Some(handle_nav_screens(state, req)),
        _ => None,
    }
}
