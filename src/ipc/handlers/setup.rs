use crate::access::Screen;
use crate::backend::BackendMode;
use crate::db;
use crate::import::Role;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{require_db, require_screen};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Import,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "import" => Some(Self::Import),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Import => "setup.import",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Import => json!({
            "defaultUserType": null,
            "backend": "auto",
            "apiBaseUrl": null
        }),
    }
}

fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut out = default_section(section);
    if let Some(Value::Object(stored)) = db::settings_get_json(conn, section.key())? {
        if let Value::Object(obj) = &mut out {
            for (k, v) in stored {
                if obj.contains_key(&k) {
                    obj.insert(k, v);
                }
            }
        }
    }
    Ok(out)
}

/// Import settings with defaults filled in. Used by the import handlers.
pub struct ImportSetup {
    pub default_user_type: Option<Role>,
    pub backend: BackendMode,
    pub api_base_url: Option<String>,
}

pub fn load_import_setup(conn: &Connection) -> anyhow::Result<ImportSetup> {
    let v = load_section(conn, SetupSection::Import)?;
    Ok(ImportSetup {
        default_user_type: v
            .get("defaultUserType")
            .and_then(|x| x.as_str())
            .and_then(Role::parse),
        backend: v
            .get("backend")
            .and_then(|x| x.as_str())
            .and_then(BackendMode::parse)
            .unwrap_or(BackendMode::Auto),
        api_base_url: v
            .get("apiBaseUrl")
            .and_then(|x| x.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    })
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "stored section is not an object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Import => match k.as_str() {
                "defaultUserType" => {
                    if v.is_null() {
                        obj.insert(k.clone(), Value::Null);
                        continue;
                    }
                    let s = parse_string_max(v, k, 32)?;
                    let Some(role) = Role::parse(&s) else {
                        return Err(format!("defaultUserType is not a known role: {}", s));
                    };
                    obj.insert(k.clone(), Value::String(role.as_str().to_string()));
                }
                "backend" => {
                    let s = parse_string_max(v, k, 16)?;
                    let Some(mode) = BackendMode::parse(&s) else {
                        return Err("backend must be one of: auto, local, remote".into());
                    };
                    obj.insert(k.clone(), Value::String(mode.as_str().to_string()));
                }
                "apiBaseUrl" => {
                    if v.is_null() {
                        obj.insert(k.clone(), Value::Null);
                        continue;
                    }
                    let s = parse_string_max(v, k, 512)?;
                    if !(s.starts_with("http://") || s.starts_with("https://")) {
                        return Err("apiBaseUrl must start with http:// or https://".into());
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                _ => return Err(format!("unknown import field: {}", k)),
            },
        }
    }
    Ok(())
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_screen(state, Screen::Users) {
        return e.response(&req.id);
    }
    let conn = match require_db(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match load_section(conn, SetupSection::Import) {
        Ok(import) => ok(&req.id, json!({ "import": import })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_screen(state, Screen::Users) {
        return e.response(&req.id);
    }
    let conn = match require_db(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(section = section.key(), "setup updated");
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
