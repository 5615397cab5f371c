use crate::access::Screen;
use crate::backend::{select_target, BackendMode, BackendTarget, LocalBackend, RemoteBackend};
use crate::cache::{USERS_LIST, USERS_STATS};
use crate::db;
use crate::import::{
    BulkCreate, ClassRef, ImportSession, ImportStage, RandomPhones, Role, SessionError,
    TemplateKind,
};
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::handlers::setup::load_import_setup;
use crate::ipc::helpers::{get_optional_str, get_required_str, parse_role_param, require_screen};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};
use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::AtomicBool;
use uuid::Uuid;

fn session_error(e: SessionError) -> HandlerErr {
    match e {
        SessionError::InvalidState { expected, actual } => HandlerErr::new(
            "invalid_state",
            format!("import is in {} stage, expected {}", actual, expected),
        )
        .with_details(json!({ "stage": actual })),
        SessionError::Parse(p) => {
            HandlerErr::new("parse_failed", p.to_string()).with_details(json!({ "stage": "upload" }))
        }
        SessionError::Submit(s) => HandlerErr::new("submit_failed", s.user_message())
            .with_details(json!({ "stage": "preview", "cause": s.to_string() })),
    }
}

fn session_json(session_id: &str, session: &ImportSession) -> Value {
    let mut out = json!({
        "sessionId": session_id,
        "stage": session.stage().name(),
        "userType": session.user_type().map(|r| r.as_str()),
    });
    match session.stage() {
        ImportStage::Upload => {}
        ImportStage::Preview(parsed) => {
            out["rowsTotal"] = json!(parsed.rows_total);
            out["rowsParsed"] = json!(parsed.records.len());
            out["dropped"] = json!(parsed.dropped());
            out["warnings"] = json!(parsed.warnings);
            out["records"] = json!(parsed.records);
        }
        ImportStage::Results(result) => {
            out["report"] = result.to_report_json();
        }
    }
    out
}

fn handle_template(state: &mut AppState, req: &Request) -> Value {
    if let Err(e) = require_screen(state, Screen::BulkImport) {
        return e.response(&req.id);
    }
    let kind_raw = get_optional_str(&req.params, "kind").unwrap_or_else(|| "generic".to_string());
    let Some(kind) = TemplateKind::parse(&kind_raw) else {
        return err(&req.id, "bad_params", "kind must be one of: student, teacher, generic", None);
    };
    let mut out = json!({
        "kind": kind.as_str(),
        "fileName": kind.file_name(),
        "contents": kind.contents(),
    });
    if let Some(out_path) = get_optional_str(&req.params, "outPath") {
        let path = std::path::PathBuf::from(&out_path);
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return err(&req.id, "io_failed", e.to_string(), Some(json!({ "path": out_path })));
            }
        }
        if let Err(e) = std::fs::write(&path, kind.contents()) {
            return err(&req.id, "io_failed", e.to_string(), Some(json!({ "path": out_path })));
        }
        out["path"] = json!(out_path);
    }
    ok(&req.id, out)
}

fn handle_open(state: &mut AppState, req: &Request) -> Value {
    if let Err(e) = require_screen(state, Screen::BulkImport) {
        return e.response(&req.id);
    }
    // An explicit `userType: null` means "use the CSV role column".
    let user_type: Option<Role> = if req.params.get("userType").is_some() {
        match parse_role_param(&req.params, "userType") {
            Ok(r) => r,
            Err(e) => return e.response(&req.id),
        }
    } else {
        match state.db.as_ref().map(load_import_setup).transpose() {
            Ok(setup) => setup.and_then(|s| s.default_user_type),
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    };
    let session_id = Uuid::new_v4().to_string();
    let session = ImportSession::new(user_type);
    let out = session_json(&session_id, &session);
    state.sessions.insert(session_id, session);
    ok(&req.id, out)
}

fn load_roster(state: &AppState, params: &Value) -> Result<Vec<ClassRef>, HandlerErr> {
    if let Some(raw) = params.get("classes") {
        return serde_json::from_value::<Vec<ClassRef>>(raw.clone())
            .map_err(|e| HandlerErr::new("bad_params", format!("invalid classes: {}", e)));
    }
    match state.db.as_ref() {
        Some(conn) => Ok(db::list_class_refs(conn)?),
        None => Ok(Vec::new()),
    }
}

fn has_csv_extension(path: &str) -> bool {
    std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

fn handle_load(state: &mut AppState, req: &Request) -> Value {
    if let Err(e) = require_screen(state, Screen::BulkImport) {
        return e.response(&req.id);
    }
    let session_id = match get_required_str(&req.params, "sessionId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let roster = match load_roster(state, &req.params) {
        Ok(r) => r,
        Err(e) => return e.response(&req.id),
    };
    let mut phones = match req.params.get("phoneSeed").and_then(|v| v.as_u64()) {
        Some(seed) => RandomPhones::seeded(seed),
        None => RandomPhones::from_os_rng(),
    };
    let Some(session) = state.sessions.get_mut(&session_id) else {
        return err(&req.id, "not_found", "import session not found", None);
    };
    let cancel = AtomicBool::new(false);

    let loaded = if let Some(path) = get_optional_str(&req.params, "path") {
        if !has_csv_extension(&path) {
            return err(
                &req.id,
                "bad_params",
                "only .csv files can be imported",
                Some(json!({ "path": path, "stage": "upload" })),
            );
        }
        match File::open(&path) {
            Ok(f) => session.load(BufReader::new(f), &roster, &mut phones, &cancel),
            Err(e) => {
                return err(
                    &req.id,
                    "parse_failed",
                    e.to_string(),
                    Some(json!({ "path": path, "stage": "upload" })),
                )
            }
        }
    } else if let Some(text) = req.params.get("text").and_then(|v| v.as_str()) {
        session.load(text.as_bytes(), &roster, &mut phones, &cancel)
    } else {
        return err(&req.id, "bad_params", "missing path or text", None);
    };

    if let Err(e) = loaded {
        tracing::warn!(session = %session_id, error = %e, "import load failed");
        return session_error(e).response(&req.id);
    }
    if let Some(parsed) = session.preview() {
        tracing::info!(
            session = %session_id,
            rows = parsed.rows_total,
            records = parsed.records.len(),
            warnings = parsed.warnings.len(),
            "import parsed"
        );
    }
    ok(&req.id, session_json(&session_id, session))
}

fn handle_get(state: &mut AppState, req: &Request) -> Value {
    if let Err(e) = require_screen(state, Screen::BulkImport) {
        return e.response(&req.id);
    }
    let session_id = match get_required_str(&req.params, "sessionId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match state.sessions.get(&session_id) {
        Some(session) => ok(&req.id, session_json(&session_id, session)),
        None => err(&req.id, "not_found", "import session not found", None),
    }
}

fn handle_back(state: &mut AppState, req: &Request) -> Value {
    if let Err(e) = require_screen(state, Screen::BulkImport) {
        return e.response(&req.id);
    }
    let session_id = match get_required_str(&req.params, "sessionId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let Some(session) = state.sessions.get_mut(&session_id) else {
        return err(&req.id, "not_found", "import session not found", None);
    };
    match session.back() {
        Ok(()) => ok(&req.id, session_json(&session_id, session)),
        Err(e) => session_error(e).response(&req.id),
    }
}

fn handle_submit(state: &mut AppState, req: &Request) -> Value {
    if let Err(e) = require_screen(state, Screen::BulkImport) {
        return e.response(&req.id);
    }
    let session_id = match get_required_str(&req.params, "sessionId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let (mode, workspace_url) = match state.db.as_ref().map(load_import_setup).transpose() {
        Ok(Some(setup)) => (setup.backend, setup.api_base_url),
        Ok(None) => (BackendMode::Auto, None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let target = match select_target(mode, workspace_url, &state.config) {
        Ok(t) => t,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };

    let Some(session) = state.sessions.get_mut(&session_id) else {
        return err(&req.id, "not_found", "import session not found", None);
    };
    let mut backend: Box<dyn BulkCreate + '_> = match &target {
        BackendTarget::Local => match state.db.as_ref() {
            Some(conn) => Box::new(LocalBackend::new(conn)),
            None => return err(&req.id, "no_workspace", "select a workspace first", None),
        },
        BackendTarget::Remote { base_url } => match RemoteBackend::new(
            base_url,
            state.config.api_token.clone(),
            state.config.http_timeout,
        ) {
            Ok(b) => Box::new(b),
            Err(e) => return session_error(SessionError::Submit(e)).response(&req.id),
        },
    };

    let submitted = session.submit(backend.as_mut());
    drop(backend);
    match submitted {
        Ok(()) => {
            if let Some(r) = session.result() {
                tracing::info!(
                    session = %session_id,
                    created = r.created.len(),
                    failed = r.errors.len(),
                    "import submitted"
                );
            }
            let out = session_json(&session_id, session);
            state.cache.invalidate(USERS_LIST);
            state.cache.invalidate(USERS_STATS);
            ok(&req.id, out)
        }
        Err(e) => {
            tracing::warn!(session = %session_id, error = %e, "import submit failed");
            session_error(e).response(&req.id)
        }
    }
}

fn handle_report(state: &mut AppState, req: &Request) -> Value {
    if let Err(e) = require_screen(state, Screen::BulkImport) {
        return e.response(&req.id);
    }
    let session_id = match get_required_str(&req.params, "sessionId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let Some(session) = state.sessions.get(&session_id) else {
        return err(&req.id, "not_found", "import session not found", None);
    };
    let Some(result) = session.result() else {
        return err(
            &req.id,
            "invalid_state",
            format!("import is in {} stage, expected results", session.stage().name()),
            Some(json!({ "stage": session.stage().name() })),
        );
    };
    match get_optional_str(&req.params, "format").as_deref() {
        None | Some("json") => ok(&req.id, result.to_report_json()),
        Some("text") => ok(&req.id, json!({ "text": result.render_text() })),
        Some(other) => err(
            &req.id,
            "bad_params",
            format!("unknown format: {}", other),
            None,
        ),
    }
}

fn handle_close(state: &mut AppState, req: &Request) -> Value {
    if let Err(e) = require_screen(state, Screen::BulkImport) {
        return e.response(&req.id);
    }
    let session_id = match get_required_str(&req.params, "sessionId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match state.sessions.remove(&session_id) {
        Some(_) => ok(&req.id, json!({ "ok": true })),
        None => err(&req.id, "not_found", "import session not found", None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "import.template" => Some(handle_template(state, req)),
        "import.open" => Some(handle_open(state, req)),
        "import.load" => Some(handle_load(state, req)),
        "import.get" => Some(handle_get(state, req)),
        "import.back" => Some(handle_back(state, req)),
        "import.submit" => Some(handle_submit(state, req)),
        "import.report" => Some(handle_report(state, req)),
        "import.close" => Some(handle_close(state, req)),
        _ => None,
    }
}
