mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn health_and_unknown_method() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));
    assert!(health["workspacePath"].is_null());

    let unknown = request(&mut stdin, &mut reader, "2", "fees.collect", json!({}));
    assert_eq!(unknown["id"], "2");
    assert_eq!(error_code(&unknown), Some("not_implemented"));
}

#[test]
fn role_gating_controls_screens_and_import() {
    let workspace = temp_dir("shikshan-router-gating");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let no_actor = request(&mut stdin, &mut reader, "2", "import.open", json!({}));
    assert_eq!(error_code(&no_actor), Some("no_actor"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "actor.set",
        json!({ "role": "teacher" }),
    );
    let screens = request_ok(&mut stdin, &mut reader, "4", "nav.screens", json!({}));
    let names = screens["screens"]
        .as_array()
        .expect("screens")
        .iter()
        .filter_map(|s| s.as_str())
        .collect::<Vec<_>>();
    assert!(names.contains(&"attendance"));
    assert!(!names.contains(&"bulkImport"));

    let forbidden = request(&mut stdin, &mut reader, "5", "import.open", json!({}));
    assert_eq!(error_code(&forbidden), Some("forbidden"));
    let forbidden_users = request(&mut stdin, &mut reader, "6", "users.list", json!({}));
    assert_eq!(error_code(&forbidden_users), Some("forbidden"));

    let bad_role = request(
        &mut stdin,
        &mut reader,
        "7",
        "actor.set",
        json!({ "role": "janitor" }),
    );
    assert_eq!(error_code(&bad_role), Some("bad_params"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "actor.set",
        json!({ "role": "principal" }),
    );
    let opened = request_ok(&mut stdin, &mut reader, "9", "import.open", json!({}));
    assert_eq!(opened["stage"], "upload");

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn malformed_json_line_gets_bad_json_reply() {
    use std::io::{BufRead, Write};

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    writeln!(stdin, "{{not json").expect("write");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read");
    let v: serde_json::Value = serde_json::from_str(&line).expect("json reply");
    assert_eq!(error_code(&v), Some("bad_json"));
}
