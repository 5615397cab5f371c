mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn import_section_defaults_and_patch_validation() {
    let workspace = temp_dir("shikshan-setup-import");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let no_actor = request(&mut stdin, &mut reader, "0", "setup.get", json!({}));
    assert_eq!(error_code(&no_actor), Some("no_actor"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "0a",
        "actor.set",
        json!({ "role": "teacher" }),
    );
    let forbidden = request(&mut stdin, &mut reader, "0b", "setup.get", json!({}));
    assert_eq!(error_code(&forbidden), Some("forbidden"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "0c",
        "actor.set",
        json!({ "role": "school_admin" }),
    );
    let no_ws = request(&mut stdin, &mut reader, "0d", "setup.get", json!({}));
    assert_eq!(error_code(&no_ws), Some("no_workspace"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let defaults = request_ok(&mut stdin, &mut reader, "2", "setup.get", json!({}));
    assert!(defaults["import"]["defaultUserType"].is_null());
    assert_eq!(defaults["import"]["backend"], "auto");
    assert!(defaults["import"]["apiBaseUrl"].is_null());
    for (i, patch) in [
        json!({ "defaultUserType": "janitor" }),
        json!({ "backend": 7 }),
        json!({ "apiBaseUrl": "ftp://school.example" }),
        json!({ "colour": "blue" }),
    ]
    .into_iter()
    .enumerate()
    {
        let resp = request(
            &mut stdin,
            &mut reader,
            &format!("bad-{i}"),
            "setup.update",
            json!({ "section": "import", "patch": patch }),
        );
        assert_eq!(error_code(&resp), Some("bad_params"), "{}", resp);
    }
    let unknown_section = request(
        &mut stdin,
        &mut reader,
        "4",
        "setup.update",
        json!({ "section": "fees", "patch": {} }),
    );
    assert_eq!(error_code(&unknown_section), Some("bad_params"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "setup.update",
        json!({ "section": "import", "patch": { "defaultUserType": "Teacher", "backend": "LOCAL" } }),
    );

    // Settings live in the workspace, so they survive a reopen.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let stored = request_ok(&mut stdin, &mut reader, "7", "setup.get", json!({}));
    assert_eq!(stored["import"]["defaultUserType"], "teacher");
    assert_eq!(stored["import"]["backend"], "local");

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn default_user_type_applies_unless_overridden() {
    let workspace = temp_dir("shikshan-setup-user-type");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "actor.set",
        json!({ "role": "school_admin" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "setup.update",
        json!({ "section": "import", "patch": { "defaultUserType": "teacher" } }),
    );

    let defaulted = request_ok(&mut stdin, &mut reader, "4", "import.open", json!({}));
    assert_eq!(defaulted["userType"], "teacher");
    let session_id = defaulted["sessionId"].as_str().expect("session id").to_string();
    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "import.load",
        json!({ "sessionId": session_id, "text": "NAME,ROLE\nPriya Verma,parent\n" }),
    );
    assert_eq!(preview["records"][0]["role"], "teacher");

    let csv_role = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "import.open",
        json!({ "userType": null }),
    );
    assert!(csv_role["userType"].is_null());
    let csv_session = csv_role["sessionId"].as_str().expect("session id").to_string();
    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "import.load",
        json!({ "sessionId": csv_session, "text": "NAME,ROLE\nPriya Verma,parent\n" }),
    );
    assert_eq!(preview["records"][0]["role"], "parent");

    let explicit = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "import.open",
        json!({ "userType": "student" }),
    );
    assert_eq!(explicit["userType"], "student");

    let bad = request(
        &mut stdin,
        &mut reader,
        "9",
        "import.open",
        json!({ "userType": "janitor" }),
    );
    assert_eq!(error_code(&bad), Some("bad_params"));

    let out_path = workspace.join("templates").join("students.csv");
    let template = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "import.template",
        json!({ "kind": "student", "outPath": out_path.to_string_lossy() }),
    );
    assert_eq!(template["fileName"], "student_import_template.csv");
    let written = std::fs::read_to_string(&out_path).expect("template written");
    assert_eq!(written, template["contents"].as_str().unwrap_or(""));

    let _ = std::fs::remove_dir_all(workspace);
}
