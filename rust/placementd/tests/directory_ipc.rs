mod common;

use common::{error_code, str_at, Sidecar};
use serde_json::json;

#[test]
fn users_are_filtered_by_role() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let mut sidecar = Sidecar::open(workspace.path());

    let created = sidecar.request_ok(
        "users.create",
        json!({ "role": "Student", "fullName": " Ada Lovelace ", "email": "ADA@Example.org" }),
    );
    assert_eq!(created["user"]["role"], json!("student"));
    assert_eq!(created["user"]["fullName"], json!("Ada Lovelace"));
    assert_eq!(created["user"]["email"], json!("ada@example.org"));
    common::create_user(&mut sidecar, "teacher", "Tom Teacher");

    let students = sidecar.request_ok("users.list", json!({ "role": "student" }));
    assert_eq!(students["users"].as_array().map(|v| v.len()), Some(1));
    let everyone = sidecar.request_ok("users.list", json!({}));
    assert_eq!(everyone["users"].as_array().map(|v| v.len()), Some(2));

    let err = sidecar.request_err("users.create", json!({ "role": "janitor", "fullName": "X" }));
    assert_eq!(error_code(&err), "bad_params");
    let err = sidecar.request_err(
        "users.create",
        json!({ "role": "teacher", "fullName": "No Mail", "email": "nomail" }),
    );
    assert_eq!(err["details"]["field"], json!("email"));
    let err = sidecar.request_err("users.get", json!({ "userId": "missing" }));
    assert_eq!(error_code(&err), "not_found");
}

#[test]
fn one_academic_year_is_active_at_a_time() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let mut sidecar = Sidecar::open(workspace.path());

    let first = sidecar.request_ok(
        "academicYears.create",
        json!({ "year": 2026, "semester": 1, "isActive": true }),
    );
    let first_id = str_at(&first, "/academicYear/id").to_string();
    let second = sidecar.request_ok(
        "academicYears.create",
        json!({ "year": 2026, "semester": 2, "isActive": true }),
    );
    let second_id = str_at(&second, "/academicYear/id").to_string();

    let listed = sidecar.request_ok("academicYears.list", json!({}));
    let rows = listed["academicYears"].as_array().expect("years");
    assert_eq!(str_at(&rows[0], "/id"), second_id);
    assert_eq!(rows[0]["isActive"], json!(true));
    assert_eq!(rows[1]["isActive"], json!(false));

    sidecar.request_ok("academicYears.activate", json!({ "academicYearId": first_id }));
    let first = sidecar.request_ok("academicYears.get", json!({ "academicYearId": first_id }));
    assert_eq!(first["academicYear"]["isActive"], json!(true));
    let second = sidecar.request_ok("academicYears.get", json!({ "academicYearId": second_id }));
    assert_eq!(second["academicYear"]["isActive"], json!(false));

    let err = sidecar.request_err("academicYears.create", json!({ "year": 2026, "semester": 1 }));
    assert_eq!(error_code(&err), "conflict");
    let err = sidecar.request_err("academicYears.create", json!({ "year": 2026, "semester": 4 }));
    assert_eq!(err["details"]["field"], json!("semester"));
}
