mod common;

use common::{error_code, str_at, Sidecar};
use serde_json::json;

fn key(school: &str, year: &str) -> serde_json::Value {
    json!({ "schoolId": school, "academicYearId": year })
}

#[test]
fn can_accept_reports_missing_closed_and_full() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let mut sidecar = Sidecar::open(workspace.path());
    let school = common::create_school(&mut sidecar, "Riverside High");
    let year = common::create_year(&mut sidecar, 2026, 1);

    let check = sidecar.request_ok("quotas.canAccept", key(&school, &year));
    assert_eq!(check["canAccept"], json!(false));
    assert_eq!(
        check["reason"],
        json!("No quota configured for this school and academic year")
    );
    let err = sidecar.request_err("quotas.get", key(&school, &year));
    assert_eq!(error_code(&err), "not_found");

    common::set_quota(&mut sidecar, &school, &year, 1);
    let check = sidecar.request_ok("quotas.canAccept", key(&school, &year));
    assert_eq!(check["canAccept"], json!(true));
    assert_eq!(check["availableSlots"], json!(1));
    assert!(check.get("reason").is_none());

    let mut closed = key(&school, &year);
    closed["isOpen"] = json!(false);
    sidecar.request_ok("quotas.setOpen", closed);
    let check = sidecar.request_ok("quotas.canAccept", key(&school, &year));
    assert_eq!(check["canAccept"], json!(false));
    assert_eq!(
        check["reason"],
        json!("School is not accepting students for this academic year")
    );

    let student = common::create_user(&mut sidecar, "student", "Ada Student");
    let mut apply = key(&school, &year);
    apply["studentId"] = json!(student);
    let err = sidecar.request_err("assignments.apply", apply.clone());
    assert_eq!(error_code(&err), "quota_closed");

    let mut open = key(&school, &year);
    open["isOpen"] = json!(true);
    sidecar.request_ok("quotas.setOpen", open);
    sidecar.request_ok("assignments.apply", apply);

    let check = sidecar.request_ok("quotas.canAccept", key(&school, &year));
    assert_eq!(check["canAccept"], json!(false));
    assert_eq!(check["reason"], json!("School quota is full"));
    assert_eq!(check["currentStudents"], json!(1));
    assert_eq!(check["availableSlots"], json!(0));
}

#[test]
fn full_quota_rejects_and_cancellation_frees_the_seat() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let mut sidecar = Sidecar::open(workspace.path());
    let school = common::create_school(&mut sidecar, "Riverside High");
    let year = common::create_year(&mut sidecar, 2026, 1);
    common::set_quota(&mut sidecar, &school, &year, 1);
    let ada = common::create_user(&mut sidecar, "student", "Ada Student");
    let ben = common::create_user(&mut sidecar, "student", "Ben Student");

    let first = sidecar.request_ok(
        "assignments.apply",
        json!({ "studentId": ada, "schoolId": school, "academicYearId": year }),
    );
    let err = sidecar.request_err(
        "assignments.apply",
        json!({ "studentId": ben, "schoolId": school, "academicYearId": year }),
    );
    assert_eq!(error_code(&err), "quota_full");
    let quota = sidecar.request_ok("quotas.get", key(&school, &year));
    assert_eq!(quota["quota"]["currentStudents"], json!(1));

    sidecar.request_ok(
        "assignments.cancel",
        json!({ "assignmentId": str_at(&first, "/assignment/id") }),
    );
    let quota = sidecar.request_ok("quotas.get", key(&school, &year));
    assert_eq!(quota["quota"]["currentStudents"], json!(0));

    sidecar.request_ok(
        "assignments.apply",
        json!({ "studentId": ben, "schoolId": school, "academicYearId": year }),
    );
}

#[test]
fn upsert_uses_setup_defaults_and_guards_enrollment() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let mut sidecar = Sidecar::open(workspace.path());
    let school = common::create_school(&mut sidecar, "Riverside High");
    let year = common::create_year(&mut sidecar, 2026, 1);

    sidecar.request_ok(
        "setup.update",
        json!({
            "section": "placement",
            "patch": { "defaultMaxStudents": 3, "quotaOpenByDefault": false }
        }),
    );
    let created = sidecar.request_ok("quotas.upsert", key(&school, &year));
    assert_eq!(created["quota"]["maxStudents"], json!(3));
    assert_eq!(created["quota"]["maxTeachers"], json!(2));
    assert_eq!(created["quota"]["isOpen"], json!(false));

    // Omitted fields keep their stored values on update.
    let mut patch = key(&school, &year);
    patch["isOpen"] = json!(true);
    let updated = sidecar.request_ok("quotas.upsert", patch);
    assert_eq!(updated["quota"]["maxStudents"], json!(3));
    assert_eq!(updated["quota"]["isOpen"], json!(true));

    for name in ["Ada Student", "Ben Student"] {
        let student = common::create_user(&mut sidecar, "student", name);
        sidecar.request_ok(
            "assignments.apply",
            json!({ "studentId": student, "schoolId": school, "academicYearId": year }),
        );
    }

    let mut shrink = key(&school, &year);
    shrink["maxStudents"] = json!(1);
    let err = sidecar.request_err("quotas.upsert", shrink);
    assert_eq!(error_code(&err), "quota_below_enrollment");
    assert_eq!(err["details"]["currentStudents"], json!(2));

    let mut negative = key(&school, &year);
    negative["maxStudents"] = json!(-1);
    let err = sidecar.request_err("quotas.upsert", negative);
    assert_eq!(error_code(&err), "bad_params");

    let err = sidecar.request_err("quotas.delete", key(&school, &year));
    assert_eq!(error_code(&err), "in_use");

    let err = sidecar.request_err("quotas.upsert", key("SCH404", &year));
    assert_eq!(error_code(&err), "not_found");
}

#[test]
fn recalculate_matches_open_assignments() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let mut sidecar = Sidecar::open(workspace.path());
    let school = common::create_school(&mut sidecar, "Riverside High");
    let year = common::create_year(&mut sidecar, 2026, 1);
    common::set_quota(&mut sidecar, &school, &year, 5);

    let mut ids = Vec::new();
    for name in ["Ada Student", "Ben Student", "Cy Student"] {
        let student = common::create_user(&mut sidecar, "student", name);
        let res = sidecar.request_ok(
            "assignments.apply",
            json!({ "studentId": student, "schoolId": school, "academicYearId": year }),
        );
        ids.push(str_at(&res, "/assignment/id").to_string());
    }
    sidecar.request_ok("assignments.cancel", json!({ "assignmentId": ids[0] }));
    sidecar.request_ok(
        "assignments.update",
        json!({ "assignmentId": ids[1], "patch": { "status": "completed" } }),
    );

    let quota = sidecar.request_ok("quotas.recalculate", key(&school, &year));
    assert_eq!(quota["quota"]["currentStudents"], json!(2));

    let listed = sidecar.request_ok("quotas.list", json!({ "academicYearId": year }));
    assert_eq!(listed["quotas"].as_array().map(|a| a.len()), Some(1));
}
