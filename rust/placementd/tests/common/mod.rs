#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Sidecar {
    pub fn spawn() -> Self {
        let exe = env!("CARGO_BIN_EXE_placementd");
        let mut child = Command::new(exe)
            .env_remove("PLACEMENTD_WORKSPACE")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn placementd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Sidecar {
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 0,
        }
    }

    pub fn open(workspace: &Path) -> Self {
        let mut sidecar = Self::spawn();
        sidecar.request_ok(
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        sidecar
    }

    pub fn send_raw(&mut self, line: &str) -> Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(&mut self, method: &str, params: Value) -> Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        let value = self.send_raw(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn request_ok(&mut self, method: &str, params: Value) -> Value {
        let value = self.request(method, params);
        assert!(
            value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or_else(|| json!({}))
    }

    /// Sends a request that must fail and returns its error object.
    pub fn request_err(&mut self, method: &str, params: Value) -> Value {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value.get("error").cloned().expect("error object")
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn error_code(error: &Value) -> &str {
    error.get("code").and_then(|v| v.as_str()).unwrap_or("")
}

pub fn str_at<'a>(value: &'a Value, pointer: &str) -> &'a str {
    value
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing string at {} in {}", pointer, value))
}

pub fn create_user(sidecar: &mut Sidecar, role: &str, name: &str) -> String {
    let res = sidecar.request_ok("users.create", json!({ "role": role, "fullName": name }));
    str_at(&res, "/user/id").to_string()
}

pub fn create_year(sidecar: &mut Sidecar, year: i64, semester: i64) -> String {
    let res = sidecar.request_ok(
        "academicYears.create",
        json!({
            "year": year,
            "semester": semester,
            "startDate": format!("{}-08-01", year),
            "endDate": format!("{}-12-31", year),
        }),
    );
    str_at(&res, "/academicYear/id").to_string()
}

pub fn create_school(sidecar: &mut Sidecar, name: &str) -> String {
    let res = sidecar.request_ok(
        "schools.create",
        json!({
            "name": name,
            "address": "99 Placement Road, Springfield",
            "phone": "0812345678",
        }),
    );
    str_at(&res, "/school/schoolId").to_string()
}

pub fn set_quota(sidecar: &mut Sidecar, school_id: &str, year_id: &str, max_students: i64) -> Value {
    sidecar.request_ok(
        "quotas.upsert",
        json!({
            "schoolId": school_id,
            "academicYearId": year_id,
            "maxStudents": max_students,
            "isOpen": true,
        }),
    )
}
