use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    list_with_db, optional_enum, optional_str, patch_nullable_str, patch_obj, required_str,
    to_json, with_db,
};
use crate::ipc::types::{AppState, Request};
use crate::models::academic_years;
use crate::models::assignments::{
    self, AssignmentFilter, AssignmentPatch, AssignmentStatus, NewAssignment,
};
use rusqlite::Connection;
use serde_json::{json, Value};

fn placement_key(params: &Value) -> Result<(String, String, String), HandlerErr> {
    Ok((
        required_str(params, "studentId")?,
        required_str(params, "schoolId")?,
        required_str(params, "academicYearId")?,
    ))
}

/// Students apply for the active academic year unless one is named.
fn assignments_apply(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let school_id = required_str(params, "schoolId")?;
    let year_id = match optional_str(params, "academicYearId")? {
        Some(id) => id,
        None => academic_years::active(conn)?
            .map(|y| y.id)
            .ok_or_else(|| HandlerErr::bad_params("no active academic year"))?,
    };
    let assignment = assignments::apply(conn, &student_id, &school_id, &year_id)?;
    Ok(json!({ "assignment": to_json(&assignment)? }))
}

fn assignments_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let (student_id, school_id, academic_year_id) = placement_key(params)?;
    let assignment = assignments::create(
        conn,
        NewAssignment {
            student_id,
            school_id,
            academic_year_id,
            teacher_id: optional_str(params, "teacherId")?,
            start_date: optional_str(params, "startDate")?,
            end_date: optional_str(params, "endDate")?,
            notes: optional_str(params, "notes")?,
        },
    )?;
    Ok(json!({ "assignment": to_json(&assignment)? }))
}

fn assignments_get(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "assignmentId")?;
    let assignment = assignments::get(conn, &id)?;
    Ok(json!({ "assignment": to_json(&assignment)? }))
}

fn assignments_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let filter = AssignmentFilter {
        student_id: optional_str(params, "studentId")?,
        school_id: optional_str(params, "schoolId")?,
        academic_year_id: optional_str(params, "academicYearId")?,
        status: optional_enum::<AssignmentStatus>(params, "status")?,
    };
    let rows = assignments::list(conn, &filter)?;
    Ok(json!({ "assignments": to_json(&rows)? }))
}

fn assignments_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "assignmentId")?;
    let patch_params = patch_obj(params)?;
    let patch = AssignmentPatch {
        teacher_id: patch_nullable_str(patch_params, "teacherId")?,
        start_date: patch_nullable_str(patch_params, "startDate")?,
        end_date: patch_nullable_str(patch_params, "endDate")?,
        notes: patch_nullable_str(patch_params, "notes")?,
        status: optional_enum::<AssignmentStatus>(&params["patch"], "status")?,
    };
    let assignment = assignments::update(conn, &id, patch)?;
    Ok(json!({ "assignment": to_json(&assignment)? }))
}

fn assignments_cancel(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "assignmentId")?;
    let assignment = assignments::cancel(conn, &id)?;
    Ok(json!({ "assignment": to_json(&assignment)? }))
}

fn assignments_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "assignmentId")?;
    assignments::delete(conn, &id)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "assignments.apply" => Some(with_db(state, req, assignments_apply)),
        "assignments.create" => Some(with_db(state, req, assignments_create)),
        "assignments.get" => Some(with_db(state, req, assignments_get)),
        "assignments.list" => Some(list_with_db(state, req, "assignments", assignments_list)),
        "assignments.update" => Some(with_db(state, req, assignments_update)),
        "assignments.cancel" => Some(with_db(state, req, assignments_cancel)),
        "assignments.delete" => Some(with_db(state, req, assignments_delete)),
        _ => None,
    }
}
