use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    list_with_db, optional_str, patch_nullable_str, patch_obj, patch_str, required_str, to_json,
    with_db,
};
use crate::ipc::types::{AppState, Request};
use crate::models::subjects::{self, NewSubject, SubjectPatch};
use rusqlite::Connection;
use serde_json::{json, Value};

fn subjects_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let subject = subjects::create(
        conn,
        NewSubject {
            code: optional_str(params, "code")?.unwrap_or_default(),
            name: optional_str(params, "name")?.unwrap_or_default(),
            description: optional_str(params, "description")?,
            created_by: optional_str(params, "createdBy")?,
        },
    )?;
    Ok(json!({ "subject": to_json(&subject)? }))
}

fn subjects_get(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "subjectId")?;
    let subject = subjects::get(conn, &id)?;
    Ok(json!({ "subject": to_json(&subject)? }))
}

fn subjects_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let created_by = optional_str(params, "createdBy")?;
    let rows = subjects::list(conn, created_by.as_deref())?;
    Ok(json!({ "subjects": to_json(&rows)? }))
}

fn subjects_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "subjectId")?;
    let patch = patch_obj(params)?;
    let subject = subjects::update(
        conn,
        &id,
        SubjectPatch {
            code: patch_str(patch, "code")?,
            name: patch_str(patch, "name")?,
            description: patch_nullable_str(patch, "description")?,
        },
    )?;
    Ok(json!({ "subject": to_json(&subject)? }))
}

fn subjects_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "subjectId")?;
    subjects::delete(conn, &id)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "subjects.create" => Some(with_db(state, req, subjects_create)),
        "subjects.get" => Some(with_db(state, req, subjects_get)),
        "subjects.list" => Some(list_with_db(state, req, "subjects", subjects_list)),
        "subjects.update" => Some(with_db(state, req, subjects_update)),
        "subjects.delete" => Some(with_db(state, req, subjects_delete)),
        _ => None,
    }
}
