use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    list_with_db, optional_str, patch_nullable_str, patch_obj, patch_str, required_str, to_json,
    with_db,
};
use crate::ipc::types::{AppState, Request};
use crate::models::schools::{self, NewSchool, SchoolPatch};
use rusqlite::Connection;
use serde_json::{json, Value};

fn schools_generate_id(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    Ok(json!({ "schoolId": schools::generate_school_id(conn)? }))
}

fn schools_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    // Missing name/address fall through to the model's field validation.
    let name = optional_str(params, "name")?.unwrap_or_default();
    let address = optional_str(params, "address")?.unwrap_or_default();
    let school = schools::create(
        conn,
        NewSchool {
            name,
            address,
            phone: optional_str(params, "phone")?,
        },
    )?;
    Ok(json!({ "school": to_json(&school)? }))
}

fn schools_get(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let school_id = required_str(params, "schoolId")?;
    let school = schools::get(conn, &school_id)?;
    Ok(json!({ "school": to_json(&school)? }))
}

fn schools_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let search = optional_str(params, "search")?;
    let rows = schools::list(conn, search.as_deref())?;
    Ok(json!({ "schools": to_json(&rows)? }))
}

fn schools_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let school_id = required_str(params, "schoolId")?;
    let patch = patch_obj(params)?;
    let patch = SchoolPatch {
        name: patch_str(patch, "name")?,
        address: patch_str(patch, "address")?,
        phone: patch_nullable_str(patch, "phone")?,
    };
    let changed = !patch.is_empty();
    let school = schools::update(conn, &school_id, patch)?;
    Ok(json!({ "school": to_json(&school)?, "changed": changed }))
}

fn schools_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let school_id = required_str(params, "schoolId")?;
    schools::delete(conn, &school_id)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "schools.generateId" => Some(with_db(state, req, schools_generate_id)),
        "schools.create" => Some(with_db(state, req, schools_create)),
        "schools.get" => Some(with_db(state, req, schools_get)),
        "schools.list" => Some(list_with_db(state, req, "schools", schools_list)),
        "schools.update" => Some(with_db(state, req, schools_update)),
        "schools.delete" => Some(with_db(state, req, schools_delete)),
        _ => None,
    }
}
