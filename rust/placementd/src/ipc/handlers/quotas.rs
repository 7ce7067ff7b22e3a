use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    list_with_db, optional_bool, optional_i64, optional_str, required_str, to_json, with_db,
};
use crate::ipc::types::{AppState, Request};
use crate::models::quotas::{self, QuotaFilter, QuotaInput};
use crate::setup::PlacementDefaults;
use rusqlite::Connection;
use serde_json::{json, Value};

fn quota_key(params: &Value) -> Result<(String, String), HandlerErr> {
    Ok((
        required_str(params, "schoolId")?,
        required_str(params, "academicYearId")?,
    ))
}

fn quotas_get(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let (school_id, year_id) = quota_key(params)?;
    let quota = quotas::get(conn, &school_id, &year_id)?;
    Ok(json!({ "quota": to_json(&quota)? }))
}

fn quotas_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let filter = QuotaFilter {
        school_id: optional_str(params, "schoolId")?,
        academic_year_id: optional_str(params, "academicYearId")?,
    };
    let rows = quotas::list(conn, &filter)?;
    Ok(json!({ "quotas": to_json(&rows)? }))
}

fn quotas_upsert(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let (school_id, year_id) = quota_key(params)?;
    let input = QuotaInput {
        max_students: optional_i64(params, "maxStudents")?,
        max_teachers: optional_i64(params, "maxTeachers")?,
        is_open: optional_bool(params, "isOpen")?,
    };
    let defaults = PlacementDefaults::load(conn)?;
    let quota = quotas::upsert(conn, &school_id, &year_id, input, &defaults)?;
    Ok(json!({ "quota": to_json(&quota)? }))
}

fn quotas_set_open(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let (school_id, year_id) = quota_key(params)?;
    let open = optional_bool(params, "isOpen")?
        .ok_or_else(|| HandlerErr::bad_params("missing isOpen"))?;
    let quota = quotas::set_open(conn, &school_id, &year_id, open)?;
    Ok(json!({ "quota": to_json(&quota)? }))
}

fn quotas_can_accept(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let (school_id, year_id) = quota_key(params)?;
    let admission = quotas::can_accept_student(conn, &school_id, &year_id)?;
    to_json(&admission)
}

fn quotas_recalculate(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let (school_id, year_id) = quota_key(params)?;
    let quota = quotas::recalculate(conn, &school_id, &year_id)?;
    Ok(json!({ "quota": to_json(&quota)? }))
}

fn quotas_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let (school_id, year_id) = quota_key(params)?;
    quotas::delete(conn, &school_id, &year_id)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "quotas.get" => Some(with_db(state, req, quotas_get)),
        "quotas.list" => Some(list_with_db(state, req, "quotas", quotas_list)),
        "quotas.upsert" => Some(with_db(state, req, quotas_upsert)),
        "quotas.setOpen" => Some(with_db(state, req, quotas_set_open)),
        "quotas.canAccept" => Some(with_db(state, req, quotas_can_accept)),
        "quotas.recalculate" => Some(with_db(state, req, quotas_recalculate)),
        "quotas.delete" => Some(with_db(state, req, quotas_delete)),
        _ => None,
    }
}
