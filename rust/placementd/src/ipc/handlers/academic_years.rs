use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    list_with_db, optional_bool, optional_i64, optional_str, required_str, to_json, with_db,
};
use crate::ipc::types::{AppState, Request};
use crate::models::academic_years::{self, NewAcademicYear};
use rusqlite::Connection;
use serde_json::{json, Value};

fn years_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let year =
        optional_i64(params, "year")?.ok_or_else(|| HandlerErr::bad_params("missing year"))?;
    let semester = optional_i64(params, "semester")?
        .ok_or_else(|| HandlerErr::bad_params("missing semester"))?;
    let created = academic_years::create(
        conn,
        NewAcademicYear {
            year,
            semester,
            start_date: optional_str(params, "startDate")?,
            end_date: optional_str(params, "endDate")?,
            is_active: optional_bool(params, "isActive")?.unwrap_or(false),
        },
    )?;
    Ok(json!({ "academicYear": to_json(&created)? }))
}

fn years_list(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    let rows = academic_years::list(conn)?;
    Ok(json!({ "academicYears": to_json(&rows)? }))
}

fn years_get(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "academicYearId")?;
    let year = academic_years::get(conn, &id)?;
    Ok(json!({ "academicYear": to_json(&year)? }))
}

fn years_activate(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "academicYearId")?;
    let year = academic_years::activate(conn, &id)?;
    Ok(json!({ "academicYear": to_json(&year)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "academicYears.create" => Some(with_db(state, req, years_create)),
        "academicYears.list" => Some(list_with_db(state, req, "academicYears", years_list)),
        "academicYears.get" => Some(with_db(state, req, years_get)),
        "academicYears.activate" => Some(with_db(state, req, years_activate)),
        _ => None,
    }
}
