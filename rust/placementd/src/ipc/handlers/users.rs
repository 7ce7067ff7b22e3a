use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    list_with_db, optional_enum, optional_str, required_str, to_json, with_db,
};
use crate::ipc::types::{AppState, Request};
use crate::models::users::{self, UserRole};
use rusqlite::Connection;
use serde_json::{json, Value};

fn users_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let role: UserRole = optional_enum(params, "role")?
        .ok_or_else(|| HandlerErr::bad_params("missing role"))?;
    let full_name = required_str(params, "fullName")?;
    let email = optional_str(params, "email")?;
    let user = users::create(conn, role, &full_name, email.as_deref())?;
    Ok(json!({ "user": to_json(&user)? }))
}

fn users_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let role: Option<UserRole> = optional_enum(params, "role")?;
    let rows = users::list(conn, role)?;
    Ok(json!({ "users": to_json(&rows)? }))
}

fn users_get(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let user_id = required_str(params, "userId")?;
    let user = users::get(conn, &user_id)?;
    Ok(json!({ "user": to_json(&user)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "users.create" => Some(with_db(state, req, users_create)),
        "users.list" => Some(list_with_db(state, req, "users", users_list)),
        "users.get" => Some(with_db(state, req, users_get)),
        _ => None,
    }
}
