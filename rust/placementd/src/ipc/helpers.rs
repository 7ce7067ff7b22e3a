use super::error::{ok, HandlerErr};
use super::types::{AppState, Request};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{Map, Value};
use std::str::FromStr;

/// Runs `f` against the open workspace database and wraps its outcome in the
/// response envelope.
pub fn with_db<F>(state: &AppState, req: &Request, f: F) -> Value
where
    F: FnOnce(&Connection, &Value) -> Result<Value, HandlerErr>,
{
    let Some(conn) = state.db.as_ref() else {
        return HandlerErr {
            code: "no_workspace",
            message: "select a workspace first".to_string(),
            details: None,
        }
        .response(&req.id);
    };
    match f(conn, &req.params) {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

/// Like [`with_db`], but list methods answer with an empty collection under
/// `key` before a workspace is open.
pub fn list_with_db<F>(state: &AppState, req: &Request, key: &str, f: F) -> Value
where
    F: FnOnce(&Connection, &Value) -> Result<Value, HandlerErr>,
{
    if state.db.is_none() {
        let mut empty = Map::new();
        empty.insert(key.to_string(), Value::Array(Vec::new()));
        return ok(&req.id, Value::Object(empty));
    }
    with_db(state, req, f)
}

pub fn to_json<T: Serialize>(v: &T) -> Result<Value, HandlerErr> {
    Ok(serde_json::to_value(v)?)
}

pub fn required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Absent and `null` both read as `None`.
pub fn optional_str(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

pub fn optional_i64(params: &Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key))),
    }
}

pub fn optional_bool(params: &Value, key: &str) -> Result<Option<bool>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be boolean", key))),
    }
}

pub fn optional_enum<T: FromStr>(params: &Value, key: &str) -> Result<Option<T>, HandlerErr> {
    match optional_str(params, key)? {
        None => Ok(None),
        Some(s) => s
            .trim()
            .to_ascii_lowercase()
            .parse()
            .map(Some)
            .map_err(|_| HandlerErr::bad_params(format!("invalid {}: {}", key, s))),
    }
}

pub fn patch_obj(params: &Value) -> Result<&Map<String, Value>, HandlerErr> {
    params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("missing/invalid patch"))
}

/// Reads a patch field where `null` means "clear": absent → `None`,
/// `null` → `Some(None)`, string → `Some(Some(s))`.
pub fn patch_nullable_str(
    patch: &Map<String, Value>,
    key: &str,
) -> Result<Option<Option<String>>, HandlerErr> {
    match patch.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(s)) => Ok(Some(Some(s.clone()))),
        Some(_) => Err(HandlerErr::bad_params(format!(
            "patch.{} must be a string or null",
            key
        ))),
    }
}

pub fn patch_str(patch: &Map<String, Value>, key: &str) -> Result<Option<String>, HandlerErr> {
    match patch.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(HandlerErr::bad_params(format!(
            "patch.{} must be a string",
            key
        ))),
    }
}
