use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{patch_obj, required_str, with_db};
use crate::ipc::types::{AppState, Request};
use crate::setup::{self, SetupSection};
use rusqlite::Connection;
use serde_json::{Map, Value};

fn setup_get(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    let mut out = Map::new();
    for section in SetupSection::ALL {
        out.insert(section.name().to_string(), setup::load_section(conn, section)?);
    }
    Ok(Value::Object(out))
}

fn setup_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let name = required_str(params, "section")?;
    let section = SetupSection::parse(&name)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown setup section: {}", name)))?;
    let patch = patch_obj(params)?;
    let mut current = setup::load_section(conn, section)?;
    setup::merge_section_patch(section, &mut current, patch).map_err(HandlerErr::bad_params)?;
    setup::save_section(conn, section, &current)?;
    tracing::info!(section = section.name(), "updated setup");
    Ok(current)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "setup.get" => Some(with_db(state, req, setup_get)),
        "setup.update" => Some(with_db(state, req, setup_update)),
        _ => None,
    }
}
