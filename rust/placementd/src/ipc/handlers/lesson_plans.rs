use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    list_with_db, optional_enum, optional_str, patch_obj, patch_str, required_str, to_json,
    with_db,
};
use crate::ipc::types::{AppState, Request};
use crate::models::lesson_plans::{self, LessonPlanPatch, LessonPlanStatus, NewLessonPlan};
use crate::setup;
use rusqlite::Connection;
use serde_json::{json, Value};

fn plans_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let status = match optional_enum::<LessonPlanStatus>(params, "status")? {
        Some(s) => s,
        None => setup::default_lesson_status(conn)?,
    };
    let plan = lesson_plans::create(
        conn,
        NewLessonPlan {
            subject_id: required_str(params, "subjectId")?,
            teacher_id: required_str(params, "teacherId")?,
            title: optional_str(params, "title")?.unwrap_or_default(),
            content: optional_str(params, "content")?.unwrap_or_default(),
            status,
        },
    )?;
    Ok(json!({ "lessonPlan": to_json(&plan)? }))
}

fn plans_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let subject_id = optional_str(params, "subjectId")?;
    let teacher_id = optional_str(params, "teacherId")?;
    let rows = lesson_plans::list(conn, subject_id.as_deref(), teacher_id.as_deref())?;
    Ok(json!({ "lessonPlans": to_json(&rows)? }))
}

fn plans_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "lessonPlanId")?;
    let patch = patch_obj(params)?;
    let plan = lesson_plans::update(
        conn,
        &id,
        LessonPlanPatch {
            title: patch_str(patch, "title")?,
            content: patch_str(patch, "content")?,
            status: optional_enum::<LessonPlanStatus>(&params["patch"], "status")?,
        },
    )?;
    Ok(json!({ "lessonPlan": to_json(&plan)? }))
}

fn plans_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_str(params, "lessonPlanId")?;
    lesson_plans::delete(conn, &id)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "lessonPlans.create" => Some(with_db(state, req, plans_create)),
        "lessonPlans.list" => Some(list_with_db(state, req, "lessonPlans", plans_list)),
        "lessonPlans.update" => Some(with_db(state, req, plans_update)),
        "lessonPlans.delete" => Some(with_db(state, req, plans_delete)),
        _ => None,
    }
}
