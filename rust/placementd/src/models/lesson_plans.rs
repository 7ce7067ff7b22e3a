use super::users::{self, UserRole};
use super::{require_text, subjects, text_enum};
use crate::error::{ModelError, Result};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonPlanStatus {
    Draft,
    Published,
    Archived,
}

text_enum!(LessonPlanStatus {
    Draft => "draft",
    Published => "published",
    Archived => "archived",
});

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPlan {
    pub id: String,
    pub subject_id: String,
    pub teacher_id: String,
    pub title: String,
    pub content: String,
    pub status: LessonPlanStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl LessonPlan {
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(LessonPlan {
            id: r.get(0)?,
            subject_id: r.get(1)?,
            teacher_id: r.get(2)?,
            title: r.get(3)?,
            content: r.get(4)?,
            status: r.get(5)?,
            created_at: r.get(6)?,
            updated_at: r.get(7)?,
        })
    }
}

const SELECT_PLAN: &str = "SELECT id, subject_id, teacher_id, title, content, status, created_at, updated_at
  FROM lesson_plans";

#[derive(Clone, Debug)]
pub struct NewLessonPlan {
    pub subject_id: String,
    pub teacher_id: String,
    pub title: String,
    pub content: String,
    pub status: LessonPlanStatus,
}

#[derive(Clone, Debug, Default)]
pub struct LessonPlanPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<LessonPlanStatus>,
}

pub fn create(conn: &Connection, input: NewLessonPlan) -> Result<LessonPlan> {
    let title = require_text("title", &input.title, 200)?;
    subjects::get(conn, &input.subject_id)?;
    users::require_role(conn, &input.teacher_id, UserRole::Teacher, "teacherId")?;

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO lesson_plans(id, subject_id, teacher_id, title, content, status, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?,
                strftime('%Y-%m-%dT%H:%M:%SZ','now'),
                strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (
            &id,
            &input.subject_id,
            &input.teacher_id,
            &title,
            &input.content,
            input.status,
        ),
    )?;
    tracing::info!(lesson_plan_id = %id, subject_id = %input.subject_id, "created lesson plan");
    get(conn, &id)
}

pub fn get(conn: &Connection, id: &str) -> Result<LessonPlan> {
    let sql = format!("{} WHERE id = ?", SELECT_PLAN);
    conn.query_row(&sql, [id], LessonPlan::from_row)
        .optional()?
        .ok_or(ModelError::NotFound("lesson plan"))
}

pub fn list(
    conn: &Connection,
    subject_id: Option<&str>,
    teacher_id: Option<&str>,
) -> Result<Vec<LessonPlan>> {
    let mut sql = String::from(SELECT_PLAN);
    let mut where_parts: Vec<&str> = Vec::new();
    let mut binds: Vec<Value> = Vec::new();
    if let Some(s) = subject_id {
        where_parts.push("subject_id = ?");
        binds.push(Value::Text(s.to_string()));
    }
    if let Some(t) = teacher_id {
        where_parts.push("teacher_id = ?");
        binds.push(Value::Text(t.to_string()));
    }
    if !where_parts.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_parts.join(" AND "));
    }
    sql.push_str(" ORDER BY title COLLATE NOCASE, id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(binds), LessonPlan::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update(conn: &Connection, id: &str, patch: LessonPlanPatch) -> Result<LessonPlan> {
    let current = get(conn, id)?;
    let mut set_parts: Vec<&str> = Vec::new();
    let mut bind_values: Vec<Value> = Vec::new();
    if let Some(title) = patch.title.as_deref() {
        set_parts.push("title = ?");
        bind_values.push(Value::Text(require_text("title", title, 200)?));
    }
    if let Some(content) = patch.content {
        set_parts.push("content = ?");
        bind_values.push(Value::Text(content));
    }
    if let Some(status) = patch.status {
        set_parts.push("status = ?");
        bind_values.push(Value::Text(status.as_str().to_string()));
    }
    if set_parts.is_empty() {
        return Ok(current);
    }
    set_parts.push("updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')");
    let sql = format!("UPDATE lesson_plans SET {} WHERE id = ?", set_parts.join(", "));
    bind_values.push(Value::Text(id.to_string()));
    conn.execute(&sql, params_from_iter(bind_values))?;
    get(conn, id)
}

pub fn delete(conn: &Connection, id: &str) -> Result<()> {
    let changed = conn.execute("DELETE FROM lesson_plans WHERE id = ?", [id])?;
    if changed == 0 {
        return Err(ModelError::NotFound("lesson plan"));
    }
    tracing::info!(lesson_plan_id = %id, "deleted lesson plan");
    Ok(())
}
