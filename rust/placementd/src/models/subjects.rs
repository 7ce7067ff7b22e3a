use super::users;
use super::{non_blank, require_text};
use crate::db;
use crate::error::{ModelError, Result};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Subject {
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Subject {
            id: r.get(0)?,
            code: r.get(1)?,
            name: r.get(2)?,
            description: r.get(3)?,
            created_by: r.get(4)?,
            created_at: r.get(5)?,
            updated_at: r.get(6)?,
        })
    }
}

const SELECT_SUBJECT: &str =
    "SELECT id, code, name, description, created_by, created_at, updated_at FROM subjects";

#[derive(Clone, Debug, Default)]
pub struct NewSubject {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct SubjectPatch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

impl SubjectPatch {
    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.name.is_none() && self.description.is_none()
    }
}

/// Subject codes are compared case-insensitively, so they are stored upper-case.
fn normalize_code(code: &str) -> Result<String> {
    let code = require_text("code", code, 20)?;
    if code.chars().any(char::is_whitespace) {
        return Err(ModelError::validation("code", "code must not contain spaces"));
    }
    Ok(code.to_ascii_uppercase())
}

pub fn create(conn: &Connection, input: NewSubject) -> Result<Subject> {
    let code = normalize_code(&input.code)?;
    let name = require_text("name", &input.name, 200)?;
    let description = non_blank(input.description.as_deref());
    let created_by = non_blank(input.created_by.as_deref());
    if let Some(owner) = created_by.as_deref() {
        users::get(conn, owner)?;
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO subjects(id, code, name, description, created_by, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?,
                strftime('%Y-%m-%dT%H:%M:%SZ','now'),
                strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (&id, &code, &name, &description, &created_by),
    )
    .map_err(|e| match ModelError::from(e) {
        ModelError::Conflict(_) => {
            ModelError::Conflict(format!("subject code {} already exists", code))
        }
        other => other,
    })?;
    tracing::info!(subject_id = %id, code = %code, "created subject");
    get(conn, &id)
}

pub fn find(conn: &Connection, id: &str) -> Result<Option<Subject>> {
    let sql = format!("{} WHERE id = ?", SELECT_SUBJECT);
    Ok(conn.query_row(&sql, [id], Subject::from_row).optional()?)
}

pub fn get(conn: &Connection, id: &str) -> Result<Subject> {
    find(conn, id)?.ok_or(ModelError::NotFound("subject"))
}

pub fn list(conn: &Connection, created_by: Option<&str>) -> Result<Vec<Subject>> {
    let mut sql = String::from(SELECT_SUBJECT);
    let mut binds: Vec<Value> = Vec::new();
    if let Some(owner) = created_by {
        sql.push_str(" WHERE created_by = ?");
        binds.push(Value::Text(owner.to_string()));
    }
    sql.push_str(" ORDER BY code");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(binds), Subject::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Applies `patch`; an empty patch is a no-op.
pub fn update(conn: &Connection, id: &str, patch: SubjectPatch) -> Result<Subject> {
    let current = get(conn, id)?;
    if patch.is_empty() {
        return Ok(current);
    }

    let mut set_parts: Vec<&str> = Vec::new();
    let mut bind_values: Vec<Value> = Vec::new();
    if let Some(code) = patch.code.as_deref() {
        set_parts.push("code = ?");
        bind_values.push(Value::Text(normalize_code(code)?));
    }
    if let Some(name) = patch.name.as_deref() {
        set_parts.push("name = ?");
        bind_values.push(Value::Text(require_text("name", name, 200)?));
    }
    if let Some(description) = &patch.description {
        set_parts.push("description = ?");
        bind_values.push(
            non_blank(description.as_deref())
                .map(Value::Text)
                .unwrap_or(Value::Null),
        );
    }
    set_parts.push("updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')");

    let sql = format!("UPDATE subjects SET {} WHERE id = ?", set_parts.join(", "));
    bind_values.push(Value::Text(id.to_string()));
    conn.execute(&sql, params_from_iter(bind_values))?;
    tracing::info!(subject_id = %id, "updated subject");
    get(conn, id)
}

/// Deletes a subject that no lesson plan references.
pub fn delete(conn: &Connection, id: &str) -> Result<()> {
    let tx = db::write_tx(conn)?;
    get(&tx, id)?;
    let plans: i64 = tx.query_row(
        "SELECT COUNT(*) FROM lesson_plans WHERE subject_id = ?",
        [id],
        |r| r.get(0),
    )?;
    if plans > 0 {
        return Err(ModelError::InUse(format!(
            "subject is used by {} lesson plan(s)",
            plans
        )));
    }
    tx.execute("DELETE FROM subjects WHERE id = ?", [id])?;
    tx.commit()?;
    tracing::info!(subject_id = %id, "deleted subject");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::users::UserRole;

    fn math() -> NewSubject {
        NewSubject {
            code: " math101 ".into(),
            name: "Mathematics".into(),
            description: Some("Algebra and geometry".into()),
            created_by: None,
        }
    }

    #[test]
    fn code_is_normalized_and_unique() {
        let conn = db::open_in_memory().expect("open");
        let s = create(&conn, math()).expect("create");
        assert_eq!(s.code, "MATH101");
        let e = create(&conn, math()).unwrap_err();
        assert_eq!(e.code(), "conflict");
        assert_eq!(e.to_string(), "subject code MATH101 already exists");
    }

    #[test]
    fn list_filters_by_owner() {
        let conn = db::open_in_memory().expect("open");
        let t = users::create(&conn, UserRole::Teacher, "T", None).expect("teacher");
        create(&conn, math()).expect("unowned");
        create(
            &conn,
            NewSubject {
                code: "PHY".into(),
                name: "Physics".into(),
                created_by: Some(t.id.clone()),
                ..Default::default()
            },
        )
        .expect("owned");
        assert_eq!(list(&conn, None).expect("all").len(), 2);
        let mine = list(&conn, Some(&t.id)).expect("mine");
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].code, "PHY");

        let e = create(
            &conn,
            NewSubject {
                code: "CHEM".into(),
                name: "Chemistry".into(),
                created_by: Some("ghost".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(e.code(), "not_found");
    }

    #[test]
    fn empty_patch_is_noop_and_description_clears() {
        let conn = db::open_in_memory().expect("open");
        let s = create(&conn, math()).expect("create");
        conn.execute(
            "UPDATE subjects SET updated_at = '2000-01-01T00:00:00Z' WHERE id = ?",
            [&s.id],
        )
        .expect("backdate");
        let same = update(&conn, &s.id, SubjectPatch::default()).expect("noop");
        assert_eq!(same.updated_at, "2000-01-01T00:00:00Z");

        let cleared = update(
            &conn,
            &s.id,
            SubjectPatch {
                description: Some(None),
                ..Default::default()
            },
        )
        .expect("clear");
        assert_eq!(cleared.description, None);
    }
}
