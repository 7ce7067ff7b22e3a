use super::{non_blank, require_text, text_enum};
use crate::error::{ModelError, Result};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Teacher,
    Admin,
}

text_enum!(UserRole {
    Student => "student",
    Teacher => "teacher",
    Admin => "admin",
});

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub role: UserRole,
    pub full_name: String,
    pub email: Option<String>,
    pub created_at: String,
}

impl User {
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(User {
            id: r.get(0)?,
            role: r.get(1)?,
            full_name: r.get(2)?,
            email: r.get(3)?,
            created_at: r.get(4)?,
        })
    }
}

const SELECT_USER: &str = "SELECT id, role, full_name, email, created_at FROM users";

pub fn create(
    conn: &Connection,
    role: UserRole,
    full_name: &str,
    email: Option<&str>,
) -> Result<User> {
    let full_name = require_text("fullName", full_name, 200)?;
    let email = non_blank(email).map(|e| e.to_ascii_lowercase());
    if let Some(e) = email.as_deref() {
        if !e.contains('@') {
            return Err(ModelError::validation("email", "email must contain '@'"));
        }
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO users(id, role, full_name, email, created_at)
         VALUES(?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (&id, role, &full_name, &email),
    )?;
    tracing::info!(user_id = %id, role = %role, "created user");
    get(conn, &id)
}

pub fn find(conn: &Connection, id: &str) -> Result<Option<User>> {
    let sql = format!("{} WHERE id = ?", SELECT_USER);
    Ok(conn.query_row(&sql, [id], User::from_row).optional()?)
}

pub fn get(conn: &Connection, id: &str) -> Result<User> {
    find(conn, id)?.ok_or(ModelError::NotFound("user"))
}

pub fn list(conn: &Connection, role: Option<UserRole>) -> Result<Vec<User>> {
    let rows = match role {
        Some(role) => {
            let sql = format!("{} WHERE role = ? ORDER BY full_name", SELECT_USER);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([role], User::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let sql = format!("{} ORDER BY full_name", SELECT_USER);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], User::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(rows)
}

/// Loads a user and checks that it holds `role`.
///
/// `field` names the request parameter that carried the id so validation
/// errors point at it.
pub fn require_role(
    conn: &Connection,
    id: &str,
    role: UserRole,
    field: &'static str,
) -> Result<User> {
    let Some(user) = find(conn, id)? else {
        return Err(ModelError::NotFound(match role {
            UserRole::Student => "student",
            UserRole::Teacher => "teacher",
            UserRole::Admin => "user",
        }));
    };
    if user.role != role {
        return Err(ModelError::validation(
            field,
            format!("{} must reference a {} (found {})", field, role, user.role),
        ));
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn create_and_filter_by_role() {
        let conn = db::open_in_memory().expect("open");
        let s = create(&conn, UserRole::Student, " Ada Lovelace ", Some("ADA@x.org"))
            .expect("student");
        assert_eq!(s.full_name, "Ada Lovelace");
        assert_eq!(s.email.as_deref(), Some("ada@x.org"));
        create(&conn, UserRole::Teacher, "Grace Hopper", None).expect("teacher");

        let students = list(&conn, Some(UserRole::Student)).expect("list");
        assert_eq!(students.len(), 1);
        assert_eq!(list(&conn, None).expect("list").len(), 2);
    }

    #[test]
    fn duplicate_email_is_a_conflict() {
        let conn = db::open_in_memory().expect("open");
        create(&conn, UserRole::Student, "A", Some("a@x.org")).expect("first");
        let e = create(&conn, UserRole::Student, "B", Some("a@x.org")).unwrap_err();
        assert_eq!(e.code(), "conflict");
    }

    #[test]
    fn require_role_rejects_wrong_role() {
        let conn = db::open_in_memory().expect("open");
        let t = create(&conn, UserRole::Teacher, "T", None).expect("teacher");
        let e = require_role(&conn, &t.id, UserRole::Student, "studentId").unwrap_err();
        assert_eq!(e.code(), "bad_params");
        let e = require_role(&conn, "nope", UserRole::Student, "studentId").unwrap_err();
        assert_eq!(e.code(), "not_found");
    }
}
