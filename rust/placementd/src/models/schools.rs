use crate::db;
use crate::error::{ModelError, Result};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;

pub const SCHOOL_ID_PREFIX: &str = "SCH";

pub const NAME_LEN: (usize, usize) = (2, 200);
pub const ADDRESS_LEN: (usize, usize) = (10, 500);
pub const PHONE_LEN: (usize, usize) = (10, 15);

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct School {
    pub id: i64,
    pub school_id: String,
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl School {
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(School {
            id: r.get(0)?,
            school_id: r.get(1)?,
            name: r.get(2)?,
            address: r.get(3)?,
            phone: r.get(4)?,
            created_at: r.get(5)?,
            updated_at: r.get(6)?,
        })
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolSummary {
    #[serde(flatten)]
    pub school: School,
    pub open_assignment_count: i64,
}

const SELECT_SCHOOL: &str =
    "SELECT id, school_id, name, address, phone, created_at, updated_at FROM schools";

#[derive(Clone, Debug, Default)]
pub struct NewSchool {
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
}

/// Field changes for [`update`]; `None` leaves a field as is.
#[derive(Clone, Debug, Default)]
pub struct SchoolPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    /// `Some(None)` clears the phone number.
    pub phone: Option<Option<String>>,
}

impl SchoolPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.address.is_none() && self.phone.is_none()
    }
}

fn check_len(field: &'static str, value: &str, (min, max): (usize, usize)) -> Result<String> {
    let value = value.trim();
    let n = value.chars().count();
    if n < min || n > max {
        return Err(ModelError::validation(
            field,
            format!("{} must be between {} and {} characters", field, min, max),
        ));
    }
    Ok(value.to_string())
}

pub fn validate_name(name: &str) -> Result<String> {
    check_len("name", name, NAME_LEN)
}

pub fn validate_address(address: &str) -> Result<String> {
    check_len("address", address, ADDRESS_LEN)
}

/// Blank phone numbers are stored as NULL.
pub fn validate_phone(phone: Option<&str>) -> Result<Option<String>> {
    match phone.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => check_len("phone", p, PHONE_LEN).map(Some),
        None => Ok(None),
    }
}

pub fn format_school_id(n: i64) -> String {
    format!("{}{:03}", SCHOOL_ID_PREFIX, n)
}

/// Next free business key: `SCH001` on an empty table, otherwise one past the
/// highest numeric suffix in use.
pub fn generate_school_id(conn: &Connection) -> Result<String> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(CAST(SUBSTR(school_id, 4) AS INTEGER))
         FROM schools
         WHERE school_id LIKE 'SCH%'",
        [],
        |r| r.get(0),
    )?;
    Ok(format_school_id(max.unwrap_or(0) + 1))
}

pub fn create(conn: &Connection, input: NewSchool) -> Result<School> {
    let name = validate_name(&input.name)?;
    let address = validate_address(&input.address)?;
    let phone = validate_phone(input.phone.as_deref())?;

    // Generation and insert share the write lock so two creators can't pick
    // the same key.
    let tx = db::write_tx(conn)?;
    let school_id = generate_school_id(&tx)?;
    tx.execute(
        "INSERT INTO schools(school_id, name, address, phone, created_at, updated_at)
         VALUES(?, ?, ?, ?,
                strftime('%Y-%m-%dT%H:%M:%SZ','now'),
                strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (&school_id, &name, &address, &phone),
    )?;
    tx.commit()?;
    tracing::info!(school_id = %school_id, "created school");
    get(conn, &school_id)
}

pub fn find(conn: &Connection, school_id: &str) -> Result<Option<School>> {
    let sql = format!("{} WHERE school_id = ?", SELECT_SCHOOL);
    Ok(conn.query_row(&sql, [school_id], School::from_row).optional()?)
}

pub fn get(conn: &Connection, school_id: &str) -> Result<School> {
    find(conn, school_id)?.ok_or(ModelError::NotFound("school"))
}

pub fn require(conn: &Connection, school_id: &str) -> Result<()> {
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM schools WHERE school_id = ?", [school_id], |r| {
            r.get(0)
        })
        .optional()?;
    match exists {
        Some(_) => Ok(()),
        None => Err(ModelError::NotFound("school")),
    }
}

/// Lists schools ordered by name, optionally filtered by a case-insensitive
/// substring of name, address or school id.
pub fn list(conn: &Connection, search: Option<&str>) -> Result<Vec<SchoolSummary>> {
    let mut sql = String::from(
        "SELECT s.id, s.school_id, s.name, s.address, s.phone, s.created_at, s.updated_at,
           (SELECT COUNT(*) FROM internship_assignments a
             WHERE a.school_id = s.school_id AND a.status <> 'cancelled') AS open_count
         FROM schools s",
    );
    let mut binds: Vec<Value> = Vec::new();
    if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
        sql.push_str(
            " WHERE s.name LIKE ? ESCAPE '\\'
                 OR s.address LIKE ? ESCAPE '\\'
                 OR s.school_id LIKE ? ESCAPE '\\'",
        );
        let pattern = format!("%{}%", escape_like(term));
        for _ in 0..3 {
            binds.push(Value::Text(pattern.clone()));
        }
    }
    sql.push_str(" ORDER BY s.name COLLATE NOCASE, s.school_id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(binds), |r| {
            Ok(SchoolSummary {
                school: School::from_row(r)?,
                open_assignment_count: r.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Applies `patch`. An empty patch is a successful no-op that leaves
/// `updated_at` untouched.
pub fn update(conn: &Connection, school_id: &str, patch: SchoolPatch) -> Result<School> {
    let current = get(conn, school_id)?;
    if patch.is_empty() {
        return Ok(current);
    }

    let mut set_parts: Vec<&str> = Vec::new();
    let mut bind_values: Vec<Value> = Vec::new();
    if let Some(name) = patch.name.as_deref() {
        set_parts.push("name = ?");
        bind_values.push(Value::Text(validate_name(name)?));
    }
    if let Some(address) = patch.address.as_deref() {
        set_parts.push("address = ?");
        bind_values.push(Value::Text(validate_address(address)?));
    }
    if let Some(phone) = &patch.phone {
        set_parts.push("phone = ?");
        bind_values.push(match validate_phone(phone.as_deref())? {
            Some(p) => Value::Text(p),
            None => Value::Null,
        });
    }
    set_parts.push("updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')");

    let sql = format!(
        "UPDATE schools SET {} WHERE school_id = ?",
        set_parts.join(", ")
    );
    bind_values.push(Value::Text(school_id.to_string()));
    conn.execute(&sql, params_from_iter(bind_values))?;
    tracing::info!(school_id = %school_id, "updated school");
    get(conn, school_id)
}

/// Deletes a school together with its quotas. Schools that still have
/// assignment history are kept.
pub fn delete(conn: &Connection, school_id: &str) -> Result<()> {
    let tx = db::write_tx(conn)?;
    require(&tx, school_id)?;
    let assignments: i64 = tx.query_row(
        "SELECT COUNT(*) FROM internship_assignments WHERE school_id = ?",
        [school_id],
        |r| r.get(0),
    )?;
    if assignments > 0 {
        return Err(ModelError::InUse(format!(
            "school {} has {} assignment(s)",
            school_id, assignments
        )));
    }
    tx.execute("DELETE FROM school_quotas WHERE school_id = ?", [school_id])?;
    tx.execute("DELETE FROM schools WHERE school_id = ?", [school_id])?;
    tx.commit()?;
    tracing::info!(school_id = %school_id, "deleted school");
    Ok(())
}
