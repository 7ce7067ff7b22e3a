use super::{check_date_range, non_blank};
use crate::db;
use crate::error::{ModelError, Result};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicYear {
    pub id: String,
    pub year: i64,
    pub semester: i64,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

impl AcademicYear {
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(AcademicYear {
            id: r.get(0)?,
            year: r.get(1)?,
            semester: r.get(2)?,
            start_date: r.get(3)?,
            end_date: r.get(4)?,
            is_active: r.get::<_, i64>(5)? != 0,
            created_at: r.get(6)?,
        })
    }
}

const SELECT_YEAR: &str =
    "SELECT id, year, semester, start_date, end_date, is_active, created_at FROM academic_years";

#[derive(Clone, Debug, Default)]
pub struct NewAcademicYear {
    pub year: i64,
    pub semester: i64,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub is_active: bool,
}

pub fn create(conn: &Connection, input: NewAcademicYear) -> Result<AcademicYear> {
    if !(1900..=2200).contains(&input.year) {
        return Err(ModelError::validation("year", "year must be in 1900..=2200"));
    }
    if !(1..=3).contains(&input.semester) {
        return Err(ModelError::validation("semester", "semester must be 1, 2 or 3"));
    }
    let start_date = non_blank(input.start_date.as_deref());
    let end_date = non_blank(input.end_date.as_deref());
    check_date_range(start_date.as_deref(), end_date.as_deref())?;

    let tx = db::write_tx(conn)?;
    if input.is_active {
        tx.execute("UPDATE academic_years SET is_active = 0 WHERE is_active = 1", [])?;
    }
    let id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO academic_years(id, year, semester, start_date, end_date, is_active, created_at)
         VALUES(?, ?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (
            &id,
            input.year,
            input.semester,
            &start_date,
            &end_date,
            input.is_active as i64,
        ),
    )?;
    tx.commit()?;
    tracing::info!(
        academic_year_id = %id,
        year = input.year,
        semester = input.semester,
        "created academic year"
    );
    get(conn, &id)
}

pub fn find(conn: &Connection, id: &str) -> Result<Option<AcademicYear>> {
    let sql = format!("{} WHERE id = ?", SELECT_YEAR);
    Ok(conn.query_row(&sql, [id], AcademicYear::from_row).optional()?)
}

pub fn get(conn: &Connection, id: &str) -> Result<AcademicYear> {
    find(conn, id)?.ok_or(ModelError::NotFound("academic year"))
}

pub fn require(conn: &Connection, id: &str) -> Result<()> {
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM academic_years WHERE id = ?", [id], |r| r.get(0))
        .optional()?;
    match exists {
        Some(_) => Ok(()),
        None => Err(ModelError::NotFound("academic year")),
    }
}

pub fn list(conn: &Connection) -> Result<Vec<AcademicYear>> {
    let sql = format!("{} ORDER BY year DESC, semester DESC", SELECT_YEAR);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], AcademicYear::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Marks `id` as the single active academic year.
pub fn activate(conn: &Connection, id: &str) -> Result<AcademicYear> {
    let tx = db::write_tx(conn)?;
    require(&tx, id)?;
    tx.execute(
        "UPDATE academic_years SET is_active = CASE WHEN id = ? THEN 1 ELSE 0 END",
        [id],
    )?;
    tx.commit()?;
    tracing::info!(academic_year_id = %id, "activated academic year");
    get(conn, id)
}

pub fn active(conn: &Connection) -> Result<Option<AcademicYear>> {
    let sql = format!("{} WHERE is_active = 1 LIMIT 1", SELECT_YEAR);
    Ok(conn.query_row(&sql, [], AcademicYear::from_row).optional()?)
}
