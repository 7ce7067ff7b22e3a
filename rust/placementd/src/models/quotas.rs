//! Per-school, per-academic-year enrollment quotas and the admission check.
//!
//! `current_students` counts the non-cancelled assignments for the pair. It
//! is only ever changed through [`reserve_seat`], [`release_seat`] and
//! [`recalculate`], each under a [`db::write_tx`], so the read-compare-write
//! happens under the SQLite write lock.

use super::{academic_years, schools};
use crate::db;
use crate::error::{ModelError, Result};
use crate::setup::PlacementDefaults;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolQuota {
    pub id: String,
    pub school_id: String,
    pub academic_year_id: String,
    pub max_students: i64,
    pub max_teachers: i64,
    pub current_students: i64,
    pub is_open: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl SchoolQuota {
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(SchoolQuota {
            id: r.get(0)?,
            school_id: r.get(1)?,
            academic_year_id: r.get(2)?,
            max_students: r.get(3)?,
            max_teachers: r.get(4)?,
            current_students: r.get(5)?,
            is_open: r.get::<_, i64>(6)? != 0,
            created_at: r.get(7)?,
            updated_at: r.get(8)?,
        })
    }

    pub fn available_slots(&self) -> i64 {
        (self.max_students - self.current_students).max(0)
    }
}

const SELECT_QUOTA: &str = "SELECT id, school_id, academic_year_id, max_students, max_teachers,
       current_students, is_open, created_at, updated_at
  FROM school_quotas";

/// Outcome of the admission check for one (school, academic year) pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Admission {
    pub can_accept: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub available_slots: i64,
    pub max_students: i64,
    pub current_students: i64,
}

impl Admission {
    pub fn evaluate(quota: Option<&SchoolQuota>) -> Self {
        let Some(q) = quota else {
            return Admission::rejected(&ModelError::QuotaMissing, 0, 0, 0);
        };
        if !q.is_open {
            return Admission::rejected(
                &ModelError::QuotaClosed,
                q.available_slots(),
                q.max_students,
                q.current_students,
            );
        }
        if q.current_students >= q.max_students {
            return Admission::rejected(
                &ModelError::QuotaFull,
                0,
                q.max_students,
                q.current_students,
            );
        }
        Admission {
            can_accept: true,
            reason: None,
            available_slots: q.available_slots(),
            max_students: q.max_students,
            current_students: q.current_students,
        }
    }

    fn rejected(e: &ModelError, available_slots: i64, max: i64, current: i64) -> Self {
        Admission {
            can_accept: false,
            reason: Some(e.to_string()),
            available_slots,
            max_students: max,
            current_students: current,
        }
    }
}

fn admission_error(quota: Option<&SchoolQuota>) -> Option<ModelError> {
    match quota {
        None => Some(ModelError::QuotaMissing),
        Some(q) if !q.is_open => Some(ModelError::QuotaClosed),
        Some(q) if q.current_students >= q.max_students => Some(ModelError::QuotaFull),
        Some(_) => None,
    }
}

#[derive(Clone, Debug, Default)]
pub struct QuotaInput {
    pub max_students: Option<i64>,
    pub max_teachers: Option<i64>,
    pub is_open: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct QuotaFilter {
    pub school_id: Option<String>,
    pub academic_year_id: Option<String>,
}

pub fn find(
    conn: &Connection,
    school_id: &str,
    academic_year_id: &str,
) -> Result<Option<SchoolQuota>> {
    let sql = format!("{} WHERE school_id = ? AND academic_year_id = ?", SELECT_QUOTA);
    Ok(conn
        .query_row(&sql, [school_id, academic_year_id], SchoolQuota::from_row)
        .optional()?)
}

pub fn get(conn: &Connection, school_id: &str, academic_year_id: &str) -> Result<SchoolQuota> {
    find(conn, school_id, academic_year_id)?.ok_or(ModelError::NotFound("quota"))
}

pub fn list(conn: &Connection, filter: &QuotaFilter) -> Result<Vec<SchoolQuota>> {
    let mut sql = String::from(SELECT_QUOTA);
    let mut where_parts: Vec<&str> = Vec::new();
    let mut binds: Vec<Value> = Vec::new();
    if let Some(s) = &filter.school_id {
        where_parts.push("school_id = ?");
        binds.push(Value::Text(s.clone()));
    }
    if let Some(y) = &filter.academic_year_id {
        where_parts.push("academic_year_id = ?");
        binds.push(Value::Text(y.clone()));
    }
    if !where_parts.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_parts.join(" AND "));
    }
    sql.push_str(" ORDER BY school_id, academic_year_id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(binds), SchoolQuota::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn check_limit(field: &'static str, v: i64) -> Result<i64> {
    if v < 0 {
        return Err(ModelError::validation(field, format!("{} must be >= 0", field)));
    }
    Ok(v)
}

/// Creates or updates the quota for (school, academic year).
///
/// On insert, omitted fields come from `defaults`; on update they keep their
/// stored values. `max_students` can never drop below the enrolled count.
pub fn upsert(
    conn: &Connection,
    school_id: &str,
    academic_year_id: &str,
    input: QuotaInput,
    defaults: &PlacementDefaults,
) -> Result<SchoolQuota> {
    let max_students = input
        .max_students
        .map(|v| check_limit("maxStudents", v))
        .transpose()?;
    let max_teachers = input
        .max_teachers
        .map(|v| check_limit("maxTeachers", v))
        .transpose()?;

    let tx = db::write_tx(conn)?;
    schools::require(&tx, school_id)?;
    academic_years::require(&tx, academic_year_id)?;

    match find(&tx, school_id, academic_year_id)? {
        Some(existing) => {
            let max_students = max_students.unwrap_or(existing.max_students);
            if max_students < existing.current_students {
                return Err(ModelError::QuotaBelowEnrollment {
                    max: max_students,
                    current: existing.current_students,
                });
            }
            tx.execute(
                "UPDATE school_quotas
                 SET max_students = ?, max_teachers = ?, is_open = ?,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
                 WHERE id = ?",
                (
                    max_students,
                    max_teachers.unwrap_or(existing.max_teachers),
                    input.is_open.unwrap_or(existing.is_open) as i64,
                    &existing.id,
                ),
            )?;
        }
        None => {
            tx.execute(
                "INSERT INTO school_quotas(
                   id, school_id, academic_year_id, max_students, max_teachers,
                   current_students, is_open, created_at, updated_at
                 ) VALUES(?, ?, ?, ?, ?, 0, ?,
                          strftime('%Y-%m-%dT%H:%M:%SZ','now'),
                          strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
                (
                    Uuid::new_v4().to_string(),
                    school_id,
                    academic_year_id,
                    max_students.unwrap_or(defaults.max_students),
                    max_teachers.unwrap_or(defaults.max_teachers),
                    input.is_open.unwrap_or(defaults.open) as i64,
                ),
            )?;
        }
    }
    tx.commit()?;
    tracing::info!(school_id, academic_year_id, "upserted quota");
    get(conn, school_id, academic_year_id)
}

pub fn set_open(
    conn: &Connection,
    school_id: &str,
    academic_year_id: &str,
    open: bool,
) -> Result<SchoolQuota> {
    let changed = conn.execute(
        "UPDATE school_quotas
         SET is_open = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
         WHERE school_id = ? AND academic_year_id = ?",
        (open as i64, school_id, academic_year_id),
    )?;
    if changed == 0 {
        return Err(ModelError::NotFound("quota"));
    }
    tracing::info!(school_id, academic_year_id, open, "changed quota intake");
    get(conn, school_id, academic_year_id)
}

/// Read-only admission check.
pub fn can_accept_student(
    conn: &Connection,
    school_id: &str,
    academic_year_id: &str,
) -> Result<Admission> {
    let quota = find(conn, school_id, academic_year_id)?;
    Ok(Admission::evaluate(quota.as_ref()))
}

/// Runs the admission check and takes one seat. Caller must hold a write
/// transaction and commit it together with the assignment insert.
pub(crate) fn reserve_seat(tx: &Connection, school_id: &str, academic_year_id: &str) -> Result<()> {
    let quota = find(tx, school_id, academic_year_id)?;
    if let Some(e) = admission_error(quota.as_ref()) {
        tracing::debug!(school_id, academic_year_id, reason = %e, "admission rejected");
        return Err(e);
    }
    tx.execute(
        "UPDATE school_quotas
         SET current_students = current_students + 1,
             updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
         WHERE school_id = ? AND academic_year_id = ?",
        [school_id, academic_year_id],
    )?;
    Ok(())
}

/// Gives back one seat. A missing quota row is tolerated so assignments can
/// still be cancelled after their quota was removed.
pub(crate) fn release_seat(tx: &Connection, school_id: &str, academic_year_id: &str) -> Result<()> {
    tx.execute(
        "UPDATE school_quotas
         SET current_students = MAX(current_students - 1, 0),
             updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
         WHERE school_id = ? AND academic_year_id = ?",
        [school_id, academic_year_id],
    )?;
    Ok(())
}

/// Recomputes `current_students` from the assignments table.
pub fn recalculate(
    conn: &Connection,
    school_id: &str,
    academic_year_id: &str,
) -> Result<SchoolQuota> {
    let tx = db::write_tx(conn)?;
    let before = get(&tx, school_id, academic_year_id)?;
    let actual: i64 = tx.query_row(
        "SELECT COUNT(*) FROM internship_assignments
         WHERE school_id = ? AND academic_year_id = ? AND status <> 'cancelled'",
        [school_id, academic_year_id],
        |r| r.get(0),
    )?;
    if actual != before.current_students {
        tx.execute(
            "UPDATE school_quotas
             SET current_students = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
             WHERE id = ?",
            (actual, &before.id),
        )?;
        tracing::warn!(
            school_id,
            academic_year_id,
            stored = before.current_students,
            actual,
            "corrected drifted enrollment counter"
        );
    }
    if actual > before.max_students {
        tracing::warn!(
            school_id,
            academic_year_id,
            actual,
            max = before.max_students,
            "school is over quota"
        );
    }
    tx.commit()?;
    get(conn, school_id, academic_year_id)
}

pub fn delete(conn: &Connection, school_id: &str, academic_year_id: &str) -> Result<()> {
    let tx = db::write_tx(conn)?;
    let quota = get(&tx, school_id, academic_year_id)?;
    let open: i64 = tx.query_row(
        "SELECT COUNT(*) FROM internship_assignments
         WHERE school_id = ? AND academic_year_id = ? AND status <> 'cancelled'",
        [school_id, academic_year_id],
        |r| r.get(0),
    )?;
    if open > 0 {
        return Err(ModelError::InUse(format!(
            "quota has {} open assignment(s)",
            open
        )));
    }
    tx.execute("DELETE FROM school_quotas WHERE id = ?", [&quota.id])?;
    tx.commit()?;
    tracing::info!(school_id, academic_year_id, "deleted quota");
    Ok(())
}
