//! Internship assignments: one student placed at one school for one academic
//! year.
//!
//! Creation takes the write lock before checking for an existing open
//! assignment and before the quota check, and keeps it until the insert and
//! the seat reservation are committed. Two concurrent applications for the
//! last seat therefore serialize, and the loser sees `QuotaFull`.

use super::users::{self, UserRole};
use super::{academic_years, check_date_range, non_blank, quotas, schools, text_enum};
use crate::db;
use crate::error::{ModelError, Result};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Active,
    Completed,
    Cancelled,
}

text_enum!(AssignmentStatus {
    Active => "active",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl AssignmentStatus {
    /// Only open assignments move, and only forward. Re-writing the current
    /// status is allowed and changes nothing.
    pub fn can_transition_to(self, next: AssignmentStatus) -> bool {
        use AssignmentStatus::*;
        self == next || matches!((self, next), (Active, Completed) | (Active, Cancelled))
    }

    /// Whether the assignment occupies a seat in its school's quota.
    pub fn holds_seat(self) -> bool {
        self != AssignmentStatus::Cancelled
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub student_id: String,
    pub school_id: String,
    pub academic_year_id: String,
    pub teacher_id: Option<String>,
    pub status: AssignmentStatus,
    pub enrollment_date: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Assignment {
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Assignment {
            id: r.get(0)?,
            student_id: r.get(1)?,
            school_id: r.get(2)?,
            academic_year_id: r.get(3)?,
            teacher_id: r.get(4)?,
            status: r.get(5)?,
            enrollment_date: r.get(6)?,
            start_date: r.get(7)?,
            end_date: r.get(8)?,
            notes: r.get(9)?,
            created_at: r.get(10)?,
            updated_at: r.get(11)?,
        })
    }
}

const SELECT_ASSIGNMENT: &str = "SELECT id, student_id, school_id, academic_year_id, teacher_id,
       status, enrollment_date, start_date, end_date, notes, created_at, updated_at
  FROM internship_assignments";

#[derive(Clone, Debug, Default)]
pub struct NewAssignment {
    pub student_id: String,
    pub school_id: String,
    pub academic_year_id: String,
    pub teacher_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub notes: Option<String>,
}

/// Field changes for [`update`]. Nested `Option`s distinguish "leave as is"
/// (`None`) from "clear" (`Some(None)`).
#[derive(Clone, Debug, Default)]
pub struct AssignmentPatch {
    pub teacher_id: Option<Option<String>>,
    pub start_date: Option<Option<String>>,
    pub end_date: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub status: Option<AssignmentStatus>,
}

impl AssignmentPatch {
    pub fn is_empty(&self) -> bool {
        self.teacher_id.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.notes.is_none()
            && self.status.is_none()
    }
}

#[derive(Clone, Debug, Default)]
pub struct AssignmentFilter {
    pub student_id: Option<String>,
    pub school_id: Option<String>,
    pub academic_year_id: Option<String>,
    pub status: Option<AssignmentStatus>,
}

/// A student's own application: no supervising teacher or dates yet.
pub fn apply(
    conn: &Connection,
    student_id: &str,
    school_id: &str,
    academic_year_id: &str,
) -> Result<Assignment> {
    create(
        conn,
        NewAssignment {
            student_id: student_id.to_string(),
            school_id: school_id.to_string(),
            academic_year_id: academic_year_id.to_string(),
            ..Default::default()
        },
    )
}

pub fn create(conn: &Connection, input: NewAssignment) -> Result<Assignment> {
    let teacher_id = non_blank(input.teacher_id.as_deref());
    let start_date = non_blank(input.start_date.as_deref());
    let end_date = non_blank(input.end_date.as_deref());
    let notes = non_blank(input.notes.as_deref());
    check_date_range(start_date.as_deref(), end_date.as_deref())?;

    let tx = db::write_tx(conn)?;
    users::require_role(&tx, &input.student_id, UserRole::Student, "studentId")?;
    schools::require(&tx, &input.school_id)?;
    academic_years::require(&tx, &input.academic_year_id)?;
    if let Some(t) = teacher_id.as_deref() {
        users::require_role(&tx, t, UserRole::Teacher, "teacherId")?;
    }

    let existing: Option<String> = tx
        .query_row(
            "SELECT id FROM internship_assignments
             WHERE student_id = ? AND academic_year_id = ? AND status <> 'cancelled'",
            [&input.student_id, &input.academic_year_id],
            |r| r.get(0),
        )
        .optional()?;
    if let Some(existing_id) = existing {
        tracing::debug!(
            student_id = %input.student_id,
            existing_id = %existing_id,
            "duplicate application"
        );
        return Err(ModelError::DuplicateApplication);
    }

    quotas::reserve_seat(&tx, &input.school_id, &input.academic_year_id)?;

    let id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO internship_assignments(
           id, student_id, school_id, academic_year_id, teacher_id, status,
           enrollment_date, start_date, end_date, notes, created_at, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, date('now'), ?, ?, ?,
                  strftime('%Y-%m-%dT%H:%M:%SZ','now'),
                  strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (
            &id,
            &input.student_id,
            &input.school_id,
            &input.academic_year_id,
            &teacher_id,
            AssignmentStatus::Active,
            &start_date,
            &end_date,
            &notes,
        ),
    )?;
    tx.commit()?;
    tracing::info!(
        assignment_id = %id,
        student_id = %input.student_id,
        school_id = %input.school_id,
        academic_year_id = %input.academic_year_id,
        "created assignment"
    );
    get(conn, &id)
}

pub fn find(conn: &Connection, id: &str) -> Result<Option<Assignment>> {
    let sql = format!("{} WHERE id = ?", SELECT_ASSIGNMENT);
    Ok(conn.query_row(&sql, [id], Assignment::from_row).optional()?)
}

pub fn get(conn: &Connection, id: &str) -> Result<Assignment> {
    find(conn, id)?.ok_or(ModelError::NotFound("assignment"))
}

pub fn list(conn: &Connection, filter: &AssignmentFilter) -> Result<Vec<Assignment>> {
    let mut sql = String::from(SELECT_ASSIGNMENT);
    let mut where_parts: Vec<&str> = Vec::new();
    let mut binds: Vec<Value> = Vec::new();
    if let Some(v) = &filter.student_id {
        where_parts.push("student_id = ?");
        binds.push(Value::Text(v.clone()));
    }
    if let Some(v) = &filter.school_id {
        where_parts.push("school_id = ?");
        binds.push(Value::Text(v.clone()));
    }
    if let Some(v) = &filter.academic_year_id {
        where_parts.push("academic_year_id = ?");
        binds.push(Value::Text(v.clone()));
    }
    if let Some(v) = filter.status {
        where_parts.push("status = ?");
        binds.push(Value::Text(v.as_str().to_string()));
    }
    if !where_parts.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_parts.join(" AND "));
    }
    sql.push_str(" ORDER BY created_at DESC, id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(binds), Assignment::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Applies `patch`. An empty patch returns the stored row without writing.
pub fn update(conn: &Connection, id: &str, patch: AssignmentPatch) -> Result<Assignment> {
    let tx = db::write_tx(conn)?;
    let current = get(&tx, id)?;
    if patch.is_empty() {
        return Ok(current);
    }

    let mut set_parts: Vec<&str> = Vec::new();
    let mut bind_values: Vec<Value> = Vec::new();

    if let Some(teacher) = &patch.teacher_id {
        let teacher = non_blank(teacher.as_deref());
        if let Some(t) = teacher.as_deref() {
            users::require_role(&tx, t, UserRole::Teacher, "teacherId")?;
        }
        set_parts.push("teacher_id = ?");
        bind_values.push(teacher.map(Value::Text).unwrap_or(Value::Null));
    }

    let start_date = match &patch.start_date {
        Some(v) => non_blank(v.as_deref()),
        None => current.start_date.clone(),
    };
    let end_date = match &patch.end_date {
        Some(v) => non_blank(v.as_deref()),
        None => current.end_date.clone(),
    };
    if patch.start_date.is_some() || patch.end_date.is_some() {
        check_date_range(start_date.as_deref(), end_date.as_deref())?;
    }
    if patch.start_date.is_some() {
        set_parts.push("start_date = ?");
        bind_values.push(start_date.map(Value::Text).unwrap_or(Value::Null));
    }
    if patch.end_date.is_some() {
        set_parts.push("end_date = ?");
        bind_values.push(end_date.map(Value::Text).unwrap_or(Value::Null));
    }

    if let Some(notes) = &patch.notes {
        set_parts.push("notes = ?");
        bind_values.push(
            non_blank(notes.as_deref())
                .map(Value::Text)
                .unwrap_or(Value::Null),
        );
    }

    if let Some(next) = patch.status {
        if !current.status.can_transition_to(next) {
            return Err(ModelError::InvalidTransition {
                from: current.status,
                to: next,
            });
        }
        if next != current.status {
            set_parts.push("status = ?");
            bind_values.push(Value::Text(next.as_str().to_string()));
            if current.status.holds_seat() && !next.holds_seat() {
                quotas::release_seat(&tx, &current.school_id, &current.academic_year_id)?;
            }
        }
    }

    if set_parts.is_empty() {
        return Ok(current);
    }
    set_parts.push("updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')");
    let sql = format!(
        "UPDATE internship_assignments SET {} WHERE id = ?",
        set_parts.join(", ")
    );
    bind_values.push(Value::Text(id.to_string()));
    tx.execute(&sql, params_from_iter(bind_values))?;
    tx.commit()?;
    tracing::info!(assignment_id = %id, "updated assignment");
    get(conn, id)
}

/// Flips the status to `cancelled` and frees the seat. Cancelling twice is a
/// no-op; cancelling a completed placement is an invalid transition.
pub fn cancel(conn: &Connection, id: &str) -> Result<Assignment> {
    update(
        conn,
        id,
        AssignmentPatch {
            status: Some(AssignmentStatus::Cancelled),
            ..Default::default()
        },
    )
}

pub fn delete(conn: &Connection, id: &str) -> Result<()> {
    let tx = db::write_tx(conn)?;
    let current = get(&tx, id)?;
    if current.status.holds_seat() {
        quotas::release_seat(&tx, &current.school_id, &current.academic_year_id)?;
    }
    tx.execute("DELETE FROM internship_assignments WHERE id = ?", [id])?;
    tx.commit()?;
    tracing::info!(assignment_id = %id, "deleted assignment");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::academic_years::NewAcademicYear;
    use crate::models::quotas::QuotaInput;
    use crate::models::schools::NewSchool;
    use crate::setup::PlacementDefaults;

    struct Fixture {
        conn: Connection,
        school: String,
        year: String,
        students: Vec<String>,
        teacher: String,
    }

    fn fixture(max_students: i64) -> Fixture {
        let conn = db::open_in_memory().expect("open");
        let school = schools::create(
            &conn,
            NewSchool {
                name: "Alpha High".into(),
                address: "12 Long Street, Springfield".into(),
                phone: None,
            },
        )
        .expect("school")
        .school_id;
        let year = academic_years::create(
            &conn,
            NewAcademicYear {
                year: 2025,
                semester: 1,
                ..Default::default()
            },
        )
        .expect("year")
        .id;
        quotas::upsert(
            &conn,
            &school,
            &year,
            QuotaInput {
                max_students: Some(max_students),
                ..Default::default()
            },
            &PlacementDefaults {
                max_students: 10,
                max_teachers: 2,
                open: true,
            },
        )
        .expect("quota");
        let students = (0..3)
            .map(|i| {
                users::create(&conn, UserRole::Student, &format!("Student {}", i), None)
                    .expect("student")
                    .id
            })
            .collect();
        let teacher = users::create(&conn, UserRole::Teacher, "Teacher", None)
            .expect("teacher")
            .id;
        Fixture {
            conn,
            school,
            year,
            students,
            teacher,
        }
    }

    fn seats(f: &Fixture) -> i64 {
        quotas::get(&f.conn, &f.school, &f.year)
            .expect("quota")
            .current_students
    }

    #[test]
    fn status_transitions() {
        use AssignmentStatus::*;
        assert!(Active.can_transition_to(Completed));
        assert!(Active.can_transition_to(Cancelled));
        assert!(Completed.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Active));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Active));
        assert!("archived".parse::<AssignmentStatus>().is_err());
    }

    #[test]
    fn apply_takes_a_seat_and_cancel_returns_it() {
        let f = fixture(2);
        let a = apply(&f.conn, &f.students[0], &f.school, &f.year).expect("apply");
        assert_eq!(a.status, AssignmentStatus::Active);
        assert_eq!(seats(&f), 1);

        let c = cancel(&f.conn, &a.id).expect("cancel");
        assert_eq!(c.status, AssignmentStatus::Cancelled);
        assert_eq!(seats(&f), 0);

        // Idempotent.
        cancel(&f.conn, &a.id).expect("cancel again");
        assert_eq!(seats(&f), 0);
    }

    #[test]
    fn second_open_application_same_year_is_rejected() {
        let f = fixture(5);
        let a = apply(&f.conn, &f.students[0], &f.school, &f.year).expect("first");
        let e = apply(&f.conn, &f.students[0], &f.school, &f.year).unwrap_err();
        assert_eq!(e.code(), "duplicate_application");
        assert_eq!(seats(&f), 1);

        cancel(&f.conn, &a.id).expect("cancel");
        apply(&f.conn, &f.students[0], &f.school, &f.year).expect("reapply after cancel");
        assert_eq!(seats(&f), 1);
    }

    #[test]
    fn open_assignment_index_backs_the_model_check() {
        let f = fixture(5);
        apply(&f.conn, &f.students[0], &f.school, &f.year).expect("first");
        let e: ModelError = f
            .conn
            .execute(
                "INSERT INTO internship_assignments(
                   id, student_id, school_id, academic_year_id, status,
                   enrollment_date, created_at, updated_at
                 ) VALUES('raw', ?, ?, ?, 'active', '2025-01-01', 'x', 'x')",
                [&f.students[0], &f.school, &f.year],
            )
            .unwrap_err()
            .into();
        assert_eq!(e.code(), "conflict");
    }

    #[test]
    fn full_quota_rejects_and_leaves_no_row() {
        let f = fixture(1);
        apply(&f.conn, &f.students[0], &f.school, &f.year).expect("first");
        let e = apply(&f.conn, &f.students[1], &f.school, &f.year).unwrap_err();
        assert_eq!(e.code(), "quota_full");
        let rows = list(
            &f.conn,
            &AssignmentFilter {
                student_id: Some(f.students[1].clone()),
                ..Default::default()
            },
        )
        .expect("list");
        assert!(rows.is_empty());
        assert_eq!(seats(&f), 1);
    }

    #[test]
    fn closed_and_missing_quota_reject() {
        let f = fixture(3);
        quotas::set_open(&f.conn, &f.school, &f.year, false).expect("close");
        assert_eq!(
            apply(&f.conn, &f.students[0], &f.school, &f.year)
                .unwrap_err()
                .code(),
            "quota_closed"
        );
        let other_year = academic_years::create(
            &f.conn,
            NewAcademicYear {
                year: 2025,
                semester: 2,
                ..Default::default()
            },
        )
        .expect("year")
        .id;
        assert_eq!(
            apply(&f.conn, &f.students[0], &f.school, &other_year)
                .unwrap_err()
                .code(),
            "quota_missing"
        );
    }

    #[test]
    fn create_validates_references() {
        let f = fixture(3);
        let e = create(
            &f.conn,
            NewAssignment {
                student_id: f.teacher.clone(),
                school_id: f.school.clone(),
                academic_year_id: f.year.clone(),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(e, ModelError::Validation { field: "studentId", .. }));

        let e = create(
            &f.conn,
            NewAssignment {
                student_id: f.students[0].clone(),
                school_id: "SCH999".into(),
                academic_year_id: f.year.clone(),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(e.code(), "not_found");

        let a = create(
            &f.conn,
            NewAssignment {
                student_id: f.students[0].clone(),
                school_id: f.school.clone(),
                academic_year_id: f.year.clone(),
                teacher_id: Some(f.teacher.clone()),
                start_date: Some("2025-02-01".into()),
                end_date: Some("2025-05-30".into()),
                notes: Some("  ".into()),
            },
        )
        .expect("create");
        assert_eq!(a.teacher_id.as_deref(), Some(f.teacher.as_str()));
        assert_eq!(a.notes, None);
    }

    #[test]
    fn update_enforces_transitions() {
        let f = fixture(3);
        let a = apply(&f.conn, &f.students[0], &f.school, &f.year).expect("apply");
        let done = update(
            &f.conn,
            &a.id,
            AssignmentPatch {
                status: Some(AssignmentStatus::Completed),
                ..Default::default()
            },
        )
        .expect("complete");
        assert_eq!(done.status, AssignmentStatus::Completed);
        // Completed placements keep their seat.
        assert_eq!(seats(&f), 1);

        let e = update(
            &f.conn,
            &a.id,
            AssignmentPatch {
                status: Some(AssignmentStatus::Active),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(e.code(), "invalid_transition");
        assert_eq!(cancel(&f.conn, &a.id).unwrap_err().code(), "invalid_transition");
    }

    #[test]
    fn empty_update_does_not_touch_updated_at() {
        let f = fixture(3);
        let a = apply(&f.conn, &f.students[0], &f.school, &f.year).expect("apply");
        f.conn
            .execute(
                "UPDATE internship_assignments SET updated_at = '2000-01-01T00:00:00Z' WHERE id = ?",
                [&a.id],
            )
            .expect("backdate");
        let same = update(&f.conn, &a.id, AssignmentPatch::default()).expect("noop");
        assert_eq!(same.updated_at, "2000-01-01T00:00:00Z");

        let e = update(
            &f.conn,
            &a.id,
            AssignmentPatch {
                start_date: Some(Some("2025-06-01".into())),
                end_date: Some(Some("2025-01-01".into())),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(e.code(), "bad_params");

        let patched = update(
            &f.conn,
            &a.id,
            AssignmentPatch {
                teacher_id: Some(Some(f.teacher.clone())),
                notes: Some(Some("weekly check-ins".into())),
                ..Default::default()
            },
        )
        .expect("patch");
        assert_eq!(patched.notes.as_deref(), Some("weekly check-ins"));
        assert_ne!(patched.updated_at, "2000-01-01T00:00:00Z");
    }

    #[test]
    fn delete_releases_seat_only_for_open_assignments() {
        let f = fixture(3);
        let a = apply(&f.conn, &f.students[0], &f.school, &f.year).expect("a");
        let b = apply(&f.conn, &f.students[1], &f.school, &f.year).expect("b");
        cancel(&f.conn, &b.id).expect("cancel b");
        assert_eq!(seats(&f), 1);

        delete(&f.conn, &b.id).expect("delete cancelled");
        assert_eq!(seats(&f), 1);
        delete(&f.conn, &a.id).expect("delete open");
        assert_eq!(seats(&f), 0);
        assert_eq!(get(&f.conn, &a.id).unwrap_err().code(), "not_found");
    }

    #[test]
    fn list_filters_by_status() {
        let f = fixture(3);
        let a = apply(&f.conn, &f.students[0], &f.school, &f.year).expect("a");
        apply(&f.conn, &f.students[1], &f.school, &f.year).expect("b");
        cancel(&f.conn, &a.id).expect("cancel");
        let active = list(
            &f.conn,
            &AssignmentFilter {
                status: Some(AssignmentStatus::Active),
                ..Default::default()
            },
        )
        .expect("list");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].student_id, f.students[1]);
        assert_eq!(list(&f.conn, &AssignmentFilter::default()).expect("all").len(), 2);
    }
}
