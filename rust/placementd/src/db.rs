use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

pub const DB_FILE_NAME: &str = "placement.sqlite3";

pub fn open_db(workspace: &Path, busy_timeout: Duration) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)?;
    conn.busy_timeout(busy_timeout)?;
    // WAL lets readers proceed while another sidecar holds the write lock.
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
    init_schema(&conn)?;
    tracing::info!(path = %db_path.display(), "opened workspace database");
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Starts a transaction that takes the database write lock up front.
///
/// Every read-check-write sequence (admission, id generation, counter
/// maintenance) must run inside one of these so that a second writer waits
/// on `busy_timeout` instead of interleaving with the check.
pub fn write_tx(conn: &Connection) -> rusqlite::Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            role TEXT NOT NULL CHECK (role IN ('student', 'teacher', 'admin')),
            full_name TEXT NOT NULL,
            email TEXT UNIQUE,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS academic_years(
            id TEXT PRIMARY KEY,
            year INTEGER NOT NULL,
            semester INTEGER NOT NULL,
            start_date TEXT,
            end_date TEXT,
            is_active INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            UNIQUE(year, semester)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schools(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            school_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            address TEXT NOT NULL,
            phone TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schools_name ON schools(name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS school_quotas(
            id TEXT PRIMARY KEY,
            school_id TEXT NOT NULL,
            academic_year_id TEXT NOT NULL,
            max_students INTEGER NOT NULL CHECK (max_students >= 0),
            max_teachers INTEGER NOT NULL CHECK (max_teachers >= 0),
            current_students INTEGER NOT NULL DEFAULT 0 CHECK (current_students >= 0),
            is_open INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(school_id) REFERENCES schools(school_id),
            FOREIGN KEY(academic_year_id) REFERENCES academic_years(id),
            UNIQUE(school_id, academic_year_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_school_quotas_year ON school_quotas(academic_year_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS internship_assignments(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            school_id TEXT NOT NULL,
            academic_year_id TEXT NOT NULL,
            teacher_id TEXT,
            status TEXT NOT NULL CHECK (status IN ('active', 'completed', 'cancelled')),
            enrollment_date TEXT NOT NULL,
            start_date TEXT,
            end_date TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES users(id),
            FOREIGN KEY(school_id) REFERENCES schools(school_id),
            FOREIGN KEY(academic_year_id) REFERENCES academic_years(id),
            FOREIGN KEY(teacher_id) REFERENCES users(id)
        )",
        [],
    )?;
    // Older workspaces predate assignment notes.
    ensure_assignments_notes(conn)?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_assignments_one_open_per_year
         ON internship_assignments(student_id, academic_year_id)
         WHERE status <> 'cancelled'",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_school_year
         ON internship_assignments(school_id, academic_year_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            description TEXT,
            created_by TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(created_by) REFERENCES users(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS lesson_plans(
            id TEXT PRIMARY KEY,
            subject_id TEXT NOT NULL,
            teacher_id TEXT NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL CHECK (status IN ('draft', 'published', 'archived')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            FOREIGN KEY(teacher_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lesson_plans_subject ON lesson_plans(subject_id)",
        [],
    )?;

    Ok(())
}

fn ensure_assignments_notes(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "internship_assignments", "notes")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE internship_assignments ADD COLUMN notes TEXT",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> rusqlite::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    // A corrupt value reads as unset; callers fall back to defaults.
    Ok(raw.and_then(|s| serde_json::from_str(&s).ok()))
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, value.to_string()),
    )?;
    Ok(())
}
