//! Workspace setup sections.
//!
//! Each section is a JSON object persisted under `setup.<section>` in the
//! `settings` table. Reads always start from the built-in defaults and merge
//! the saved object over them, so new fields pick up defaults in older
//! workspaces.

use crate::db;
use crate::models::lesson_plans::LessonPlanStatus;
use rusqlite::Connection;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupSection {
    Placement,
    Planner,
}

impl SetupSection {
    pub const ALL: [SetupSection; 2] = [SetupSection::Placement, SetupSection::Planner];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "placement" => Some(Self::Placement),
            "planner" => Some(Self::Planner),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Placement => "placement",
            Self::Planner => "planner",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Placement => "setup.placement",
            Self::Planner => "setup.planner",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Placement => json!({
            "defaultMaxStudents": 10,
            "defaultMaxTeachers": 2,
            "quotaOpenByDefault": true
        }),
        SetupSection::Planner => json!({
            "defaultLessonStatus": "draft"
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

pub fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Placement => match k.as_str() {
                "defaultMaxStudents" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 10_000)?));
                }
                "defaultMaxTeachers" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 1_000)?));
                }
                "quotaOpenByDefault" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown placement field: {}", k)),
            },
            SetupSection::Planner => match k.as_str() {
                "defaultLessonStatus" => {
                    let s = v
                        .as_str()
                        .ok_or_else(|| format!("{} must be string", k))?
                        .trim()
                        .to_ascii_lowercase();
                    if s.parse::<LessonPlanStatus>().is_err() {
                        return Err(
                            "defaultLessonStatus must be one of: draft, published, archived"
                                .into(),
                        );
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                _ => return Err(format!("unknown planner field: {}", k)),
            },
        }
    }
    Ok(())
}

pub fn load_section(conn: &Connection, section: SetupSection) -> rusqlite::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed historical values must not block reads.
            if let Err(e) = merge_section_patch(section, &mut current, saved_obj) {
                tracing::warn!(
                    section = section.name(),
                    error = %e,
                    "ignoring invalid saved setup"
                );
                current = default_section(section);
            }
        }
    }
    Ok(current)
}

pub fn save_section(
    conn: &Connection,
    section: SetupSection,
    value: &Value,
) -> rusqlite::Result<()> {
    db::settings_set_json(conn, section.key(), value)
}

/// Values applied when a quota row is created without explicit limits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacementDefaults {
    pub max_students: i64,
    pub max_teachers: i64,
    pub open: bool,
}

impl PlacementDefaults {
    pub fn load(conn: &Connection) -> rusqlite::Result<Self> {
        let obj = load_section(conn, SetupSection::Placement)?;
        Ok(PlacementDefaults {
            max_students: obj
                .get("defaultMaxStudents")
                .and_then(|v| v.as_i64())
                .unwrap_or(10),
            max_teachers: obj
                .get("defaultMaxTeachers")
                .and_then(|v| v.as_i64())
                .unwrap_or(2),
            open: obj
                .get("quotaOpenByDefault")
                .and_then(|v| v.as_bool())
                .unwrap_or(true),
        })
    }
}

pub fn default_lesson_status(conn: &Connection) -> rusqlite::Result<LessonPlanStatus> {
    let obj = load_section(conn, SetupSection::Planner)?;
    Ok(obj
        .get("defaultLessonStatus")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or(LessonPlanStatus::Draft))
}
