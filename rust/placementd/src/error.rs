use crate::models::assignments::AssignmentStatus;
use rusqlite::ffi;
use serde_json::json;
use thiserror::Error;

/// Failure of a model operation.
///
/// Business-rule rejections get their own variants so the IPC layer can
/// report a stable code for each; anything the database itself raises that is
/// not a constraint violation stays in [`ModelError::Db`].
#[derive(Error, Debug)]
pub enum ModelError {
    /// A caller-supplied value failed validation
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// Entity not found by the given identifier
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Unique constraint violation
    #[error("{0}")]
    Conflict(String),

    #[error("student already has an open assignment for this academic year")]
    DuplicateApplication,

    #[error("No quota configured for this school and academic year")]
    QuotaMissing,

    #[error("School is not accepting students for this academic year")]
    QuotaClosed,

    #[error("School quota is full")]
    QuotaFull,

    #[error("maxStudents ({max}) is below current enrollment ({current})")]
    QuotaBelowEnrollment { max: i64, current: i64 },

    #[error("cannot change assignment status from {from} to {to}")]
    InvalidTransition {
        from: AssignmentStatus,
        to: AssignmentStatus,
    },

    /// Entity is still referenced and cannot be removed
    #[error("{0}")]
    InUse(String),

    #[error(transparent)]
    Db(rusqlite::Error),
}

pub type Result<T, E = ModelError> = std::result::Result<T, E>;

impl ModelError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ModelError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Wire-level error code.
    pub fn code(&self) -> &'static str {
        match self {
            ModelError::Validation { .. } => "bad_params",
            ModelError::NotFound(_) => "not_found",
            ModelError::Conflict(_) => "conflict",
            ModelError::DuplicateApplication => "duplicate_application",
            ModelError::QuotaMissing => "quota_missing",
            ModelError::QuotaClosed => "quota_closed",
            ModelError::QuotaFull => "quota_full",
            ModelError::QuotaBelowEnrollment { .. } => "quota_below_enrollment",
            ModelError::InvalidTransition { .. } => "invalid_transition",
            ModelError::InUse(_) => "in_use",
            ModelError::Db(_) => "db_error",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ModelError::Validation { field, .. } => Some(json!({ "field": field })),
            ModelError::NotFound(entity) => Some(json!({ "entity": entity })),
            ModelError::QuotaBelowEnrollment { max, current } => Some(json!({
                "maxStudents": max,
                "currentStudents": current,
            })),
            ModelError::InvalidTransition { from, to } => Some(json!({
                "from": from.as_str(),
                "to": to.as_str(),
            })),
            _ => None,
        }
    }

    /// True for failures caused by the request rather than the store.
    pub fn is_business(&self) -> bool {
        !matches!(self, ModelError::Db(_))
    }
}

impl From<rusqlite::Error> for ModelError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ffi_err, msg) = &err {
            let message = msg
                .clone()
                .unwrap_or_else(|| "constraint violation".to_string());
            match ffi_err.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return ModelError::Conflict(message);
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return ModelError::InUse(message),
                _ => {}
            }
        }
        ModelError::Db(err)
    }
}
