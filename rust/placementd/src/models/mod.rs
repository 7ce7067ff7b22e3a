pub mod academic_years;
pub mod assignments;
pub mod lesson_plans;
pub mod quotas;
pub mod schools;
pub mod subjects;
pub mod users;

use crate::error::{ModelError, Result};
use chrono::NaiveDate;

/// Implements string conversions and SQLite text mapping for a fieldless enum.
macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($ty), other)),
                }
            }
        }

        impl rusqlite::types::ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $ty {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: String| rusqlite::types::FromSqlError::Other(e.into()))
            }
        }
    };
}
pub(crate) use text_enum;

/// Trims `s`, mapping blank input to `None`.
pub fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

pub fn require_text(field: &'static str, value: &str, max_len: usize) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ModelError::validation(
            field,
            format!("{} must not be empty", field),
        ));
    }
    if value.chars().count() > max_len {
        return Err(ModelError::validation(
            field,
            format!("{} must be at most {} characters", field, max_len),
        ));
    }
    Ok(value.to_string())
}

/// Validates an ISO `YYYY-MM-DD` date.
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ModelError::validation(field, format!("{} must be a YYYY-MM-DD date", field))
    })
}

pub fn check_date_range(start: Option<&str>, end: Option<&str>) -> Result<()> {
    let start = start.map(|s| parse_date("startDate", s)).transpose()?;
    let end = end.map(|s| parse_date("endDate", s)).transpose()?;
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(ModelError::validation(
                "endDate",
                "endDate must not be before startDate",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_range_validation() {
        assert!(check_date_range(Some("2025-01-10"), Some("2025-03-01")).is_ok());
        assert!(check_date_range(Some("2025-01-10"), None).is_ok());
        assert!(check_date_range(None, None).is_ok());
        let e = check_date_range(Some("2025-03-01"), Some("2025-01-10")).unwrap_err();
        assert_eq!(e.code(), "bad_params");
        assert!(check_date_range(Some("03/01/2025"), None).is_err());
    }

    #[test]
    fn require_text_trims_and_bounds() {
        assert_eq!(require_text("name", "  Math ", 10).expect("ok"), "Math");
        assert!(require_text("name", "   ", 10).is_err());
        assert!(require_text("name", "abcdefghijk", 10).is_err());
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(Some(" x ")), Some("x".to_string()));
    }
}
