use thiserror::Error;

use crate::ForeshadowStatus;

/// Rejections raised before anything is sent to the backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("{field} must be at most {max} characters (got {len})")]
    TooLong {
        field: &'static str,
        max: usize,
        len: usize,
    },

    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },

    #[error("cannot move foreshadow from {from} to {to}")]
    IllegalTransition {
        from: ForeshadowStatus,
        to: ForeshadowStatus,
    },

    #[error("a foreshadow is marked resolved through resolve, not update")]
    ResolveRequired,

    #[error("{field} can only be set on a resolved foreshadow")]
    OnlyWhenResolved { field: &'static str },

    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

impl ValidationError {
    pub(crate) fn check_range(
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    ) -> Result<(), Self> {
        if (min..=max).contains(&value) {
            Ok(())
        } else {
            Err(Self::OutOfRange {
                field,
                min,
                max,
                value,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_range_accepts_bounds() {
        assert!(ValidationError::check_range("importance", 1, 1, 10).is_ok());
        assert!(ValidationError::check_range("importance", 10, 1, 10).is_ok());
    }

    #[test]
    fn check_range_reports_value() {
        let err = ValidationError::check_range("importance", 11, 1, 10).unwrap_err();
        assert_eq!(
            err.to_string(),
            "importance must be between 1 and 10 (got 11)"
        );
    }
}
