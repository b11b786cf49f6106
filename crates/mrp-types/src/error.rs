//! Validation errors for intake and intervention input

/// Malformed input rejected before any state or audit mutation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A required field was empty or whitespace
    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),

    /// Severity outside the accepted set
    #[error("invalid severity `{0}` (expected HIGH or CRITICAL)")]
    InvalidSeverity(String),

    /// Signal id that does not parse
    #[error("invalid signal id `{0}`")]
    InvalidSignalId(String),
}

impl ValidationError {
    /// Reject `value` if it is blank
    ///
    /// # Errors
    /// Returns [`ValidationError::EmptyField`] naming `field`
    pub fn require_non_empty(field: &'static str, value: &str) -> Result<(), Self> {
        if value.trim().is_empty() {
            Err(Self::EmptyField(field))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_rejected() {
        assert_eq!(
            ValidationError::require_non_empty("subject_id", "  \t"),
            Err(ValidationError::EmptyField("subject_id"))
        );
        assert!(ValidationError::require_non_empty("subject_id", "S1").is_ok());
    }

    #[test]
    fn display_names_the_field() {
        let err = ValidationError::EmptyField("description");
        assert!(err.to_string().contains("description"));
    }
}
