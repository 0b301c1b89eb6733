//! Rule criteria validation.

use std::str::FromStr;

use thiserror::Error;

use alertflow_core::{Severity, WILDCARD};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("a rule matching everything is not allowed: all three criteria are '*'")]
    AllWildcard,

    #[error("criterion '{0}' must not be empty")]
    EmptyCriterion(&'static str),

    #[error("severity criterion must be a severity level or '*', got: {0}")]
    UnknownSeverity(String),
}

/// Validate a rule's `(severity, source, name)` tuple.
///
/// Each criterion is a literal or the wildcard. The severity literal must
/// be one of the four levels, since anything else could never match an
/// alert. The all-wildcard tuple is rejected outright.
pub fn validate_criteria(
    severity: &str,
    source: &str,
    name: &str,
) -> Result<(), ValidationError> {
    if severity == WILDCARD && source == WILDCARD && name == WILDCARD {
        return Err(ValidationError::AllWildcard);
    }
    if severity.is_empty() {
        return Err(ValidationError::EmptyCriterion("severity"));
    }
    if source.is_empty() {
        return Err(ValidationError::EmptyCriterion("source"));
    }
    if name.is_empty() {
        return Err(ValidationError::EmptyCriterion("name"));
    }
    if severity != WILDCARD && Severity::from_str(severity).is_err() {
        return Err(ValidationError::UnknownSeverity(severity.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_literal_tuple() {
        assert!(validate_criteria("HIGH", "api", "timeout").is_ok());
    }

    #[test]
    fn accepts_partial_wildcards() {
        assert!(validate_criteria("*", "api", "timeout").is_ok());
        assert!(validate_criteria("LOW", "*", "timeout").is_ok());
        assert!(validate_criteria("LOW", "api", "*").is_ok());
        assert!(validate_criteria("*", "*", "timeout").is_ok());
    }

    #[test]
    fn rejects_all_wildcard() {
        assert_eq!(
            validate_criteria("*", "*", "*"),
            Err(ValidationError::AllWildcard)
        );
    }

    #[test]
    fn rejects_empty_criteria() {
        assert_eq!(
            validate_criteria("", "api", "timeout"),
            Err(ValidationError::EmptyCriterion("severity"))
        );
        assert_eq!(
            validate_criteria("HIGH", "", "timeout"),
            Err(ValidationError::EmptyCriterion("source"))
        );
        assert_eq!(
            validate_criteria("HIGH", "api", ""),
            Err(ValidationError::EmptyCriterion("name"))
        );
    }

    #[test]
    fn rejects_made_up_severity() {
        assert_eq!(
            validate_criteria("URGENT", "api", "timeout"),
            Err(ValidationError::UnknownSeverity("URGENT".to_string()))
        );
    }
}
