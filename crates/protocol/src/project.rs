//! Project name rules.

use crate::error::ValidationError;

/// Longest project name the platform accepts.
pub const MAX_PROJECT_NAME_LEN: usize = 58;

/// Validates a project name before it is sent anywhere.
///
/// Accepts lowercase ASCII letters, digits and hyphens, 1 to 58 characters,
/// not starting or ending with a hyphen.
pub fn validate_project_name(name: &str) -> Result<(), ValidationError> {
    let invalid = |reason| ValidationError::InvalidProjectName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.len() > MAX_PROJECT_NAME_LEN {
        return Err(invalid("must be at most 58 characters"));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(invalid("only lowercase letters, digits and hyphens are allowed"));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(invalid("must not start or end with a hyphen"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_names() {
        assert!(validate_project_name("my-site").is_ok());
        assert!(validate_project_name("a").is_ok());
        assert!(validate_project_name("site2024").is_ok());
        assert!(validate_project_name("0-0").is_ok());
    }

    #[test]
    fn accepts_max_length() {
        let name = "a".repeat(MAX_PROJECT_NAME_LEN);
        assert!(validate_project_name(&name).is_ok());
    }

    #[test]
    fn rejects_too_long() {
        let name = "a".repeat(MAX_PROJECT_NAME_LEN + 1);
        assert!(validate_project_name(&name).is_err());
    }

    #[test]
    fn rejects_empty() {
        let err = validate_project_name("").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidProjectName { .. }));
    }

    #[test]
    fn rejects_uppercase_and_symbols() {
        assert!(validate_project_name("My-Site").is_err());
        assert!(validate_project_name("my_site").is_err());
        assert!(validate_project_name("my.site").is_err());
        assert!(validate_project_name("my site").is_err());
        assert!(validate_project_name("sité").is_err());
    }

    #[test]
    fn rejects_edge_hyphens() {
        assert!(validate_project_name("-site").is_err());
        assert!(validate_project_name("site-").is_err());
        assert!(validate_project_name("-").is_err());
    }

    #[test]
    fn error_names_the_project() {
        let err = validate_project_name("Bad").unwrap_err();
        assert!(err.to_string().contains("\"Bad\""));
    }
}
