//! Request validation helpers

use crate::ApiError;

const MAX_NAME_LENGTH: usize = 255;

/// Validate a user-supplied entity name.
///
/// Empty names are allowed at create time, a random identifier is
/// substituted downstream.
pub fn validate_optional_name(name: Option<&str>) -> Result<(), ApiError> {
    if let Some(name) = name {
        if name.len() > MAX_NAME_LENGTH {
            return Err(ApiError::InvalidRequest(format!(
                "Name cannot exceed {MAX_NAME_LENGTH} characters"
            )));
        }
    }
    Ok(())
}

/// Validate a name on update, where blanking out is not allowed.
pub fn validate_required_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::InvalidRequest("Name cannot be empty".to_string()));
    }
    validate_optional_name(Some(name))
}

/// Validate source attachment fields.
pub fn validate_source_fields(kind: &str, repository: &str) -> Result<(), ApiError> {
    if kind.trim().is_empty() {
        return Err(ApiError::InvalidRequest("Source kind cannot be empty".to_string()));
    }
    if repository.trim().is_empty() {
        return Err(ApiError::InvalidRequest("Source repository cannot be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_name() {
        assert!(validate_optional_name(None).is_ok());
        assert!(validate_optional_name(Some("web")).is_ok());
        assert!(validate_optional_name(Some("")).is_ok());
        assert!(validate_optional_name(Some(&"x".repeat(256))).is_err());
    }

    #[test]
    fn test_required_name() {
        assert!(validate_required_name("web").is_ok());
        assert!(validate_required_name("").is_err());
        assert!(validate_required_name("   ").is_err());
    }

    #[test]
    fn test_source_fields() {
        assert!(validate_source_fields("github", "acme/web").is_ok());
        assert!(validate_source_fields("", "acme/web").is_err());
        assert!(validate_source_fields("github", "").is_err());
    }
}
