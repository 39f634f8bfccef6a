//! Name validation for builds and the backend objects derived from them.

use crate::errors::{BuildflowError, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Maximum length of a DNS-1123 subdomain.
pub const MAX_NAME_LENGTH: usize = 253;

/// Maximum length of a DNS-1123 label, which backend objects such as
/// workloads are limited to.
pub const MAX_LABEL_LENGTH: usize = 63;

fn dns1123_subdomain() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
            .expect("static pattern is valid")
    })
}

fn dns1123_label() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("static pattern is valid")
    })
}

/// Validates a record name (DNS-1123 subdomain).
pub fn validate_resource_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LENGTH {
        return Err(BuildflowError::Validation(format!(
            "name '{name}' must be between 1 and {MAX_NAME_LENGTH} characters"
        )));
    }
    if !dns1123_subdomain().is_match(name) {
        return Err(BuildflowError::Validation(format!(
            "name '{name}' must consist of lower case alphanumeric characters, '-' or '.'"
        )));
    }
    Ok(())
}

/// Validates the name of a build record.
///
/// Backend object names are derived from it, so it must use the label
/// character set. Length is bounded by the subdomain limit; derived names
/// are shortened to fit a label.
pub fn validate_build_name(name: &str) -> Result<()> {
    validate_resource_name(name)?;
    if !dns1123_label().is_match(name) {
        return Err(BuildflowError::Validation(format!(
            "build name '{name}' must consist of lower case alphanumeric characters or '-'"
        )));
    }
    Ok(())
}

/// Validates a backend object name (DNS-1123 label).
pub fn validate_label_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_LABEL_LENGTH {
        return Err(BuildflowError::Validation(format!(
            "name '{name}' must be between 1 and {MAX_LABEL_LENGTH} characters"
        )));
    }
    if !dns1123_label().is_match(name) {
        return Err(BuildflowError::Validation(format!(
            "name '{name}' must consist of lower case alphanumeric characters or '-'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_resource_names() {
        assert!(validate_resource_name("greetings").is_ok());
        assert!(validate_resource_name("my-flow.v2").is_ok());
        assert!(validate_resource_name("a").is_ok());
    }

    #[test]
    fn test_invalid_resource_names() {
        assert!(validate_resource_name("").is_err());
        assert!(validate_resource_name("Greetings").is_err());
        assert!(validate_resource_name("-leading").is_err());
        assert!(validate_resource_name("trailing-").is_err());
        assert!(validate_resource_name(&"a".repeat(254)).is_err());
    }

    #[test]
    fn test_build_names_allow_long_names_without_dots() {
        assert!(validate_build_name("greetings").is_ok());
        assert!(validate_build_name(&"a".repeat(120)).is_ok());
        assert!(validate_build_name("my-flow.v2").is_err());
        assert!(validate_build_name(&"a".repeat(254)).is_err());
    }

    #[test]
    fn test_label_names_reject_dots_and_long_names() {
        assert!(validate_label_name("greetings-builder-1").is_ok());
        assert!(validate_label_name("my.flow").is_err());
        assert!(validate_label_name(&"a".repeat(64)).is_err());
    }
}
