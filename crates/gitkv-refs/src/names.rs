//! Reference name validation following git's check-ref-format rules.
//!
//! A valid name is either a pseudo ref made of uppercase letters and
//! underscores (`HEAD`, `FETCH_HEAD`, `ORIG_HEAD`) or a slash-separated path
//! under `refs/` where:
//! - No component is empty or starts with `.`
//! - No component ends with `.lock`
//! - There is no `..`, `@{`, whitespace, control character, or any of
//!   `~ ^ : ? * [ \`
//! - The name does not end with `/` or `.`

use crate::error::{RefError, Result};

/// Characters that are forbidden anywhere in a reference name.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

fn invalid(name: &str, reason: impl Into<String>) -> RefError {
    RefError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Returns `true` for names like `HEAD` or `FETCH_HEAD`.
pub fn is_pseudo_ref(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_uppercase() || c == '_')
        && !name.starts_with('_')
}

/// Validate a full reference name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use gitkv_refs::names::validate_reference_name;
///
/// assert!(validate_reference_name("HEAD").is_ok());
/// assert!(validate_reference_name("refs/heads/feature/auth").is_ok());
/// assert!(validate_reference_name("main").is_err());
/// assert!(validate_reference_name("refs/heads/bad..name").is_err());
/// ```
pub fn validate_reference_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(name, "reference name must not be empty"));
    }
    if is_pseudo_ref(name) {
        return Ok(());
    }
    let Some(path) = name.strip_prefix("refs/") else {
        return Err(invalid(name, "must be a pseudo ref or start with 'refs/'"));
    };

    if let Some(ch) = name
        .chars()
        .find(|c| FORBIDDEN_CHARS.contains(c) || c.is_control())
    {
        return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
    }
    if name.contains("..") {
        return Err(invalid(name, "must not contain '..'"));
    }
    if name.contains("@{") {
        return Err(invalid(name, "must not contain '@{'"));
    }
    if name.ends_with('.') || name.ends_with('/') {
        return Err(invalid(name, "must not end with '.' or '/'"));
    }

    for component in path.split('/') {
        if component.is_empty() {
            return Err(invalid(name, "path components must not be empty"));
        }
        if component.starts_with('.') {
            return Err(invalid(
                name,
                format!("component must not start with '.': {component:?}"),
            ));
        }
        if component.ends_with(".lock") {
            return Err(invalid(
                name,
                format!("component must not end with '.lock': {component:?}"),
            ));
        }
    }

    Ok(())
}
