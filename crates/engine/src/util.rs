//! Internal helpers for input normalization and id handling.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation so every entry point enforces the same rules.

use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// New random id in the string form used by every table.
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Trim a required text field; empty input is an error.
pub(crate) fn normalize_required_text(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(format!("{label} must not be empty")));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// NFKC-normalize a person's name, collapse whitespace and title-case each
/// word. Full names need at least two words ("John Doe").
pub(crate) fn normalize_person_name(value: &str) -> ResultEngine<String> {
    let normalized: String = value.nfkc().collect();
    let words: Vec<String> = normalized
        .split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        return Err(EngineError::InvalidInput("name is required".to_string()));
    }
    if words.len() < 2 {
        return Err(EngineError::InvalidInput(
            "please enter at least two names (e.g. John Doe)".to_string(),
        ));
    }
    Ok(words.join(" "))
}

pub(crate) fn normalize_email(value: &str) -> ResultEngine<String> {
    let email = value.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(EngineError::InvalidInput(format!("invalid email: {email}")));
    }
    Ok(email)
}

/// Parse an id coming from a caller and return a labeled error on failure.
pub(crate) fn parse_id(value: &str, label: &str) -> ResultEngine<String> {
    Uuid::parse_str(value.trim())
        .map(|id| id.to_string())
        .map_err(|_| EngineError::InvalidId(format!("invalid {label} id")))
}
