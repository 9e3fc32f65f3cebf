//! Kenyan phone number normalization.
//!
//! Members type their numbers as `0712…`, `254712…` or `+254 712 …`; payment
//! providers send `2547…`. Everything is stored and compared in E.164 form
//! (`+254XXXXXXXXX`) so that alert matching is an exact string comparison.

use crate::{EngineError, ResultEngine};

const COUNTRY_CODE: &str = "254";

/// Returns the E.164 form of a Kenyan mobile/landline-mobile number
/// (`07…`/`01…` ranges), or `None` if the input is not one.
pub fn normalize_kenyan_phone(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    let subscriber = if let Some(rest) = cleaned.strip_prefix('+') {
        rest.strip_prefix(COUNTRY_CODE)?
    } else if let Some(rest) = cleaned.strip_prefix(COUNTRY_CODE) {
        rest
    } else if let Some(rest) = cleaned.strip_prefix('0') {
        rest
    } else {
        return None;
    };

    let valid = subscriber.len() == 9
        && subscriber.chars().all(|c| c.is_ascii_digit())
        && matches!(subscriber.as_bytes()[0], b'1' | b'7');
    valid.then(|| format!("+{COUNTRY_CODE}{subscriber}"))
}

/// Validates and normalizes an optional phone input.
///
/// Empty input is treated as "no phone".
pub(crate) fn normalize_optional_phone(raw: Option<&str>) -> ResultEngine<Option<String>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    normalize_kenyan_phone(raw).map(Some).ok_or_else(|| {
        EngineError::InvalidInput(
            "invalid Kenyan phone number (e.g. +254712345678 or 0712345678)".to_string(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_all_local_formats() {
        let expected = Some("+254712345678".to_string());
        assert_eq!(normalize_kenyan_phone("+254712345678"), expected);
        assert_eq!(normalize_kenyan_phone("254712345678"), expected);
        assert_eq!(normalize_kenyan_phone("0712345678"), expected);
        assert_eq!(normalize_kenyan_phone("0712 345-678"), expected);
        assert_eq!(
            normalize_kenyan_phone("0112345678"),
            Some("+254112345678".to_string())
        );
    }

    #[test]
    fn rejects_foreign_or_malformed_numbers() {
        assert_eq!(normalize_kenyan_phone("+255712345678"), None);
        assert_eq!(normalize_kenyan_phone("071234567"), None);
        assert_eq!(normalize_kenyan_phone("0812345678"), None);
        assert_eq!(normalize_kenyan_phone("07123456ab"), None);
        assert_eq!(normalize_kenyan_phone(""), None);
    }

    #[test]
    fn optional_phone_treats_blank_as_none() {
        assert_eq!(normalize_optional_phone(Some("  ")).unwrap(), None);
        assert_eq!(normalize_optional_phone(None).unwrap(), None);
        assert!(normalize_optional_phone(Some("12345")).is_err());
    }
}
