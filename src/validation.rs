//! Field validators shared by the entity types.
//!
//! Formats follow Mexican school administration: CCT registration codes,
//! RFC tax ids and CURP population codes.

use crate::error::ValidationError;

pub const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn default_true() -> bool {
    true
}

/// Record an error when `value` is blank or longer than `max` characters.
pub fn required(errors: &mut ValidationError, field: &str, value: &str, max: usize) {
    if value.trim().is_empty() {
        errors.add(field, "is required");
    } else if value.chars().count() > max {
        errors.add(field, format!("may not be greater than {} characters", max));
    }
}

pub fn password(errors: &mut ValidationError, field: &str, value: &str) {
    errors.check(
        value.chars().count() < MIN_PASSWORD_LEN,
        field,
        "must be at least 8 characters",
    );
}

/// A single `@` with a non-empty local part and a dotted domain.
pub fn is_email(value: &str) -> bool {
    let value = value.trim();
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

/// Lowercase ASCII letters, digits and single dashes, not starting or ending with a dash.
pub fn is_slug(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('-')
        && !value.ends_with('-')
        && !value.contains("--")
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// CCT: two digits, three uppercase letters, four digits, one uppercase letter.
pub fn is_cct(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes[..2].iter().all(u8::is_ascii_digit)
        && bytes[2..5].iter().all(u8::is_ascii_uppercase)
        && bytes[5..9].iter().all(u8::is_ascii_digit)
        && bytes[9].is_ascii_uppercase()
}

/// RFC: 12 characters for companies, 13 for individuals, uppercase alphanumeric.
pub fn is_rfc(value: &str) -> bool {
    matches!(value.len(), 12 | 13)
        && value
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '&')
}

/// CURP: 18 uppercase alphanumeric characters, birth date digits in positions 5 to 10.
pub fn is_curp(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 18
        && bytes[..4].iter().all(u8::is_ascii_uppercase)
        && bytes[4..10].iter().all(u8::is_ascii_digit)
        && bytes[10..16].iter().all(u8::is_ascii_uppercase)
        && bytes[16..].iter().all(u8::is_ascii_alphanumeric)
}

/// `#RRGGBB`.
pub fn is_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Postal code: five digits.
pub fn is_postal_code(value: &str) -> bool {
    value.len() == 5 && value.chars().all(|c| c.is_ascii_digit())
}
