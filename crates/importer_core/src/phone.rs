//! Phone number validation and E.164-like normalization.
//!
//! Validation and formatting share one country-code table so that any value
//! accepted by [`is_valid_phone`] formats to a value that is itself valid.

use crate::fields::FieldError;

/// Country calling codes and the expected number of digits after the leading
/// `+`, country code included.
pub const COUNTRY_CODES: &[(&str, usize)] = &[
    ("1", 11),  // US/Canada
    ("44", 12), // UK
    ("61", 11), // Australia
    ("64", 11), // New Zealand
    ("86", 13), // China
    ("91", 12), // India
];

/// Digits of a bare national number that is assumed to be US/Canada.
const BARE_NATIONAL_DIGITS: usize = 10;

pub(crate) const INVALID_PHONE_MESSAGE: &str =
    "Invalid phone number format. Please ensure the number includes a valid country code.";

/// Strips every character that is neither an ASCII digit nor `+`.
pub fn clean_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect()
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Returns the country code whose table entry matches `digits` exactly.
fn matching_country_code(digits: &str) -> Option<&'static str> {
    COUNTRY_CODES
        .iter()
        .find(|(code, len)| digits.starts_with(code) && digits.len() == *len)
        .map(|(code, _)| *code)
}

/// Accepts bare 10-digit numbers, `+<code><number>` and `<code><number>`
/// where the total digit count matches the country-code table.
pub fn is_valid_phone(raw: &str) -> bool {
    let cleaned = clean_phone(raw);
    if cleaned.len() == BARE_NATIONAL_DIGITS && all_digits(&cleaned) {
        return true;
    }
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    all_digits(digits) && matching_country_code(digits).is_some()
}

/// Normalizes to `+<countrycode><number>`.
///
/// A `+`-prefixed value is passed through once cleaned. Otherwise a number
/// that carries a known country code at the expected length gets a `+`, and a
/// bare 10-digit number is assumed to be US/Canada.
pub fn format_phone(raw: &str) -> Result<String, FieldError> {
    let cleaned = clean_phone(raw);
    if cleaned.starts_with('+') {
        return Ok(cleaned);
    }
    if all_digits(&cleaned) {
        if matching_country_code(&cleaned).is_some() {
            return Ok(format!("+{cleaned}"));
        }
        if cleaned.len() == BARE_NATIONAL_DIGITS {
            return Ok(format!("+1{cleaned}"));
        }
    }
    Err(FieldError::new(INVALID_PHONE_MESSAGE))
}
