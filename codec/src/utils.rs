// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

/// Invalid UTF-8 string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringError {
    /// Longer than 65535 bytes.
    TooManyData,

    /// Contains a disallowed code point.
    InvalidChar,

    /// Contains U+0000 or is not well-formed UTF-8.
    /// Server or client shall close the connection immediately.
    SeriousError,
}

impl From<std::string::FromUtf8Error> for StringError {
    fn from(_err: std::string::FromUtf8Error) -> Self {
        Self::SeriousError
    }
}

/// Generate random alphanumeric string.
#[must_use]
pub fn random_string(len: usize) -> String {
    let bytes: Vec<u8> = thread_rng().sample_iter(&Alphanumeric).take(len).collect();
    // Alphanumeric samples are always valid ASCII.
    String::from_utf8(bytes).unwrap_or_default()
}

/// Generate a server-assigned client id.
#[must_use]
pub fn random_client_id() -> String {
    format!("auto-{}", random_string(18))
}

/// Check data length exceeds 64k or not.
///
/// # Errors
///
/// Returns error if length of `data` is bigger than 65535.
#[inline]
pub fn validate_two_bytes_data(data: &[u8]) -> Result<(), StringError> {
    if data.len() > u16::MAX as usize {
        Err(StringError::TooManyData)
    } else {
        Ok(())
    }
}

const fn is_non_character(c: char) -> bool {
    let cp = c as u32;
    (cp >= 0xfdd0 && cp <= 0xfdef) || (cp & 0xffff) == 0xfffe || (cp & 0xffff) == 0xffff
}

/// Check string characters and length per MQTT-1.5.4.
///
/// Surrogate halves and overlong byte sequences cannot occur in a `&str`,
/// they are rejected by the UTF-8 conversion before this check runs.
///
/// # Errors
///
/// Returns error if:
/// - string is longer than 65535 bytes
/// - string contains U+0000 [MQTT-1.5.4-2]
/// - string contains control characters U+0001..U+001F or U+007F..U+009F
/// - string contains a Unicode non-character
pub fn validate_utf8_string(s: &str) -> Result<(), StringError> {
    if s.len() > u16::MAX as usize {
        return Err(StringError::TooManyData);
    }

    for c in s.chars() {
        if c == '\u{0000}' {
            return Err(StringError::SeriousError);
        }

        if ('\u{0001}'..='\u{001f}').contains(&c) || ('\u{007f}'..='\u{009f}').contains(&c) {
            return Err(StringError::InvalidChar);
        }

        if is_non_character(c) {
            return Err(StringError::InvalidChar);
        }
    }

    // Empty string is valid.
    Ok(())
}

/// Convert byte slice to a validated UTF-8 string.
///
/// # Errors
///
/// Returns error if bytes are not well-formed or violate MQTT-1.5.4.
pub fn to_utf8_string(buf: &[u8]) -> Result<String, StringError> {
    let s = String::from_utf8(buf.to_vec())?;
    validate_utf8_string(&s)?;
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_utf8_string() {
        assert!(validate_utf8_string("").is_ok());
        assert!(validate_utf8_string("sensor/temperature").is_ok());
        assert!(validate_utf8_string("héllo wörld").is_ok());

        assert_eq!(
            validate_utf8_string("a\u{0000}b"),
            Err(StringError::SeriousError)
        );
        assert_eq!(
            validate_utf8_string("a\u{0003}b"),
            Err(StringError::InvalidChar)
        );
        assert_eq!(
            validate_utf8_string("a\u{007f}b"),
            Err(StringError::InvalidChar)
        );
        assert_eq!(
            validate_utf8_string("a\u{fdd0}b"),
            Err(StringError::InvalidChar)
        );
        assert_eq!(
            validate_utf8_string("a\u{fffe}b"),
            Err(StringError::InvalidChar)
        );
        assert_eq!(
            validate_utf8_string("a\u{1ffff}b"),
            Err(StringError::InvalidChar)
        );
    }

    #[test]
    fn test_to_utf8_string_rejects_surrogate_bytes() {
        // 0xed 0xa0 0x80 is the UTF-8-style encoding of surrogate U+D800.
        let buf = [0x61, 0xed, 0xa0, 0x80];
        assert!(to_utf8_string(&buf).is_err());
    }

    #[test]
    fn test_to_utf8_string_rejects_overlong() {
        // 0xc0 0x80 is an overlong encoding of NUL.
        let buf = [0xc0, 0x80];
        assert!(to_utf8_string(&buf).is_err());
    }

    #[test]
    fn test_random_client_id() {
        let id = random_client_id();
        assert!(id.starts_with("auto-"));
        assert_eq!(id.len(), 23);
    }
}
