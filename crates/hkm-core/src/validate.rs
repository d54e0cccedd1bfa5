//! Request-shape validation performed before any network call.

use std::fmt;

use serde::Serialize;

/// Country calling code prepended to local (9-digit) phone numbers.
pub const COUNTRY_CODE: &str = "998";

const LOCAL_PHONE_DIGITS: usize = 9;
const FULL_PHONE_DIGITS: usize = 12;
const NATIONAL_ID_DIGITS: usize = 14;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid phone number format")]
    Phone,

    #[error("Invalid JSHIR format")]
    NationalId,
}

/// Phone number normalized to `998XXXXXXXXX`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Strip non-digits, then accept a 9-digit local number (country code is
    /// prepended) or a 12-digit number that already starts with it.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        match digits.len() {
            LOCAL_PHONE_DIGITS => Ok(Self(format!("{COUNTRY_CODE}{digits}"))),
            FULL_PHONE_DIGITS if digits.starts_with(COUNTRY_CODE) => Ok(Self(digits)),
            _ => Err(ValidationError::Phone),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Personal identification number (JSHIR): exactly 14 digits.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct NationalId(String);

impl NationalId {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.len() == NATIONAL_ID_DIGITS && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(ValidationError::NationalId)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NationalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_numbers_get_country_code() {
        let p = PhoneNumber::parse("901234567").unwrap();
        assert_eq!(p.as_str(), "998901234567");

        let p = PhoneNumber::parse("(90) 123-45-67").unwrap();
        assert_eq!(p.as_str(), "998901234567");
    }

    #[test]
    fn prefixed_numbers_are_identity() {
        let p = PhoneNumber::parse("998901234567").unwrap();
        assert_eq!(p.as_str(), "998901234567");

        let p = PhoneNumber::parse("+998 90 123 45 67").unwrap();
        assert_eq!(p.as_str(), "998901234567");
    }

    #[test]
    fn other_phone_shapes_fail() {
        for raw in [
            "",
            "12345678",
            "1234567890",
            "12345678901",
            "123901234567",
            "9989012345678",
            "phone",
        ] {
            assert_eq!(
                PhoneNumber::parse(raw),
                Err(ValidationError::Phone),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn national_id_requires_exactly_14_digits() {
        assert_eq!(
            NationalId::parse("  12345678901234 \n").unwrap().as_str(),
            "12345678901234"
        );

        for raw in [
            "1234567890123",
            "123456789012345",
            "1234567890123a",
            "1234567 901234",
            "",
        ] {
            assert_eq!(
                NationalId::parse(raw),
                Err(ValidationError::NationalId),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn error_messages_are_user_facing() {
        assert_eq!(
            ValidationError::Phone.to_string(),
            "Invalid phone number format"
        );
        assert_eq!(ValidationError::NationalId.to_string(), "Invalid JSHIR format");
    }
}
