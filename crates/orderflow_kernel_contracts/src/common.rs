#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub enum ContractViolation {
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
}

pub trait Validate {
    fn validate(&self) -> Result<(), ContractViolation>;
}

/// Wall-clock milliseconds since the unix epoch, as observed by the caller.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct WallClockMs(pub u64);

/// Calendar day key in `YYYY-MM-DD` form. Produced only by the os-layer
/// clock; everything below it treats the key as opaque but validated.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayKey(String);

impl DayKey {
    pub fn new(key: impl Into<String>) -> Result<Self, ContractViolation> {
        let key = key.into();
        let bytes = key.as_bytes();
        if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
            return Err(ContractViolation::InvalidValue {
                field: "day_key",
                reason: "must be YYYY-MM-DD",
            });
        }
        for (i, b) in bytes.iter().enumerate() {
            if i == 4 || i == 7 {
                continue;
            }
            if !b.is_ascii_digit() {
                return Err(ContractViolation::InvalidValue {
                    field: "day_key",
                    reason: "must be YYYY-MM-DD",
                });
            }
        }
        let month = (bytes[5] - b'0') * 10 + (bytes[6] - b'0');
        let day = (bytes[8] - b'0') * 10 + (bytes[9] - b'0');
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(ContractViolation::InvalidValue {
                field: "day_key",
                reason: "month/day out of range",
            });
        }
        Ok(Self(key))
    }

    pub fn from_civil(year: i64, month: u32, day: u32) -> Result<Self, ContractViolation> {
        if !(1970..=9999).contains(&year) {
            return Err(ContractViolation::InvalidValue {
                field: "day_key.year",
                reason: "must be within 1970..=9999",
            });
        }
        Self::new(format!("{year:04}-{month:02}-{day:02}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn validate_token(
    field: &'static str,
    value: &str,
    max_len: usize,
) -> Result<(), ContractViolation> {
    if value.is_empty() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must be non-empty",
        });
    }
    if value.len() > max_len {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "exceeds max length",
        });
    }
    if value.chars().any(|c| {
        !(c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ':' || c == '.' || c == '/')
    }) {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must contain token-safe ASCII only",
        });
    }
    Ok(())
}

pub fn validate_text(
    field: &'static str,
    value: &str,
    max_len: usize,
) -> Result<(), ContractViolation> {
    if value.is_empty() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must be non-empty",
        });
    }
    if value.len() > max_len {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "exceeds max length",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_common_01_day_key_accepts_canonical_form() {
        assert!(DayKey::new("2024-02-29").is_ok());
        assert_eq!(DayKey::from_civil(2024, 2, 29).unwrap().as_str(), "2024-02-29");
    }

    #[test]
    fn at_common_02_day_key_rejects_malformed_input() {
        assert!(DayKey::new("2024/02/29").is_err());
        assert!(DayKey::new("2024-13-01").is_err());
        assert!(DayKey::new("2024-00-10").is_err());
        assert!(DayKey::new("2024-1-1").is_err());
        assert!(DayKey::new("garbage").is_err());
    }

    #[test]
    fn at_common_03_token_validation_fails_closed() {
        assert!(validate_token("f", "user_1", 16).is_ok());
        assert!(validate_token("f", "", 16).is_err());
        assert!(validate_token("f", "has space", 16).is_err());
        assert!(validate_token("f", "waaaaaaaaaaaaaaaaay_too_long", 16).is_err());
    }
}
