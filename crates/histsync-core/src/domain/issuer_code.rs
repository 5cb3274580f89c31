use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_ISSUER_CODE_LEN: usize = 15;

/// Normalized exchange issuer code (e.g. `ALK`, `KMB`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IssuerCode(String);

impl IssuerCode {
    /// Parse and normalize an issuer code to uppercase.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyIssuerCode);
        }

        let normalized = trimmed.to_ascii_uppercase();
        let len = normalized.chars().count();
        if len > MAX_ISSUER_CODE_LEN {
            return Err(ValidationError::IssuerCodeTooLong {
                len,
                max: MAX_ISSUER_CODE_LEN,
            });
        }

        if let Some(first) = normalized.chars().next() {
            if !first.is_ascii_alphabetic() {
                return Err(ValidationError::IssuerCodeInvalidStart { ch: first });
            }
        }

        for (index, ch) in normalized.chars().enumerate() {
            if !ch.is_ascii_alphanumeric() {
                return Err(ValidationError::IssuerCodeInvalidChar { ch, index });
            }
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn contains_digit(&self) -> bool {
        self.0.chars().any(|ch| ch.is_ascii_digit())
    }
}

impl Display for IssuerCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for IssuerCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for IssuerCode {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<IssuerCode> for String {
    fn from(value: IssuerCode) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes_code() {
        let parsed = IssuerCode::parse(" alk ").expect("code should parse");
        assert_eq!(parsed.as_str(), "ALK");
    }

    #[test]
    fn rejects_invalid_start() {
        let err = IssuerCode::parse("1ALK").expect_err("must fail");
        assert!(matches!(err, ValidationError::IssuerCodeInvalidStart { .. }));
    }

    #[test]
    fn rejects_punctuation() {
        let err = IssuerCode::parse("KMB-P").expect_err("must fail");
        assert!(matches!(
            err,
            ValidationError::IssuerCodeInvalidChar { ch: '-', index: 3 }
        ));
    }

    #[test]
    fn reports_embedded_digits() {
        let code = IssuerCode::parse("RZUS2").expect("code should parse");
        assert!(code.contains_digit());
        assert!(!IssuerCode::parse("TEL").expect("code").contains_digit());
    }
}
