//! Identity and credential values handled by the verification flows.
//!
//! - [`Subject`]: the validated email a session verifies against
//! - [`NewPassword`]: a replacement password, zeroized on drop
//! - [`BearerToken`]: the opaque credential issued after a successful login

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{FacegateError, Result};

/// Minimum password length accepted by the account service.
pub const MIN_PASSWORD_LEN: usize = 8;

fn email_pattern() -> Option<&'static Regex> {
    static EMAIL_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL_PATTERN
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok())
        .as_ref()
}

/// Identity a verification attempt is checked against.
///
/// Immutable once constructed; a session holds exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subject(String);

impl Subject {
    /// Parse and validate an email address.
    pub fn parse(email: &str) -> Result<Self> {
        let email = email.trim();
        if email.is_empty() {
            return Err(FacegateError::InvalidSubject("email is required".into()));
        }
        if !email_pattern().is_some_and(|regex| regex.is_match(email)) {
            return Err(FacegateError::InvalidSubject(format!(
                "invalid email format: {email}"
            )));
        }
        Ok(Self(email.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Subject {
    type Error = FacegateError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Subject> for String {
    fn from(subject: Subject) -> Self {
        subject.0
    }
}

/// Replacement password carried by a password-reset session.
///
/// The buffer is wiped when the value is dropped.
#[derive(Clone)]
pub struct NewPassword(Zeroizing<String>);

impl NewPassword {
    /// Validate against the account password policy: at least
    /// [`MIN_PASSWORD_LEN`] characters with one letter and one digit.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = Zeroizing::new(value.into());
        check_password_policy(&value)?;
        Ok(Self(value))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for NewPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NewPassword([REDACTED])")
    }
}

/// Check a password against the account policy without taking ownership.
pub fn check_password_policy(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(FacegateError::WeakPassword(format!(
            "must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_letter && has_digit) {
        return Err(FacegateError::WeakPassword(
            "must contain at least one letter and one number".into(),
        ));
    }
    Ok(())
}

/// Opaque bearer credential returned by the session store.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(Zeroizing<String>);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Zeroizing::new(token.into()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_accepts_valid_email() {
        let subject = Subject::parse("  ada@example.org ").unwrap();
        assert_eq!(subject.as_str(), "ada@example.org");
        assert_eq!(subject.to_string(), "ada@example.org");
    }

    #[test]
    fn test_subject_rejects_malformed_email() {
        for bad in ["", "ada", "ada@", "ada@example", "ada@example.c", "a b@example.org"] {
            assert!(
                matches!(Subject::parse(bad), Err(FacegateError::InvalidSubject(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_subject_serde_validates() {
        let ok: Subject = serde_json::from_str("\"x@y.io\"").unwrap();
        assert_eq!(ok.as_str(), "x@y.io");
        assert!(serde_json::from_str::<Subject>("\"nope\"").is_err());
    }

    #[test]
    fn test_password_policy() {
        assert!(NewPassword::new("hunter22").is_ok());
        assert!(matches!(
            NewPassword::new("short1"),
            Err(FacegateError::WeakPassword(_))
        ));
        assert!(matches!(
            NewPassword::new("lettersonly"),
            Err(FacegateError::WeakPassword(_))
        ));
        assert!(matches!(
            NewPassword::new("1234567890"),
            Err(FacegateError::WeakPassword(_))
        ));
    }

    #[test]
    fn test_secrets_are_redacted_in_debug() {
        let password = NewPassword::new("correcthorse9").unwrap();
        let token = BearerToken::new("eyJhbGciOi");
        assert!(!format!("{password:?}").contains("correcthorse9"));
        assert!(!format!("{token:?}").contains("eyJhbGciOi"));
        assert_eq!(token.expose(), "eyJhbGciOi");
    }
}
