use std::collections::HashSet;

use lazy_static::lazy_static;
use thiserror::Error;

lazy_static! {
    static ref COMMON_PASSWORDS: HashSet<&'static str> = [
        "password", "password1", "123456", "12345678", "qwerty", "abc123", "monkey",
        "1234567", "letmein", "trustno1", "dragon", "baseball", "iloveyou", "master",
        "sunshine", "ashley", "bailey", "passw0rd", "shadow", "123123", "654321",
        "superman", "qazwsx", "michael", "football",
    ]
    .into_iter()
    .collect();
}

const SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>/?";

/// Rules a new password must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_upper: bool,
    pub require_lower: bool,
    pub require_digit: bool,
    pub require_special: bool,
    pub reject_common: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_upper: true,
            require_lower: true,
            require_digit: true,
            require_special: true,
            reject_common: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("password must be at least {0} characters long")]
    TooShort(usize),
    #[error("password is too common, please choose a stronger password")]
    TooCommon,
    #[error("password must contain at least one uppercase letter")]
    MissingUppercase,
    #[error("password must contain at least one lowercase letter")]
    MissingLowercase,
    #[error("password must contain at least one number")]
    MissingDigit,
    #[error("password must contain at least one special character")]
    MissingSpecial,
}

impl PasswordPolicy {
    /// Returns the first rule the password breaks. Order: length, denylist,
    /// then character classes.
    pub fn validate(&self, password: &str) -> Result<(), PolicyViolation> {
        if password.chars().count() < self.min_length {
            return Err(PolicyViolation::TooShort(self.min_length));
        }
        if self.reject_common && is_common(password) {
            return Err(PolicyViolation::TooCommon);
        }
        if self.require_upper && !password.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(PolicyViolation::MissingUppercase);
        }
        if self.require_lower && !password.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(PolicyViolation::MissingLowercase);
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PolicyViolation::MissingDigit);
        }
        if self.require_special && !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
            return Err(PolicyViolation::MissingSpecial);
        }
        Ok(())
    }
}

fn is_common(password: &str) -> bool {
    COMMON_PASSWORDS.contains(password.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_compliant_password() {
        assert_eq!(PasswordPolicy::default().validate("Fl33t!Pass"), Ok(()));
    }

    #[test]
    fn short_passwords_fail_on_length_first() {
        let policy = PasswordPolicy::default();
        for pw in ["", "a", "Ab1!", "Ab1!xyz", "qwerty"] {
            assert_eq!(policy.validate(pw), Err(PolicyViolation::TooShort(8)), "{pw}");
        }
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        // seven characters, more than eight bytes
        assert_eq!(
            PasswordPolicy::default().validate("Éé1!Éé1"),
            Err(PolicyViolation::TooShort(8))
        );
    }

    #[test]
    fn denylist_is_case_insensitive_and_checked_before_classes() {
        let policy = PasswordPolicy::default();
        assert_eq!(policy.validate("PassW0rd"), Err(PolicyViolation::TooCommon));
        assert_eq!(policy.validate("FOOTBALL"), Err(PolicyViolation::TooCommon));
        assert_eq!(policy.validate("12345678"), Err(PolicyViolation::TooCommon));
    }

    #[test]
    fn denylist_can_be_disabled() {
        let policy = PasswordPolicy {
            require_upper: false,
            require_digit: false,
            require_special: false,
            reject_common: false,
            ..PasswordPolicy::default()
        };
        assert_eq!(policy.validate("football"), Ok(()));
    }

    #[test]
    fn reports_first_missing_class() {
        let policy = PasswordPolicy::default();
        assert_eq!(policy.validate("lower1!case"), Err(PolicyViolation::MissingUppercase));
        assert_eq!(policy.validate("UPPER1!CASE"), Err(PolicyViolation::MissingLowercase));
        assert_eq!(policy.validate("NoDigits!x"), Err(PolicyViolation::MissingDigit));
        assert_eq!(policy.validate("NoSpecial1x"), Err(PolicyViolation::MissingSpecial));
    }

    #[test]
    fn custom_min_length_is_reported() {
        let policy = PasswordPolicy {
            min_length: 12,
            ..PasswordPolicy::default()
        };
        let err = policy.validate("Fl33t!Pass").unwrap_err();
        assert_eq!(err, PolicyViolation::TooShort(12));
        assert_eq!(err.to_string(), "password must be at least 12 characters long");
    }
}
