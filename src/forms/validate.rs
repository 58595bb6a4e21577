//! Per-field validation rules shared by the login, signup, profile and contact forms

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{10,15}$").expect("phone pattern"));

pub const NAME_ERROR: &str = "Must be at least 2 characters";
pub const EMAIL_ERROR: &str = "Invalid email address";
pub const PHONE_ERROR: &str = "Invalid phone number";
pub const PASSWORD_REQUIRED: &str = "Password is required";
pub const PASSWORD_INCOMPLETE: &str = "Password must meet all requirements";

/// Number of password requirements; a password is accepted only when all are met.
pub const MAX_STRENGTH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    FullName,
    Email,
    PhoneNumber,
    Password,
}

impl Field {
    pub fn label(&self) -> &'static str {
        match self {
            Field::FullName => "Full Name",
            Field::Email => "Email",
            Field::PhoneNumber => "Phone Number",
            Field::Password => "Password",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Full Name" => Some(Field::FullName),
            "Email" => Some(Field::Email),
            "Phone Number" => Some(Field::PhoneNumber),
            "Password" => Some(Field::Password),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    pub met: bool,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordCheck {
    pub error: String,
    pub strength: usize,
    pub requirements: Vec<Requirement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ValidationResult {
    Text(String),
    Password(PasswordCheck),
}

impl ValidationResult {
    /// Empty when the value is acceptable.
    pub fn error(&self) -> &str {
        match self {
            ValidationResult::Text(e) => e,
            ValidationResult::Password(check) => &check.error,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.error().is_empty()
    }

    pub fn password(&self) -> Option<&PasswordCheck> {
        match self {
            ValidationResult::Password(check) => Some(check),
            ValidationResult::Text(_) => None,
        }
    }
}

/// Validates by display label. Unknown labels are accepted as-is.
pub fn validate(field_name: &str, value: &str) -> ValidationResult {
    match Field::from_label(field_name) {
        Some(field) => validate_field(field, value),
        None => ValidationResult::Text(String::new()),
    }
}

pub fn validate_field(field: Field, value: &str) -> ValidationResult {
    match field {
        Field::FullName => ValidationResult::Text(check_name(value)),
        Field::Email => ValidationResult::Text(check_email(value)),
        Field::PhoneNumber => ValidationResult::Text(check_phone(value)),
        Field::Password => ValidationResult::Password(check_password(value)),
    }
}

pub fn check_name(value: &str) -> String {
    if value.trim().chars().count() >= 2 {
        String::new()
    } else {
        NAME_ERROR.to_string()
    }
}

pub fn check_email(value: &str) -> String {
    if EMAIL_RE.is_match(value) {
        String::new()
    } else {
        EMAIL_ERROR.to_string()
    }
}

pub fn check_phone(value: &str) -> String {
    if PHONE_RE.is_match(value) {
        String::new()
    } else {
        PHONE_ERROR.to_string()
    }
}

pub fn check_password(value: &str) -> PasswordCheck {
    if value.is_empty() {
        return PasswordCheck {
            error: PASSWORD_REQUIRED.to_string(),
            strength: 0,
            requirements: Vec::new(),
        };
    }

    // Display order is fixed.
    let requirements = vec![
        Requirement {
            met: value.chars().count() >= 8,
            description: "At least 8 characters",
        },
        Requirement {
            met: value.chars().any(|c| c.is_ascii_lowercase()),
            description: "Lowercase letter (a-z)",
        },
        Requirement {
            met: value.chars().any(|c| c.is_ascii_uppercase()),
            description: "Uppercase letter (A-Z)",
        },
        Requirement {
            met: value.chars().any(|c| c.is_ascii_digit()),
            description: "Number (0-9)",
        },
        Requirement {
            met: value.chars().any(|c| !c.is_ascii_alphanumeric()),
            description: "Special character (!@#$% etc.)",
        },
    ];

    let strength = requirements.iter().filter(|r| r.met).count();
    let error = if strength == MAX_STRENGTH {
        String::new()
    } else {
        PASSWORD_INCOMPLETE.to_string()
    };

    PasswordCheck {
        error,
        strength,
        requirements,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_rule() {
        assert_eq!(validate("Email", "a@b.com").error(), "");
        assert_eq!(validate("Email", "not-an-email").error(), EMAIL_ERROR);
        assert_eq!(validate("Email", "a b@c.com").error(), EMAIL_ERROR);
        assert_eq!(validate("Email", "a@bcom").error(), EMAIL_ERROR);
    }

    #[test]
    fn test_phone_rule() {
        assert!(validate("Phone Number", "+2341234567890").is_valid());
        assert!(validate("Phone Number", "5551234567").is_valid());
        assert!(!validate("Phone Number", "123").is_valid());
        assert!(!validate("Phone Number", "+1234567890123456").is_valid());
        assert!(!validate("Phone Number", "555-123-4567").is_valid());
    }

    #[test]
    fn test_name_is_trimmed() {
        assert_eq!(validate("Full Name", "Al").error(), "");
        assert_eq!(validate("Full Name", " A ").error(), NAME_ERROR);
        assert_eq!(validate("Full Name", "").error(), NAME_ERROR);
    }

    #[test]
    fn test_unknown_field_is_accepted() {
        assert_eq!(validate("Favourite Colour", ""), ValidationResult::Text(String::new()));
    }

    #[test]
    fn test_empty_password() {
        let check = check_password("");
        assert_eq!(check.error, PASSWORD_REQUIRED);
        assert_eq!(check.strength, 0);
        assert!(check.requirements.is_empty());
    }

    #[test]
    fn test_strength_counts_met_requirements() {
        let cases = [
            ("a", 1),
            ("abcdefgh", 2),
            ("Abcdefgh", 3),
            ("Abcdefg1", 4),
            ("Abcd123!", 5),
            ("!!!!", 1),
            ("ÉÉÉÉÉÉÉÉ", 2),
        ];
        for (password, expected) in cases {
            let check = check_password(password);
            let met = check.requirements.iter().filter(|r| r.met).count();
            assert_eq!(check.strength, expected, "password {:?}", password);
            assert_eq!(check.strength, met);
            assert_eq!(check.error.is_empty(), check.strength == MAX_STRENGTH);
        }
    }

    #[test]
    fn test_requirement_order_is_stable() {
        let descriptions: Vec<_> = check_password("x")
            .requirements
            .iter()
            .map(|r| r.description)
            .collect();
        assert_eq!(
            descriptions,
            vec![
                "At least 8 characters",
                "Lowercase letter (a-z)",
                "Uppercase letter (A-Z)",
                "Number (0-9)",
                "Special character (!@#$% etc.)",
            ]
        );
    }
}
