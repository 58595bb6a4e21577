//! Form state owned by the login/signup and profile views

use crate::account::identity::Identity;
use crate::account::profile::ProfileDocument;
use crate::forms::validate::{
    check_name, check_password, check_phone, validate_field, Field, PasswordCheck, MAX_STRENGTH,
    PASSWORD_REQUIRED,
};
use std::collections::BTreeMap;

pub const VALIDATION_TITLE: &str = "Form Validation Error";
pub const WEAK_PASSWORD_MESSAGE: &str = "Password must meet all security requirements";
pub const PASSWORD_MISMATCH: &str = "Passwords do not match";

/// Lifecycle of a submit button.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubmitState {
    #[default]
    Idle,
    Submitting,
    Success,
    Error(String),
}

impl SubmitState {
    pub fn is_submitting(&self) -> bool {
        matches!(self, SubmitState::Submitting)
    }

    /// Moves to `Submitting`; returns false if a submit is already running.
    pub fn begin(&mut self) -> bool {
        if self.is_submitting() {
            return false;
        }
        *self = SubmitState::Submitting;
        true
    }

    pub fn finish<T, E: ToString>(&mut self, outcome: &Result<T, E>) {
        *self = match outcome {
            Ok(_) => SubmitState::Success,
            Err(e) => SubmitState::Error(e.to_string()),
        };
    }
}

/// Validation failures collected at submit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRejection {
    pub errors: BTreeMap<Field, String>,
    pub messages: Vec<String>,
}

impl FormRejection {
    pub fn title(&self) -> &'static str {
        VALIDATION_TITLE
    }

    /// The first three messages, with a marker when more were dropped.
    pub fn summary(&self) -> String {
        if self.messages.is_empty() {
            return "Please fill in all required fields correctly".to_string();
        }
        let mut summary = self
            .messages
            .iter()
            .take(3)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if self.messages.len() > 3 {
            summary.push_str(", and more...");
        }
        summary
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Login,
    Signup,
}

impl FormMode {
    pub fn fields(&self) -> &'static [Field] {
        match self {
            FormMode::Login => &[Field::Email, Field::Password],
            FormMode::Signup => &[
                Field::FullName,
                Field::Email,
                Field::PhoneNumber,
                Field::Password,
            ],
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            FormMode::Login => FormMode::Signup,
            FormMode::Signup => FormMode::Login,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Login { email: String, password: String },
    Signup(Registration),
}

#[derive(Debug, Clone)]
pub struct AuthForm {
    mode: FormMode,
    inputs: BTreeMap<Field, String>,
    errors: BTreeMap<Field, String>,
    password: Option<PasswordCheck>,
    pub submit: SubmitState,
}

impl AuthForm {
    pub fn new(mode: FormMode) -> Self {
        Self {
            mode,
            inputs: BTreeMap::new(),
            errors: BTreeMap::new(),
            password: None,
            submit: SubmitState::Idle,
        }
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    /// Switching between login and signup discards everything typed so far.
    pub fn switch_mode(&mut self) {
        *self = Self::new(self.mode.toggled());
    }

    /// Records a keystroke and revalidates that field.
    pub fn set_input(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        let result = validate_field(field, &value);
        if let Some(check) = result.password() {
            self.password = Some(check.clone());
        }
        self.errors.insert(field, result.error().to_string());
        self.inputs.insert(field, value);
    }

    pub fn input(&self, field: Field) -> &str {
        self.inputs.get(&field).map(String::as_str).unwrap_or_default()
    }

    /// The field's current error, if it has one.
    pub fn error(&self, field: Field) -> Option<&str> {
        self.errors
            .get(&field)
            .map(String::as_str)
            .filter(|e| !e.is_empty())
    }

    pub fn password_check(&self) -> Option<&PasswordCheck> {
        self.password.as_ref()
    }

    pub fn strength(&self) -> usize {
        self.password.as_ref().map_or(0, |c| c.strength)
    }

    pub fn can_submit(&self) -> bool {
        if self.submit.is_submitting() {
            return false;
        }
        match self.mode {
            FormMode::Login => true,
            FormMode::Signup => self.strength() == MAX_STRENGTH,
        }
    }

    /// Validates every field of the current mode. On failure the per-field errors
    /// are stored on the form and returned for display.
    pub fn validate_for_submit(&mut self) -> Result<Credentials, FormRejection> {
        let mut errors = BTreeMap::new();
        let mut messages = Vec::new();

        for &field in self.mode.fields() {
            let value = self.input(field).to_string();
            let error = match (self.mode, field) {
                // Existing accounts may predate the complexity rules.
                (FormMode::Login, Field::Password) if !value.is_empty() => String::new(),
                (FormMode::Login, Field::Password) => PASSWORD_REQUIRED.to_string(),
                (FormMode::Signup, Field::Password) if !value.is_empty() => {
                    if check_password(&value).strength < MAX_STRENGTH {
                        WEAK_PASSWORD_MESSAGE.to_string()
                    } else {
                        String::new()
                    }
                }
                _ => validate_field(field, &value).error().to_string(),
            };
            if error.is_empty() {
                continue;
            }
            if value.is_empty() {
                messages.push(format!("{} is required", field.label()));
            } else {
                messages.push(error.clone());
            }
            errors.insert(field, error);
        }

        if !errors.is_empty() {
            self.errors = errors.clone();
            return Err(FormRejection { errors, messages });
        }

        let email = self.input(Field::Email).trim().to_string();
        let password = self.input(Field::Password).to_string();
        Ok(match self.mode {
            FormMode::Login => Credentials::Login { email, password },
            FormMode::Signup => Credentials::Signup(Registration {
                email,
                password,
                name: self.input(Field::FullName).trim().to_string(),
                phone: self.input(Field::PhoneNumber).trim().to_string(),
            }),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProfileField {
    Name,
    Phone,
    CurrentPassword,
    NewPassword,
    ConfirmPassword,
}

/// Editable copy of the profile for the dashboard's profile tab.
#[derive(Debug, Clone, Default)]
pub struct ProfileForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
    pub editing: bool,
    pub submit: SubmitState,
    errors: BTreeMap<ProfileField, String>,
    password_check: Option<PasswordCheck>,
}

impl ProfileForm {
    pub fn from_profile(identity: &Identity, profile: Option<&ProfileDocument>) -> Self {
        let name = profile
            .map(|p| p.name.clone())
            .filter(|n| !n.is_empty())
            .or_else(|| identity.display_name.clone())
            .unwrap_or_default();
        Self {
            name,
            email: identity.email.clone(),
            phone: profile.and_then(|p| p.phone.clone()).unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Discards edits and reloads the values from the stored profile.
    pub fn cancel(&mut self, identity: &Identity, profile: Option<&ProfileDocument>) {
        *self = Self::from_profile(identity, profile);
    }

    /// Typing into a field clears its error.
    pub fn set(&mut self, field: ProfileField, value: impl Into<String>) {
        let value = value.into();
        if field == ProfileField::NewPassword {
            self.password_check = Some(check_password(&value));
        }
        match field {
            ProfileField::Name => self.name = value,
            ProfileField::Phone => self.phone = value,
            ProfileField::CurrentPassword => self.current_password = value,
            ProfileField::NewPassword => self.new_password = value,
            ProfileField::ConfirmPassword => self.confirm_password = value,
        }
        self.errors.remove(&field);
    }

    pub fn error(&self, field: ProfileField) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    pub fn password_check(&self) -> Option<&PasswordCheck> {
        self.password_check.as_ref()
    }

    pub fn validate_personal(&mut self) -> bool {
        self.errors.clear();
        let name_error = check_name(&self.name);
        if !name_error.is_empty() {
            self.errors.insert(ProfileField::Name, name_error);
        }
        // Federated profiles start without a phone number.
        let phone = self.phone.trim();
        if !phone.is_empty() {
            let phone_error = check_phone(phone);
            if !phone_error.is_empty() {
                self.errors.insert(ProfileField::Phone, phone_error);
            }
        }
        self.errors.is_empty()
    }

    pub fn validate_security(&mut self) -> bool {
        self.errors.clear();
        let check = check_password(&self.new_password);
        if !check.error.is_empty() {
            self.errors.insert(ProfileField::NewPassword, check.error);
        }
        if self.new_password != self.confirm_password {
            self.errors
                .insert(ProfileField::ConfirmPassword, PASSWORD_MISMATCH.to_string());
        }
        self.errors.is_empty()
    }

    pub fn clear_passwords(&mut self) {
        self.current_password.clear();
        self.new_password.clear();
        self.confirm_password.clear();
        self.password_check = None;
    }
}
