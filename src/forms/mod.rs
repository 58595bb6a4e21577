//! Form validation and form state

pub mod state;
pub mod strength;
pub mod validate;

pub use state::{
    AuthForm, Credentials, FormMode, FormRejection, ProfileField, ProfileForm, Registration,
    SubmitState,
};
pub use strength::{present, StrengthLabel, StrengthReport};
pub use validate::{validate, validate_field, Field, PasswordCheck, Requirement, ValidationResult};
