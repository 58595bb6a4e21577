//! Login and signup page

use crate::account::gateway::AuthGateway;
use crate::forms::state::{AuthForm, Credentials, FormMode, SubmitState};
use crate::forms::validate::{check_email, Field};
use crate::views::{Notification, Outcome, Route};

pub struct LoginView {
    gateway: AuthGateway,
    pub form: AuthForm,
    pub google: SubmitState,
}

impl LoginView {
    pub fn new(gateway: AuthGateway, mode: FormMode) -> Self {
        Self {
            gateway,
            form: AuthForm::new(mode),
            google: SubmitState::Idle,
        }
    }

    pub fn set_input(&mut self, field: Field, value: impl Into<String>) {
        self.form.set_input(field, value);
    }

    pub fn switch_mode(&mut self) {
        self.form.switch_mode();
    }

    /// `None` while a submit is already running.
    pub async fn submit(&mut self) -> Option<Outcome> {
        if !self.form.submit.begin() {
            return None;
        }

        let credentials = match self.form.validate_for_submit() {
            Ok(credentials) => credentials,
            Err(rejection) => {
                let summary = rejection.summary();
                self.form.submit = SubmitState::Error(summary.clone());
                return Some(Outcome::show(Notification::error(rejection.title(), summary)));
            }
        };

        let outcome = match credentials {
            Credentials::Login { email, password } => {
                let result = self.gateway.login(&email, &password).await;
                self.form.submit.finish(&result);
                match result {
                    Ok(_) => Outcome::show(Notification::success("Login Successful", "Welcome back!"))
                        .then(Route::Dashboard),
                    Err(e) => Outcome::show(Notification::error("Login Failed", e.friendly_message())),
                }
            }
            Credentials::Signup(registration) => {
                let result = self
                    .gateway
                    .register(
                        &registration.email,
                        &registration.password,
                        &registration.name,
                        &registration.phone,
                    )
                    .await;
                self.form.submit.finish(&result);
                match result {
                    Ok(_) => Outcome::show(Notification::success(
                        "Account Created",
                        "Your account has been created successfully!",
                    ))
                    .then(Route::Verify),
                    Err(e) => Outcome::show(Notification::error(
                        "Registration Failed",
                        e.friendly_message(),
                    )),
                }
            }
        };
        Some(outcome)
    }

    pub async fn sign_in_with_google(&mut self) -> Option<Outcome> {
        if !self.google.begin() {
            return None;
        }
        let result = self.gateway.sign_in_with_google().await;
        self.google.finish(&result);
        Some(match result {
            Ok(_) => Outcome::show(Notification::success(
                "Google Sign-in Successful",
                "You're logged in!",
            ))
            .then(Route::Dashboard),
            Err(e) => Outcome::show(Notification::error(
                "Google Sign-in Failed",
                e.friendly_message(),
            )),
        })
    }

    /// Sends a reset link to the email typed into the form.
    pub async fn reset_password(&self) -> Outcome {
        let email = self.form.input(Field::Email).trim().to_string();
        if email.is_empty() {
            return Outcome::show(Notification::warning(
                "Missing Email",
                "Please enter your email first.",
            ));
        }
        if !check_email(&email).is_empty() {
            return Outcome::show(Notification::warning(
                "Invalid Email",
                "Please enter a valid email address.",
            ));
        }
        match self.gateway.reset_password(&email).await {
            Ok(()) => Outcome::show(Notification::success(
                "Reset Email Sent",
                "Check your inbox for reset instructions.",
            )),
            Err(e) => Outcome::show(Notification::error("Reset Failed", e.friendly_message())),
        }
    }

    pub fn mode(&self) -> FormMode {
        self.form.mode()
    }
}
