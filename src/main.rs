use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use school_portal::account::{
    AuthErrorCode, FederatedProvider, OAuthCredential, PopupHandler, PortalError, ProviderError,
};
use school_portal::api::{create_router, AppState};
use school_portal::backend::{EmailJs, FirebaseAuth, Firestore};
use school_portal::contact::ContactMessage;
use school_portal::forms::{present, validate, Field, FormMode, ProfileField};
use school_portal::views::Outcome;
use school_portal::{AppContext, PortalConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "portal", about = "School portal account tools")]
struct Cli {
    #[arg(long, default_value = "portal.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct SignIn {
    #[arg(long)]
    email: Option<String>,

    #[arg(long, default_value = "")]
    password: String,

    /// Google ID token; signs in through Google instead of email/password.
    #[arg(long)]
    id_token: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate one form field the way the sign-up form does
    Validate {
        #[arg(long)]
        field: String,
        #[arg(long, default_value = "")]
        value: String,
    },
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
    },
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Google {
        #[arg(long)]
        id_token: String,
    },
    ResetPassword {
        #[arg(long)]
        email: String,
    },
    /// Wait until the account's email is verified
    Verify {
        #[command(flatten)]
        sign_in: SignIn,
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,
        /// Send a fresh verification email before waiting
        #[arg(long)]
        resend: bool,
    },
    Profile {
        #[command(flatten)]
        sign_in: SignIn,
    },
    UpdateProfile {
        #[command(flatten)]
        sign_in: SignIn,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        phone: String,
    },
    ChangePassword {
        #[command(flatten)]
        sign_in: SignIn,
        #[arg(long)]
        new_password: String,
    },
    DeleteAccount {
        #[command(flatten)]
        sign_in: SignIn,
    },
    /// Relay a message through the contact form
    Contact {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long)]
        subject: String,
        #[arg(long, default_value = "")]
        grade_level: String,
        #[arg(long)]
        message: String,
    },
    /// Serve the validation and contact endpoints over HTTP
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
}

/// Stands in for the browser popup: hands over a token obtained elsewhere.
struct TokenPopup {
    id_token: Option<String>,
}

#[async_trait]
impl PopupHandler for TokenPopup {
    async fn open(&self, provider: FederatedProvider) -> Result<OAuthCredential, PortalError> {
        match &self.id_token {
            Some(token) => Ok(OAuthCredential {
                provider,
                id_token: Some(token.clone()),
                access_token: None,
            }),
            None => Err(ProviderError::from_code(AuthErrorCode::PopupClosedByUser).into()),
        }
    }
}

fn build_context(config: PortalConfig, id_token: Option<String>) -> anyhow::Result<AppContext> {
    config.validate().context("invalid configuration")?;
    let auth = Arc::new(
        FirebaseAuth::new(&config.firebase).with_popup_handler(Arc::new(TokenPopup { id_token })),
    );
    let store = Arc::new(Firestore::new(&config.firebase, auth.clone()));
    let email = Arc::new(EmailJs::new(config.email.clone()));
    Ok(AppContext::start(config, auth, store, email))
}

fn report(outcome: &Outcome) {
    println!("{}", outcome.notification);
    if let Some(route) = outcome.navigate {
        info!("Next: {}", route.path());
    }
}

fn finish(outcome: Option<Outcome>) -> anyhow::Result<()> {
    let Some(outcome) = outcome else {
        bail!("request already in progress");
    };
    report(&outcome);
    if !outcome.is_success() {
        bail!("{}", outcome.notification.message);
    }
    Ok(())
}

/// Signs in through the login view and waits for the session to pick it up.
async fn sign_in(ctx: &AppContext, sign_in: &SignIn) -> anyhow::Result<()> {
    let mut view = ctx.login_view(FormMode::Login);
    let outcome = if sign_in.id_token.is_some() {
        view.sign_in_with_google().await
    } else {
        let Some(email) = &sign_in.email else {
            bail!("either --email or --id-token is required");
        };
        view.set_input(Field::Email, email.as_str());
        view.set_input(Field::Password, sign_in.password.as_str());
        view.submit().await
    };
    finish(outcome)?;
    ctx.session
        .wait_until(|s| !s.loading && s.identity.is_some())
        .await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = PortalConfig::load(&cli.config)
        .with_context(|| format!("load config {}", cli.config))?
        .apply_env_overrides();

    match cli.command {
        Command::Validate { field, value } => {
            let result = validate(&field, &value);
            println!("{}", serde_json::to_string_pretty(&result)?);
            if let Some(check) = result.password() {
                println!("{}", present(check.strength, &check.requirements));
            }
        }
        Command::Register {
            email,
            password,
            name,
            phone,
        } => {
            let ctx = build_context(config, None)?;
            let mut view = ctx.login_view(FormMode::Signup);
            view.set_input(Field::FullName, name);
            view.set_input(Field::Email, email);
            view.set_input(Field::PhoneNumber, phone);
            view.set_input(Field::Password, password);
            let outcome = view.submit().await;
            ctx.teardown();
            finish(outcome)?;
        }
        Command::Login { email, password } => {
            let ctx = build_context(config, None)?;
            let result = sign_in(
                &ctx,
                &SignIn {
                    email: Some(email),
                    password,
                    id_token: None,
                },
            )
            .await;
            ctx.teardown();
            result?;
        }
        Command::Google { id_token } => {
            let ctx = build_context(config, Some(id_token))?;
            let mut view = ctx.login_view(FormMode::Login);
            let outcome = view.sign_in_with_google().await;
            ctx.teardown();
            finish(outcome)?;
        }
        Command::ResetPassword { email } => {
            let ctx = build_context(config, None)?;
            let mut view = ctx.login_view(FormMode::Login);
            view.set_input(Field::Email, email);
            let outcome = view.reset_password().await;
            ctx.teardown();
            finish(Some(outcome))?;
        }
        Command::Verify {
            sign_in: creds,
            timeout_secs,
            resend,
        } => {
            let ctx = build_context(config, creds.id_token.clone())?;
            sign_in(&ctx, &creds).await?;
            let mut view = ctx.verify_view();
            if let Some(email) = view.email() {
                println!("Waiting for {} to be verified", email);
            }
            if resend {
                if let Some(outcome) = view.resend().await {
                    report(&outcome);
                }
            }
            let outcome = tokio::time::timeout(Duration::from_secs(timeout_secs), view.wait())
                .await
                .context("timed out waiting for email verification")?;
            report(&outcome);
            ctx.teardown();
        }
        Command::Profile { sign_in: creds } => {
            let ctx = build_context(config, creds.id_token.clone())?;
            sign_in(&ctx, &creds).await?;
            let state = ctx.session_state();
            match &state.profile {
                Some(profile) => println!("{}", serde_json::to_string_pretty(profile)?),
                None => println!(
                    "No profile document for {}",
                    state.identity.map(|i| i.uid).unwrap_or_default()
                ),
            }
            ctx.teardown();
        }
        Command::UpdateProfile {
            sign_in: creds,
            name,
            phone,
        } => {
            let ctx = build_context(config, creds.id_token.clone())?;
            sign_in(&ctx, &creds).await?;
            let mut view = ctx.profile_view();
            view.edit();
            view.form.set(ProfileField::Name, name);
            view.form.set(ProfileField::Phone, phone);
            let outcome = view.save_personal_info(&ctx.session).await;
            if outcome.is_none() {
                for field in [ProfileField::Name, ProfileField::Phone] {
                    if let Some(error) = view.form.error(field) {
                        println!("{:?}: {}", field, error);
                    }
                }
            }
            ctx.teardown();
            finish(outcome)?;
        }
        Command::ChangePassword {
            sign_in: creds,
            new_password,
        } => {
            let ctx = build_context(config, None)?;
            sign_in(&ctx, &creds).await?;
            let mut view = ctx.profile_view();
            view.form.set(ProfileField::CurrentPassword, creds.password.as_str());
            view.form.set(ProfileField::NewPassword, new_password.as_str());
            view.form.set(ProfileField::ConfirmPassword, new_password);
            let outcome = view.change_password().await;
            if outcome.is_none() {
                for field in [ProfileField::NewPassword, ProfileField::ConfirmPassword] {
                    if let Some(error) = view.form.error(field) {
                        println!("{:?}: {}", field, error);
                    }
                }
            }
            ctx.teardown();
            finish(outcome)?;
        }
        Command::DeleteAccount { sign_in: creds } => {
            let ctx = build_context(config, creds.id_token.clone())?;
            sign_in(&ctx, &creds).await?;
            let mut view = ctx.profile_view();
            let outcome = view.delete_account(&creds.password).await;
            ctx.teardown();
            finish(outcome)?;
        }
        Command::Contact {
            name,
            email,
            phone,
            subject,
            grade_level,
            message,
        } => {
            let ctx = build_context(config, None)?;
            let mut view = ctx.contact_view();
            view.message = ContactMessage {
                name,
                email,
                phone,
                subject,
                grade_level,
                message,
            };
            if let Some(rejected) = view.submit() {
                ctx.teardown();
                return finish(Some(rejected));
            }
            let outcome = view.next_result().await;
            ctx.teardown();
            finish(outcome)?;
        }
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let email = Arc::new(EmailJs::new(config.email.clone()));
            let app = create_router(AppState { email });

            let listener = tokio::net::TcpListener::bind(&bind)
                .await
                .with_context(|| format!("bind {}", bind))?;
            info!("Portal API listening on {}", bind);
            axum::serve(listener, app).await?;
        }
    }
    Ok(())
}
