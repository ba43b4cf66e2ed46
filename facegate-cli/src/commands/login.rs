//! Login command implementation.

use anyhow::{Context as _, Result};
use facegate_core::{AccountClient, SessionMode, Subject, SuccessEffect};
use tracing::info;

use super::{run_face_session, Context};
use crate::exit_codes::FlowError;
use crate::SessionArgs;

/// Execute the login command.
pub async fn execute(
    ctx: &Context,
    email: String,
    password: Option<String>,
    session: SessionArgs,
) -> Result<()> {
    let subject = Subject::parse(&email)?;
    let presenter = ctx.presenter();

    let token = match password {
        Some(password) => {
            let accounts = AccountClient::new(ctx.api.clone())?;
            let token = accounts
                .login_with_password(&subject, &password)
                .await
                .context("Password login failed")?;
            info!(subject = %subject, "Logged in with password");
            token
        }
        None => {
            let success =
                run_face_session(ctx, subject.clone(), SessionMode::Login, None, &session).await?;
            match success.effect {
                SuccessEffect::CredentialIssued(token) => token,
                SuccessEffect::PasswordReset => {
                    return Err(FlowError::Unverified("no credential issued".into()).into())
                }
            }
        }
    };

    presenter.success("LOGGED IN", &[("Account:", subject.as_str())]);
    // The token goes to stdout even in quiet mode so scripts can capture it.
    println!("{}", token.expose());
    Ok(())
}
