//! Password reset command implementation.

use anyhow::Result;
use facegate_core::{NewPassword, SessionMode, Subject};

use super::{run_face_session, Context};
use crate::SessionArgs;

/// Execute the reset command.
pub async fn execute(
    ctx: &Context,
    email: String,
    new_password: String,
    session: SessionArgs,
) -> Result<()> {
    let subject = Subject::parse(&email)?;
    let new_password = NewPassword::new(new_password)?;

    let success = run_face_session(
        ctx,
        subject,
        SessionMode::PasswordReset,
        Some(new_password),
        &session,
    )
    .await?;

    let attempts = success.attempts.to_string();
    ctx.presenter().success(
        "PASSWORD RESET",
        &[
            ("Account:", success.subject.as_str()),
            ("Attempts:", attempts.as_str()),
        ],
    );
    Ok(())
}
