//! Enroll command implementation.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use facegate_core::{AccountClient, EnrollmentCapture, NewPassword, Registration, Subject};
use tracing::info;

use super::{open_camera, Context};
use crate::exit_codes::FlowError;
use crate::CameraArgs;

pub struct EnrollRequest {
    pub email: String,
    pub password: Option<String>,
    pub output: Option<PathBuf>,
    pub register: bool,
    pub now: bool,
    pub camera: CameraArgs,
}

/// Execute the enroll command.
pub async fn execute(ctx: &Context, request: EnrollRequest) -> Result<()> {
    let subject = Subject::parse(&request.email)?;
    let password = request.password.map(NewPassword::new).transpose()?;
    if request.output.is_none() && !request.register {
        return Err(FlowError::Usage("nothing to do: pass --output FILE and/or --register".into()).into());
    }

    let presenter = ctx.presenter();
    let device = open_camera(&request.camera)?;
    let preview = EnrollmentCapture::new(device)
        .open()
        .await
        .context("Failed to open camera")?;

    if !request.now {
        presenter.prompt("Camera ready. Press Enter to capture...");
        wait_for_enter().await?;
    }
    let image = preview.capture().await.context("Capture failed")?;
    info!(width = image.width(), height = image.height(), "Enrollment image captured");

    let mut details = vec![("Account:", subject.as_str().to_string())];
    if let Some(path) = &request.output {
        std::fs::write(path, image.jpeg())
            .with_context(|| format!("Failed to write image: {}", path.display()))?;
        details.push(("Saved to:", path.display().to_string()));
    }

    if request.register {
        let mut registration = Registration::new(subject.clone()).with_enrollment(image);
        if let Some(password) = password {
            registration = registration.with_password(password);
        }
        AccountClient::new(ctx.api.clone())?
            .register(&registration)
            .await
            .context("Registration failed")?;
        details.push(("Registered:", "yes".to_string()));
    }

    let details: Vec<(&str, &str)> = details.iter().map(|(k, v)| (*k, v.as_str())).collect();
    presenter.success("FACE ENROLLED", &details);
    Ok(())
}

async fn wait_for_enter() -> Result<()> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| ())
    })
    .await
    .context("Input task failed")?
    .context("Failed to read from stdin")
}
