//! Subcommand implementations and the face-session runner they share.

pub mod enroll;
pub mod login;
pub mod reset;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use facegate_core::{
    ApiConfig, CaptureDevice, FacegateError, FileCamera, HttpSessionStore, HttpVerifier,
    MockCamera, MockSessionStore, MockVerifier, NewPassword, SessionEvent, SessionMode,
    SessionStore, SessionSuccess, Subject, VerificationService, VerificationSession,
};
use tracing::{debug, info};

use crate::exit_codes::FlowError;
use crate::presenter::Presenter;
use crate::{CameraArgs, SessionArgs};

/// Settings shared by every subcommand.
pub struct Context {
    pub api: ApiConfig,
    pub quiet: bool,
}

impl Context {
    pub fn presenter(&self) -> Presenter {
        Presenter::new(self.quiet)
    }
}

/// Pick the capture source named on the command line.
pub fn open_camera(args: &CameraArgs) -> Result<Arc<dyn CaptureDevice>> {
    match (&args.frames, args.mock) {
        (Some(dir), _) => {
            if !dir.is_dir() {
                return Err(FlowError::Input(format!(
                    "Frames directory not found: {}",
                    dir.display()
                ))
                .into());
            }
            debug!(dir = %dir.display(), "Using file camera");
            Ok(Arc::new(FileCamera::new(dir)))
        }
        (None, true) => Ok(Arc::new(MockCamera::default().with_warmup(3))),
        (None, false) => Err(FacegateError::DeviceUnavailable(
            "no camera source; pass --frames DIR or --mock".into(),
        )
        .into()),
    }
}

/// Run one live session until it succeeds, fails terminally, or Ctrl-C.
pub async fn run_face_session(
    ctx: &Context,
    subject: Subject,
    mode: SessionMode,
    new_password: Option<NewPassword>,
    args: &SessionArgs,
) -> Result<SessionSuccess> {
    let device = open_camera(&args.camera)?;
    let (verifier, store): (Arc<dyn VerificationService>, Arc<dyn SessionStore>) =
        if args.camera.mock {
            (
                Arc::new(MockVerifier::matching_after(2)),
                Arc::new(MockSessionStore::new()),
            )
        } else {
            (
                Arc::new(HttpVerifier::new(ctx.api.clone())?),
                Arc::new(HttpSessionStore::new(ctx.api.clone())?),
            )
        };

    let mut builder = VerificationSession::builder(subject, mode)
        .device(device)
        .verifier(verifier)
        .store(store)
        .config(args.session_config());
    if let Some(password) = new_password {
        builder = builder.new_password(password);
    }
    let (mut session, mut events) = builder.build()?;

    let presenter = ctx.presenter();
    presenter.session_started(session.subject(), mode);
    session.start().await.context("Failed to start camera")?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let terminal = loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break None };
                presenter.show(&event);
                if event.is_terminal() {
                    break Some(event);
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted, stopping session");
                if let Some(report) = session.stop().await? {
                    presenter.report(&report);
                }
                return Err(FlowError::Cancelled.into());
            }
        }
    };

    if let Some(report) = session.wait().await? {
        presenter.report(&report);
    }
    match terminal {
        Some(SessionEvent::Success(success)) => Ok(success),
        Some(SessionEvent::Failure { reason, message, .. }) => {
            Err(FlowError::Unverified(format!("{reason}: {message}")).into())
        }
        _ => Err(FlowError::Unverified("session ended without a verdict".into()).into()),
    }
}
