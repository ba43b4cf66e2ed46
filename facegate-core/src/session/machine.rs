use std::future::{self, Future};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep, sleep_until, Instant, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, instrument, trace, warn, Instrument};
use uuid::Uuid;

use super::{
    FailureReason, FrameClock, SessionConfig, SessionEnd, SessionEvent, SessionMode,
    SessionReport, SessionState, SessionSuccess, SuccessEffect,
};
use crate::capture::{CaptureDevice, CaptureHandle, FrameSampler, SnapshotSampler};
use crate::credentials::{NewPassword, Subject};
use crate::error::{FacegateError, Result};
use crate::store::{SessionStore, VerifiedSubject};
use crate::verify::{
    Endpoint, MatchPayload, OutcomeError, VerificationOutcome, VerificationRequest,
    VerificationResponse, VerificationService,
};

type PendingOutcome = Pin<Box<dyn Future<Output = VerificationOutcome> + Send>>;

/// Builder for [`VerificationSession`].
///
/// A device, a verifier and a store are required; the sampler defaults to
/// [`SnapshotSampler`] and the config to [`SessionConfig::default`].
pub struct SessionBuilder {
    subject: Subject,
    mode: SessionMode,
    new_password: Option<NewPassword>,
    device: Option<Arc<dyn CaptureDevice>>,
    sampler: Arc<dyn FrameSampler>,
    verifier: Option<Arc<dyn VerificationService>>,
    store: Option<Arc<dyn SessionStore>>,
    config: SessionConfig,
}

impl SessionBuilder {
    pub fn new(subject: Subject, mode: SessionMode) -> Self {
        Self {
            subject,
            mode,
            new_password: None,
            device: None,
            sampler: Arc::new(SnapshotSampler::new()),
            verifier: None,
            store: None,
            config: SessionConfig::default(),
        }
    }

    pub fn device(mut self, device: Arc<dyn CaptureDevice>) -> Self {
        self.device = Some(device);
        self
    }

    pub fn sampler(mut self, sampler: Arc<dyn FrameSampler>) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn verifier(mut self, verifier: Arc<dyn VerificationService>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Password applied on success; required in password-reset mode.
    pub fn new_password(mut self, password: NewPassword) -> Self {
        self.new_password = Some(password);
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the session and the receiving end of its event stream.
    pub fn build(self) -> Result<(VerificationSession, mpsc::UnboundedReceiver<SessionEvent>)> {
        let device = self
            .device
            .ok_or_else(|| FacegateError::Config("capture device is required".into()))?;
        let verifier = self
            .verifier
            .ok_or_else(|| FacegateError::Config("verification service is required".into()))?;
        let store = self
            .store
            .ok_or_else(|| FacegateError::Config("session store is required".into()))?;

        let new_password = match (self.mode, self.new_password) {
            (SessionMode::PasswordReset, None) => {
                return Err(FacegateError::Config(
                    "password reset requires a new password".into(),
                ))
            }
            (SessionMode::PasswordReset, password) => password,
            (SessionMode::Login, _) => None,
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(SessionState::Idle);
        let session = VerificationSession {
            id: Uuid::new_v4(),
            subject: self.subject,
            mode: self.mode,
            parts: Arc::new(Collaborators {
                device,
                sampler: self.sampler,
                verifier,
                store,
                new_password,
                config: self.config,
            }),
            state: Arc::new(state),
            events: events_tx,
            running: None,
        };
        Ok((session, events_rx))
    }
}

/// Everything a run needs that does not change between runs.
struct Collaborators {
    device: Arc<dyn CaptureDevice>,
    sampler: Arc<dyn FrameSampler>,
    verifier: Arc<dyn VerificationService>,
    store: Arc<dyn SessionStore>,
    new_password: Option<NewPassword>,
    config: SessionConfig,
}

struct RunningTask {
    cancel: CancellationToken,
    task: JoinHandle<SessionReport>,
}

/// Live face verification state machine.
///
/// Each successful [`start`](Self::start) spawns one loop task owning the
/// capture stream. [`stop`](Self::stop) cancels it and waits until the
/// stream is released; dropping the session cancels it as well.
pub struct VerificationSession {
    id: Uuid,
    subject: Subject,
    mode: SessionMode,
    parts: Arc<Collaborators>,
    state: Arc<watch::Sender<SessionState>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    running: Option<RunningTask>,
}

impl VerificationSession {
    pub fn builder(subject: Subject, mode: SessionMode) -> SessionBuilder {
        SessionBuilder::new(subject, mode)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn config(&self) -> &SessionConfig {
        &self.parts.config
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Acquire the capture device and start sampling.
    ///
    /// Allowed from `Idle` or `Failed`; a restart from `Failed` goes back to
    /// `Idle` first. If the device cannot be acquired a `DeviceError` event
    /// is emitted, the session stays `Idle` and `DeviceUnavailable` is
    /// returned.
    #[instrument(level = "info", skip(self), fields(session_id = %self.id, subject = %self.subject, mode = %self.mode))]
    pub async fn start(&mut self) -> Result<()> {
        let current = self.state();
        if !matches!(current, SessionState::Idle | SessionState::Failed) {
            return Err(FacegateError::InvalidState {
                expected: "idle or failed",
                actual: current,
            });
        }

        // A failed run has already released its stream; reap its task.
        if let Some(previous) = self.running.take() {
            previous.cancel.cancel();
            if let Err(e) = previous.task.await {
                warn!(error = %e, "Previous session task ended abnormally");
            }
        }
        if current == SessionState::Failed {
            self.state.send_replace(SessionState::Idle);
        }

        let handle =
            match CaptureHandle::acquire(Arc::clone(&self.parts.device), &self.parts.config.constraints)
                .await
            {
                Ok(handle) => handle,
                Err(e) => {
                    warn!(error = %e, "Capture device unavailable");
                    let reason = match &e {
                        FacegateError::DeviceUnavailable(reason) => reason.clone(),
                        other => other.to_string(),
                    };
                    let _ = self.events.send(SessionEvent::DeviceError { reason });
                    return Err(e);
                }
            };

        self.state.send_replace(SessionState::Active);
        let cancel = CancellationToken::new();
        let run = Run {
            id: self.id,
            subject: self.subject.clone(),
            mode: self.mode,
            parts: Arc::clone(&self.parts),
            state: Arc::clone(&self.state),
            events: self.events.clone(),
            cancel: cancel.clone(),
            handle: Some(handle),
            pending: None,
            grace: None,
            attempts: 0,
            frames_sampled: 0,
            frames_not_ready: 0,
            gated_ticks: 0,
        };
        let span = info_span!("session_run", session_id = %self.id, mode = %self.mode);
        let task = tokio::spawn(run.drive().instrument(span));
        self.running = Some(RunningTask { cancel, task });
        info!("Session started");
        Ok(())
    }

    /// Cancel the current run and wait until its stream is released.
    ///
    /// An outstanding request is abandoned; its response, whenever it
    /// arrives, is discarded. Returns `None` if the session never started.
    #[instrument(level = "info", skip(self), fields(session_id = %self.id))]
    pub async fn stop(&mut self) -> Result<Option<SessionReport>> {
        let Some(running) = self.running.take() else {
            return Ok(None);
        };
        running.cancel.cancel();
        let report = self.reap(running.task.await)?;
        info!(end = ?report.end, attempts = report.attempts, "Session stopped");
        Ok(Some(report))
    }

    /// Wait for the current run to end on its own.
    ///
    /// Cancel safe: dropping the future leaves the run untouched, so it can
    /// be raced against a shutdown signal and followed by [`stop`](Self::stop).
    pub async fn wait(&mut self) -> Result<Option<SessionReport>> {
        let Some(running) = self.running.as_mut() else {
            return Ok(None);
        };
        let joined = (&mut running.task).await;
        self.running = None;
        self.reap(joined).map(Some)
    }

    fn reap(&self, joined: std::result::Result<SessionReport, JoinError>) -> Result<SessionReport> {
        joined.map_err(|e| {
            // The stream was released while the task unwound.
            self.state.send_replace(SessionState::Idle);
            FacegateError::TaskFailed(e.to_string())
        })
    }
}

impl Drop for VerificationSession {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.cancel.cancel();
        }
    }
}

struct Grace {
    timer: Pin<Box<Sleep>>,
    payload: MatchPayload,
}

/// State owned by one spawned loop task.
struct Run {
    id: Uuid,
    subject: Subject,
    mode: SessionMode,
    parts: Arc<Collaborators>,
    state: Arc<watch::Sender<SessionState>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
    handle: Option<CaptureHandle>,
    pending: Option<PendingOutcome>,
    grace: Option<Grace>,
    attempts: u32,
    frames_sampled: u64,
    frames_not_ready: u64,
    gated_ticks: u64,
}

impl Run {
    async fn drive(mut self) -> SessionReport {
        let started = Instant::now();
        let deadline = self.parts.config.max_duration.map(|limit| started + limit);
        let mut clock = FrameClock::new(&self.parts.config.cadence);
        let cancel = self.cancel.clone();

        let end = loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Some(SessionEnd::Cancelled),
                _ = until(deadline), if self.grace.is_none() => self.fail(
                    FailureReason::DeadlineExceeded,
                    format!("no match within {} s", self.parts.config.max_duration.unwrap_or_default().as_secs()),
                ),
                _ = grace_elapsed(&mut self.grace) => self.finalize().await,
                outcome = next_outcome(&mut self.pending) => self.on_outcome(outcome),
                _ = clock.tick() => {
                    self.on_tick();
                    None
                }
            };
            if let Some(end) = step {
                break end;
            }
        };

        if end == SessionEnd::Cancelled {
            self.conclude(SessionState::Idle);
        }
        debug!(
            end = ?end,
            attempts = self.attempts,
            frames_sampled = self.frames_sampled,
            gated_ticks = self.gated_ticks,
            "Session loop finished"
        );
        SessionReport {
            session_id: self.id,
            end,
            attempts: self.attempts,
            frames_sampled: self.frames_sampled,
            frames_not_ready: self.frames_not_ready,
            gated_ticks: self.gated_ticks,
            elapsed: started.elapsed(),
        }
    }

    /// One cadence tick: sample and dispatch unless the gate is closed.
    fn on_tick(&mut self) {
        let active = *self.state.borrow() == SessionState::Active;
        if !active || self.pending.is_some() || self.grace.is_some() {
            self.gated_ticks += 1;
            return;
        }
        let Some(handle) = self.handle.as_ref() else {
            self.gated_ticks += 1;
            return;
        };
        let Some(frame) = self.parts.sampler.sample(handle) else {
            self.frames_not_ready += 1;
            trace!("Frame not ready");
            return;
        };
        self.frames_sampled += 1;

        let image = match frame.to_data_url() {
            Ok(image) => image,
            Err(e) => {
                warn!(error = %e, "Dropping frame that failed to encode");
                return;
            }
        };
        self.attempts += 1;
        self.state.send_replace(SessionState::AwaitingResult);
        debug!(
            attempt = self.attempts,
            width = frame.width(),
            height = frame.height(),
            "Dispatching verification request"
        );

        let request = VerificationRequest {
            subject: self.subject.clone(),
            image,
            new_password: self.parts.new_password.clone(),
        };
        self.pending = Some(dispatch(
            Arc::clone(&self.parts.verifier),
            request,
            self.mode,
            self.parts.config.precheck_then_confirm,
            self.parts.config.request_timeout,
        ));
    }

    fn on_outcome(&mut self, outcome: VerificationOutcome) -> Option<SessionEnd> {
        self.pending = None;
        let attempt = self.attempts;
        let window = self.parts.config.feedback_window;

        let event = match outcome {
            VerificationOutcome::Success(payload) => {
                info!(attempt, "Face matched, grace period running");
                self.emit(SessionEvent::MatchDetected { attempt });
                self.grace = Some(Grace {
                    timer: Box::pin(sleep(self.parts.config.grace_period)),
                    payload,
                });
                return None;
            }
            VerificationOutcome::NoMatch { message } => {
                debug!(attempt, "No match");
                SessionEvent::NoMatch {
                    attempt,
                    message,
                    clear_after: window,
                }
            }
            VerificationOutcome::Error(error) => {
                let (reason, message) = match error {
                    OutcomeError::Transport(message) => (FailureReason::Connection, message),
                    OutcomeError::Service(message) => (FailureReason::Rejected, message),
                };
                warn!(attempt, %reason, %message, "Verification attempt failed");
                SessionEvent::Failure {
                    reason,
                    message,
                    clear_after: Some(window),
                }
            }
        };

        let exhausted = matches!(self.parts.config.max_attempts, Some(max) if attempt >= max);
        if !exhausted {
            self.state.send_replace(SessionState::Active);
        }
        self.emit(event);
        if exhausted {
            return self.fail(
                FailureReason::AttemptsExhausted,
                format!("no match after {attempt} attempts"),
            );
        }
        None
    }

    /// Apply the mode's side effect once the grace period has elapsed.
    async fn finalize(&mut self) -> Option<SessionEnd> {
        let grace = self.grace.take()?;
        let verified = VerifiedSubject {
            subject: self.subject.clone(),
            session_id: self.id,
            verified_at: grace.payload.matched_at,
        };

        let applied = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Some(SessionEnd::Cancelled),
            result = apply_effect(
                self.parts.store.as_ref(),
                self.mode,
                &verified,
                self.parts.new_password.as_ref(),
            ) => result,
        };

        match applied {
            Ok(effect) => {
                self.conclude(SessionState::Succeeded);
                info!(attempts = self.attempts, "Session succeeded");
                self.emit(SessionEvent::Success(SessionSuccess {
                    session_id: self.id,
                    subject: self.subject.clone(),
                    mode: self.mode,
                    attempts: self.attempts,
                    message: grace.payload.message,
                    effect,
                }));
                Some(SessionEnd::Succeeded)
            }
            Err(e) => self.fail(FailureReason::Finalization, e.to_string()),
        }
    }

    fn fail(&mut self, reason: FailureReason, message: String) -> Option<SessionEnd> {
        warn!(%reason, %message, attempts = self.attempts, "Session failed");
        self.conclude(SessionState::Failed);
        self.emit(SessionEvent::Failure {
            reason,
            message,
            clear_after: None,
        });
        Some(SessionEnd::Failed(reason))
    }

    /// Drop pending work, release the stream, then publish the final state.
    fn conclude(&mut self, state: SessionState) {
        self.pending = None;
        self.grace = None;
        if let Some(handle) = self.handle.take() {
            handle.release();
        }
        self.state.send_replace(state);
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            trace!("Event receiver dropped");
        }
    }
}

fn dispatch(
    verifier: Arc<dyn VerificationService>,
    request: VerificationRequest,
    mode: SessionMode,
    precheck: bool,
    timeout: Option<Duration>,
) -> PendingOutcome {
    Box::pin(async move {
        let started = Instant::now();
        let exchange = exchange(verifier.as_ref(), &request, mode, precheck);
        let result = match timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .unwrap_or_else(|_| {
                    Err(FacegateError::Transport(format!(
                        "no verdict within {} ms",
                        limit.as_millis()
                    )))
                }),
            None => exchange.await,
        };
        debug!(
            latency_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Verification round trip finished"
        );
        VerificationOutcome::from_result(result)
    })
}

/// One request slot: the confirm call, optionally preceded by a precheck.
async fn exchange(
    verifier: &dyn VerificationService,
    request: &VerificationRequest,
    mode: SessionMode,
    precheck: bool,
) -> Result<VerificationResponse> {
    if precheck {
        let response = verifier.verify(Endpoint::Precheck, request).await?;
        if !(response.success && response.matched) {
            return Ok(response);
        }
    }
    verifier.verify(Endpoint::for_mode(mode), request).await
}

async fn apply_effect(
    store: &dyn SessionStore,
    mode: SessionMode,
    verified: &VerifiedSubject,
    new_password: Option<&NewPassword>,
) -> Result<SuccessEffect> {
    match (mode, new_password) {
        (SessionMode::Login, _) => store
            .issue_credential(verified)
            .await
            .map(SuccessEffect::CredentialIssued),
        (SessionMode::PasswordReset, Some(password)) => {
            store.reset_password(verified, password).await?;
            Ok(SuccessEffect::PasswordReset)
        }
        (SessionMode::PasswordReset, None) => Err(FacegateError::Config(
            "password reset requires a new password".into(),
        )),
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}

async fn grace_elapsed(grace: &mut Option<Grace>) {
    match grace {
        Some(grace) => grace.timer.as_mut().await,
        None => future::pending().await,
    }
}

async fn next_outcome(pending: &mut Option<PendingOutcome>) -> VerificationOutcome {
    match pending {
        Some(outcome) => outcome.as_mut().await,
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MockCamera;
    use crate::store::MockSessionStore;
    use crate::verify::MockVerifier;

    fn subject() -> Subject {
        Subject::parse("ada@example.org").unwrap()
    }

    fn builder(mode: SessionMode) -> SessionBuilder {
        VerificationSession::builder(subject(), mode)
            .device(Arc::new(MockCamera::default()))
            .verifier(Arc::new(MockVerifier::new()))
            .store(Arc::new(MockSessionStore::new()))
    }

    #[test]
    fn test_build_requires_device() {
        let result = VerificationSession::builder(subject(), SessionMode::Login)
            .verifier(Arc::new(MockVerifier::new()))
            .store(Arc::new(MockSessionStore::new()))
            .build();
        assert!(matches!(result, Err(FacegateError::Config(_))));
    }

    #[test]
    fn test_reset_requires_new_password() {
        let result = builder(SessionMode::PasswordReset).build();
        assert!(matches!(result, Err(FacegateError::Config(_))));

        let password = NewPassword::new("abcdefg1").unwrap();
        assert!(builder(SessionMode::PasswordReset)
            .new_password(password)
            .build()
            .is_ok());
    }

    #[tokio::test]
    async fn test_new_session_is_idle() {
        let (mut session, _events) = builder(SessionMode::Login).build().unwrap();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.stop().await.unwrap().is_none());
        assert!(session.wait().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_double_start_is_rejected() {
        let (mut session, _events) = builder(SessionMode::Login).build().unwrap();
        session.start().await.unwrap();
        let err = session.start().await.unwrap_err();
        assert!(matches!(
            err,
            FacegateError::InvalidState {
                actual: SessionState::Active | SessionState::AwaitingResult,
                ..
            }
        ));
        session.stop().await.unwrap();
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_drop_releases_stream() {
        let camera = Arc::new(MockCamera::default());
        let (mut session, _events) = VerificationSession::builder(subject(), SessionMode::Login)
            .device(camera.clone())
            .verifier(Arc::new(MockVerifier::new()))
            .store(Arc::new(MockSessionStore::new()))
            .build()
            .unwrap();
        session.start().await.unwrap();
        assert_eq!(camera.live_streams(), 1);

        let mut state = session.subscribe();
        drop(session);
        state.wait_for(|s| *s == SessionState::Idle).await.unwrap();
        assert_eq!(camera.live_streams(), 0);
    }
}
