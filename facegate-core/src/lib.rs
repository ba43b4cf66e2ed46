//! Facegate Core - live face verification sessions
//!
//! This crate owns the stateful part of face login and face-verified
//! password reset: it holds a camera stream, samples frames at display
//! cadence, keeps exactly one verification request in flight, and turns the
//! verdicts into a terminal outcome with its side effect.
//!
//! # Features
//!
//! - Exclusive, RAII-released capture streams ([`CaptureHandle`])
//! - Backpressured sampling loop: frames taken while a request is pending
//!   are dropped, never queued
//! - Cancellable grace period and side effects; late responses after
//!   `stop()` are discarded
//! - Optional attempt / duration ceilings and request timeout
//! - Single-shot enrollment capture for registration
//! - JSON API clients with retry (feature `http`)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use facegate_core::{
//!     MockCamera, MockSessionStore, MockVerifier, SessionEvent, SessionMode, Subject,
//!     VerificationSession,
//! };
//!
//! # async fn example() -> facegate_core::Result<()> {
//! let (mut session, mut events) =
//!     VerificationSession::builder(Subject::parse("ada@example.org")?, SessionMode::Login)
//!         .device(Arc::new(MockCamera::default()))
//!         .verifier(Arc::new(MockVerifier::matching_after(2)))
//!         .store(Arc::new(MockSessionStore::new()))
//!         .build()?;
//!
//! session.start().await?;
//! while let Some(event) = events.recv().await {
//!     if let SessionEvent::Success(success) = &event {
//!         println!("verified after {} attempts", success.attempts);
//!     }
//!     if event.is_terminal() {
//!         break;
//!     }
//! }
//! let report = session.wait().await?;
//! # let _ = report;
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod config;
pub mod credentials;
pub mod enrollment;
pub mod error;
pub mod session;
pub mod store;
pub mod verify;

#[cfg(feature = "http")]
pub mod account;
#[cfg(feature = "http")]
pub mod http;

// Re-export main types for convenience
pub use capture::{
    CaptureDevice, CaptureHandle, Facing, FileCamera, Frame, FrameSampler, MockCamera,
    SnapshotSampler, StreamConstraints, StreamId,
};
pub use config::{ApiConfig, DEFAULT_API_URL};
pub use credentials::{BearerToken, NewPassword, Subject};
pub use enrollment::{EnrollmentCapture, EnrollmentImage, EnrollmentPreview};
pub use error::{FacegateError, Result};
pub use session::{
    FailureReason, FrameCadence, SessionBuilder, SessionConfig, SessionEnd, SessionEvent,
    SessionMode, SessionReport, SessionState, SessionSuccess, SuccessEffect,
    VerificationSession,
};
pub use store::{MockSessionStore, SessionStore, VerifiedSubject};
pub use verify::{
    Endpoint, MockReply, MockVerifier, VerificationOutcome, VerificationRequest,
    VerificationResponse, VerificationService,
};

#[cfg(feature = "http")]
pub use account::{AccountClient, Registration};
#[cfg(feature = "http")]
pub use store::HttpSessionStore;
#[cfg(feature = "http")]
pub use verify::HttpVerifier;
