//! Live verification session.
//!
//! A [`VerificationSession`] owns a capture stream while it runs, samples a
//! frame on every cadence tick, and keeps at most one verification request
//! outstanding. Frames sampled while a request is pending are dropped, so
//! the service always sees the freshest picture.
//!
//! ```text
//! Idle ──start──▶ Active ──frame──▶ AwaitingResult ──match + grace──▶ Succeeded
//!  ▲                ▲                     │
//!  │                └──no match / error───┘
//!  └────────────stop (any live state)
//! ```
//!
//! Attempt and duration ceilings, when configured, end a run in `Failed`.

mod config;
mod event;
mod machine;

pub use config::{FrameCadence, SessionConfig};
pub use event::{
    FailureReason, SessionEnd, SessionEvent, SessionReport, SessionSuccess, SuccessEffect,
};
pub use machine::{SessionBuilder, VerificationSession};

pub(crate) use config::FrameClock;

use std::fmt;

/// Which flow a session serves. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionMode {
    Login,
    PasswordReset,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login => write!(f, "login"),
            Self::PasswordReset => write!(f, "password-reset"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Active,
    AwaitingResult,
    Succeeded,
    Failed,
}

impl SessionState {
    /// States in which the session holds a capture stream.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Active | Self::AwaitingResult)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::AwaitingResult => "awaiting-result",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}
