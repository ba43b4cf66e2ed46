use std::fmt;
use std::time::Duration;

use uuid::Uuid;

use super::SessionMode;
use crate::credentials::{BearerToken, Subject};

/// Why a failure was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// The verification service could not be reached, timed out, or
    /// answered with something unreadable.
    Connection,
    /// The service processed the sample but refused it.
    Rejected,
    AttemptsExhausted,
    DeadlineExceeded,
    /// The match succeeded but the follow-up side effect did not.
    Finalization,
}

impl FailureReason {
    /// Transient failures are shown briefly while the session keeps running.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Connection | Self::Rejected)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Connection => "connection error",
            Self::Rejected => "sample rejected",
            Self::AttemptsExhausted => "attempts exhausted",
            Self::DeadlineExceeded => "deadline exceeded",
            Self::Finalization => "finalization failed",
        };
        f.write_str(text)
    }
}

/// Side effect applied after a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuccessEffect {
    CredentialIssued(BearerToken),
    PasswordReset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSuccess {
    pub session_id: Uuid,
    pub subject: Subject,
    pub mode: SessionMode,
    /// Requests sent, including the matching one.
    pub attempts: u32,
    pub message: Option<String>,
    pub effect: SuccessEffect,
}

/// Presentation signal emitted by a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The capture device could not be acquired.
    DeviceError { reason: String },
    NoMatch {
        attempt: u32,
        message: Option<String>,
        clear_after: Duration,
    },
    /// A match arrived; the grace period is running.
    MatchDetected { attempt: u32 },
    Success(SessionSuccess),
    /// `clear_after` is set only for transient reasons.
    Failure {
        reason: FailureReason,
        message: String,
        clear_after: Option<Duration>,
    },
}

impl SessionEvent {
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Success(_) => true,
            Self::Failure { reason, .. } => !reason.is_transient(),
            _ => false,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Succeeded,
    Failed(FailureReason),
    /// Stopped by the caller or torn down.
    Cancelled,
}

/// Summary of one run, from acquisition to its end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub end: SessionEnd,
    /// Verification requests dispatched.
    pub attempts: u32,
    pub frames_sampled: u64,
    pub frames_not_ready: u64,
    /// Loop ticks skipped because a request or grace period was pending.
    pub gated_ticks: u64,
    pub elapsed: Duration,
}
