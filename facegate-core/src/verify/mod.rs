//! Remote face verification.
//!
//! The matching itself happens in an external service. This module defines
//! what is sent to it ([`VerificationRequest`]), what comes back
//! ([`VerificationResponse`]) and how a response is interpreted
//! ([`VerificationOutcome`]).
//!
//! ## Implementations
//!
//! - [`HttpVerifier`] - JSON API client (feature `http`)
//! - [`MockVerifier`] - scripted replies (testing)

#[cfg(feature = "http")]
mod http;
mod mock;

#[cfg(feature = "http")]
pub use http::{HttpVerifier, VerifierEndpoints};
pub use mock::{MockReply, MockVerifier, RecordedRequest};

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credentials::{NewPassword, Subject};
use crate::error::{FacegateError, Result};
use crate::session::SessionMode;

/// Logical verification endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Mode-independent face check used before a confirm call.
    Precheck,
    /// Login verification.
    Login,
    /// Password-reset verification; carries the new password.
    PasswordReset,
}

impl Endpoint {
    pub fn for_mode(mode: SessionMode) -> Self {
        match mode {
            SessionMode::Login => Self::Login,
            SessionMode::PasswordReset => Self::PasswordReset,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Precheck => write!(f, "precheck"),
            Self::Login => write!(f, "login-verify"),
            Self::PasswordReset => write!(f, "reset-verify"),
        }
    }
}

/// One verification call: who, which picture, and for password resets the
/// replacement password.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub subject: Subject,
    /// JPEG data URL of the sampled frame.
    pub image: String,
    pub new_password: Option<NewPassword>,
}

/// Raw verdict returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResponse {
    /// The service processed the image.
    pub success: bool,
    /// The face matched the subject's enrolled face.
    #[serde(rename = "match", default)]
    pub matched: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl VerificationResponse {
    pub fn matched() -> Self {
        Self {
            success: true,
            matched: true,
            message: None,
        }
    }

    pub fn no_match() -> Self {
        Self {
            success: true,
            matched: false,
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            matched: false,
            message: Some(message.into()),
        }
    }
}

/// Data carried by a successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPayload {
    pub message: Option<String>,
    pub matched_at: DateTime<Utc>,
}

/// Why a verification call produced no verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeError {
    /// Service unreachable, timed out, or answered with garbage.
    Transport(String),
    /// Service answered but could not process the sample.
    Service(String),
}

/// Interpretation of one verification call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Success(MatchPayload),
    NoMatch { message: Option<String> },
    Error(OutcomeError),
}

impl VerificationOutcome {
    pub fn from_response(response: VerificationResponse) -> Self {
        match response {
            VerificationResponse {
                success: true,
                matched: true,
                message,
            } => Self::Success(MatchPayload {
                message,
                matched_at: Utc::now(),
            }),
            VerificationResponse {
                success: true,
                message,
                ..
            } => Self::NoMatch { message },
            VerificationResponse { message, .. } => Self::Error(OutcomeError::Service(
                message.unwrap_or_else(|| "verification failed".to_string()),
            )),
        }
    }

    /// Every error returned by a [`VerificationService`] counts as transport.
    pub fn from_error(error: FacegateError) -> Self {
        Self::Error(OutcomeError::Transport(error.to_string()))
    }

    pub fn from_result(result: Result<VerificationResponse>) -> Self {
        match result {
            Ok(response) => Self::from_response(response),
            Err(error) => Self::from_error(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Remote face verification endpoint.
///
/// Implementations must be thread-safe (`Send + Sync`). An `Err` means the
/// service could not be reached or its answer could not be read; a verdict,
/// positive or negative, is always an `Ok`.
#[async_trait]
pub trait VerificationService: Send + Sync {
    async fn verify(
        &self,
        endpoint: Endpoint,
        request: &VerificationRequest,
    ) -> Result<VerificationResponse>;
}
