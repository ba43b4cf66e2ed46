//! Side effects applied after a successful face match.
//!
//! The [`SessionStore`] issues the login credential or performs the password
//! reset. It only ever sees subjects the verification service has matched.

#[cfg(feature = "http")]
mod http;
mod mock;

#[cfg(feature = "http")]
pub use http::{HttpSessionStore, StoreEndpoints};
pub use mock::{MockSessionStore, ResetRecord};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::credentials::{BearerToken, NewPassword, Subject};
use crate::error::Result;

/// Signal that a subject passed live verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSubject {
    pub subject: Subject,
    /// Session that produced the match.
    pub session_id: Uuid,
    pub verified_at: DateTime<Utc>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Exchange a verified subject for an opaque bearer credential.
    async fn issue_credential(&self, verified: &VerifiedSubject) -> Result<BearerToken>;

    /// Replace the verified subject's password.
    async fn reset_password(
        &self,
        verified: &VerifiedSubject,
        new_password: &NewPassword,
    ) -> Result<()>;
}
