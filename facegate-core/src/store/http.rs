use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::{SessionStore, VerifiedSubject};
use crate::config::ApiConfig;
use crate::credentials::{BearerToken, NewPassword};
use crate::error::{FacegateError, Result};
use crate::http::{ApiClient, ApiReply};

/// Relative paths of the session-store endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEndpoints {
    pub login: String,
    pub reset_password: String,
}

impl Default for StoreEndpoints {
    fn default() -> Self {
        Self {
            login: "auth/login".into(),
            reset_password: "auth/reset-password".into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FaceLoginBody<'a> {
    method: &'static str,
    email: &'a str,
    session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FaceResetBody<'a> {
    method: &'static str,
    email: &'a str,
    session_id: String,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StoreReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl StoreReply {
    pub(crate) fn failure(&self, fallback: &str) -> FacegateError {
        FacegateError::Store(self.message.clone().unwrap_or_else(|| fallback.to_string()))
    }
}

/// Session store backed by the account API.
///
/// Transient failures are retried with exponential backoff; the store call
/// only happens once per successful session so retrying is cheap.
pub struct HttpSessionStore {
    api: ApiClient,
    endpoints: StoreEndpoints,
}

impl HttpSessionStore {
    #[instrument(level = "debug", skip_all, fields(base_url = %config.base_url))]
    pub fn new(config: ApiConfig) -> Result<Self> {
        Self::with_endpoints(config, StoreEndpoints::default())
    }

    pub fn with_endpoints(config: ApiConfig, endpoints: StoreEndpoints) -> Result<Self> {
        let api = ApiClient::new(config)?;
        info!("Session store client created");
        Ok(Self { api, endpoints })
    }
}

#[async_trait]
impl SessionStore for HttpSessionStore {
    #[instrument(level = "info", skip(self, verified), fields(subject = %verified.subject))]
    async fn issue_credential(&self, verified: &VerifiedSubject) -> Result<BearerToken> {
        let body = FaceLoginBody {
            method: "face",
            email: verified.subject.as_str(),
            session_id: verified.session_id.to_string(),
        };
        let reply: ApiReply<StoreReply> = self
            .api
            .post_with_retry(&self.endpoints.login, &body, None)
            .await?;

        match reply.body {
            StoreReply {
                success: true,
                token: Some(token),
                ..
            } if reply.status.is_success() => {
                info!("Credential issued");
                Ok(BearerToken::new(token))
            }
            other => {
                warn!(status = %reply.status, "Credential issuance refused");
                Err(other.failure("login failed"))
            }
        }
    }

    #[instrument(level = "info", skip(self, verified, new_password), fields(subject = %verified.subject))]
    async fn reset_password(
        &self,
        verified: &VerifiedSubject,
        new_password: &NewPassword,
    ) -> Result<()> {
        let body = FaceResetBody {
            method: "face",
            email: verified.subject.as_str(),
            session_id: verified.session_id.to_string(),
            password: new_password.expose(),
        };
        let reply: ApiReply<StoreReply> = self
            .api
            .post_with_retry(&self.endpoints.reset_password, &body, None)
            .await?;

        if reply.status.is_success() && reply.body.success {
            info!("Password reset applied");
            Ok(())
        } else {
            warn!(status = %reply.status, "Password reset refused");
            Err(reply.body.failure("password reset failed"))
        }
    }
}
