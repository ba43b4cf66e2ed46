use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, instrument};

use super::{Endpoint, VerificationRequest, VerificationResponse, VerificationService};
use crate::config::ApiConfig;
use crate::error::Result;
use crate::http::{ApiClient, ApiReply};

/// Relative paths of the logical verification endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierEndpoints {
    pub precheck: String,
    pub login: String,
    pub password_reset: String,
}

impl Default for VerifierEndpoints {
    fn default() -> Self {
        Self {
            precheck: "face/verify".into(),
            login: "face/verify".into(),
            password_reset: "face/verify-reset".into(),
        }
    }
}

impl VerifierEndpoints {
    pub fn path(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::Precheck => &self.precheck,
            Endpoint::Login => &self.login,
            Endpoint::PasswordReset => &self.password_reset,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyBody<'a> {
    email: &'a str,
    face_image: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_password: Option<&'a str>,
}

/// Verification service client speaking the JSON API.
///
/// Makes exactly one HTTP call per `verify`; the session loop decides when
/// to try again.
pub struct HttpVerifier {
    api: ApiClient,
    endpoints: VerifierEndpoints,
}

impl HttpVerifier {
    #[instrument(level = "debug", skip_all, fields(base_url = %config.base_url))]
    pub fn new(config: ApiConfig) -> Result<Self> {
        Self::with_endpoints(config, VerifierEndpoints::default())
    }

    pub fn with_endpoints(config: ApiConfig, endpoints: VerifierEndpoints) -> Result<Self> {
        let api = ApiClient::new(config)?;
        info!("Verification client created");
        Ok(Self { api, endpoints })
    }
}

#[async_trait]
impl VerificationService for HttpVerifier {
    #[instrument(level = "debug", skip(self, request), fields(subject = %request.subject))]
    async fn verify(
        &self,
        endpoint: Endpoint,
        request: &VerificationRequest,
    ) -> Result<VerificationResponse> {
        let new_password = match endpoint {
            Endpoint::PasswordReset => request.new_password.as_ref().map(|p| p.expose()),
            _ => None,
        };
        let body = VerifyBody {
            email: request.subject.as_str(),
            face_image: &request.image,
            new_password,
        };

        let reply: ApiReply<VerificationResponse> =
            self.api.post(self.endpoints.path(endpoint), &body, None).await?;
        debug!(
            status = %reply.status,
            success = reply.body.success,
            matched = reply.body.matched,
            "Verification answered"
        );
        Ok(reply.body)
    }
}
