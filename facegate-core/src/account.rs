//! Account API client: password login, registration, token checks, face
//! management and the e-mailed password recovery flow.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::ApiConfig;
use crate::credentials::{BearerToken, NewPassword, Subject};
use crate::enrollment::EnrollmentImage;
use crate::error::{FacegateError, Result};
use crate::http::{ApiClient, ApiReply};

/// New account request. Must carry a password, an enrollment image, or both.
#[derive(Debug, Clone)]
pub struct Registration {
    pub subject: Subject,
    pub password: Option<NewPassword>,
    pub enrollment: Option<EnrollmentImage>,
}

impl Registration {
    pub fn new(subject: Subject) -> Self {
        Self {
            subject,
            password: None,
            enrollment: None,
        }
    }

    pub fn with_password(mut self, password: NewPassword) -> Self {
        self.password = Some(password);
        self
    }

    pub fn with_enrollment(mut self, image: EnrollmentImage) -> Self {
        self.enrollment = Some(image);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.password.is_none() && self.enrollment.is_none() {
            return Err(FacegateError::Config(
                "registration needs a password, a face image, or both".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordLoginBody<'a> {
    method: &'static str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    face_image: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FaceBody {
    face_image: String,
}

#[derive(Debug, Serialize)]
struct ForgotPasswordBody<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct TokenResetBody<'a> {
    token: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AccountReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl AccountReply {
    fn refused(self, fallback: &str) -> FacegateError {
        FacegateError::Rejected(self.message.unwrap_or_else(|| fallback.to_string()))
    }
}

fn accepted(reply: ApiReply<AccountReply>, fallback: &str) -> Result<()> {
    if reply.status.is_success() && reply.body.success {
        Ok(())
    } else {
        warn!(status = %reply.status, "{fallback}");
        Err(reply.body.refused(fallback))
    }
}

/// Client for the account endpoints that do not involve a live session.
pub struct AccountClient {
    api: ApiClient,
}

impl AccountClient {
    #[instrument(level = "debug", skip_all, fields(base_url = %config.base_url))]
    pub fn new(config: ApiConfig) -> Result<Self> {
        let api = ApiClient::new(config)?;
        info!("Account client created");
        Ok(Self { api })
    }

    #[instrument(level = "info", skip(self, password), fields(subject = %subject))]
    pub async fn login_with_password(&self, subject: &Subject, password: &str) -> Result<BearerToken> {
        let body = PasswordLoginBody {
            method: "password",
            email: subject.as_str(),
            password,
        };
        let reply: ApiReply<AccountReply> = self.api.post("auth/login", &body, None).await?;

        match reply.body {
            AccountReply {
                success: true,
                token: Some(token),
                ..
            } if reply.status.is_success() => {
                info!("Password login succeeded");
                Ok(BearerToken::new(token))
            }
            other => {
                warn!(status = %reply.status, "Password login refused");
                Err(other.refused("invalid email or password"))
            }
        }
    }

    #[instrument(level = "info", skip(self, registration), fields(subject = %registration.subject))]
    pub async fn register(&self, registration: &Registration) -> Result<()> {
        registration.validate()?;
        let body = RegisterBody {
            email: registration.subject.as_str(),
            password: registration.password.as_ref().map(|p| p.expose()),
            face_image: registration.enrollment.as_ref().map(|i| i.to_data_url()),
        };
        // Not idempotent: a retried create would be refused as a duplicate.
        let reply: ApiReply<AccountReply> = self.api.post("auth/register", &body, None).await?;
        accepted(reply, "registration failed")?;
        info!(
            with_face = registration.enrollment.is_some(),
            "Account registered"
        );
        Ok(())
    }

    /// Replace the face enrolled on the account that owns `token`.
    #[instrument(level = "info", skip_all, fields(width = image.width(), height = image.height()))]
    pub async fn update_face(&self, token: &BearerToken, image: &EnrollmentImage) -> Result<()> {
        let body = FaceBody {
            face_image: image.to_data_url(),
        };
        let reply: ApiReply<AccountReply> = self
            .api
            .post_with_retry("face/update", &body, Some(token.expose()))
            .await?;
        accepted(reply, "face update failed")?;
        info!("Face updated");
        Ok(())
    }

    /// Remove the enrolled face; the account keeps password login.
    #[instrument(level = "info", skip_all)]
    pub async fn delete_face(&self, token: &BearerToken) -> Result<()> {
        let reply: ApiReply<AccountReply> =
            self.api.delete("face/delete", Some(token.expose())).await?;
        accepted(reply, "face deletion failed")?;
        info!("Face deleted");
        Ok(())
    }

    /// Ask the service to e-mail a reset link. The service answers the same
    /// way whether or not the address is registered.
    #[instrument(level = "info", skip(self), fields(subject = %subject))]
    pub async fn request_password_reset(&self, subject: &Subject) -> Result<()> {
        let body = ForgotPasswordBody {
            email: subject.as_str(),
        };
        let reply: ApiReply<AccountReply> =
            self.api.post("auth/forgot-password", &body, None).await?;
        accepted(reply, "password reset request failed")
    }

    /// Complete the e-mailed recovery flow with the token from the link.
    #[instrument(level = "info", skip_all)]
    pub async fn reset_password_with_token(
        &self,
        reset_token: &str,
        new_password: &NewPassword,
    ) -> Result<()> {
        let body = TokenResetBody {
            token: reset_token,
            password: new_password.expose(),
        };
        let reply: ApiReply<AccountReply> =
            self.api.post("auth/reset-password", &body, None).await?;
        accepted(reply, "password reset failed")?;
        info!("Password reset with e-mailed token");
        Ok(())
    }

    /// Whether the service still accepts `token`.
    #[instrument(level = "debug", skip_all)]
    pub async fn verify_token(&self, token: &BearerToken) -> Result<bool> {
        let reply: ApiReply<AccountReply> = self
            .api
            .post_with_retry("auth/verify-token", &serde_json::json!({}), Some(token.expose()))
            .await?;
        Ok(reply.status.is_success() && reply.body.success)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use image::{Rgb, RgbImage};
    use serde_json::json;
    use wiremock::matchers::{body_json, body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::capture::Frame;

    fn subject() -> Subject {
        Subject::parse("ada@example.org").unwrap()
    }

    async fn client(server: &MockServer) -> AccountClient {
        AccountClient::new(ApiConfig {
            base_url: format!("{}/api", server.uri()),
            timeout: Duration::from_secs(2),
            max_retries: 1,
            initial_interval: Duration::from_millis(5),
            max_interval: Duration::from_millis(10),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_password_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(json!({
                "method": "password",
                "email": "ada@example.org",
                "password": "hunter22"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": true, "token": "tok"})),
            )
            .mount(&server)
            .await;

        let token = client(&server)
            .await
            .login_with_password(&subject(), "hunter22")
            .await
            .unwrap();
        assert_eq!(token.expose(), "tok");
    }

    #[tokio::test]
    async fn test_password_login_refused() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(
                json!({"success": false, "message": "Invalid email or password"}),
            ))
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .login_with_password(&subject(), "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, FacegateError::Rejected(ref m) if m == "Invalid email or password"));
    }

    #[tokio::test]
    async fn test_register_with_face() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/register"))
            .and(body_partial_json(json!({"email": "ada@example.org"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        let frame = Frame::new(RgbImage::from_pixel(8, 8, Rgb([200, 180, 160])));
        let registration =
            Registration::new(subject()).with_enrollment(EnrollmentImage::from_frame(&frame).unwrap());
        client(&server).await.register(&registration).await.unwrap();

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert!(body["faceImage"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
        assert!(body.get("password").is_none());
    }

    #[tokio::test]
    async fn test_register_requires_a_credential() {
        let server = MockServer::start().await;
        let err = client(&server)
            .await
            .register(&Registration::new(subject()))
            .await
            .unwrap_err();
        assert!(matches!(err, FacegateError::Config(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    fn image() -> EnrollmentImage {
        EnrollmentImage::from_frame(&Frame::new(RgbImage::from_pixel(8, 8, Rgb([90, 80, 70]))))
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/register"))
            .respond_with(ResponseTemplate::new(504))
            .expect(1)
            .mount(&server)
            .await;

        let registration = Registration::new(subject())
            .with_password(NewPassword::new("hunter22").unwrap());
        let err = client(&server)
            .await
            .register(&registration)
            .await
            .unwrap_err();
        assert!(matches!(err, FacegateError::Transport(_)));
    }

    #[tokio::test]
    async fn test_update_face_sends_image_with_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/face/update"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"success": true, "message": "Face data updated successfully"}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .await
            .update_face(&BearerToken::new("tok"), &image())
            .await
            .unwrap();

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert!(body["faceImage"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_update_face_without_face_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(
                json!({"success": false, "message": "No face detected in the image"}),
            ))
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .update_face(&BearerToken::new("tok"), &image())
            .await
            .unwrap_err();
        assert!(matches!(err, FacegateError::Rejected(ref m) if m == "No face detected in the image"));
    }

    #[tokio::test]
    async fn test_delete_face() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/face/delete"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"success": false})),
            )
            .mount(&server)
            .await;

        let accounts = client(&server).await;
        accounts.delete_face(&BearerToken::new("tok")).await.unwrap();
        let err = accounts
            .delete_face(&BearerToken::new("stale"))
            .await
            .unwrap_err();
        assert!(matches!(err, FacegateError::Rejected(ref m) if m == "face deletion failed"));
    }

    #[tokio::test]
    async fn test_request_password_reset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/forgot-password"))
            .and(body_json(json!({"email": "ada@example.org"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "If your email is registered, you will receive a password reset link"
            })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .await
            .request_password_reset(&subject())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reset_password_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/reset-password"))
            .and(body_json(json!({"token": "emailed", "password": "brandnew99"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(
                json!({"success": false, "message": "Invalid or expired token"}),
            ))
            .mount(&server)
            .await;

        let accounts = client(&server).await;
        let password = NewPassword::new("brandnew99").unwrap();
        accounts
            .reset_password_with_token("emailed", &password)
            .await
            .unwrap();
        let err = accounts
            .reset_password_with_token("expired", &password)
            .await
            .unwrap_err();
        assert!(matches!(err, FacegateError::Rejected(ref m) if m == "Invalid or expired token"));
    }

    #[tokio::test]
    async fn test_verify_token_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/verify-token"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"success": false})),
            )
            .mount(&server)
            .await;

        let accounts = client(&server).await;
        assert!(accounts.verify_token(&BearerToken::new("tok")).await.unwrap());
        assert!(!accounts.verify_token(&BearerToken::new("stale")).await.unwrap());
    }
}
