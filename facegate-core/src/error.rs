use thiserror::Error;

use crate::session::SessionState;

#[derive(Error, Debug)]
pub enum FacegateError {
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Frame not ready: {0}")]
    FrameNotReady(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Verification rejected: {0}")]
    Rejected(String),

    #[error("Session store error: {0}")]
    Store(String),

    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    #[error("Weak password: {0}")]
    WeakPassword(String),

    #[error("Invalid session state: expected {expected}, found {actual}")]
    InvalidState {
        expected: &'static str,
        actual: SessionState,
    },

    #[error("Image encoding error: {0}")]
    Encoding(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session task failed: {0}")]
    TaskFailed(String),
}

impl FacegateError {
    /// Whether the error comes from the network path rather than local state.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, FacegateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_is_network_path() {
        assert!(FacegateError::Transport("connection refused".into()).is_transport());
        assert!(!FacegateError::Rejected("No face detected".into()).is_transport());
        assert!(!FacegateError::DeviceUnavailable("device busy".into()).is_transport());
    }
}
