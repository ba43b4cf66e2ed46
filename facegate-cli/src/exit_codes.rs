//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts to tell a refused face apart from a missing camera or
//! an unreachable service.

use facegate_core::FacegateError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments, malformed email, weak password).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Identity could not be verified (no match, refused login).
/// Maps to EX_DATAERR from sysexits.h.
pub const VERIFICATION_FAILED: i32 = 65;

/// Cannot open input (frames directory).
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Camera unavailable or never ready.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const DEVICE_UNAVAILABLE: i32 = 69;

/// I/O error (cannot write output file).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Verification or account service unreachable.
/// Maps to EX_TEMPFAIL from sysexits.h.
pub const NETWORK_ERROR: i32 = 75;

/// Interrupted with Ctrl-C.
pub const CANCELLED: i32 = 130;

pub const HELP: &str = "\
Exit codes:
  0    Success
  1    General error
  64   Usage error (bad arguments, invalid email, weak password)
  65   Verification failed
  66   Input not found (frames directory)
  69   Camera unavailable
  74   I/O error
  75   Service unreachable
  130  Cancelled";

/// Failures raised by the CLI itself rather than the core library.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("{0}")]
    Usage(String),

    #[error("{0}")]
    Input(String),

    #[error("Verification failed: {0}")]
    Unverified(String),

    #[error("Cancelled")]
    Cancelled,
}

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let code = err
            .chain()
            .find_map(|cause| {
                if let Some(flow) = cause.downcast_ref::<FlowError>() {
                    Some(flow_code(flow))
                } else if let Some(core) = cause.downcast_ref::<FacegateError>() {
                    Some(core_code(core))
                } else {
                    cause.downcast_ref::<std::io::Error>().map(|_| IO_ERROR)
                }
            })
            .unwrap_or(GENERAL_ERROR);

        Self {
            code,
            message: Some(format!("{err:#}")),
        }
    }
}

fn flow_code(err: &FlowError) -> i32 {
    match err {
        FlowError::Usage(_) => USAGE_ERROR,
        FlowError::Input(_) => INPUT_ERROR,
        FlowError::Unverified(_) => VERIFICATION_FAILED,
        FlowError::Cancelled => CANCELLED,
    }
}

fn core_code(err: &FacegateError) -> i32 {
    match err {
        FacegateError::DeviceUnavailable(_) | FacegateError::FrameNotReady(_) => {
            DEVICE_UNAVAILABLE
        }
        FacegateError::InvalidSubject(_)
        | FacegateError::WeakPassword(_)
        | FacegateError::Config(_) => USAGE_ERROR,
        FacegateError::Rejected(_) | FacegateError::Store(_) => VERIFICATION_FAILED,
        err if err.is_transport() => NETWORK_ERROR,
        _ => GENERAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    fn code_of(err: anyhow::Error) -> i32 {
        ExitCode::from_anyhow(&err).code
    }

    #[test]
    fn test_core_errors_through_context() {
        let err = Err::<(), _>(FacegateError::DeviceUnavailable("busy".into()))
            .context("Failed to start camera")
            .unwrap_err();
        assert_eq!(code_of(err), DEVICE_UNAVAILABLE);
        assert_eq!(
            code_of(FacegateError::Transport("refused".into()).into()),
            NETWORK_ERROR
        );
        assert_eq!(
            code_of(FacegateError::WeakPassword("short".into()).into()),
            USAGE_ERROR
        );
    }

    #[test]
    fn test_flow_errors() {
        assert_eq!(code_of(FlowError::Cancelled.into()), CANCELLED);
        assert_eq!(
            code_of(FlowError::Unverified("no match".into()).into()),
            VERIFICATION_FAILED
        );
        assert_eq!(code_of(anyhow::anyhow!("something else")), GENERAL_ERROR);
    }

    #[test]
    fn test_io_error() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(code_of(err.into()), IO_ERROR);
    }
}
