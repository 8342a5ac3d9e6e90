//! Errno-style completion statuses.
//!
//! The front-end router expects every request to resolve with an
//! errno-style integer and a short human-readable message. Account
//! requests use plain errno values; PAM requests report the PAM status
//! code produced by the pipeline.

use std::borrow::Cow;

/// Status value for a successfully handled request.
pub const EOK: i32 = 0;

/// Outcome of a backend request, as delivered to the front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Errno-style status code (`0` on success).
    pub status: i32,

    /// Short human-readable outcome description.
    pub message: Cow<'static, str>,
}

impl Completion {
    /// Successful completion.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            status: EOK,
            message: Cow::Borrowed("Success"),
        }
    }

    /// The backend is offline or the server is unreachable; the front-end
    /// should retry after the recovery window.
    #[must_use]
    pub fn retry_later(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status: libc::EAGAIN,
            message: message.into(),
        }
    }

    /// The request payload was malformed; never retried.
    #[must_use]
    pub fn invalid_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status: libc::EINVAL,
            message: message.into(),
        }
    }

    /// The directory rejected the bind credentials.
    #[must_use]
    pub fn auth_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status: libc::EACCES,
            message: message.into(),
        }
    }

    /// An I/O-level or internal failure.
    #[must_use]
    pub fn system_error(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status: libc::EIO,
            message: message.into(),
        }
    }

    /// Completion for a PAM request; the status value is the PAM status
    /// code set by the auth pipeline.
    #[must_use]
    pub fn pam(pam_status: i32, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status: pam_status,
            message: message.into(),
        }
    }

    /// Whether this completion reports success.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status == EOK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_errno_style() {
        assert_eq!(Completion::ok().status, 0);
        assert_eq!(Completion::retry_later("Offline").status, libc::EAGAIN);
        assert_eq!(Completion::invalid_request("bad").status, libc::EINVAL);
        assert_eq!(Completion::auth_failed("bind").status, libc::EACCES);
        assert_eq!(Completion::system_error("io").status, libc::EIO);
    }

    #[test]
    fn ok_is_ok() {
        assert!(Completion::ok().is_ok());
        assert!(!Completion::retry_later("Offline").is_ok());
    }
}
