//! Error types for the worker authentication core.
//!
//! Each component gets its own `thiserror` enum, the way `AuthError` /
//! `TunnelError` / `ConfigError` are kept separate in the surrounding
//! codebase. [`AuthFail`] is the terminal outcome `WorkerAuth`'s entry
//! points return.

use thiserror::Error;

/// Failure extracting a field from a credential body (component A).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BodyParseError {
    #[error("field `{0}` not present in body")]
    FieldMissing(String),
    #[error("field `{0}` present but empty")]
    FieldEmpty(String),
}

/// Failure introspecting the peer certificate (component B).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CertError {
    #[error("No certificate")]
    NoCertificate,
    #[error("Could not read certificate")]
    CouldNotReadCertificate,
}

/// Failure encoding, decoding, or exchanging an IPC message (component D).
#[derive(Error, Debug)]
pub enum IpcError {
    #[error("IPC transport error: {0}")]
    Transport(#[from] std::io::Error),
    #[error("malformed IPC message: {0}")]
    Malformed(&'static str),
    #[error("IPC message field too large: {0} bytes")]
    FieldTooLarge(usize),
}

/// The terminal failure of the auth state machine: the caller must emit a
/// 401 with `reason` as the `X-Reason` header value, shut the TLS session
/// down with an access-denied alert, and discard this worker/session.
///
/// This is deliberately *not* named `AuthFail` to avoid colliding with the
/// wire-level `ReplyCode::Failed`; it is the Rust rendering of the
/// original's `auth_fail()` control-flow primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct AuthFail {
    pub reason: String,
}

impl AuthFail {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn no_password() -> Self {
        Self::new("No password")
    }

    pub fn no_certificate() -> Self {
        Self::new("No certificate")
    }

    pub fn internal_error() -> Self {
        Self::new("Internal error")
    }
}

impl From<CertError> for AuthFail {
    fn from(e: CertError) -> Self {
        AuthFail::new(e.to_string())
    }
}

impl From<IpcError> for AuthFail {
    fn from(e: IpcError) -> Self {
        tracing::warn!(error = %e, "IPC failure during auth, treating as internal error");
        AuthFail::internal_error()
    }
}
