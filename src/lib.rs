//! Worker-side authentication state machine for an AnyConnect-compatible
//! SSL/TLS VPN gateway.
//!
//! A short-lived per-connection worker terminates a client's TLS session
//! and drives it through authentication against two privileged
//! out-of-process collaborators — a security module (credential
//! verification) and a main supervisor (cookie redemption, tunnel
//! assignment) — over length-prefixed IPC. On success it issues an opaque
//! session cookie and hands the client over to tunnel setup.
//!
//! # Modules
//!
//! - `body`: credential body parser (XML and URL-encoded wire shapes).
//! - `cert`: X.509 peer-certificate introspection.
//! - `render`: challenge-document rendering, including group-list ordering.
//! - `ipc`: wire message schemas, codec, and transport-trait boundaries.
//! - `state`: the auth state machine, success finalizer, and cookie
//!   redemption — the orchestrator tying everything above together.
//! - `session`: the per-connection `WorkerSession` context.
//! - `config`: the gateway's shared, read-mostly `WorkerConfig`.
//! - `http`: minimal response construction (status/headers/body).
//! - `error`: component-scoped error enums plus the terminal `AuthFail`.

pub mod body;
pub mod cert;
pub mod config;
pub mod error;
pub mod http;
pub mod ipc;
pub mod render;
pub mod session;
pub mod state;

pub use config::WorkerConfig;
pub use error::AuthFail;
pub use session::WorkerSession;
pub use state::{AuthOutcome, WorkerAuth};
