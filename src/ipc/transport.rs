//! Transport-trait boundaries for the IPC dialogue (§4.4, §5).
//!
//! The raw socket I/O and SCM_RIGHTS file-descriptor passing are out of
//! scope; these traits are the seam this crate is generic over. The only
//! suspension points in the whole auth core are at these trait-method
//! boundaries — everything else is synchronous string/byte manipulation.

use std::os::fd::OwnedFd;

use async_trait::async_trait;

use crate::error::IpcError;
use crate::ipc::messages::{
    AuthCookieReply, AuthCookieRequest, SecAuthCont, SecAuthInit, SecAuthReply,
};

/// Opens a fresh unix-domain connection to the security module for one
/// request/reply round trip (§5: "a fresh unix-domain connection per
/// message round-trip — opened, used, closed").
#[async_trait]
pub trait SecurityModuleDialer: Send + Sync {
    async fn dial(&self) -> Result<Box<dyn SecurityModuleConn>, IpcError>;
}

/// One security-module round trip: exactly one request, then exactly one
/// reply (§5 ordering guarantee — no correlation IDs needed).
#[async_trait]
pub trait SecurityModuleConn: Send {
    async fn send_init(&mut self, msg: &SecAuthInit) -> Result<(), IpcError>;
    async fn send_cont(&mut self, msg: &SecAuthCont) -> Result<(), IpcError>;
    async fn recv_reply(&mut self) -> Result<SecAuthReply, IpcError>;
}

/// The persistent connection to the main supervisor (`cmd_fd`), held for
/// the life of the worker. Used only for cookie redemption (§4.7) in this
/// core; tunnel data-plane traffic never crosses it.
#[async_trait]
pub trait SupervisorChannel: Send {
    async fn redeem_cookie(
        &mut self,
        request: &AuthCookieRequest,
    ) -> Result<(AuthCookieReply, Option<OwnedFd>), IpcError>;
}
