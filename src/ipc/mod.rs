//! IPC Codec and transport boundaries (component D, §4.4, §5).

pub mod codec;
pub mod messages;
pub mod transport;

pub use messages::{
    AuthCookieReply, AuthCookieRequest, ReplyCode, SecAuthCont, SecAuthInit, SecAuthReply,
};
pub use transport::{SecurityModuleConn, SecurityModuleDialer, SupervisorChannel};
