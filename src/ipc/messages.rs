//! Wire-level message schemas for the IPC dialogue with the security
//! module and the supervisor (§4.4).

/// The three possible dispositions of a security-module reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyCode {
    Ok,
    Failed,
    Msg,
}

impl ReplyCode {
    pub fn to_u8(self) -> u8 {
        match self {
            ReplyCode::Ok => 0,
            ReplyCode::Failed => 1,
            ReplyCode::Msg => 2,
        }
    }

    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0 => Some(ReplyCode::Ok),
            1 => Some(ReplyCode::Failed),
            2 => Some(ReplyCode::Msg),
            _ => None,
        }
    }
}

/// `SecAuthInit`: opens a dialogue with the security module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecAuthInit {
    pub user_name: Option<String>,
    pub group_name: Option<String>,
    pub hostname: String,
    pub ip: String,
    pub tls_auth_ok: bool,
    pub cert_user_name: Option<String>,
    pub cert_group_names: Option<Vec<String>>,
}

/// `SecAuthCont`: continues a dialogue, submitting the user's response to
/// a prior challenge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecAuthCont {
    pub password: String,
    pub sid: Option<Vec<u8>>,
}

/// `SecAuthReply`: the security module's answer to either message above.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecAuthReply {
    pub reply: Option<ReplyCode>,
    pub msg: Option<String>,
    pub sid: Option<Vec<u8>>,
    pub cookie: Option<Vec<u8>>,
    pub dtls_session_id: Option<Vec<u8>>,
    pub user_name: Option<String>,
}

impl Default for ReplyCode {
    fn default() -> Self {
        ReplyCode::Failed
    }
}

/// `AuthCookieRequest`: sent to the supervisor to redeem a persisted
/// cookie on reconnect (§4.7).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthCookieRequest {
    pub cookie: Vec<u8>,
    pub tls_auth_ok: bool,
}

/// `AuthCookieReply`: the supervisor's answer, carrying tunnel network
/// parameters. The passed file descriptor itself travels out-of-band
/// (SCM_RIGHTS) via [`crate::ipc::transport::SupervisorChannel`], not in
/// this struct.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthCookieReply {
    pub reply: Option<ReplyCode>,
    pub vname: Option<String>,
    pub user_name: Option<String>,
    pub group_name: Option<String>,
    pub session_id: Vec<u8>,
    pub ipv4: Option<String>,
    pub ipv6: Option<String>,
    pub ipv4_local: Option<String>,
    pub ipv6_local: Option<String>,
    pub ipv4_netmask: Option<String>,
    pub ipv6_netmask: Option<String>,
    pub ipv6_prefix: Option<u8>,
    pub rx_per_sec: Option<u32>,
    pub tx_per_sec: Option<u32>,
    pub net_priority: Option<u8>,
    pub no_udp: Option<bool>,
    pub routes: Vec<String>,
    pub dns: Vec<String>,
    pub nbns: Vec<String>,
}
