//! The per-connection worker session (§3 Data Model).
//!
//! Exclusively owned by one worker task; every component operation takes
//! `&mut WorkerSession` (or `&WorkerSession` for read-only rendering).
//! There is no interior mutability here on purpose: a real worker handles
//! exactly one client, so there is nothing to synchronize.

use std::sync::Arc;

use crate::config::WorkerConfig;

/// §4.5: the four states of the auth state machine. Transitions are
/// monotonic — there is no backward edge except through worker teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Inactive,
    Init,
    Req,
    Cookie,
}

impl Default for AuthState {
    fn default() -> Self {
        AuthState::Inactive
    }
}

/// Optional network address, modeling the "nullable pointer, sentinel
/// clears it" rewrite described in the design notes.
pub type OptAddr = Option<String>;

/// Interface name and addresses assigned by the supervisor (§3 `vinfo`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VpnInterfaceInfo {
    pub name: Option<String>,
    pub ipv4: OptAddr,
    pub ipv6: OptAddr,
    pub ipv4_local: OptAddr,
    pub ipv6_local: OptAddr,
    pub ipv4_netmask: OptAddr,
    pub ipv6_netmask: OptAddr,
    pub ipv6_prefix: Option<u8>,
    pub udp_port: Option<u16>,
    pub rx_per_sec: Option<u32>,
    pub tx_per_sec: Option<u32>,
    pub net_priority: Option<u8>,
}

/// The per-connection authentication context.
#[derive(Debug, Clone)]
pub struct WorkerSession {
    pub config: Arc<WorkerConfig>,

    pub auth_state: AuthState,

    /// Security-module dialogue identifier. `sid_set` mirrors the
    /// original's explicit flag rather than relying on `Option` alone,
    /// since an empty `sid` and "no sid" are kept as distinct concepts
    /// in the source; we fold both into `Option<Vec<u8>>` here but keep
    /// the accessor name for continuity.
    pub sid: Option<Vec<u8>>,

    pub username: Option<String>,
    pub groupname: Option<String>,

    pub cert_username: Option<String>,
    pub cert_groups: Vec<String>,
    pub cert_auth_ok: bool,

    pub cookie: Option<Vec<u8>>,
    pub cookie_set: bool,

    pub session_id: Option<Vec<u8>>,

    pub vinfo: VpnInterfaceInfo,
    pub routes: Vec<String>,
    pub dns: Vec<String>,
    pub nbns: Vec<String>,
    pub default_route: bool,

    /// Peer hostname/address, carried for `SecAuthInit` (§4.4); supplied by
    /// the out-of-scope TLS/connection layer, not derived by this crate.
    pub client_hostname: String,
    pub client_ip: String,
}

impl WorkerSession {
    pub fn new(config: Arc<WorkerConfig>) -> Self {
        Self::with_peer(config, String::new(), String::new())
    }

    pub fn with_peer(config: Arc<WorkerConfig>, client_hostname: String, client_ip: String) -> Self {
        Self {
            config,
            auth_state: AuthState::Inactive,
            sid: None,
            username: None,
            groupname: None,
            cert_username: None,
            cert_groups: Vec::new(),
            cert_auth_ok: false,
            cookie: None,
            cookie_set: false,
            session_id: None,
            vinfo: VpnInterfaceInfo::default(),
            routes: Vec::new(),
            dns: Vec::new(),
            nbns: Vec::new(),
            default_route: false,
            client_hostname,
            client_ip,
        }
    }

    pub fn sid_set(&self) -> bool {
        self.sid.is_some()
    }

    pub fn cert_info_populated(&self) -> bool {
        self.cert_username.is_some() || !self.cert_groups.is_empty()
    }

    /// §3 invariant / S4: fold the default-route sentinels into
    /// `default_route` and empty `routes` when present.
    pub fn check_if_default_route(&mut self) {
        const SENTINELS: [&str; 2] = ["default", "0.0.0.0/0"];
        if self.routes.iter().any(|r| SENTINELS.contains(&r.as_str())) {
            self.routes.clear();
            self.default_route = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> WorkerSession {
        WorkerSession::new(Arc::new(WorkerConfig::default()))
    }

    #[test]
    fn default_route_sentinel_clears_routes() {
        let mut s = session();
        s.routes = vec![
            "10.0.0.0/8".into(),
            "default".into(),
            "192.168.1.0/24".into(),
        ];
        s.check_if_default_route();
        assert!(s.routes.is_empty());
        assert!(s.default_route);
    }

    #[test]
    fn no_sentinel_leaves_routes_untouched() {
        let mut s = session();
        s.routes = vec!["10.0.0.0/8".into()];
        s.check_if_default_route();
        assert_eq!(s.routes, vec!["10.0.0.0/8".to_string()]);
        assert!(!s.default_route);
    }

    #[test]
    fn cidr_sentinel_also_collapses() {
        let mut s = session();
        s.routes = vec!["0.0.0.0/0".into()];
        s.check_if_default_route();
        assert!(s.routes.is_empty());
        assert!(s.default_route);
    }
}
