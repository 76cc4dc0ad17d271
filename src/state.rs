//! Auth State Machine (E), Success Finalizer (F), and Cookie Redemption
//! (G) — §4.5, §4.6, §4.7.
//!
//! [`WorkerAuth`] is the orchestrator tying components A-D and F-G
//! together around one [`WorkerSession`]. It never calls `std::process::exit`
//! on failure (see §5/§9): a terminal [`AuthFail`] is simply returned, and
//! it is the caller's job to write the 401, tear the TLS session down, and
//! drop the session.

use std::os::fd::OwnedFd;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::cert::{self, PeerCertificateSource};
use crate::config::WorkerConfig;
use crate::error::AuthFail;
use crate::http::HttpResponse;
use crate::ipc::messages::{AuthCookieReply, AuthCookieRequest, ReplyCode, SecAuthCont, SecAuthInit, SecAuthReply};
use crate::ipc::transport::{SecurityModuleConn, SecurityModuleDialer, SupervisorChannel};
use crate::render;
use crate::session::{AuthState, WorkerSession};

const SUCCESS_MSG_HEAD: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
    "<config-auth client=\"vpn\" type=\"complete\">\n",
    "<version who=\"sg\">0.1(1)</version>\n",
    "<auth id=\"success\">\n",
    "<title>SSL VPN Service</title>",
);
const SUCCESS_MSG_FOOT: &str = "</auth></config-auth>\n";

const DEFAULT_ADDR_SENTINELS_V4: &str = "0.0.0.0";
const DEFAULT_ADDR_SENTINELS_V6: &str = "::";

/// Outcome of a successfully-dispatched `POST /auth`: either a further
/// challenge to re-render, or the final success document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Continue(HttpResponse),
    Success(HttpResponse),
}

/// Ties the credential parser, certificate introspector, challenge
/// renderer, and IPC codec together around one session, per §4.5.
pub struct WorkerAuth {
    dialer: Arc<dyn SecurityModuleDialer>,
}

impl WorkerAuth {
    pub fn new(dialer: Arc<dyn SecurityModuleDialer>) -> Self {
        Self { dialer }
    }

    /// `GET /` (or any path besides `POST /auth`): always re-renders the
    /// initial prompt, never advances `auth_state` (§4.5 last paragraph).
    pub fn handle_get(&self, session: &WorkerSession) -> HttpResponse {
        render::render_initial_prompt(session)
    }

    /// `POST /auth`: drives the state machine per the §4.5 transition table.
    pub async fn handle_post(
        &self,
        session: &mut WorkerSession,
        body: &str,
        cert_source: &dyn PeerCertificateSource,
    ) -> Result<AuthOutcome, AuthFail> {
        let effective_retry_as_init =
            session.auth_state == AuthState::Inactive && session.sid_set();

        match session.auth_state {
            AuthState::Inactive if !effective_retry_as_init => {
                self.handle_inactive(session, body, cert_source).await
            }
            AuthState::Inactive | AuthState::Init | AuthState::Req => {
                self.handle_credential_continuation(session, body).await
            }
            AuthState::Cookie => Err(AuthFail::new("Already authenticated")),
        }
    }

    async fn handle_inactive(
        &self,
        session: &mut WorkerSession,
        body: &str,
        cert_source: &dyn PeerCertificateSource,
    ) -> Result<AuthOutcome, AuthFail> {
        // Group is optional; a supplied value equal to the default-select
        // placeholder means "no choice" and is not recorded or sent.
        if let Ok(group) = crate::body::parse_reply(body, "group_list", Some("group-select")) {
            let is_placeholder = session
                .config
                .default_select_group
                .as_deref()
                .is_some_and(|placeholder| placeholder == group);
            if !is_placeholder {
                session.groupname = Some(group);
            }
        }

        let username = match crate::body::parse_reply(body, "username", None) {
            Ok(u) => u,
            // Missing username on INACTIVE is `ask_auth`, not a failure:
            // re-render the prompt without advancing state.
            Err(_) => return Ok(AuthOutcome::Continue(render::render_initial_prompt(session))),
        };
        session.username = Some(username.clone());

        if session.config.requires_certificate() {
            cert::get_cert_info(session, cert_source)?;
        }

        let init = SecAuthInit {
            user_name: Some(username),
            group_name: session.groupname.clone(),
            hostname: session.client_hostname.clone(),
            ip: session.client_ip.clone(),
            tls_auth_ok: session.cert_auth_ok,
            cert_user_name: session.cert_username.clone(),
            cert_group_names: (!session.cert_groups.is_empty()).then(|| session.cert_groups.clone()),
        };

        let mut conn = self.dialer.dial().await.map_err(AuthFail::from)?;
        conn.send_init(&init).await.map_err(AuthFail::from)?;
        session.auth_state = AuthState::Init;

        let reply = conn.recv_reply().await.map_err(AuthFail::from)?;
        self.dispatch_reply(session, reply)
    }

    async fn handle_credential_continuation(
        &self,
        session: &mut WorkerSession,
        body: &str,
    ) -> Result<AuthOutcome, AuthFail> {
        let password = crate::body::parse_reply(body, "password", None).map_err(|_| AuthFail::no_password())?;

        let cont = SecAuthCont {
            password,
            sid: session.sid.clone(),
        };

        let mut conn = self.dialer.dial().await.map_err(AuthFail::from)?;
        conn.send_cont(&cont).await.map_err(AuthFail::from)?;
        session.auth_state = AuthState::Req;

        let reply = conn.recv_reply().await.map_err(AuthFail::from)?;
        self.dispatch_reply(session, reply)
    }

    fn dispatch_reply(
        &self,
        session: &mut WorkerSession,
        reply: SecAuthReply,
    ) -> Result<AuthOutcome, AuthFail> {
        match reply.reply {
            Some(ReplyCode::Msg) => {
                let message = reply
                    .msg
                    .map(|m| truncate_to_byte_limit(m, session.config.max_msg_size));
                if let Some(sid) = reply.sid {
                    session.sid = Some(sid);
                }
                session.auth_state = AuthState::Req;
                let response = render::render_password_prompt(session, message.as_deref());
                Ok(AuthOutcome::Continue(response))
            }
            Some(ReplyCode::Ok) => {
                let user_name = reply.user_name;
                let cookie = reply.cookie.filter(|c| !c.is_empty());
                let session_id = reply.dtls_session_id;

                let session_id_ok = session_id
                    .as_ref()
                    .is_some_and(|s| s.len() == session.config.session_id_size);

                if !session_id_ok {
                    if let Some(s) = &session_id {
                        tracing::warn!(
                            got = s.len(),
                            expected = session.config.session_id_size,
                            "dtls_session_id length mismatch from security module, treating as auth failure"
                        );
                    }
                }

                match (user_name, cookie, session_id_ok) {
                    (Some(user_name), Some(cookie), true) => {
                        session.username = Some(user_name);
                        session.cookie = Some(cookie);
                        session.cookie_set = true;
                        session.session_id = session_id;
                        session.auth_state = AuthState::Cookie;
                        Ok(AuthOutcome::Success(self.finalize(session)))
                    }
                    _ => Err(AuthFail::new("Authentication failed")),
                }
            }
            _ => Err(AuthFail::new("Authentication failed")),
        }
    }

    /// §4.6: the final success document and its `Set-Cookie` headers.
    fn finalize(&self, session: &WorkerSession) -> HttpResponse {
        let config = &session.config;

        let mut body = String::from(SUCCESS_MSG_HEAD);
        if let Some(banner) = &config.banner {
            body.push_str(&format!("<banner>{}</banner>\n", xml_escape(banner)));
        }
        body.push_str(SUCCESS_MSG_FOOT);

        let mut builder = HttpResponse::builder(200, "OK");

        let cookie = session
            .cookie
            .as_deref()
            .expect("finalize only called once cookie_set=true");
        builder = builder.header(
            "Set-Cookie",
            format!("webvpn={}; Secure", BASE64.encode(cookie)),
        );

        if config.anyconnect_compat {
            builder = builder.header(
                "Set-Cookie",
                "webvpnc=; expires=Thu, 01 Jan 1970 00:00:00 GMT; path=/; Secure".to_string(),
            );
            builder = builder.header("Set-Cookie", webvpnc_profile_hint(config));
        }

        builder.xml_body(body.into_bytes())
    }

    /// §4.7: redeem a persisted `webvpn` cookie with the supervisor on
    /// reconnect, installing the returned tunnel parameters into `session`
    /// and handing back the passed tunnel file descriptor.
    pub async fn redeem_cookie(
        &self,
        session: &mut WorkerSession,
        supervisor: &mut dyn SupervisorChannel,
        cookie: Vec<u8>,
        tls_auth_ok: bool,
    ) -> Result<OwnedFd, AuthFail> {
        let request = AuthCookieRequest { cookie, tls_auth_ok };
        let (reply, fd) = supervisor
            .redeem_cookie(&request)
            .await
            .map_err(AuthFail::from)?;

        if reply.reply != Some(ReplyCode::Ok) {
            return Err(AuthFail::internal_error());
        }

        let (vname, user_name, fd) = match (reply.vname.clone(), reply.user_name.clone(), fd) {
            (Some(vname), Some(user_name), Some(fd)) => (vname, user_name, fd),
            _ => return Err(AuthFail::internal_error()),
        };

        apply_cookie_reply(session, reply, vname, user_name);

        Ok(fd)
    }
}

fn webvpnc_profile_hint(config: &WorkerConfig) -> String {
    let mut hint = format!("bu:/&p:t&iu:1/&sh:{}", config.cert_hash);
    if let Some(xml_file) = &config.xml_config_file {
        hint.push_str(&format!(
            "&lu:/&fu:profiles/{}&fh:{}",
            xml_file,
            config.xml_config_hash.as_deref().unwrap_or("")
        ));
    }
    hint.push_str("; path=/; Secure");
    hint
}

fn apply_cookie_reply(
    session: &mut WorkerSession,
    reply: AuthCookieReply,
    vname: String,
    user_name: String,
) {
    session.vinfo.name = Some(vname);
    session.username = Some(user_name);
    session.groupname = reply.group_name;
    session.session_id = Some(reply.session_id);

    session.vinfo.ipv4 = clear_sentinel(reply.ipv4, DEFAULT_ADDR_SENTINELS_V4);
    session.vinfo.ipv6 = clear_sentinel(reply.ipv6, DEFAULT_ADDR_SENTINELS_V6);
    session.vinfo.ipv4_local = clear_sentinel(reply.ipv4_local, DEFAULT_ADDR_SENTINELS_V4);
    session.vinfo.ipv6_local = clear_sentinel(reply.ipv6_local, DEFAULT_ADDR_SENTINELS_V6);

    session.vinfo.ipv4_netmask = reply.ipv4_netmask;
    session.vinfo.ipv6_netmask = reply.ipv6_netmask;
    session.vinfo.ipv6_prefix = reply.ipv6_prefix;
    session.vinfo.rx_per_sec = reply.rx_per_sec;
    session.vinfo.tx_per_sec = reply.tx_per_sec;
    session.vinfo.net_priority = reply.net_priority;

    if reply.no_udp == Some(true) {
        session.vinfo.udp_port = None;
    }

    session.routes = reply.routes;
    session.dns = reply.dns;
    session.nbns = reply.nbns;
    session.check_if_default_route();
}

/// §9 open question, decided: a sentinel always clears a previously stored
/// address — we never treat it as "leave unchanged".
fn clear_sentinel(value: Option<String>, sentinel: &str) -> Option<String> {
    match value {
        Some(v) if v == sentinel => None,
        other => other,
    }
}

/// `max_msg_size` is a byte count, but the MSG text comes from the security
/// module over IPC and may contain multi-byte UTF-8; slicing at a raw byte
/// offset can land mid-character. Back off to the nearest preceding char
/// boundary instead of panicking.
fn truncate_to_byte_limit(s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
