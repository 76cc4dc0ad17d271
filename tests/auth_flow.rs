//! End-to-end scenarios from the spec's testable-properties section,
//! driven entirely through the crate's public API.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use vpn_worker_auth::cert::PeerCertificateSource;
use vpn_worker_auth::config::WorkerConfig;
use vpn_worker_auth::error::IpcError;
use vpn_worker_auth::ipc::messages::{
    AuthCookieReply, AuthCookieRequest, ReplyCode, SecAuthCont, SecAuthInit, SecAuthReply,
};
use vpn_worker_auth::ipc::transport::{SecurityModuleConn, SecurityModuleDialer, SupervisorChannel};
use vpn_worker_auth::session::WorkerSession;
use vpn_worker_auth::{AuthFail, AuthOutcome, WorkerAuth};

struct NoCert;
impl PeerCertificateSource for NoCert {
    fn peer_certificate_chain(&self) -> Option<&[Vec<u8>]> {
        None
    }
}

struct ScriptDialer {
    replies: Mutex<VecDeque<SecAuthReply>>,
}

impl ScriptDialer {
    fn new(replies: Vec<SecAuthReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
        })
    }
}

#[async_trait]
impl SecurityModuleDialer for ScriptDialer {
    async fn dial(&self) -> Result<Box<dyn SecurityModuleConn>, IpcError> {
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(IpcError::Malformed("script exhausted"))?;
        Ok(Box::new(ScriptConn { reply: Some(reply) }))
    }
}

struct ScriptConn {
    reply: Option<SecAuthReply>,
}

#[async_trait]
impl SecurityModuleConn for ScriptConn {
    async fn send_init(&mut self, _msg: &SecAuthInit) -> Result<(), IpcError> {
        Ok(())
    }

    async fn send_cont(&mut self, _msg: &SecAuthCont) -> Result<(), IpcError> {
        Ok(())
    }

    async fn recv_reply(&mut self) -> Result<SecAuthReply, IpcError> {
        self.reply
            .take()
            .ok_or(IpcError::Malformed("reply already consumed"))
    }
}

struct ScriptSupervisor {
    reply: Option<AuthCookieReply>,
}

#[async_trait]
impl SupervisorChannel for ScriptSupervisor {
    async fn redeem_cookie(
        &mut self,
        _request: &AuthCookieRequest,
    ) -> Result<(AuthCookieReply, Option<std::os::fd::OwnedFd>), IpcError> {
        let reply = self
            .reply
            .take()
            .ok_or(IpcError::Malformed("cookie reply already consumed"))?;
        let fd = std::fs::File::open("/dev/null")
            .ok()
            .map(std::os::fd::OwnedFd::from);
        Ok((reply, fd))
    }
}

// S1: password-only auth, OTP continuation, success.
#[tokio::test]
async fn s1_password_only_auth_success() {
    let config = WorkerConfig {
        cert_hash: "deadbeef".into(),
        ..WorkerConfig::default()
    };
    let mut session = WorkerSession::new(Arc::new(config));

    let dialer = ScriptDialer::new(vec![
        SecAuthReply {
            reply: Some(ReplyCode::Msg),
            msg: Some("OTP?".into()),
            sid: Some(b"sid-1".to_vec()),
            ..Default::default()
        },
        SecAuthReply {
            reply: Some(ReplyCode::Ok),
            user_name: Some("alice".into()),
            cookie: Some(b"C0".to_vec()),
            dtls_session_id: Some(vec![0u8; 16]),
            ..Default::default()
        },
    ]);
    let auth = WorkerAuth::new(dialer);

    let first = auth
        .handle_post(&mut session, "username=alice&password=secret", &NoCert)
        .await
        .unwrap();
    let challenge = match first {
        AuthOutcome::Continue(resp) => resp,
        AuthOutcome::Success(_) => panic!("expected continuation before OTP"),
    };
    assert!(String::from_utf8(challenge.body).unwrap().contains("OTP?"));
    assert!(challenge
        .header("Set-Cookie")
        .unwrap()
        .starts_with("webvpncontext="));

    let second = auth
        .handle_post(&mut session, "password=000000", &NoCert)
        .await
        .unwrap();
    let success = match second {
        AuthOutcome::Success(resp) => resp,
        AuthOutcome::Continue(_) => panic!("expected success after OTP"),
    };
    let cookie_header = success.header("Set-Cookie").unwrap();
    assert_eq!(
        cookie_header,
        format!("webvpn={}; Secure", BASE64.encode(b"C0"))
    );
    let body = String::from_utf8(success.body).unwrap();
    assert!(body.contains("config-auth"));
}

// S2: missing password in state INIT.
#[tokio::test]
async fn s2_missing_password_fails_with_reason() {
    let mut session = WorkerSession::new(Arc::new(WorkerConfig::default()));
    session.auth_state = vpn_worker_auth::session::AuthState::Init;

    let dialer = ScriptDialer::new(vec![]);
    let auth = WorkerAuth::new(dialer);

    let result = auth
        .handle_post(&mut session, "username=alice", &NoCert)
        .await;
    assert_eq!(result, Err(AuthFail::new("No password")));
}

// S5: certificate auth required but the client presented none.
#[tokio::test]
async fn s5_cert_required_but_missing() {
    let config = WorkerConfig {
        auth_types: vec![vpn_worker_auth::config::AuthType::Certificate],
        ..WorkerConfig::default()
    };
    let mut session = WorkerSession::new(Arc::new(config));

    let dialer = ScriptDialer::new(vec![]);
    let auth = WorkerAuth::new(dialer);

    let result = auth
        .handle_post(&mut session, "username=alice", &NoCert)
        .await;
    assert_eq!(result, Err(AuthFail::new("No certificate")));
}

// S6: XML body with HTML-escaped password.
#[test]
fn s6_xml_body_is_unescaped() {
    let body = r#"<?xml version="1.0"?><config-auth><username>bob</username><password>s&amp;p</password></config-auth>"#;
    assert_eq!(
        vpn_worker_auth::body::parse_reply(body, "username", None).unwrap(),
        "bob"
    );
    assert_eq!(
        vpn_worker_auth::body::parse_reply(body, "password", None).unwrap(),
        "s&p"
    );
}

// S4, via §4.7 cookie redemption: default-route sentinel collapses routes.
#[tokio::test]
async fn s4_cookie_redemption_collapses_default_route() {
    let mut session = WorkerSession::new(Arc::new(WorkerConfig::default()));
    let mut supervisor = ScriptSupervisor {
        reply: Some(AuthCookieReply {
            reply: Some(ReplyCode::Ok),
            vname: Some("tun0".into()),
            user_name: Some("alice".into()),
            session_id: vec![7u8; 16],
            routes: vec![
                "10.0.0.0/8".into(),
                "default".into(),
                "192.168.1.0/24".into(),
            ],
            ..Default::default()
        }),
    };

    let dialer = ScriptDialer::new(vec![]);
    let auth = WorkerAuth::new(dialer);

    auth.redeem_cookie(&mut session, &mut supervisor, b"webvpn-cookie".to_vec(), false)
        .await
        .unwrap();

    assert!(session.routes.is_empty());
    assert!(session.default_route);
}

// Full reconnect path: address sentinels clear, not "leave unchanged".
#[tokio::test]
async fn cookie_redemption_sentinel_clears_address() {
    let mut session = WorkerSession::new(Arc::new(WorkerConfig::default()));
    session.vinfo.ipv4 = Some("10.0.0.9".to_string());

    let mut supervisor = ScriptSupervisor {
        reply: Some(AuthCookieReply {
            reply: Some(ReplyCode::Ok),
            vname: Some("tun0".into()),
            user_name: Some("alice".into()),
            session_id: vec![1u8; 16],
            ipv4: Some("0.0.0.0".into()),
            ..Default::default()
        }),
    };

    let dialer = ScriptDialer::new(vec![]);
    let auth = WorkerAuth::new(dialer);

    auth.redeem_cookie(&mut session, &mut supervisor, b"cookie".to_vec(), false)
        .await
        .unwrap();

    assert_eq!(session.vinfo.ipv4, None);
}
