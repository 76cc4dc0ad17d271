//! Demo/debug harness for the worker auth core.
//!
//! Replays a scripted security-module conversation against
//! [`vpn_worker_auth::WorkerAuth`] and prints the resulting HTTP
//! responses, so the scenarios in the spec's testable-properties section
//! (S1-S6) can be exercised by hand without a live security module or
//! supervisor.

use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use vpn_worker_auth::cert::PeerCertificateSource;
use vpn_worker_auth::config::{AuthType, GroupEntry, WorkerConfig};
use vpn_worker_auth::error::IpcError;
use vpn_worker_auth::ipc::messages::{ReplyCode, SecAuthCont, SecAuthInit, SecAuthReply};
use vpn_worker_auth::ipc::transport::{SecurityModuleConn, SecurityModuleDialer};
use vpn_worker_auth::session::WorkerSession;
use vpn_worker_auth::{AuthOutcome, WorkerAuth};

#[derive(Parser)]
#[command(name = "worker-authd")]
#[command(about = "Replay a scripted auth conversation through the worker auth core")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive one of the spec's named scenarios end-to-end.
    Replay {
        #[arg(value_enum)]
        scenario: Scenario,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Scenario {
    /// S1: password-only auth with an OTP challenge, then success.
    PasswordOtp,
    /// S3: group-list reordering with a selected group and cert groups.
    GroupReorder,
}

struct NoCert;
impl PeerCertificateSource for NoCert {
    fn peer_certificate_chain(&self) -> Option<&[Vec<u8>]> {
        None
    }
}

/// Hands back one scripted reply per `dial()`, in order, regardless of
/// what the caller sends — good enough for a single-threaded CLI replay.
struct ScriptDialer {
    replies: std::sync::Mutex<std::collections::VecDeque<SecAuthReply>>,
}

impl ScriptDialer {
    fn new(replies: Vec<SecAuthReply>) -> Self {
        Self {
            replies: std::sync::Mutex::new(replies.into()),
        }
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
    async fn send_init(&mut self, msg: &SecAuthInit) -> Result<(), IpcError> {
        info!(user = ?msg.user_name, "-> SecAuthInit");
        Ok(())
    }

    async fn send_cont(&mut self, _msg: &SecAuthCont) -> Result<(), IpcError> {
        info!("-> SecAuthCont");
        Ok(())
    }

    async fn recv_reply(&mut self) -> Result<SecAuthReply, IpcError> {
        self.reply
            .take()
            .ok_or(IpcError::Malformed("reply already consumed"))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Replay { scenario } => match scenario {
            Scenario::PasswordOtp => replay_password_otp().await?,
            Scenario::GroupReorder => replay_group_reorder(),
        },
    }

    Ok(())
}

async fn replay_password_otp() -> Result<(), Box<dyn std::error::Error>> {
    let config = WorkerConfig {
        cert_hash: "deadbeef".into(),
        ..WorkerConfig::default()
    };
    let mut session = WorkerSession::new(Arc::new(config));

    let dialer = Arc::new(ScriptDialer::new(vec![
        SecAuthReply {
            reply: Some(ReplyCode::Msg),
            msg: Some("OTP?".into()),
            sid: Some(b"sid-demo".to_vec()),
            ..Default::default()
        },
        SecAuthReply {
            reply: Some(ReplyCode::Ok),
            user_name: Some("alice".into()),
            cookie: Some(b"C0".to_vec()),
            dtls_session_id: Some(vec![0u8; 16]),
            ..Default::default()
        },
    ]));
    let auth = WorkerAuth::new(dialer);

    info!("POST /auth username=alice&password=secret");
    let outcome = auth
        .handle_post(&mut session, "username=alice&password=secret", &NoCert)
        .await?;
    print_outcome(&outcome);

    info!("POST /auth password=000000");
    let outcome = auth
        .handle_post(&mut session, "password=000000", &NoCert)
        .await?;
    print_outcome(&outcome);

    Ok(())
}

fn replay_group_reorder() {
    let config = WorkerConfig {
        auth_types: vec![AuthType::Password],
        groups: vec![
            GroupEntry {
                value: "A".into(),
                friendly_name: Some("alpha".into()),
            },
            GroupEntry {
                value: "B".into(),
                friendly_name: Some("beta".into()),
            },
            GroupEntry {
                value: "C".into(),
                friendly_name: Some("gamma".into()),
            },
        ],
        ..WorkerConfig::default()
    };
    let mut session = WorkerSession::new(Arc::new(config));
    session.groupname = Some("B".to_string());
    session.cert_groups = vec!["B".to_string(), "D".to_string()];

    let dialer: Arc<dyn SecurityModuleDialer> = Arc::new(ScriptDialer::new(vec![]));
    let auth = WorkerAuth::new(dialer);

    info!("GET /");
    let resp = auth.handle_get(&session);
    print_response(&resp);
}

fn print_outcome(outcome: &AuthOutcome) {
    match outcome {
        AuthOutcome::Continue(resp) => print_response(resp),
        AuthOutcome::Success(resp) => print_response(resp),
    }
}

fn print_response(resp: &vpn_worker_auth::http::HttpResponse) {
    println!("HTTP {} {}", resp.status, resp.reason);
    for (name, value) in &resp.headers {
        println!("{name}: {value}");
    }
    println!();
    println!("{}", String::from_utf8_lossy(&resp.body));
    println!("---");
}
