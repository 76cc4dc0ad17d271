//! Challenge Renderer (component C, §4.3).
//!
//! Builds the XML `config-auth` documents the client expects at each step
//! of the dialogue: the password-only re-prompt (state REQ) and the
//! initial username/group prompt (every other state, including `GET /`).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::http::HttpResponse;
use crate::session::WorkerSession;

const DEFAULT_PASSWORD_PROMPT: &str = "Please enter your password.";

/// §4.3 state REQ: a single password input, captioned with `message` or
/// the default prompt.
pub fn render_password_prompt(session: &WorkerSession, message: Option<&str>) -> HttpResponse {
    let prompt = message.unwrap_or(DEFAULT_PASSWORD_PROMPT);
    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<config-auth client="vpn" type="auth-request">
<message>{}</message>
<auth>
<input type="password" name="password"></input>
</auth>
</config-auth>
"#,
        xml_escape(prompt)
    );

    with_sid_cookie(session, HttpResponse::builder(200, "OK").xml_body(body.into_bytes()))
}

/// §4.3 "any other state": username + optional group-select prompt.
pub fn render_initial_prompt(session: &WorkerSession) -> HttpResponse {
    let options = build_group_options(session);

    let group_select = if options.is_empty() {
        String::new()
    } else {
        let mut s = String::from("<select name=\"group_list\">\n");
        for opt in &options {
            match &opt.value {
                Some(value) => {
                    s.push_str(&format!(
                        "<option value=\"{}\">{}</option>\n",
                        xml_escape(value),
                        xml_escape(&opt.display)
                    ));
                }
                None => {
                    s.push_str(&format!("<option>{}</option>\n", xml_escape(&opt.display)));
                }
            }
        }
        s.push_str("</select>\n");
        s
    };

    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<config-auth client="vpn" type="auth-request">
<message>Please enter your username and password.</message>
<auth>
<input type="text" name="username"></input>
{}</auth>
</config-auth>
"#,
        group_select
    );

    with_sid_cookie(session, HttpResponse::builder(200, "OK").xml_body(body.into_bytes()))
}

/// One rendered `<option>`: `value` is the configured group's raw value
/// (omitted for bare cert-only options), `display` is the friendly name
/// or the raw value if there is none.
struct GroupOption {
    value: Option<String>,
    display: String,
}

/// §4.3 steps 1-4: compose the group list in strict order, deduplicating
/// cert groups against the config list and the selected group.
fn build_group_options(session: &WorkerSession) -> Vec<GroupOption> {
    if session.config.groups.is_empty() && session.cert_groups.is_empty() {
        return Vec::new();
    }

    let mut options = Vec::new();
    let mut emitted: Vec<String> = Vec::new();

    // 1. previously selected group, if any.
    if let Some(selected) = &session.groupname {
        let display = session
            .config
            .find_group(selected)
            .map(|g| g.display_name().to_string())
            .unwrap_or_else(|| selected.clone());
        options.push(GroupOption {
            value: Some(selected.clone()),
            display,
        });
        emitted.push(selected.clone());
    }

    // 2. the default-select placeholder, as a bare option.
    if let Some(default_select) = &session.config.default_select_group {
        options.push(GroupOption {
            value: None,
            display: default_select.clone(),
        });
    }

    // 3. cert groups, deduplicated against the config list and the
    // selected group.
    for cert_group in &session.cert_groups {
        if emitted.iter().any(|e| e == cert_group) {
            continue;
        }
        if session.config.find_group(cert_group).is_some() {
            continue;
        }
        options.push(GroupOption {
            value: None,
            display: cert_group.clone(),
        });
        emitted.push(cert_group.clone());
    }

    // 4. configured groups, in declaration order, skipping the selected one.
    for group in &session.config.groups {
        if session.groupname.as_deref() == Some(group.value.as_str()) {
            continue;
        }
        options.push(GroupOption {
            value: Some(group.value.clone()),
            display: group.display_name().to_string(),
        });
    }

    options
}

/// If a sid is in progress, every auth document carries the
/// `webvpncontext` cookie so the client can present it on retry.
fn with_sid_cookie(session: &WorkerSession, builder: HttpResponse) -> HttpResponse {
    let Some(sid) = &session.sid else {
        return builder;
    };

    let mut resp = builder;
    resp.headers.push((
        "Set-Cookie".to_string(),
        format!(
            "webvpncontext={}; Max-Age={}; Secure",
            BASE64.encode(sid),
            session.config.max_auth_secs
        ),
    ));
    resp
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthType, GroupEntry, WorkerConfig};
    use std::sync::Arc;

    fn config_with_groups() -> WorkerConfig {
        WorkerConfig {
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
        }
    }

    // S3
    #[test]
    fn group_reordering_matches_scenario() {
        let config = config_with_groups();
        let mut session = WorkerSession::new(Arc::new(config));
        session.groupname = Some("B".to_string());
        session.cert_groups = vec!["B".to_string(), "D".to_string()];

        let options = build_group_options(&session);
        let rendered: Vec<(Option<String>, String)> = options
            .into_iter()
            .map(|o| (o.value, o.display))
            .collect();

        assert_eq!(
            rendered,
            vec![
                (Some("B".to_string()), "beta".to_string()),
                (None, "D".to_string()),
                (Some("A".to_string()), "alpha".to_string()),
                (Some("C".to_string()), "gamma".to_string()),
            ]
        );
    }

    #[test]
    fn no_groups_emits_no_select() {
        let session = WorkerSession::new(Arc::new(WorkerConfig::default()));
        let resp = render_initial_prompt(&session);
        let body = String::from_utf8(resp.body).unwrap();
        assert!(!body.contains("<select"));
    }

    #[test]
    fn password_prompt_uses_default_message() {
        let session = WorkerSession::new(Arc::new(WorkerConfig::default()));
        let resp = render_password_prompt(&session, None);
        let body = String::from_utf8(resp.body).unwrap();
        assert!(body.contains("Please enter your password."));
    }

    #[test]
    fn password_prompt_uses_caller_supplied_message() {
        let session = WorkerSession::new(Arc::new(WorkerConfig::default()));
        let resp = render_password_prompt(&session, Some("OTP?"));
        let body = String::from_utf8(resp.body).unwrap();
        assert!(body.contains("OTP?"));
    }

    #[test]
    fn sid_present_sets_webvpncontext_cookie() {
        let mut session = WorkerSession::new(Arc::new(WorkerConfig::default()));
        session.sid = Some(b"abcd".to_vec());
        let resp = render_initial_prompt(&session);
        let cookie = resp.header("Set-Cookie").unwrap();
        assert!(cookie.starts_with("webvpncontext="));
        assert!(cookie.contains("; Secure"));
    }

    #[test]
    fn content_length_matches_body() {
        let session = WorkerSession::new(Arc::new(WorkerConfig::default()));
        let resp = render_initial_prompt(&session);
        let len: usize = resp.header("Content-Length").unwrap().parse().unwrap();
        assert_eq!(len, resp.body.len());
    }
}
