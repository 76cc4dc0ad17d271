//! Configuration for the worker authentication core.
//!
//! Shared, read-mostly settings (§3 `config`), loaded from TOML the same
//! way the sibling VPN CLI loads its own `Config`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

/// Authentication methods a gateway may require of a connecting client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    Password,
    Certificate,
}

/// One configured group: its raw value and optional human-friendly label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub value: String,
    #[serde(default)]
    pub friendly_name: Option<String>,
}

impl GroupEntry {
    pub fn display_name(&self) -> &str {
        self.friendly_name.as_deref().unwrap_or(&self.value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Auth methods accepted by this gateway.
    pub auth_types: Vec<AuthType>,
    /// Configured groups, in declaration order.
    #[serde(default)]
    pub groups: Vec<GroupEntry>,
    /// Placeholder value meaning "let the client choose" (§4.5).
    #[serde(default)]
    pub default_select_group: Option<String>,
    /// OID of the DN attribute holding the certificate username, e.g. "CN".
    #[serde(default)]
    pub cert_user_oid: Option<String>,
    /// OID of the DN attribute holding certificate group memberships.
    #[serde(default)]
    pub cert_group_oid: Option<String>,
    /// Plaintext banner shown on successful auth, if any.
    #[serde(default)]
    pub banner: Option<String>,
    /// Hash of the gateway's own certificate, embedded in the `webvpnc`
    /// profile-update hint cookie.
    pub cert_hash: String,
    /// Name of the AnyConnect XML profile file, if profile push is enabled.
    #[serde(default)]
    pub xml_config_file: Option<String>,
    /// Hash of the XML profile file, required when `xml_config_file` is set.
    #[serde(default)]
    pub xml_config_hash: Option<String>,
    /// Whether to emit the AnyConnect-compatibility `webvpnc` cookie dance.
    #[serde(default = "default_true")]
    pub anyconnect_compat: bool,
    /// Lifetime, in seconds, of the `webvpncontext` cookie during auth.
    #[serde(default = "default_max_auth_secs")]
    pub max_auth_secs: u64,
    /// Maximum accepted length of a security-module `MSG` challenge string.
    #[serde(default = "default_max_msg_size")]
    pub max_msg_size: usize,
    /// Expected byte length of `dtls_session_id` values.
    #[serde(default = "default_session_id_size")]
    pub session_id_size: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_auth_secs() -> u64 {
    300
}

fn default_max_msg_size() -> usize {
    4096
}

fn default_session_id_size() -> usize {
    16
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            auth_types: vec![AuthType::Password],
            groups: Vec::new(),
            default_select_group: None,
            cert_user_oid: None,
            cert_group_oid: None,
            banner: None,
            cert_hash: String::new(),
            xml_config_file: None,
            xml_config_hash: None,
            anyconnect_compat: true,
            max_auth_secs: default_max_auth_secs(),
            max_msg_size: default_max_msg_size(),
            session_id_size: default_session_id_size(),
        }
    }
}

impl WorkerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: WorkerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn requires_certificate(&self) -> bool {
        self.auth_types.contains(&AuthType::Certificate)
    }

    pub fn find_group(&self, value: &str) -> Option<&GroupEntry> {
        self.groups.iter().find(|g| g.value == value)
    }
}
