mod defaults;

use std::path::PathBuf;
use std::time::Duration;

use defaults::*;
use serde::Deserialize;

use crate::ListenEndpoint;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("`http.path` must start with a slash, got {0:?}")]
    InvalidHttpPath(String),
    #[error("`http.certificate` and `http.key` must be set together")]
    IncompleteTls,
    #[error("`sftp.known_hosts` must be set when `sftp.host_key_verification` is `known_hosts`")]
    KnownHostsPathMissing,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq, Copy)]
pub enum HostKeyVerificationMode {
    /// Trusts whatever key the server presents. Only suitable inside a
    /// network where the SFTP servers are already trusted.
    #[serde(rename = "accept_any")]
    #[default]
    AcceptAny,
    /// Checks the key against an OpenSSH `known_hosts` file and rejects
    /// unknown or changed keys.
    #[serde(rename = "known_hosts")]
    KnownHosts,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "_default_http_listen")]
    pub listen: ListenEndpoint,

    /// Route the bridge endpoint is mounted at.
    #[serde(default = "_default_http_path")]
    pub path: String,

    #[serde(default = "_default_empty_string")]
    pub certificate: String,

    #[serde(default = "_default_empty_string")]
    pub key: String,

    #[serde(default = "_default_false")]
    pub trust_x_forwarded_headers: bool,

    /// Downloads up to this size are read completely before the response
    /// status is sent.
    #[serde(default = "_default_download_buffer_limit")]
    pub download_buffer_limit: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            listen: _default_http_listen(),
            path: _default_http_path(),
            certificate: _default_empty_string(),
            key: _default_empty_string(),
            trust_x_forwarded_headers: false,
            download_buffer_limit: _default_download_buffer_limit(),
        }
    }
}

impl HttpConfig {
    pub fn tls_enabled(&self) -> bool {
        !self.certificate.is_empty() && !self.key.is_empty()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SftpConfig {
    #[serde(default)]
    pub host_key_verification: HostKeyVerificationMode,

    #[serde(default)]
    pub known_hosts: Option<String>,

    #[serde(default = "_default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    #[serde(default = "_default_inactivity_timeout", with = "humantime_serde")]
    pub inactivity_timeout: Duration,

    /// Answer any failure to open a session with a Basic-Auth challenge,
    /// not only rejected credentials.
    #[serde(default = "_default_false")]
    pub challenge_on_connect_error: bool,
}

impl Default for SftpConfig {
    fn default() -> Self {
        SftpConfig {
            host_key_verification: Default::default(),
            known_hosts: None,
            connect_timeout: _default_connect_timeout(),
            inactivity_timeout: _default_inactivity_timeout(),
            challenge_on_connect_error: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SftpgateConfigStore {
    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub sftp: SftpConfig,
}

#[derive(Debug, Clone)]
pub struct SftpgateConfig {
    pub store: SftpgateConfigStore,
    pub paths_relative_to: PathBuf,
}

impl SftpgateConfig {
    pub fn certificate_path(&self) -> PathBuf {
        self.paths_relative_to.join(&self.store.http.certificate)
    }

    pub fn key_path(&self) -> PathBuf {
        self.paths_relative_to.join(&self.store.http.key)
    }

    pub fn known_hosts_path(&self) -> Option<PathBuf> {
        self.store
            .sftp
            .known_hosts
            .as_ref()
            .map(|path| self.paths_relative_to.join(path))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let http = &self.store.http;
        if !http.path.starts_with('/') {
            return Err(ConfigError::InvalidHttpPath(http.path.clone()));
        }
        if http.certificate.is_empty() != http.key.is_empty() {
            return Err(ConfigError::IncompleteTls);
        }

        if self.store.sftp.host_key_verification == HostKeyVerificationMode::KnownHosts
            && self.store.sftp.known_hosts.is_none()
        {
            return Err(ConfigError::KnownHostsPathMissing);
        }
        Ok(())
    }
}
