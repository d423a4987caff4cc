use std::path::PathBuf;

use russh::keys::PublicKey;
use sftpgate_common::{ConfigError, HostKeyVerificationMode, SftpgateConfig};
use tracing::*;

use crate::known_hosts::{KnownHostValidationResult, KnownHosts};

/// How server host keys are trusted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Insecure: any key is accepted.
    AcceptAny,
    KnownHosts(PathBuf),
}

impl HostKeyPolicy {
    pub fn from_config(config: &SftpgateConfig) -> Result<Self, ConfigError> {
        match config.store.sftp.host_key_verification {
            HostKeyVerificationMode::AcceptAny => Ok(Self::AcceptAny),
            HostKeyVerificationMode::KnownHosts => config
                .known_hosts_path()
                .map(Self::KnownHosts)
                .ok_or(ConfigError::KnownHostsPathMissing),
        }
    }
}

pub struct ClientHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl ClientHandler {
    pub fn new(host: &str, port: u16, policy: HostKeyPolicy) -> Self {
        Self {
            host: host.to_owned(),
            port,
            policy,
        }
    }
}

impl russh::client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let path = match self.policy {
            HostKeyPolicy::AcceptAny => {
                debug!(host=%self.host, port=self.port, "Accepting host key without verification");
                return Ok(true);
            }
            HostKeyPolicy::KnownHosts(ref path) => path,
        };

        match KnownHosts::new(path).validate(&self.host, self.port, server_public_key) {
            Ok(KnownHostValidationResult::Valid) => Ok(true),
            Ok(KnownHostValidationResult::Invalid) => {
                warn!(host=%self.host, port=self.port, "Host key is invalid!");
                Ok(false)
            }
            Ok(KnownHostValidationResult::Unknown) => {
                warn!(host=%self.host, port=self.port, known_hosts=%path.display(), "Host key is unknown");
                Ok(false)
            }
            Err(error) => {
                error!(?error, host=%self.host, "Failed to verify the host key");
                Err(error.into())
            }
        }
    }
}
