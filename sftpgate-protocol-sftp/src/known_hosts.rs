use std::path::{Path, PathBuf};

use russh::keys::known_hosts::known_host_keys_path;
use russh::keys::PublicKey;

/// An OpenSSH `known_hosts` file. A missing file has no entries.
pub struct KnownHosts {
    path: PathBuf,
}

#[derive(Debug, PartialEq, Eq)]
pub enum KnownHostValidationResult {
    Valid,
    Invalid,
    Unknown,
}

impl KnownHosts {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn validate(
        &self,
        host: &str,
        port: u16,
        key: &PublicKey,
    ) -> Result<KnownHostValidationResult, russh::keys::Error> {
        let entries = known_host_keys_path(host, port, &self.path)?;

        if entries.iter().any(|(_, known_key)| known_key == key) {
            return Ok(KnownHostValidationResult::Valid);
        }
        if !entries.is_empty() {
            return Ok(KnownHostValidationResult::Invalid);
        }
        Ok(KnownHostValidationResult::Unknown)
    }
}
