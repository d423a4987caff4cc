use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use sftpgate_common::helpers::fs::secure_file;
use sftpgate_common::{SftpgateConfig, SftpgateConfigStore};
use tracing::*;

pub fn load_config(path: &Path, secure: bool) -> Result<SftpgateConfig> {
    if secure {
        secure_file(path).context("Could not secure config")?;
    }

    let store: SftpgateConfigStore = Config::builder()
        .add_source(File::from(path))
        .add_source(
            Environment::with_prefix("SFTPGATE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Could not load config")?
        .try_deserialize()
        .context("Could not parse config")?;

    let paths_relative_to = path
        .parent()
        .map(Path::to_path_buf)
        .context("Config path has no parent directory")?;

    let config = SftpgateConfig {
        store,
        paths_relative_to,
    };
    config.validate().context("Invalid config")?;

    info!(
        "Using config: {path:?} (listen: {}, path: {}, host keys: {:?})",
        config.store.http.listen,
        config.store.http.path,
        config.store.sftp.host_key_verification,
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sftpgate_common::HostKeyVerificationMode;

    use super::*;

    fn write_config(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("sftpgate-{}-{name}.yaml", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_config() {
        let path = write_config(
            "load",
            "http:\n  listen: 127.0.0.1:9999\nsftp:\n  host_key_verification: known_hosts\n  known_hosts: known_hosts\n  connect_timeout: 10s\n",
        );
        let config = load_config(&path, false).unwrap();

        assert_eq!(config.store.http.listen.port(), 9999);
        assert_eq!(
            config.store.sftp.host_key_verification,
            HostKeyVerificationMode::KnownHosts
        );
        assert_eq!(config.store.sftp.connect_timeout, Duration::from_secs(10));
        assert_eq!(
            config.known_hosts_path(),
            Some(std::env::temp_dir().join("known_hosts"))
        );
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let path = write_config("invalid", "http:\n  certificate: cert.pem\n");
        assert!(load_config(&path, false).is_err());
        std::fs::remove_file(path).unwrap();
    }
}
