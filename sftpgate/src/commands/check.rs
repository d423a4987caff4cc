use anyhow::{Context, Result};
use sftpgate_protocol_sftp::RusshConnector;
use tracing::*;

use crate::config::load_config;

pub(crate) async fn command(cli: &crate::Cli) -> Result<()> {
    let config = load_config(&cli.config, true)?;

    if config.store.http.tls_enabled() {
        for path in [config.certificate_path(), config.key_path()] {
            std::fs::metadata(&path)
                .with_context(|| format!("TLS file '{}' is not readable", path.display()))?;
        }
    }
    if let Some(path) = config.known_hosts_path() {
        std::fs::metadata(&path)
            .with_context(|| format!("known_hosts file '{}' is not readable", path.display()))?;
    }
    RusshConnector::new(&config)?;

    info!("No problems found");
    Ok(())
}
