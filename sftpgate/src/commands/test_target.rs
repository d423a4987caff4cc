use anyhow::{Context, Result};
use sftpgate_common::{Credentials, SftpUrl};
use sftpgate_protocol_sftp::{RusshConnector, SessionGuard, SftpClientError, SftpConnector};
use tracing::*;

use crate::commands::common::read_password;
use crate::config::load_config;

pub(crate) async fn command(cli: &crate::Cli, url: &str, username: &str) -> Result<()> {
    let config = load_config(&cli.config, false)?;
    let target: SftpUrl = url.parse().context("Invalid target URL")?;
    let connector = RusshConnector::new(&config)?;

    let password = read_password(username)?;

    let session = match connector
        .open(&target, Credentials::new(username, password))
        .await
    {
        Ok(session) => session,
        Err(SftpClientError::AuthRejected(_)) => {
            error!("Authentication failed");
            anyhow::bail!("Connection test failed")
        }
        Err(SftpClientError::HostKeyRejected { .. }) => {
            error!("Host key was not accepted, check `sftp.known_hosts`");
            anyhow::bail!("Connection test failed")
        }
        Err(error) => {
            error!(%error, "Connection error");
            anyhow::bail!("Connection test failed")
        }
    };

    let path = target.source_path();
    let mut guard = SessionGuard::new(session);
    let result = guard.session().size(&path).await;
    guard.close().await;

    match result {
        Ok(size) => info!(%path, ?size, "Connection successful!"),
        Err(SftpClientError::IsADirectory(_)) => {
            info!(%path, "Connection successful! (target is a directory)")
        }
        Err(error) => {
            error!(%path, %error, "Connected, but the target path is not accessible");
            anyhow::bail!("Connection test failed")
        }
    }
    Ok(())
}
