use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::Handle;
use russh::Disconnect;
use russh_sftp::client::SftpSession as RusshSftpSession;
use sftpgate_common::{ConfigError, Credentials, SftpUrl, SftpgateConfig};
use tracing::*;

use super::{
    resolve_path, ClientHandler, HostKeyPolicy, RemoteReader, RemoteWriter, SftpClientError,
    SftpConnector, SftpSession,
};

/// Password-authenticated SFTP over `russh`.
pub struct RusshConnector {
    config: Arc<russh::client::Config>,
    connect_timeout: Duration,
    host_key_policy: HostKeyPolicy,
}

impl RusshConnector {
    pub fn new(config: &SftpgateConfig) -> Result<Self, ConfigError> {
        let sftp = &config.store.sftp;
        let ssh_config = russh::client::Config {
            inactivity_timeout: Some(sftp.inactivity_timeout),
            ..Default::default()
        };
        Ok(Self {
            config: Arc::new(ssh_config),
            connect_timeout: sftp.connect_timeout,
            host_key_policy: HostKeyPolicy::from_config(config)?,
        })
    }

    async fn establish(
        &self,
        target: &SftpUrl,
        credentials: &Credentials,
    ) -> Result<RusshSession, SftpClientError> {
        let handler = ClientHandler::new(target.host(), target.port(), self.host_key_policy.clone());
        let mut handle = russh::client::connect(
            self.config.clone(),
            (target.host(), target.port()),
            handler,
        )
        .await
        .map_err(|error| match error {
            russh::Error::UnknownKey => SftpClientError::HostKeyRejected {
                host: target.host().to_owned(),
                port: target.port(),
            },
            error => SftpClientError::Russh(error),
        })?;

        match start_sftp(&mut handle, credentials).await {
            Ok(sftp) => {
                let cwd = match sftp.canonicalize(".").await {
                    Ok(path) => path,
                    Err(error) => {
                        debug!(?error, "Could not resolve the login directory, using /");
                        "/".to_owned()
                    }
                };
                Ok(RusshSession { sftp, handle, cwd })
            }
            Err(error) => {
                let _ = handle
                    .disconnect(Disconnect::ByApplication, "", "")
                    .await;
                Err(error)
            }
        }
    }
}

async fn start_sftp(
    handle: &mut Handle<ClientHandler>,
    credentials: &Credentials,
) -> Result<RusshSftpSession, SftpClientError> {
    let auth_result = handle
        .authenticate_password(&credentials.username, credentials.password.expose_secret())
        .await?;
    if !auth_result.success() {
        return Err(SftpClientError::AuthRejected(credentials.username.clone()));
    }

    let channel = handle.channel_open_session().await?;
    channel.request_subsystem(true, "sftp").await?;
    Ok(RusshSftpSession::new(channel.into_stream()).await?)
}

#[async_trait]
impl SftpConnector for RusshConnector {
    async fn open(
        &self,
        target: &SftpUrl,
        credentials: Credentials,
    ) -> Result<Box<dyn SftpSession>, SftpClientError> {
        let address = format!("{}:{}", target.host(), target.port());
        info!(%address, username=%credentials.username, "Connecting");

        let session = tokio::time::timeout(self.connect_timeout, self.establish(target, &credentials))
            .await
            .map_err(|_| SftpClientError::ConnectTimeout(address.clone()))?
            .map_err(|error| {
                warn!(%address, username=%credentials.username, %error, "Connection failed");
                error
            })?;

        info!(%address, cwd=%session.cwd, "Connected");
        Ok(Box::new(session))
    }
}

pub struct RusshSession {
    sftp: RusshSftpSession,
    handle: Handle<ClientHandler>,
    cwd: String,
}

#[async_trait]
impl SftpSession for RusshSession {
    async fn cd(&mut self, directory: &str) -> Result<(), SftpClientError> {
        let path = resolve_path(&self.cwd, directory);
        if !self.sftp.metadata(path.as_str()).await?.is_dir() {
            return Err(SftpClientError::NotADirectory(path));
        }
        self.cwd = self.sftp.canonicalize(path).await?;
        Ok(())
    }

    async fn mkdir(&mut self, directory: &str) -> Result<(), SftpClientError> {
        let path = resolve_path(&self.cwd, directory);
        info!(%path, "Creating directory");
        Ok(self.sftp.create_dir(path).await?)
    }

    async fn size(&mut self, path: &str) -> Result<Option<u64>, SftpClientError> {
        let path = resolve_path(&self.cwd, path);
        let metadata = self.sftp.metadata(path.as_str()).await?;
        if metadata.is_dir() {
            return Err(SftpClientError::IsADirectory(path));
        }
        Ok(metadata.size)
    }

    async fn open(&mut self, path: &str) -> Result<RemoteReader, SftpClientError> {
        let file = self.sftp.open(resolve_path(&self.cwd, path)).await?;
        Ok(Box::new(file))
    }

    async fn create(&mut self, path: &str) -> Result<RemoteWriter, SftpClientError> {
        let file = self.sftp.create(resolve_path(&self.cwd, path)).await?;
        Ok(Box::new(file))
    }

    async fn close(&mut self) {
        if let Err(error) = self.sftp.close().await {
            debug!(?error, "Failed to close the SFTP channel");
        }
        if let Err(error) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "")
            .await
        {
            debug!(?error, "Failed to disconnect");
        }
        debug!("Closed session");
    }
}
