use std::sync::Arc;

use sftpgate_common::{Credentials, SftpUrl, SftpgateConfig, SftpgateError};
use sftpgate_protocol_sftp::{SessionGuard, SftpConnector};

/// Read-only state shared by all requests.
#[derive(Clone)]
pub struct Services {
    pub config: Arc<SftpgateConfig>,
    pub connector: Arc<dyn SftpConnector>,
}

impl Services {
    pub fn new(config: SftpgateConfig, connector: Arc<dyn SftpConnector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
        }
    }

    pub async fn open_session(
        &self,
        target: &SftpUrl,
        credentials: Credentials,
    ) -> Result<SessionGuard, SftpgateError> {
        match self.connector.open(target, credentials).await {
            Ok(session) => Ok(SessionGuard::new(session)),
            Err(error) => {
                let error = SftpgateError::from(error);
                if self.config.store.sftp.challenge_on_connect_error
                    && !error.kind().wants_challenge()
                {
                    return Err(SftpgateError::SecurityFailure(Box::new(error)));
                }
                Err(error)
            }
        }
    }
}
