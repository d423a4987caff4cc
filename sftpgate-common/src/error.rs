use std::error::Error;

use crate::UrlError;

/// Coarse classification used when translating a failure into a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    AuthRequired,
    SecurityFailure,
    RemoteIoFailure,
    UpstreamProtocolFailure,
}

impl ErrorKind {
    /// Whether the caller should be asked for (new) credentials.
    pub fn wants_challenge(self) -> bool {
        matches!(self, Self::AuthRequired | Self::SecurityFailure)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SftpgateError {
    #[error(transparent)]
    InvalidUrl(#[from] UrlError),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("no file part in the request body")]
    NoFilePart,
    #[error("basic authentication required for SFTP connection")]
    AuthRequired,
    #[error("SFTP server rejected the connection: {0}")]
    SecurityFailure(Box<dyn Error + Send + Sync>),
    #[error("remote I/O failed: {0}")]
    RemoteIo(Box<dyn Error + Send + Sync>),
    #[error("SFTP connection failed: {0}")]
    UpstreamProtocol(Box<dyn Error + Send + Sync>),
}

impl SftpgateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl(_) | Self::InvalidArgument(_) | Self::NoFilePart => {
                ErrorKind::InvalidArgument
            }
            Self::AuthRequired => ErrorKind::AuthRequired,
            Self::SecurityFailure(_) => ErrorKind::SecurityFailure,
            Self::RemoteIo(_) => ErrorKind::RemoteIoFailure,
            Self::UpstreamProtocol(_) => ErrorKind::UpstreamProtocolFailure,
        }
    }

    pub fn security<E: Error + Send + Sync + 'static>(err: E) -> Self {
        Self::SecurityFailure(Box::new(err))
    }

    pub fn remote_io<E: Error + Send + Sync + 'static>(err: E) -> Self {
        Self::RemoteIo(Box::new(err))
    }

    pub fn upstream<E: Error + Send + Sync + 'static>(err: E) -> Self {
        Self::UpstreamProtocol(Box::new(err))
    }
}
