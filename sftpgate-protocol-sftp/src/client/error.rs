use sftpgate_common::SftpgateError;

#[derive(thiserror::Error, Debug)]
pub enum SftpClientError {
    #[error("connection to {0} timed out")]
    ConnectTimeout(String),
    #[error("host key of {host}:{port} was not accepted")]
    HostKeyRejected { host: String, port: u16 },
    #[error("authentication rejected for user {0}")]
    AuthRejected(String),
    #[error("russh error: {0}")]
    Russh(#[from] russh::Error),
    #[error("sftp error: {0}")]
    Sftp(#[from] russh_sftp::client::error::Error),
    #[error("{0} is not a directory")]
    NotADirectory(String),
    #[error("{0} is a directory")]
    IsADirectory(String),
    #[error("session is already closed")]
    SessionClosed,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SftpClientError> for SftpgateError {
    fn from(error: SftpClientError) -> Self {
        match error {
            SftpClientError::AuthRejected(_) => SftpgateError::security(error),
            SftpClientError::ConnectTimeout(_)
            | SftpClientError::HostKeyRejected { .. }
            | SftpClientError::Russh(_) => SftpgateError::upstream(error),
            SftpClientError::Sftp(_)
            | SftpClientError::NotADirectory(_)
            | SftpClientError::IsADirectory(_)
            | SftpClientError::SessionClosed
            | SftpClientError::Io(_) => SftpgateError::remote_io(error),
        }
    }
}
