mod connector;
mod error;
mod handler;

use async_trait::async_trait;
pub use connector::RusshConnector;
pub use error::SftpClientError;
pub use handler::{ClientHandler, HostKeyPolicy};
use sftpgate_common::{Credentials, SftpUrl};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::*;

pub type RemoteReader = Box<dyn AsyncRead + Send + Unpin>;
pub type RemoteWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Opens authenticated SFTP sessions, one per call.
#[async_trait]
pub trait SftpConnector: Send + Sync {
    async fn open(
        &self,
        target: &SftpUrl,
        credentials: Credentials,
    ) -> Result<Box<dyn SftpSession>, SftpClientError>;
}

/// A connected SFTP session with a client-side working directory.
///
/// Relative paths are resolved against the working directory, which starts
/// at the login directory and is changed with [`SftpSession::cd`].
#[async_trait]
pub trait SftpSession: Send {
    async fn cd(&mut self, directory: &str) -> Result<(), SftpClientError>;
    async fn mkdir(&mut self, directory: &str) -> Result<(), SftpClientError>;
    /// Size of a regular file, `None` when the server does not report it.
    async fn size(&mut self, path: &str) -> Result<Option<u64>, SftpClientError>;
    async fn open(&mut self, path: &str) -> Result<RemoteReader, SftpClientError>;
    /// Creates or truncates a file. The upload is complete once the
    /// returned writer has been shut down.
    async fn create(&mut self, path: &str) -> Result<RemoteWriter, SftpClientError>;
    /// Best-effort teardown, never fails.
    async fn close(&mut self);
}

/// Owns a session for the duration of a request and makes sure it gets
/// closed exactly once.
///
/// Call [`SessionGuard::close`] on every path that finishes normally. If the
/// guard is dropped instead (e.g. the HTTP client went away mid-download),
/// the close is spawned onto the current runtime.
pub struct SessionGuard {
    session: Box<dyn SftpSession>,
    closed: bool,
}

impl SessionGuard {
    pub fn new(session: Box<dyn SftpSession>) -> Self {
        Self {
            session,
            closed: false,
        }
    }

    pub fn session(&mut self) -> &mut dyn SftpSession {
        self.session.as_mut()
    }

    pub async fn close(mut self) {
        self.closed = true;
        self.session.close().await;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let mut session = std::mem::replace(&mut self.session, Box::new(DetachedSession));
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!("Closing abandoned session");
                runtime.spawn(async move { session.close().await });
            }
            Err(_) => warn!("Session dropped outside of a runtime, leaving it to the transport"),
        }
    }
}

/// Stand-in left behind in a guard whose session has been moved out.
struct DetachedSession;

#[async_trait]
impl SftpSession for DetachedSession {
    async fn cd(&mut self, _directory: &str) -> Result<(), SftpClientError> {
        Err(SftpClientError::SessionClosed)
    }

    async fn mkdir(&mut self, _directory: &str) -> Result<(), SftpClientError> {
        Err(SftpClientError::SessionClosed)
    }

    async fn size(&mut self, _path: &str) -> Result<Option<u64>, SftpClientError> {
        Err(SftpClientError::SessionClosed)
    }

    async fn open(&mut self, _path: &str) -> Result<RemoteReader, SftpClientError> {
        Err(SftpClientError::SessionClosed)
    }

    async fn create(&mut self, _path: &str) -> Result<RemoteWriter, SftpClientError> {
        Err(SftpClientError::SessionClosed)
    }

    async fn close(&mut self) {}
}

/// Joins `path` onto `cwd` unless it is already absolute.
pub(crate) fn resolve_path(cwd: &str, path: &str) -> String {
    if path.starts_with('/') {
        path.to_owned()
    } else if cwd.ends_with('/') {
        format!("{cwd}{path}")
    } else {
        format!("{cwd}/{path}")
    }
}
