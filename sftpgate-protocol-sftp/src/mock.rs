//! In-memory SFTP server for tests.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use async_trait::async_trait;
use sftpgate_common::{Credentials, SftpUrl};
use tokio::io::AsyncWrite;

use crate::client::resolve_path;
use crate::{RemoteReader, RemoteWriter, SftpClientError, SftpConnector, SftpSession};

struct MockState {
    password: Option<String>,
    unreachable: bool,
    read_only: bool,
    failing_writes: bool,
    reported_sizes: BTreeMap<String, Option<u64>>,
    directories: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    attempts: Vec<String>,
    operations: Vec<String>,
    opened: usize,
    closed: usize,
}

/// Hands out sessions backed by a shared in-memory tree and records what
/// they did. Clones share the same state.
#[derive(Clone)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

fn parents(path: &str) -> impl Iterator<Item = &str> + '_ {
    path.match_indices('/')
        .map(move |(index, _)| if index == 0 { "/" } else { &path[..index] })
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                password: None,
                unreachable: false,
                read_only: false,
                failing_writes: false,
                reported_sizes: BTreeMap::new(),
                directories: BTreeSet::from(["/".to_owned()]),
                files: BTreeMap::new(),
                attempts: vec![],
                operations: vec![],
                opened: 0,
                closed: 0,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Only this password is accepted. Without it any password is.
    pub fn with_password(self, password: &str) -> Self {
        self.state().password = Some(password.to_owned());
        self
    }

    pub fn with_directory(self, path: &str) -> Self {
        {
            let mut state = self.state();
            for parent in parents(path) {
                state.directories.insert(parent.to_owned());
            }
            state.directories.insert(path.to_owned());
        }
        self
    }

    pub fn with_file(self, path: &str, contents: &[u8]) -> Self {
        {
            let mut state = self.state();
            for parent in parents(path) {
                state.directories.insert(parent.to_owned());
            }
            state.files.insert(path.to_owned(), contents.to_vec());
        }
        self
    }

    /// Every connection attempt times out.
    pub fn unreachable(self) -> Self {
        self.state().unreachable = true;
        self
    }

    /// `mkdir` and `create` fail with a permission error.
    pub fn read_only(self) -> Self {
        self.state().read_only = true;
        self
    }

    /// Writes to created files fail with a broken pipe.
    pub fn failing_writes(self) -> Self {
        self.state().failing_writes = true;
        self
    }

    /// Makes `size` report `size` for `path` whatever the file holds.
    pub fn with_reported_size(self, path: &str, size: Option<u64>) -> Self {
        self.state().reported_sizes.insert(path.to_owned(), size);
        self
    }

    /// `username@host:port` for every call to [`SftpConnector::open`].
    pub fn attempts(&self) -> Vec<String> {
        self.state().attempts.clone()
    }

    /// Sessions successfully opened.
    pub fn opened(&self) -> usize {
        self.state().opened
    }

    pub fn closed(&self) -> usize {
        self.state().closed
    }

    /// Directory and file operations in the order sessions issued them.
    pub fn operations(&self) -> Vec<String> {
        self.state().operations.clone()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state().files.get(path).cloned()
    }

    pub fn has_directory(&self, path: &str) -> bool {
        self.state().directories.contains(path)
    }
}

#[async_trait]
impl SftpConnector for MockConnector {
    async fn open(
        &self,
        target: &SftpUrl,
        credentials: Credentials,
    ) -> Result<Box<dyn SftpSession>, SftpClientError> {
        let mut state = self.state();
        state.attempts.push(format!(
            "{}@{}:{}",
            credentials.username,
            target.host(),
            target.port()
        ));

        if state.unreachable {
            return Err(SftpClientError::ConnectTimeout(format!(
                "{}:{}",
                target.host(),
                target.port()
            )));
        }
        if let Some(ref password) = state.password {
            if credentials.password.expose_secret() != password {
                return Err(SftpClientError::AuthRejected(credentials.username));
            }
        }

        state.opened += 1;
        Ok(Box::new(MockSession {
            state: self.state.clone(),
            cwd: "/".to_owned(),
        }))
    }
}

pub struct MockSession {
    state: Arc<Mutex<MockState>>,
    cwd: String,
}

impl MockSession {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn permission_denied(path: &str) -> SftpClientError {
    SftpClientError::Io(io::Error::new(
        io::ErrorKind::PermissionDenied,
        format!("{path}: permission denied"),
    ))
}

fn not_found(path: &str) -> SftpClientError {
    SftpClientError::Io(io::Error::new(
        io::ErrorKind::NotFound,
        format!("{path}: no such file"),
    ))
}

#[async_trait]
impl SftpSession for MockSession {
    async fn cd(&mut self, directory: &str) -> Result<(), SftpClientError> {
        let path = resolve_path(&self.cwd, directory);
        {
            let mut state = self.state();
            state.operations.push(format!("cd {directory}"));
            if !state.directories.contains(&path) {
                return Err(SftpClientError::NotADirectory(path));
            }
        }
        self.cwd = path;
        Ok(())
    }

    async fn mkdir(&mut self, directory: &str) -> Result<(), SftpClientError> {
        let path = resolve_path(&self.cwd, directory);
        let mut state = self.state();
        state.operations.push(format!("mkdir {directory}"));
        if state.read_only {
            return Err(permission_denied(&path));
        }
        if state.directories.contains(&path) || state.files.contains_key(&path) {
            return Err(SftpClientError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                path,
            )));
        }
        state.directories.insert(path);
        Ok(())
    }

    async fn size(&mut self, path: &str) -> Result<Option<u64>, SftpClientError> {
        let path = resolve_path(&self.cwd, path);
        let state = self.state();
        if state.directories.contains(&path) {
            return Err(SftpClientError::IsADirectory(path));
        }
        let size = state
            .files
            .get(&path)
            .map(|contents| contents.len() as u64)
            .ok_or_else(|| not_found(&path))?;
        Ok(state.reported_sizes.get(&path).copied().unwrap_or(Some(size)))
    }

    async fn open(&mut self, path: &str) -> Result<RemoteReader, SftpClientError> {
        let path = resolve_path(&self.cwd, path);
        let mut state = self.state();
        state.operations.push(format!("open {path}"));
        let contents = state.files.get(&path).cloned().ok_or_else(|| not_found(&path))?;
        Ok(Box::new(Cursor::new(contents)))
    }

    async fn create(&mut self, path: &str) -> Result<RemoteWriter, SftpClientError> {
        let path = resolve_path(&self.cwd, path);
        let mut state = self.state();
        state.operations.push(format!("create {path}"));
        if state.read_only {
            return Err(permission_denied(&path));
        }
        Ok(Box::new(MockWriter {
            state: self.state.clone(),
            path,
            buffer: vec![],
            failing: state.failing_writes,
        }))
    }

    async fn close(&mut self) {
        self.state().closed += 1;
    }
}

/// Collects written bytes and stores them as the file on shutdown.
struct MockWriter {
    state: Arc<Mutex<MockState>>,
    path: String,
    buffer: Vec<u8>,
    failing: bool,
}

impl AsyncWrite for MockWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.failing {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("{}: connection lost", self.path),
            )));
        }
        self.buffer.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let contents = std::mem::take(&mut self.buffer);
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .files
            .insert(self.path.clone(), contents);
        Poll::Ready(Ok(()))
    }
}
