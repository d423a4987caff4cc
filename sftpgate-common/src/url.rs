use std::fmt::Display;
use std::num::ParseIntError;
use std::str::FromStr;

pub const SFTP_SCHEME_PREFIX: &str = "sftp://";
pub const DEFAULT_SFTP_PORT: u16 = 22;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("url must be defined")]
    Empty,
    #[error("url must begin with {SFTP_SCHEME_PREFIX}")]
    UnsupportedScheme,
    #[error("url must contain host and filename")]
    MissingPath,
    #[error("unrecognized host and port format: {0}")]
    InvalidHost(String),
    #[error("invalid port in {host}: {source}")]
    InvalidPort {
        host: String,
        #[source]
        source: ParseIntError,
    },
}

/// A parsed `sftp://host[:port]/dir/.../file` address.
///
/// The last path element is the file name; everything before it is the
/// directory chain. Instances only come out of [`SftpUrl::from_str`] and are
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SftpUrl {
    host: String,
    port: u16,
    path: Vec<String>,
}

impl SftpUrl {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Everything except the final element.
    pub fn directories(&self) -> &[String] {
        match self.path.split_last() {
            Some((_, directories)) => directories,
            None => &[],
        }
    }

    pub fn file_name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    /// `/seg1/seg2/.../segN`
    pub fn source_path(&self) -> String {
        self.path.iter().fold(String::new(), |mut path, element| {
            path.push('/');
            path.push_str(element);
            path
        })
    }

    pub fn full_url(&self) -> String {
        format!(
            "{SFTP_SCHEME_PREFIX}{}:{}{}",
            self.host,
            self.port,
            self.source_path()
        )
    }
}

impl Display for SftpUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full_url())
    }
}

impl FromStr for SftpUrl {
    type Err = UrlError;

    fn from_str(url: &str) -> Result<Self, Self::Err> {
        let url = url.trim();
        if url.is_empty() {
            return Err(UrlError::Empty);
        }

        let prefix = url
            .get(..SFTP_SCHEME_PREFIX.len())
            .ok_or(UrlError::UnsupportedScheme)?;
        if !prefix.eq_ignore_ascii_case(SFTP_SCHEME_PREFIX) {
            return Err(UrlError::UnsupportedScheme);
        }

        #[allow(clippy::indexing_slicing)] // prefix length checked above
        let mut tokens = url[SFTP_SCHEME_PREFIX.len()..]
            .split('/')
            .filter(|token| !token.is_empty())
            .map(str::to_owned);

        let authority = tokens.next().ok_or(UrlError::MissingPath)?;
        let path: Vec<String> = tokens.collect();
        if path.is_empty() {
            return Err(UrlError::MissingPath);
        }

        let (host, port) = match authority.split_once(':') {
            None => (authority, DEFAULT_SFTP_PORT),
            Some((host, port)) => {
                if host.is_empty() || port.contains(':') {
                    return Err(UrlError::InvalidHost(authority.clone()));
                }
                let port = port.parse().map_err(|source| UrlError::InvalidPort {
                    host: authority.clone(),
                    source,
                })?;
                (host.to_owned(), port)
            }
        };

        Ok(SftpUrl { host, port, path })
    }
}
