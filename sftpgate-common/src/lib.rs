mod auth;
mod config;
mod error;
pub mod helpers;
mod types;
mod url;

pub use auth::Credentials;
pub use config::*;
pub use error::{ErrorKind, SftpgateError};
pub use types::*;
pub use url::{SftpUrl, UrlError, DEFAULT_SFTP_PORT, SFTP_SCHEME_PREFIX};
