use poem::web::headers::authorization::Basic;
use poem::web::headers::{Authorization, HeaderMapExt};
use poem::Request;
use sftpgate_common::{Credentials, SftpgateError};

/// Pulls the Basic-Auth pair out of the request. The credentials are only
/// checked by the SFTP server later on.
pub fn extract_credentials(req: &Request) -> Result<Credentials, SftpgateError> {
    req.headers()
        .typed_get::<Authorization<Basic>>()
        .map(|Authorization(basic)| Credentials::new(basic.username(), basic.password()))
        .ok_or(SftpgateError::AuthRequired)
}

/// `WWW-Authenticate` value asking for credentials for `realm`.
pub fn basic_challenge(realm: &str) -> String {
    let realm = realm.replace('\\', "\\\\").replace('"', "\\\"");
    format!("Basic realm=\"{realm}\"")
}
