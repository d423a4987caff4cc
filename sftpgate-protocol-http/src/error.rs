use poem::http::header::WWW_AUTHENTICATE;
use poem::http::StatusCode;
use poem::Response;
use sftpgate_common::{ErrorKind, SftpgateError};
use tracing::*;

use crate::auth::basic_challenge;

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::AuthRequired | ErrorKind::SecurityFailure => StatusCode::UNAUTHORIZED,
        ErrorKind::RemoteIoFailure => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::UpstreamProtocolFailure => StatusCode::BAD_GATEWAY,
    }
}

/// Turns a failed request into its response. Challenges name
/// `challenge_host`, the SFTP server the credentials are meant for.
pub fn error_response(error: &SftpgateError, challenge_host: Option<&str>) -> Response {
    let kind = error.kind();
    let status = status_for(kind);
    match kind {
        ErrorKind::RemoteIoFailure | ErrorKind::UpstreamProtocolFailure => {
            error!(%error, "Request failed")
        }
        _ => debug!(%error, %status, "Request rejected"),
    }

    let mut response = Response::builder()
        .status(status)
        .content_type("text/plain; charset=utf-8");
    if kind.wants_challenge() {
        if let Some(host) = challenge_host {
            response = response.header(WWW_AUTHENTICATE, basic_challenge(host));
        }
    }
    response.body(error.to_string())
}

#[cfg(test)]
mod tests {
    use sftpgate_common::UrlError;

    use super::*;

    #[test]
    fn test_error_response() {
        let response = error_response(&UrlError::MissingPath.into(), None);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());

        let response = error_response(&SftpgateError::AuthRequired, Some("example.com"));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"example.com\""
        );

        let response = error_response(
            &SftpgateError::upstream(std::io::Error::other("reset")),
            Some("example.com"),
        );
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());
    }
}
