use std::io::Cursor;

use bytes::{Bytes, BytesMut};
use futures::Stream;
use poem::http::header::CONTENT_LENGTH;
use poem::web::{Data, Field, Multipart, Query};
use poem::{handler, Body, Request, Response};
use serde::Deserialize;
use sftpgate_common::{SftpUrl, SftpgateError};
use sftpgate_protocol_sftp::{
    ensure_directories, RemoteReader, SessionGuard, SftpClientError, SftpSession,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::*;

use crate::auth::extract_credentials;
use crate::error::error_response;
use crate::Services;

const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Deserialize)]
pub struct ProxyParams {
    url: Option<String>,
}

impl ProxyParams {
    fn target(&self) -> Result<SftpUrl, SftpgateError> {
        Ok(self.url.as_deref().unwrap_or_default().parse()?)
    }
}

/// Strips any Windows-style directory part some browsers send along.
pub fn sanitize_file_name(file_name: &str) -> &str {
    match file_name.rfind('\\') {
        Some(index) => &file_name[index + 1..],
        None => file_name,
    }
}

#[handler]
pub async fn download(
    req: &Request,
    Query(params): Query<ProxyParams>,
    services: Data<&Services>,
) -> Response {
    let target = match params.target() {
        Ok(target) => target,
        Err(error) => return error_response(&error, None),
    };
    download_file(req, &target, &services)
        .await
        .unwrap_or_else(|error| error_response(&error, Some(target.host())))
}

enum Download {
    Buffered(Vec<u8>),
    /// `size` is only set when the server reported a size above the
    /// buffer limit, and the reader is capped to it.
    Streamed {
        size: Option<u64>,
        reader: RemoteReader,
    },
}

async fn start_download(
    session: &mut dyn SftpSession,
    path: &str,
    buffer_limit: u64,
) -> Result<Download, SftpClientError> {
    let size = session.size(path).await?;
    let mut reader = session.open(path).await?;
    if let Some(size) = size.filter(|size| *size > buffer_limit) {
        return Ok(Download::Streamed {
            size: Some(size),
            reader: Box::new(reader.take(size)),
        });
    }

    // The reported size may be missing or stale, so never hold more than
    // the limit in memory.
    let mut head = Vec::new();
    (&mut reader)
        .take(buffer_limit + 1)
        .read_to_end(&mut head)
        .await?;
    if head.len() as u64 <= buffer_limit {
        return Ok(Download::Buffered(head));
    }
    Ok(Download::Streamed {
        size: None,
        reader: Box::new(Cursor::new(head).chain(reader)),
    })
}

async fn download_file(
    req: &Request,
    target: &SftpUrl,
    services: &Services,
) -> Result<Response, SftpgateError> {
    let credentials = extract_credentials(req)?;
    let mut guard = services.open_session(target, credentials).await?;

    let path = target.source_path();
    let content_type = mime_guess::from_path(target.file_name())
        .first_or_octet_stream()
        .to_string();

    let started = start_download(
        guard.session(),
        &path,
        services.config.store.http.download_buffer_limit,
    )
    .await;

    match started {
        Ok(Download::Buffered(contents)) => {
            guard.close().await;
            info!(host=%target.host(), %path, size=contents.len(), "Downloaded");
            Ok(Response::builder().content_type(content_type).body(contents))
        }
        Ok(Download::Streamed { size, reader }) => {
            info!(host=%target.host(), %path, ?size, "Streaming download");
            let mut response = Response::builder().content_type(content_type);
            if let Some(size) = size {
                response = response.header(CONTENT_LENGTH, size);
            }
            Ok(response.body(Body::from_bytes_stream(download_stream(guard, reader))))
        }
        Err(error) => {
            guard.close().await;
            Err(error.into())
        }
    }
}

struct DownloadState {
    guard: SessionGuard,
    reader: RemoteReader,
    transferred: u64,
}

/// Yields the remote file in chunks and closes the session once the file
/// has been read to the end or a read fails. Dropping the stream early
/// leaves the close to [`SessionGuard`].
fn download_stream(
    guard: SessionGuard,
    reader: RemoteReader,
) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
    let state = DownloadState {
        guard,
        reader,
        transferred: 0,
    };
    futures::stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        let mut chunk = BytesMut::with_capacity(DOWNLOAD_CHUNK_SIZE);
        match state.reader.read_buf(&mut chunk).await {
            Ok(0) => {
                debug!(size = state.transferred, "Download finished");
                state.guard.close().await;
                None
            }
            Ok(read) => {
                state.transferred += read as u64;
                Some((Ok(chunk.freeze()), Some(state)))
            }
            Err(error) => {
                warn!(%error, transferred = state.transferred, "Download interrupted");
                state.guard.close().await;
                Some((Err(error), None))
            }
        }
    })
}

#[handler]
pub async fn upload(
    req: &Request,
    Query(params): Query<ProxyParams>,
    services: Data<&Services>,
    multipart: poem::Result<Multipart>,
) -> Response {
    let target = match params.target() {
        Ok(target) => target,
        Err(error) => return error_response(&error, None),
    };
    upload_file(req, &target, &services, multipart)
        .await
        .unwrap_or_else(|error| error_response(&error, Some(target.host())))
}

/// First part that carries a file name, with the name sanitized.
async fn next_file_part(multipart: &mut Multipart) -> Result<(String, Field), SftpgateError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| SftpgateError::InvalidArgument(error.to_string()))?
    {
        let file_name = field.file_name().map(sanitize_file_name).unwrap_or_default();
        if !file_name.is_empty() {
            return Ok((file_name.to_owned(), field));
        }
    }
    Err(SftpgateError::NoFilePart)
}

async fn store_file(
    session: &mut dyn SftpSession,
    target: &SftpUrl,
    remote_name: &str,
    field: Field,
) -> Result<u64, SftpClientError> {
    ensure_directories(&mut *session, target.directories()).await?;
    let mut writer = session.create(remote_name).await?;
    let reader = field.into_async_read();
    tokio::pin!(reader);
    let size = tokio::io::copy(&mut reader, &mut writer).await?;
    writer.shutdown().await?;
    Ok(size)
}

async fn upload_file(
    req: &Request,
    target: &SftpUrl,
    services: &Services,
    multipart: poem::Result<Multipart>,
) -> Result<Response, SftpgateError> {
    let mut multipart =
        multipart.map_err(|error| SftpgateError::InvalidArgument(error.to_string()))?;
    let (file_name, field) = next_file_part(&mut multipart).await?;

    let credentials = extract_credentials(req)?;
    let mut guard = services.open_session(target, credentials).await?;

    let remote_name = format!("{}{}", target.file_name(), file_name);
    let result = store_file(guard.session(), target, &remote_name, field).await;
    guard.close().await;
    let size = result?;

    info!(host=%target.host(), %remote_name, size, "Uploaded");
    Ok(Response::builder()
        .content_type("text/plain; charset=utf-8")
        .body(format!("{}{}", target.full_url(), file_name)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use poem::http::StatusCode;
    use poem::test::{TestClient, TestForm, TestFormField};
    use sftpgate_common::{Credentials, SftpgateConfig, SftpgateConfigStore};
    use sftpgate_protocol_sftp::mock::MockConnector;
    use sftpgate_protocol_sftp::SftpConnector;

    use super::*;
    use crate::make_app;

    const ALICE: &str = "Basic YWxpY2U6cHc=";
    const ALICE_WRONG_PASSWORD: &str = "Basic YWxpY2U6d3Jvbmc=";

    fn services(connector: &MockConnector, store: SftpgateConfigStore) -> Services {
        let config = SftpgateConfig {
            store,
            paths_relative_to: ".".into(),
        };
        Services::new(config, Arc::new(connector.clone()))
    }

    fn client(connector: &MockConnector) -> TestClient<impl poem::Endpoint> {
        TestClient::new(make_app(&services(connector, Default::default())))
    }

    fn report_form() -> TestForm {
        TestForm::new()
            .field(TestFormField::text("quarterly").name("comment"))
            .field(
                TestFormField::bytes(b"a,b\n1,2\n".to_vec())
                    .name("file")
                    .filename("C:\\Users\\me\\report.csv"),
            )
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("C:\\Users\\me\\report.csv"), "report.csv");
        assert_eq!(sanitize_file_name("report.csv"), "report.csv");
        assert_eq!(sanitize_file_name("dir\\"), "");
    }

    #[tokio::test]
    async fn test_download() {
        let connector = MockConnector::new()
            .with_password("pw")
            .with_file("/data/reports/q1.txt", b"hello");
        let cli = client(&connector);

        let resp = cli
            .get("/")
            .query("url", &"sftp://files.example.com:2222/data/reports/q1.txt")
            .header("authorization", ALICE)
            .send()
            .await;
        resp.assert_status_is_ok();
        resp.assert_content_type("text/plain");
        resp.assert_text("hello").await;

        assert_eq!(connector.attempts(), vec!["alice@files.example.com:2222"]);
        assert_eq!(connector.opened(), 1);
        assert_eq!(connector.closed(), 1);
    }

    #[tokio::test]
    async fn test_download_streamed() {
        let contents: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let connector = MockConnector::new().with_file("/big.bin", &contents);
        let mut store = SftpgateConfigStore::default();
        store.http.download_buffer_limit = 1024;
        let cli = TestClient::new(make_app(&services(&connector, store)));

        let resp = cli
            .get("/")
            .query("url", &"sftp://host/big.bin")
            .header("authorization", ALICE)
            .send()
            .await;
        resp.assert_status_is_ok();
        resp.assert_header("content-length", "200000");
        resp.assert_content_type("application/octet-stream");
        resp.assert_bytes(contents).await;

        assert_eq!(connector.opened(), 1);
        assert_eq!(connector.closed(), 1);
    }

    #[tokio::test]
    async fn test_buffering_ignores_reported_size() {
        let contents = vec![7u8; 32 * 1024];
        let connector = MockConnector::new()
            .with_file("/grown.bin", &contents)
            .with_reported_size("/grown.bin", Some(0))
            .with_file("/small.bin", b"small")
            .with_reported_size("/small.bin", None);
        let url: SftpUrl = "sftp://host/grown.bin".parse().unwrap();
        let mut session = connector
            .open(&url, Credentials::new("alice", "pw"))
            .await
            .unwrap();

        match start_download(session.as_mut(), "/grown.bin", 1024).await {
            Ok(Download::Streamed { size, mut reader }) => {
                assert_eq!(size, None);
                let mut streamed = vec![];
                reader.read_to_end(&mut streamed).await.unwrap();
                assert_eq!(streamed, contents);
            }
            _ => panic!("expected a streamed download"),
        }

        match start_download(session.as_mut(), "/small.bin", 1024).await {
            Ok(Download::Buffered(buffered)) => assert_eq!(buffered, b"small"),
            _ => panic!("expected a buffered download"),
        }
    }

    #[tokio::test]
    async fn test_download_with_understated_size() {
        let contents: Vec<u8> = (0..50_000u32).map(|i| (i % 13) as u8).collect();
        let connector = MockConnector::new()
            .with_file("/grown.bin", &contents)
            .with_reported_size("/grown.bin", Some(10));
        let mut store = SftpgateConfigStore::default();
        store.http.download_buffer_limit = 1024;
        let cli = TestClient::new(make_app(&services(&connector, store)));

        let resp = cli
            .get("/")
            .query("url", &"sftp://host/grown.bin")
            .header("authorization", ALICE)
            .send()
            .await;
        resp.assert_status_is_ok();
        resp.assert_header_is_not_exist("content-length");
        resp.assert_bytes(contents).await;

        assert_eq!(connector.opened(), 1);
        assert_eq!(connector.closed(), 1);
    }

    #[tokio::test]
    async fn test_download_capped_to_reported_size() {
        let contents: Vec<u8> = (0..5_000u32).map(|i| (i % 7) as u8).collect();
        let connector = MockConnector::new()
            .with_file("/shrunk.bin", &contents)
            .with_reported_size("/shrunk.bin", Some(2_048));
        let mut store = SftpgateConfigStore::default();
        store.http.download_buffer_limit = 1024;
        let cli = TestClient::new(make_app(&services(&connector, store)));

        let resp = cli
            .get("/")
            .query("url", &"sftp://host/shrunk.bin")
            .header("authorization", ALICE)
            .send()
            .await;
        resp.assert_status_is_ok();
        resp.assert_header("content-length", "2048");
        resp.assert_bytes(contents[..2_048].to_vec()).await;
        assert_eq!(connector.closed(), 1);
    }

    #[tokio::test]
    async fn test_download_requires_auth() {
        let connector = MockConnector::new().with_file("/file", b"x");
        let cli = client(&connector);

        let resp = cli
            .get("/")
            .query("url", &"sftp://files.example.com/file")
            .send()
            .await;
        resp.assert_status(StatusCode::UNAUTHORIZED);
        resp.assert_header("www-authenticate", "Basic realm=\"files.example.com\"");
        assert!(connector.attempts().is_empty());
        assert_eq!(connector.opened(), 0);
    }

    #[tokio::test]
    async fn test_rejected_credentials_are_challenged() {
        let connector = MockConnector::new()
            .with_password("pw")
            .with_file("/file", b"x");
        let cli = client(&connector);

        let resp = cli
            .get("/")
            .query("url", &"sftp://files.example.com/file")
            .header("authorization", ALICE_WRONG_PASSWORD)
            .send()
            .await;
        resp.assert_status(StatusCode::UNAUTHORIZED);
        resp.assert_header("www-authenticate", "Basic realm=\"files.example.com\"");
        assert_eq!(connector.attempts().len(), 1);
        assert_eq!(connector.opened(), 0);
    }

    #[tokio::test]
    async fn test_download_missing_file() {
        let connector = MockConnector::new();
        let cli = client(&connector);

        let resp = cli
            .get("/")
            .query("url", &"sftp://host/missing.txt")
            .header("authorization", ALICE)
            .send()
            .await;
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(connector.opened(), 1);
        assert_eq!(connector.closed(), 1);
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let connector = MockConnector::new();
        let cli = client(&connector);

        for url in ["http://host/file", "sftp://onlyhost", "sftp://host:badport/file"] {
            let resp = cli
                .get("/")
                .query("url", &url)
                .header("authorization", ALICE)
                .send()
                .await;
            resp.assert_status(StatusCode::BAD_REQUEST);
        }

        let resp = cli.get("/").header("authorization", ALICE).send().await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        assert!(connector.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let connector = MockConnector::new().unreachable();
        let cli = client(&connector);

        let resp = cli
            .get("/")
            .query("url", &"sftp://host/file")
            .header("authorization", ALICE)
            .send()
            .await;
        resp.assert_status(StatusCode::BAD_GATEWAY);

        let mut store = SftpgateConfigStore::default();
        store.sftp.challenge_on_connect_error = true;
        let cli = TestClient::new(make_app(&services(&connector, store)));
        let resp = cli
            .get("/")
            .query("url", &"sftp://host/file")
            .header("authorization", ALICE)
            .send()
            .await;
        resp.assert_status(StatusCode::UNAUTHORIZED);
        resp.assert_header("www-authenticate", "Basic realm=\"host\"");
    }

    #[tokio::test]
    async fn test_upload() {
        let connector = MockConnector::new().with_directory("/incoming");
        let cli = client(&connector);

        let resp = cli
            .post("/")
            .query("url", &"sftp://files.example.com/incoming/2024/upload-")
            .header("authorization", ALICE)
            .multipart(report_form())
            .send()
            .await;
        resp.assert_status_is_ok();
        resp.assert_content_type("text/plain; charset=utf-8");
        resp.assert_text("sftp://files.example.com:22/incoming/2024/upload-report.csv")
            .await;

        assert_eq!(
            connector.file("/incoming/2024/upload-report.csv"),
            Some(b"a,b\n1,2\n".to_vec())
        );
        assert_eq!(
            connector.operations(),
            vec![
                "cd incoming",
                "cd 2024",
                "mkdir 2024",
                "cd 2024",
                "create /incoming/2024/upload-report.csv",
            ]
        );
        assert_eq!(connector.opened(), 1);
        assert_eq!(connector.closed(), 1);
    }

    #[tokio::test]
    async fn test_upload_without_file_part() {
        let connector = MockConnector::new();
        let cli = client(&connector);

        let resp = cli
            .post("/")
            .query("url", &"sftp://host/incoming/prefix")
            .header("authorization", ALICE)
            .multipart(TestForm::new().field(TestFormField::text("value").name("comment")))
            .send()
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        assert!(connector.attempts().is_empty());
        assert!(connector.operations().is_empty());
    }

    #[tokio::test]
    async fn test_upload_requires_auth() {
        let connector = MockConnector::new();
        let cli = client(&connector);

        let resp = cli
            .post("/")
            .query("url", &"sftp://files.example.com/incoming/prefix")
            .multipart(report_form())
            .send()
            .await;
        resp.assert_status(StatusCode::UNAUTHORIZED);
        resp.assert_header("www-authenticate", "Basic realm=\"files.example.com\"");
        assert!(connector.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_upload_to_read_only_server() {
        let connector = MockConnector::new().read_only();
        let cli = client(&connector);

        let resp = cli
            .post("/")
            .query("url", &"sftp://host/incoming/prefix")
            .header("authorization", ALICE)
            .multipart(report_form())
            .send()
            .await;
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(connector.opened(), 1);
        assert_eq!(connector.closed(), 1);
    }

    #[tokio::test]
    async fn test_upload_interrupted_while_writing() {
        let connector = MockConnector::new()
            .with_directory("/incoming")
            .failing_writes();
        let cli = client(&connector);

        let resp = cli
            .post("/")
            .query("url", &"sftp://host/incoming/prefix")
            .header("authorization", ALICE)
            .multipart(report_form())
            .send()
            .await;
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            connector.operations(),
            vec!["cd incoming", "create /incoming/prefixreport.csv"]
        );
        assert_eq!(connector.file("/incoming/prefixreport.csv"), None);
        assert_eq!(connector.opened(), 1);
        assert_eq!(connector.closed(), 1);
    }

    #[tokio::test]
    async fn test_other_methods() {
        let connector = MockConnector::new();
        let cli = client(&connector);

        let resp = cli
            .put("/")
            .query("url", &"sftp://host/file")
            .header("authorization", ALICE)
            .send()
            .await;
        resp.assert_status(StatusCode::METHOD_NOT_ALLOWED);
        assert!(connector.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_health() {
        let connector = MockConnector::new();
        let cli = client(&connector);

        let resp = cli.get("/@sftpgate/health").send().await;
        resp.assert_status_is_ok();
        assert!(connector.attempts().is_empty());
    }
}
