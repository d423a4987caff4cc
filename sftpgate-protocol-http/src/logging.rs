use std::sync::Arc;

use poem::http::{Method, StatusCode, Uri};
use poem::{Endpoint, IntoResponse, Request, Response};
use tracing::*;

use crate::Services;

pub fn get_client_ip(req: &Request) -> Option<String> {
    let trust_x_forwarded_headers = req
        .data::<Services>()
        .map(|services| services.config.store.http.trust_x_forwarded_headers)
        .unwrap_or(false);

    let remote_ip = req.remote_addr().as_socket_addr().map(|x| x.ip().to_string());

    if trust_x_forwarded_headers {
        req.header("x-forwarded-for")
            .map(|x| x.to_string())
            .or(remote_ip)
    } else {
        remote_ip
    }
}

pub fn log_request_result(
    method: &Method,
    url: &Uri,
    client_ip: Option<&str>,
    status: &StatusCode,
) {
    let client_ip = client_ip.unwrap_or("<unknown>");
    if status.is_server_error() || status.is_client_error() {
        warn!(%method, %url, %status, %client_ip, "Request failed");
    } else {
        info!(%method, %url, %status, %client_ip, "Request");
    }
}

/// Runs the request inside an `HTTP` span and logs its outcome.
pub async fn log_request<E: Endpoint>(ep: Arc<E>, req: Request) -> poem::Result<Response> {
    let client_ip = get_client_ip(&req);
    let method = req.method().clone();
    let url = req.original_uri().clone();
    let span = info_span!("HTTP", client_ip = client_ip.as_deref().unwrap_or("<unknown>"));

    async move {
        let result = ep.call(req).await.map(IntoResponse::into_response);
        let status = match result {
            Ok(ref response) => response.status(),
            Err(ref error) => error.status(),
        };
        log_request_result(&method, &url, client_ip.as_deref(), &status);
        result
    }
    .instrument(span)
    .await
}
