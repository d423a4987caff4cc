mod auth;
mod error;
mod logging;
mod proxy;
mod services;

use std::fmt::Debug;

use anyhow::{Context, Result};
pub use auth::{basic_challenge, extract_credentials};
pub use error::error_response;
use poem::listener::{Listener, RustlsCertificate, RustlsConfig, TcpListener};
use poem::{get, handler, Endpoint, EndpointExt, Route, Server};
pub use services::Services;
use sftpgate_common::ListenEndpoint;
use tracing::*;

pub const HEALTH_PATH: &str = "/@sftpgate/health";

#[handler]
async fn health() -> &'static str {
    "OK"
}

/// The bridge endpoint plus the liveness probe, wired to `services`.
pub fn make_app(services: &Services) -> impl Endpoint {
    Route::new()
        .at(HEALTH_PATH, get(health))
        .at(
            &services.config.store.http.path,
            get(proxy::download).post(proxy::upload),
        )
        .around(|ep, req| async move { logging::log_request(ep, req).await })
        .data(services.clone())
}

#[derive(Clone)]
pub struct HTTPProtocolServer {
    services: Services,
}

impl HTTPProtocolServer {
    pub fn new(services: &Services) -> Self {
        HTTPProtocolServer {
            services: services.clone(),
        }
    }

    pub async fn run(self, address: ListenEndpoint) -> Result<()> {
        let app = make_app(&self.services);
        let config = &self.services.config;
        let listener = TcpListener::bind(address.0);

        if !config.store.http.tls_enabled() {
            info!(%address, path=%config.store.http.path, "Listening");
            return Server::new(listener)
                .run(app)
                .await
                .context("Failed to start HTTP server");
        }

        let (certificate, key) = {
            let certificate_path = config.certificate_path();
            let key_path = config.key_path();

            (
                std::fs::read(&certificate_path).with_context(|| {
                    format!(
                        "reading SSL certificate from '{}'",
                        certificate_path.display()
                    )
                })?,
                std::fs::read(&key_path).with_context(|| {
                    format!("reading SSL private key from '{}'", key_path.display())
                })?,
            )
        };

        info!(%address, path=%config.store.http.path, "Listening (TLS)");
        Server::new(listener.rustls(
            RustlsConfig::new().fallback(RustlsCertificate::new().cert(certificate).key(key)),
        ))
        .run(app)
        .await
        .context("Failed to start HTTP server")
    }
}

impl Debug for HTTPProtocolServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTPProtocolServer")
    }
}
