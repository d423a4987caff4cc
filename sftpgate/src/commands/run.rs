use std::sync::Arc;

use anyhow::Result;
#[cfg(target_os = "linux")]
use sd_notify::NotifyState;
use sftpgate_common::{HostKeyVerificationMode, SftpgateConfig};
use sftpgate_protocol_http::{HTTPProtocolServer, Services};
use sftpgate_protocol_sftp::RusshConnector;
use tracing::*;

use crate::config::load_config;

pub(crate) async fn command(cli: &crate::Cli) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    info!(%version, "sftpgate");

    let config = load_config(&cli.config, true)?;
    let connector = RusshConnector::new(&config)?;
    if let Some(warning) = host_key_warning(&config) {
        warn!("{warning}");
    }
    let listen = config.store.http.listen;
    let scheme = if config.store.http.tls_enabled() {
        "https"
    } else {
        "http"
    };
    let path = config.store.http.path.clone();

    let services = Services::new(config, Arc::new(connector));
    let server = HTTPProtocolServer::new(&services).run(listen);

    if console::user_attended() {
        info!("--------------------------------------------");
        info!("sftpgate is now running.");
        info!("Accepting requests on {scheme}://{listen}{path}");
        info!("--------------------------------------------");
    }

    #[cfg(target_os = "linux")]
    if let Ok(true) = sd_notify::booted() {
        use std::time::Duration;
        tokio::spawn(async {
            if let Err(error) = async {
                sd_notify::notify(false, &[NotifyState::Ready])?;
                loop {
                    sd_notify::notify(false, &[NotifyState::Watchdog])?;
                    tokio::time::sleep(Duration::from_secs(15)).await;
                }
                #[allow(unreachable_code)]
                Ok::<(), anyhow::Error>(())
            }
            .await
            {
                error!(?error, "Failed to communicate with systemd");
            }
        });
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Exiting");
        }
        result = server => {
            if let Err(error) = result {
                error!(?error, "HTTP server error");
                return Err(error);
            }
        }
    }

    Ok(())
}

fn host_key_warning(config: &SftpgateConfig) -> Option<&'static str> {
    match config.store.sftp.host_key_verification {
        HostKeyVerificationMode::AcceptAny => Some(
            "SFTP host keys are not verified (`sftp.host_key_verification: accept_any`). \
             Set it to `known_hosts` unless all SFTP servers are on a trusted network.",
        ),
        HostKeyVerificationMode::KnownHosts => None,
    }
}
