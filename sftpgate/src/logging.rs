use std::sync::Arc;

use anyhow::Result;
use time::{format_description, UtcOffset};
use tracing_subscriber::filter::dynamic_filter_fn;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const FULL_TIME_FORMAT: &str = "[day].[month].[year] [hour]:[minute]:[second]";
const COMPACT_TIME_FORMAT: &str = "[hour]:[minute]:[second]";

/// Compact output for a terminal, full timestamps and targets otherwise
/// (journald, docker logs).
pub fn init_logging() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "sftpgate=info")
    }

    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let attended = console::user_attended();
    let env_filter = Arc::new(EnvFilter::from_default_env());

    let full_fmt_layer = if attended {
        None
    } else {
        let env_filter = env_filter.clone();
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_timer(OffsetTime::new(
                    offset,
                    format_description::parse(FULL_TIME_FORMAT)?,
                ))
                .with_filter(dynamic_filter_fn(move |m, c| {
                    env_filter.enabled(m, c.clone())
                })),
        )
    };

    let compact_fmt_layer = if attended {
        Some(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(true)
                .with_target(false)
                .with_timer(OffsetTime::new(
                    offset,
                    format_description::parse(COMPACT_TIME_FORMAT)?,
                ))
                .with_filter(dynamic_filter_fn(move |m, c| {
                    env_filter.enabled(m, c.clone())
                })),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(full_fmt_layer)
        .with(compact_fmt_layer)
        .init();
    Ok(())
}
