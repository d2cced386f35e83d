//! Logging and metrics initialization for the server binary.

use std::net::{IpAddr, SocketAddr};

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines on stderr.
    #[default]
    Text,
    /// One JSON object per line, for log aggregation.
    Json,
}

/// Chooses the filter directives: `RUST_LOG` wins, then the configured
/// filter, then `info`.
#[must_use]
pub fn resolve_directives(rust_log: Option<&str>, configured: Option<&str>) -> String {
    rust_log
        .filter(|v| !v.trim().is_empty())
        .or(configured)
        .unwrap_or("info")
        .to_string()
}

/// Installs the global `tracing` subscriber.
///
/// # Errors
///
/// Returns an error if the directives do not parse or a global subscriber
/// is already installed.
pub fn init_tracing(format: LogFormat, filter: Option<&str>) -> anyhow::Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directives = resolve_directives(rust_log.as_deref(), filter);
    let env_filter = EnvFilter::try_new(&directives)?;

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_ansi(std::env::var_os("NO_COLOR").is_none()),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()?,
    }
    Ok(())
}

/// Starts the Prometheus scrape endpoint and installs it as the global
/// metrics recorder.
///
/// # Errors
///
/// Returns an error if the exporter cannot bind or a recorder is already
/// installed.
pub fn install_metrics(host: IpAddr, port: u16) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::new(host, port))
        .install()?;
    Ok(())
}
