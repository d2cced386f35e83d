//! Interop server binary: parses flags, installs logging and metrics, and
//! serves until Ctrl-C.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use interop_server::network::{NetworkConfig, NetworkModule, DEFAULT_PORT};
use interop_server::service::{InteropService, ServerConfig, DEFAULT_DRAIN_LIMIT};
use interop_server::telemetry::{self, LogFormat};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "interop-server")]
#[command(about = "Registry, RPC dispatch and message queue for polyglot modules")]
struct Args {
    /// Host to bind to
    #[arg(long, env = "INTEROP_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, env = "INTEROP_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Upper bound on one outbound call to a module, in milliseconds
    #[arg(long, env = "INTEROP_DISPATCH_TIMEOUT_MS", default_value_t = 5_000)]
    dispatch_timeout_ms: u64,

    /// Host that registered modules listen on
    #[arg(long, env = "INTEROP_MODULE_HOST", default_value = "localhost")]
    module_host: String,

    /// Fail calls to port-less modules instead of answering with a stub
    #[arg(long, env = "INTEROP_NO_STUB_FALLBACK")]
    no_stub_fallback: bool,

    /// Items drained by Process-Queue when no limit is given
    #[arg(long, env = "INTEROP_DRAIN_LIMIT", default_value_t = DEFAULT_DRAIN_LIMIT)]
    drain_limit: usize,

    /// Drain the queue automatically on this interval (milliseconds)
    #[arg(long, env = "INTEROP_QUEUE_DRAIN_INTERVAL_MS")]
    queue_drain_interval_ms: Option<u64>,

    /// Allowed CORS origin; repeat for several ("*" allows any)
    #[arg(long = "cors-origin", env = "INTEROP_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    cors_origins: Vec<String>,

    /// Maximum HTTP request duration in seconds
    #[arg(long, env = "INTEROP_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    /// Log output format
    #[arg(long, env = "INTEROP_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Log filter directives, used when RUST_LOG is unset
    #[arg(long, env = "INTEROP_LOG_FILTER")]
    log_filter: Option<String>,

    /// Expose Prometheus metrics on this port
    #[arg(long, env = "INTEROP_METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Address for the metrics listener
    #[arg(long, env = "INTEROP_METRICS_HOST", default_value = "0.0.0.0")]
    metrics_host: IpAddr,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            dispatch_timeout_ms: self.dispatch_timeout_ms,
            module_host: self.module_host.clone(),
            stub_fallback: !self.no_stub_fallback,
            default_drain_limit: self.drain_limit,
            queue_drain_interval_ms: self.queue_drain_interval_ms,
        }
    }

    fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            cors_origins: self.cors_origins.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..NetworkConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    telemetry::init_tracing(args.log_format, args.log_filter.as_deref())?;

    if let Some(port) = args.metrics_port {
        telemetry::install_metrics(args.metrics_host, port)?;
        info!(host = %args.metrics_host, port, "prometheus exporter listening");
    }

    let server_config = args.server_config();
    if !server_config.stub_fallback {
        info!("stub fallback disabled; port-less modules cannot be called");
    }
    let service = Arc::new(InteropService::new(server_config)?);

    let mut network = NetworkModule::new(args.network_config(), service);
    let port = network.start().await?;
    info!(host = %args.host, port, "interop server started");

    network
        .serve(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("interop server stopped");
    Ok(())
}
