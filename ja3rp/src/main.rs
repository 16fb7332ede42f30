#![forbid(unsafe_code)]

use clap::Parser;
use ja3rp_lib::config::{read_from_path, validate_config, Config};
use ja3rp_lib::proxy::signal_shutdown;
use ja3rp_lib::telemetry::{init_metrics, init_tracing, start_observability_server};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "TLS reverse proxy that filters clients by JA3 fingerprint")]
struct Cli {
    /// Address to listen on
    #[arg(short, long, env = "JA3RP_ADDRESS")]
    address: Option<String>,

    /// Path to the PEM certificate
    #[arg(short, long, value_name = "FILE", env = "JA3RP_CERT")]
    cert: Option<String>,

    /// Path to the PEM private key
    #[arg(short, long, value_name = "FILE", env = "JA3RP_KEY")]
    key: Option<String>,

    /// http:// or https:// URL to forward accepted traffic to (enables reverse proxy mode)
    #[arg(short, long, value_name = "URL", env = "JA3RP_DESTINATION")]
    destination: Option<String>,

    /// File of blacklisted JA3 hashes, one per line
    #[arg(short, long, value_name = "FILE")]
    blacklist: Option<PathBuf>,

    /// File of whitelisted JA3 hashes, one per line
    #[arg(short, long, value_name = "FILE")]
    whitelist: Option<PathBuf>,

    /// Optional TOML configuration; flags override its values
    #[arg(long, value_name = "FILE", env = "JA3RP_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, env = "JA3RP_LOG_LEVEL")]
    log_level: Option<String>,

    /// Serve /metrics and /health on this port
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Send x-ja3-hash and x-ja3 headers upstream
    #[arg(long)]
    fingerprint_header: bool,
}

impl Cli {
    fn into_config(self) -> ja3rp_lib::Result<Config> {
        let mut cfg = match &self.config {
            Some(path) => read_from_path(path)?,
            None => Config::default(),
        };

        if let Some(address) = self.address {
            cfg.listen = address;
        }
        if let Some(cert) = self.cert {
            cfg.tls.cert_path = cert;
        }
        if let Some(key) = self.key {
            cfg.tls.key_path = key;
        }
        if let Some(destination) = self.destination.filter(|d| !d.is_empty()) {
            cfg.destination = Some(destination);
        }
        if self.blacklist.is_some() {
            cfg.access.blacklist = self.blacklist;
        }
        if self.whitelist.is_some() {
            cfg.access.whitelist = self.whitelist;
        }
        if let Some(level) = self.log_level {
            cfg.logging.level = level;
        }
        if self.metrics_port.is_some() {
            cfg.telemetry.metrics_port = self.metrics_port;
        }
        if self.fingerprint_header {
            cfg.fingerprint.header = true;
        }

        validate_config(&cfg)?;
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let log_level = cli.log_level.clone().unwrap_or_else(|| "info".to_string());
    let loaded = cli.into_config();

    let level = loaded.as_ref().map(|c| c.logging.level.as_str()).unwrap_or(log_level.as_str());
    let show_target = loaded.as_ref().map(|c| c.logging.show_target).unwrap_or(false);
    if let Err(err) = init_tracing(level, show_target) {
        eprintln!("failed to initialise logging: {err}");
        std::process::exit(1);
    }

    let cfg = match loaded {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(%err, "failed to load configuration");
            std::process::exit(1);
        }
    };
    info!(listen = %cfg.listen, destination = ?cfg.destination, "configuration loaded");

    let shutdown = match signal_shutdown() {
        Ok(rx) => rx,
        Err(err) => {
            error!(%err, "failed to install signal handlers");
            std::process::exit(1);
        }
    };

    let metrics = match cfg.telemetry.metrics_port {
        Some(port) => match init_metrics() {
            Ok((metrics, registry)) => {
                let proxy_mode = cfg.destination.is_some();
                let rx = shutdown.clone();
                tokio::spawn(async move {
                    let served = start_observability_server(port, registry, proxy_mode, rx).await;
                    if let Err(err) = served {
                        warn!(%err, "observability server exited with error");
                    }
                });
                Some(metrics)
            }
            Err(err) => {
                warn!(%err, "metrics disabled");
                None
            }
        },
        None => None,
    };

    if let Err(err) = ja3rp_lib::run(&cfg, metrics, shutdown).await {
        error!(%err, "proxy exited with error");
        std::process::exit(1);
    }
}
