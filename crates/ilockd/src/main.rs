//! ilockd: ilock appliance daemon
//!
//! Usage:
//!   ilockd [--config /etc/ilock/config.toml] [--debug]
//!
//! Startup fails closed: an unknown cipher or a bad HSM directive aborts
//! before the listener binds.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use ilock_core::config::{DaemonConfig, IlockConfig};
use ilock_crypto::RegistryBuilder;
use ilock_server::AppState;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ilockd", version, about = "ilock appliance daemon")]
struct Cli {
    /// Path to config.toml
    #[arg(
        long,
        short = 'c',
        env = "ILOCK_CONFIG",
        default_value = "/etc/ilock/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error) [default: daemon.log_level]
    #[arg(long, env = "ILOCK_LOG")]
    log: Option<String>,

    /// Log format (json, text) [default: daemon.log_format]
    #[arg(long, env = "ILOCK_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log API requests and response envelopes
    #[arg(long)]
    debug: bool,
}

#[derive(Clone, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging settings may come from the file, so it is read first
    let loaded = load_config(&cli.config).await?;
    let found = loaded.is_some();
    let mut config = loaded.unwrap_or_default();
    if cli.debug {
        config.daemon.debug = true;
    }

    let (level, format) = logging_settings(&cli, &config.daemon)?;
    init_logging(&level, &format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "ilockd starting"
    );
    if !found {
        tracing::warn!(
            "config file not found: {}  (using defaults)",
            cli.config.display()
        );
    }

    let builder = RegistryBuilder::with_builtins();
    info!(available = ?builder.available_cipher_names(), "cipher providers");
    let registry = builder.initialize(&config.crypto)?;
    info!(enabled = ?registry.enabled_names(), "registry ready");
    if config.crypto.hsm_enabled() {
        info!(
            directive = %config.crypto.hsm,
            auth = ?registry.auth_hsm().map(|b| &b.model),
            tls = ?registry.tls_hsm().map(|b| &b.model),
            "HSM bound"
        );
    }

    if config.auth.users.is_empty() {
        tracing::warn!("no [auth.users] configured: every login will be rejected");
    }
    if registry.tls_hsm().is_some() {
        tracing::warn!("tls HSM role is bound but TLS termination is not served by ilockd");
    }

    let state = AppState::new(&config, registry);
    let app = ilock_server::router(state, &config.daemon.static_path);
    ilock_server::serve(&config.daemon.bind_address, app).await
}

/// Read the config file; `None` when it does not exist.
async fn load_config(path: &Path) -> Result<Option<IlockConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.display()))?;
    parse_config(&content)
        .map(Some)
        .map_err(|e| anyhow::anyhow!("parsing config {}: {e}", path.display()))
}

/// Command-line flags win over `[daemon]` log settings.
fn logging_settings(cli: &Cli, daemon: &DaemonConfig) -> Result<(String, LogFormat)> {
    let level = cli.log.clone().unwrap_or_else(|| daemon.log_level.clone());
    let format = match &cli.log_format {
        Some(format) => format.clone(),
        None => LogFormat::from_str(&daemon.log_format, true)
            .map_err(|e| anyhow::anyhow!("daemon.log_format {:?}: {e}", daemon.log_format))?,
    };
    Ok((level, format))
}

fn parse_config(content: &str) -> Result<IlockConfig, toml::de::Error> {
    toml::from_str(content)
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}
