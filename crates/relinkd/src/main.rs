// # relinkd - link daemon
//
// Thin integration layer over relink-core: a reconnecting pipe between a
// remote TCP endpoint and this process's stdio. Bytes received over the
// link go to stdout; bytes read from stdin go to `send`. All reconnection
// behavior lives in the library; nothing here retries anything.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// - `RELINK_HOST`: server hostname or IP (required)
// - `RELINK_PORT`: server TCP port (required)
// - `RELINK_RETRY_DELAY_MS`: delay between retry attempts (default 2000)
// - `RELINK_RECV_BUFFER_BYTES`: receive scratch buffer size (default 1024)
// - `RELINK_LOG_LEVEL`: trace, debug, info, warn or error (default info)
//
// ## Example
//
// ```bash
// export RELINK_HOST=feed.example.com
// export RELINK_PORT=9000
//
// relinkd > feed.bin
// ```

use std::env;
use std::net::IpAddr;
use std::process::ExitCode;

use anyhow::Result;
use relink_core::{LinkConfig, LinkEvent, TcpLink, TuningConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_stream::StreamExt;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum RelinkExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<RelinkExitCode> for ExitCode {
    fn from(code: RelinkExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    host: String,
    port: u16,
    retry_delay_ms: Option<u64>,
    recv_buffer_bytes: Option<usize>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let host = env::var("RELINK_HOST")
            .map_err(|_| anyhow::anyhow!("RELINK_HOST is required"))?;
        let port = env::var("RELINK_PORT")
            .map_err(|_| anyhow::anyhow!("RELINK_PORT is required"))?
            .parse()
            .map_err(|_| anyhow::anyhow!("RELINK_PORT must be a TCP port number"))?;

        Ok(Self {
            host,
            port,
            retry_delay_ms: env::var("RELINK_RETRY_DELAY_MS")
                .ok()
                .map(|s| s.parse())
                .transpose()
                .map_err(|_| anyhow::anyhow!("RELINK_RETRY_DELAY_MS must be an integer"))?,
            recv_buffer_bytes: env::var("RELINK_RECV_BUFFER_BYTES")
                .ok()
                .map(|s| s.parse())
                .transpose()
                .map_err(|_| anyhow::anyhow!("RELINK_RECV_BUFFER_BYTES must be an integer"))?,
            log_level: env::var("RELINK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.validate_host()?;

        if self.port == 0 {
            anyhow::bail!("RELINK_PORT must be between 1 and 65535");
        }

        if let Some(delay) = self.retry_delay_ms
            && !(10..=300_000).contains(&delay)
        {
            anyhow::bail!(
                "RELINK_RETRY_DELAY_MS must be between 10 and 300000. Got: {}",
                delay
            );
        }

        if let Some(bytes) = self.recv_buffer_bytes
            && !(1..=1_048_576).contains(&bytes)
        {
            anyhow::bail!(
                "RELINK_RECV_BUFFER_BYTES must be between 1 and 1048576. Got: {}",
                bytes
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "RELINK_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Validate that the host is an IP literal or a plausible domain name
    /// (basic RFC 1035 shape checks, not a full DNS grammar).
    fn validate_host(&self) -> Result<()> {
        let host = &self.host;

        if host.is_empty() {
            anyhow::bail!("RELINK_HOST cannot be empty");
        }

        if host.parse::<IpAddr>().is_ok() {
            return Ok(());
        }

        if host.len() > 253 {
            anyhow::bail!("RELINK_HOST too long: {} chars (max 253)", host.len());
        }

        for label in host.split('.') {
            if label.is_empty() {
                anyhow::bail!("RELINK_HOST has an empty label: '{}'", host);
            }
            if label.len() > 63 {
                anyhow::bail!("RELINK_HOST label too long: '{}'", label);
            }
            if !label.chars().all(|c| c.is_alphanumeric() || c == '-') {
                anyhow::bail!(
                    "RELINK_HOST label contains invalid characters: '{}'. \
                    Valid: alphanumeric and hyphen only.",
                    label
                );
            }
            if label.starts_with('-') || label.ends_with('-') {
                anyhow::bail!("RELINK_HOST label cannot start or end with hyphen: '{}'", label);
            }
        }

        Ok(())
    }

    fn link_config(&self) -> LinkConfig {
        let mut tuning = TuningConfig::default();
        if let Some(delay) = self.retry_delay_ms {
            tuning.retry_delay_ms = delay;
        }
        if let Some(bytes) = self.recv_buffer_bytes {
            tuning.recv_buffer_bytes = bytes;
        }
        LinkConfig::new(self.host.clone(), self.port).with_tuning(tuning)
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return RelinkExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return RelinkExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr; stdout carries the link payload.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return RelinkExitCode::ConfigError.into();
    }

    info!("Starting relinkd");
    info!("Target endpoint: {}:{}", config.host, config.port);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return RelinkExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {}", e);
            RelinkExitCode::RuntimeError
        } else {
            RelinkExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let link = TcpLink::new(config.link_config())?;
    let mut events = link.subscribe();
    link.start();

    let mut stdout = tokio::io::stdout();
    let mut stdin = tokio::io::stdin();
    let mut input = vec![0u8; 1024];
    let mut stdin_open = true;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            received = &mut shutdown => {
                match received {
                    Ok(name) => info!("Received shutdown signal: {}", name),
                    Err(e) => error!("Shutdown signal error: {}", e),
                }
                break;
            }

            event = events.next() => match event {
                Some(LinkEvent::Connected) => info!("Link up"),
                Some(LinkEvent::Disconnected) => warn!("Link down, reconnecting"),
                Some(LinkEvent::Data(payload)) => {
                    stdout.write_all(&payload).await?;
                    stdout.flush().await?;
                }
                None => break,
            },

            read = stdin.read(&mut input), if stdin_open => match read {
                Ok(0) => {
                    info!("stdin closed, no further sends");
                    stdin_open = false;
                }
                Ok(count) => link.send(&input[..count]),
                Err(e) => {
                    warn!("stdin read failed: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    info!("Shutting down daemon");
    link.stop().await;

    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn shutdown_signal() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
