//! `tubekeep` binary: serve the playlist API or bootstrap credentials.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{Level, error, info};
use tubekeep_server::{
    ConfigFile, DEFAULT_CONFIG_PATH, LogRotation, LoggingConfig, Result, device_auth,
    exchange_auth_code, logging, run, token_source,
};

#[derive(Debug, Parser)]
#[command(
    name = "tubekeep",
    version,
    about = "YouTube playlist cache and reconciliation server"
)]
struct Cli {
    /// Configuration file; created with defaults when missing.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Print the OAuth consent URL and exit.
    #[arg(long, conflicts_with_all = ["youtube_auth_code", "youtube_device_auth"])]
    youtube_auth_url: bool,

    /// Exchange a consent-page code for a refresh token, store it and exit.
    #[arg(long, value_name = "CODE", conflicts_with = "youtube_device_auth")]
    youtube_auth_code: Option<String>,

    /// Authorize through the device flow, store the refresh token and exit.
    #[arg(long)]
    youtube_device_auth: bool,

    /// Directory for log files.
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Terminal log level; ignored when RUST_LOG is set.
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<Level>,

    /// Log file level.
    #[arg(long, value_name = "LEVEL")]
    log_file_level: Option<Level>,

    /// How often log files roll over.
    #[arg(long, value_enum)]
    log_rotation: Option<LogRotation>,
}

impl Cli {
    fn logging_config(&self) -> LoggingConfig {
        let mut config = self
            .log_dir
            .clone()
            .map_or_else(LoggingConfig::default, LoggingConfig::new);
        if let Some(level) = self.log_level {
            config = config.with_console_level(level);
        }
        if let Some(level) = self.log_file_level {
            config = config.with_file_level(level);
        }
        if let Some(rotation) = self.log_rotation {
            config = config.with_rotation(rotation);
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match logging::init(&cli.logging_config()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let file = ConfigFile::open(cli.config.clone())?;

    if cli.youtube_auth_url {
        println!("{}", token_source(&file)?.authorization_url());
        return Ok(());
    }

    if let Some(code) = cli.youtube_auth_code.as_deref() {
        let timeout = file.snapshot()?.youtube.request_timeout();
        exchange_auth_code(&file, &token_source(&file)?, code, timeout).await?;
        println!("Refresh token saved to {}", file.path().display());
        return Ok(());
    }

    if cli.youtube_device_auth {
        let source = token_source(&file)?;
        device_auth(&file, &source, |auth| {
            println!(
                "Visit {} and enter the code {}",
                auth.verification_url, auth.user_code
            );
        })
        .await?;
        println!("Refresh token saved to {}", file.path().display());
        return Ok(());
    }

    info!("Starting tubekeep {}", env!("CARGO_PKG_VERSION"));
    run(Arc::new(file), shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_log_flags_reach_logging_config() {
        let cli = Cli::try_parse_from([
            "tubekeep",
            "--log-dir",
            "/tmp/tubekeep-logs",
            "--log-level",
            "warn",
            "--log-file-level",
            "info",
            "--log-rotation",
            "never",
        ])
        .unwrap();

        let config = cli.logging_config();
        assert_eq!(config.directory, PathBuf::from("/tmp/tubekeep-logs"));
        assert_eq!(config.console_level, Level::WARN);
        assert_eq!(config.file_level, Level::INFO);
        assert_eq!(config.rotation, LogRotation::Never);
    }

    #[test]
    fn test_log_flags_default_to_build_profile() {
        let cli = Cli::try_parse_from(["tubekeep"]).unwrap();
        let defaults = LoggingConfig::default();

        let config = cli.logging_config();
        assert_eq!(config.console_level, defaults.console_level);
        assert_eq!(config.rotation, defaults.rotation);
    }

    #[test]
    fn test_bad_rotation_rejected() {
        assert!(Cli::try_parse_from(["tubekeep", "--log-rotation", "weekly"]).is_err());
    }
}
