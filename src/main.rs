//! ohm-exporter - OpenHardwareMonitor sensors for Prometheus.
//!
//! This is the main entry point that initializes logging, starts the poll
//! loop and the HTTP server, and dispatches subcommands.

use anyhow::Context;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tokio::{net::TcpListener, signal, sync::watch};
use tracing::{debug, error, info, Level};

use ohm_exporter::cli::{Args, Commands, LogLevel};
use ohm_exporter::commands::{
    command_check, command_config, command_generate_testdata, command_sensors, command_test,
};
use ohm_exporter::config::{resolve_config, show_config, validate_effective_config, Config};
use ohm_exporter::error::ExporterError;
use ohm_exporter::handlers::build_router;
use ohm_exporter::poller::Poller;
use ohm_exporter::source::ConfiguredSource;
use ohm_exporter::startup_checks::log_startup_check;
use ohm_exporter::state::AppState;

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(level: LogLevel) {
    let max_level = match level {
        LogLevel::Off => None,
        LogLevel::Error => Some(Level::ERROR),
        LogLevel::Warn => Some(Level::WARN),
        LogLevel::Info => Some(Level::INFO),
        LogLevel::Debug => Some(Level::DEBUG),
        LogLevel::Trace => Some(Level::TRACE),
    };

    let Some(max_level) = max_level else {
        return;
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(max_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Logging initialized with level: {:?}", level);
}

/// Resolves and validates the configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> anyhow::Result<Config> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Main application entry point.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        // Commands that never touch the hardware monitor skip config validation
        match command {
            Commands::Config {
                output,
                format,
                commented,
            } => return command_config(output.clone(), *format, *commented),
            Commands::Sensors => return command_sensors(),
            Commands::GenerateTestdata {
                output,
                cores,
                disks,
                seed,
            } => return command_generate_testdata(output.clone(), *cores, *disks, *seed),
            _ => {}
        }

        let config = resolve_config(&args)?;
        setup_logging(config.log_level());

        return match command {
            Commands::Check { skip_source } => command_check(*skip_source, &config).await,
            Commands::Test {
                iterations,
                verbose,
            } => {
                validate_effective_config(&config)?;
                command_test(*iterations, *verbose, &config).await
            }
            Commands::Config { .. } | Commands::Sensors | Commands::GenerateTestdata { .. } => {
                unreachable!("handled above")
            }
        };
    }

    // Load configuration for main server mode
    let config = load_validated_config(&args)?;
    setup_logging(config.log_level());

    info!("Starting ohm-exporter {}", env!("CARGO_PKG_VERSION"));

    let addr = config.listen_addr()?;
    let source = ConfiguredSource::from_config(&config)?;
    let state = AppState::shared(config)?;
    debug!("Application state initialized");

    log_startup_check(&source, &state.classifier).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = tokio::spawn(Poller::new(source, state.clone()).run(shutdown_rx));

    let app = build_router(state.clone());
    let metrics_path = state.config.metrics_path().to_string();

    let served: anyhow::Result<()> = if state.config.tls_enabled() {
        // Paths are present, validate_effective_config() checked them
        let (Some(cert_path), Some(key_path)) = (
            state.config.tls_cert_path.as_ref(),
            state.config.tls_key_path.as_ref(),
        ) else {
            anyhow::bail!("TLS enabled without certificate and key paths");
        };

        info!("Loading TLS certificate from: {}", cert_path);
        info!("Loading TLS private key from: {}", key_path);

        let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .map_err(ExporterError::Tls)?;

        info!("ohm-exporter listening on https://{}{}", addr, metrics_path);

        let server = axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service());

        tokio::select! {
            result = server => result.context("HTTPS server failed"),
            _ = shutdown_signal() => {
                info!("Shutdown signal received, exiting...");
                Ok(())
            }
        }
    } else {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ExporterError::Bind { addr, source })?;
        info!("ohm-exporter listening on http://{}{}", addr, metrics_path);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server failed")
    };

    if let Err(e) = &served {
        error!("Server error: {:#}", e);
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = poller.await {
        error!("Poll task ended abnormally: {}", e);
    }

    info!("ohm-exporter stopped gracefully");
    served
}
