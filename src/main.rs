//! oss-pm-exporter
//!
//! Prometheus exporter for OSS performance-management counters.
//! This is the main entry point that initializes the server and handles subcommands.

mod cli;
mod commands;
mod config;
mod handlers;
mod metrics;
mod scrape_stats;
mod state;

use axum::{extract::State, routing::get, Router};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use oss_pm_exporter::descriptors::DescriptorSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use cli::{Args, Commands, LogFormat, LogLevel};
use commands::{
    command_check, command_collect, command_config, command_generate_testdata, command_report,
};
use config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR, DEFAULT_PORT,
};
use handlers::{
    aggregate_handler, config_handler, device_handler, health_handler, metrics_handler,
    root_handler,
};
use state::{AppState, SharedState};

/// Paths served by the exporter itself; application paths may not shadow them.
const RESERVED_PATHS: &[&str] = &["", "metrics", "health", "config", "api/metrics"];

/// Initializes tracing logging subsystem with configured level and encoding.
/// Subcommands log to stderr so their stdout stays machine-readable.
fn setup_logging(config: &Config, to_stderr: bool) {
    let level = config.log_level();
    if level == LogLevel::Off {
        return;
    }
    let log_level = match level {
        LogLevel::Off | LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let writer = if to_stderr {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };

    let builder = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    let result = match config.log_format() {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
    };
    if let Err(e) = result {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {:?}", level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
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
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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

/// Builds the router: fixed endpoints plus one route per application path.
fn build_router(state: SharedState) -> Router {
    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/metrics", get(aggregate_handler))
        .route("/config", get(config_handler));

    if state.config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }

    for path in state.descriptors.apps.keys() {
        let path = path.trim_matches('/').to_string();
        if RESERVED_PATHS.contains(&path.as_str()) {
            warn!("Application path /{} collides with a built-in endpoint, skipped", path);
            continue;
        }
        debug!("Registering application path /{}", path);
        let key = path.clone();
        app = app.route(
            &format!("/{path}"),
            get(move |state: State<SharedState>| device_handler(state, key.clone())),
        );
    }

    app.with_state(state)
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
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
        if let Commands::Config {
            output,
            format,
            commented,
        } = command
        {
            return command_config(output.clone(), *format, *commented);
        }

        let config = load_validated_config(&args)?;
        setup_logging(&config, true);

        return match command {
            Commands::Check { cluster } => command_check(*cluster, &config).await,
            Commands::Collect { offline, format } => command_collect(*offline, *format, &config)
                .await
                .map_err(Into::into),
            Commands::Report { compact } => command_report(*compact, &config).map_err(Into::into),
            Commands::GenerateTestdata {
                output,
                locations,
                rows_per_location,
            } => command_generate_testdata(output.clone(), *locations, *rows_per_location, &config),
            Commands::Config { .. } => unreachable!("Config handled above"),
        };
    }

    // Load configuration for main server mode
    let config = load_validated_config(&args)?;
    setup_logging(&config, false);

    info!("Starting oss-pm-exporter");

    let bind_ip_str = config.bind.clone().unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
    let port = config.port.unwrap_or(DEFAULT_PORT);

    let descriptors = DescriptorSet::load(
        &config.metric_config_path(),
        &config.app_config_path(),
        config.metric_prefix(),
    )
    .map_err(|e| {
        error!("Failed to load metric definitions: {}", e);
        e
    })?;

    let tls = match (
        config.enable_tls.unwrap_or(false),
        config.tls_cert_path.clone(),
        config.tls_key_path.clone(),
    ) {
        (true, Some(cert), Some(key)) => Some((cert, key)),
        (true, _, _) => return Err("TLS is enabled but certificate or key path is missing".into()),
        (false, _, _) => None,
    };

    let state: SharedState = Arc::new(AppState::new(config, descriptors)?);
    info!(
        "Serving {} PM metrics and {} application paths",
        state.descriptors.pm.len(),
        state.descriptors.apps.len()
    );

    // Configure HTTP server routes
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;
    let app = build_router(state.clone());

    if let Some((cert_path, key_path)) = tls {
        info!("Loading TLS certificate from: {}", cert_path);
        info!("Loading TLS private key from: {}", key_path);

        let tls_config = RustlsConfig::from_pem_file(&cert_path, &key_path)
            .await
            .map_err(|e| {
                error!("Failed to load TLS configuration: {}", e);
                e
            })?;

        info!("oss-pm-exporter listening on https://{}:{}", bind_ip_str, port);

        let server = axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service());

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server error: {}", e);
                    return Err(e.into());
                }
            }
            _ = shutdown_signal() => {
                info!("Shutdown signal received, exiting...");
            }
        }
    } else {
        let listener = TcpListener::bind(addr).await?;
        info!("oss-pm-exporter listening on http://{}:{}", bind_ip_str, port);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                error!("Server error: {}", e);
                e
            })?;
    }

    info!("oss-pm-exporter stopped gracefully");
    Ok(())
}
