//! Web server

use crate::app::Service;
use crate::cli::CommandLineArgs;

use std::{net::SocketAddr, process::exit, str::FromStr, time::Duration};

use axum::ServiceExt;
use axum_server::{tls_rustls::RustlsConfig, Handle};
use expanduser::expanduser;
use tokio::signal;
use tracing::{event, Level};

/// Serve the equistat service
///
/// Binds the configured address, optionally with TLS, and runs until a
/// shutdown signal is received.
///
/// # Arguments
///
/// * `args`: Command line arguments
/// * `service`: The [crate::app::Service] to serve
pub async fn serve(args: &CommandLineArgs, service: Service) {
    let addr = SocketAddr::from_str(&format!("{}:{}", args.host, args.port))
        .expect("invalid host name, IP address or port number");

    // Catch ctrl+c and try to shutdown gracefully
    let handle = Handle::new();
    tokio::spawn(shutdown_signal(
        handle.clone(),
        args.graceful_shutdown_timeout,
    ));

    if args.https {
        let tls_config = load_tls_config(args).await;
        event!(Level::INFO, %addr, "listening with TLS");
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(service.into_make_service())
            .await
            .expect("server error");
    } else {
        event!(Level::INFO, %addr, "listening");
        axum_server::bind(addr)
            .handle(handle)
            .serve(service.into_make_service())
            .await
            .expect("server error");
    }
}

/// Load the TLS certificate and key named on the command line.
///
/// Paths may start with `~`, which is expanded to the user's home directory.
async fn load_tls_config(args: &CommandLineArgs) -> RustlsConfig {
    let cert_file = expanduser(&args.cert_file)
        .expect("Failed to expand ~ to user name. Please provide an absolute path instead.");
    let key_file = expanduser(&args.key_file)
        .expect("Failed to expand ~ to user name. Please provide an absolute path instead.");
    if !cert_file.exists() {
        event!(
            Level::ERROR,
            "TLS certificate file expected at '{}' but not found",
            cert_file.display()
        );
        exit(1)
    }
    if !key_file.exists() {
        event!(
            Level::ERROR,
            "TLS key file expected at '{}' but not found",
            key_file.display()
        );
        exit(1)
    }
    RustlsConfig::from_pem_file(cert_file, key_file)
        .await
        .expect("Failed to load TLS certificate files")
}

/// Graceful shutdown handler
///
/// Installs signal handlers to catch Ctrl-C or SIGTERM and trigger a graceful shutdown.
async fn shutdown_signal(handle: Handle, timeout: u64) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    event!(Level::INFO, "signal received, starting graceful shutdown");
    // Force shutdown if graceful shutdown takes longer than the timeout
    handle.graceful_shutdown(Some(Duration::from_secs(timeout)));
}
