//! HTTP server binary for pdf-invert.
//!
//! Serves [`pdf_invert::server::router`] with graceful shutdown on
//! SIGINT/SIGTERM. All options can also be set through `PDFINVERT_*`
//! environment variables.

use anyhow::{Context, Result};
use clap::Parser;
use pdf_invert::server::{router, ServerState};
use pdf_invert::{DpiFallback, InversionConfig};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Serve PDF colour inversion over HTTP.
#[derive(Parser, Debug)]
#[command(name = "pdfinvert-server", version, about = "HTTP service for PDF colour inversion")]
struct Args {
    /// Address to bind to.
    #[arg(long, env = "PDFINVERT_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, env = "PDFINVERT_PORT", default_value_t = 3000)]
    port: u16,

    /// Maximum upload size in MiB.
    #[arg(long, env = "PDFINVERT_MAX_UPLOAD_MB", default_value_t = 100)]
    max_upload_mb: usize,

    /// Rendering DPI (1–1200).
    #[arg(long, env = "PDFINVERT_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(1..=1200))]
    dpi: u32,

    /// Always render at --dpi, even for uploads over 10 MiB.
    #[arg(long, env = "PDFINVERT_NO_DPI_FALLBACK")]
    no_dpi_fallback: bool,

    /// Path to the pdfium shared library (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    info!(
        "Initializing server {} v{}...",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let mut builder = InversionConfig::builder().dpi(args.dpi).dpi_fallback(
        (!args.no_dpi_fallback).then(DpiFallback::default),
    );
    if let Some(ref lib) = args.pdfium_lib {
        builder = builder.pdfium_library_path(lib);
    }
    let config = builder.build().context("Invalid configuration")?;
    debug!(?config, "Base inversion config");

    let state = ServerState::new(config).with_max_upload_bytes(args.max_upload_mb * 1024 * 1024);
    let app = router(state);

    let bind_addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to address {}", bind_addr))?;
    let addr = listener.local_addr()?;
    info!(
        address = %addr,
        max_upload_mb = args.max_upload_mb,
        "Server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Axum server error")?;

    info!("Server shut down gracefully.");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
