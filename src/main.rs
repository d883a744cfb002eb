//! # Audio Enhancement Gateway - Main Application Entry Point
//!
//! An Actix-web server that accepts audio uploads, validates them, and
//! forwards them to a downstream audio-enhancement processor, relaying the
//! result (or a proxied download) back to the caller.
//!
//! ## Application Architecture:
//! - **config**: Typed configuration (TOML file + environment variables)
//! - **state**: Shared read-only config, the gateway, request metrics
//! - **gateway**: Validation, health gating, forwarding, response translation
//! - **handlers**: Public `/api/audio/*` endpoints
//! - **health**: Liveness and metrics for the gateway itself
//! - **middleware**: Request logging and metrics
//! - **error**: HTTP error responses

mod config;      // Configuration management (config.rs)
mod error;       // Error handling types (error.rs)
mod gateway;     // Forwarding and validation pipeline (gateway/ directory)
mod handlers;    // HTTP request handlers (handlers/ directory)
mod health;      // Liveness and metrics endpoints (health.rs)
mod middleware;  // Custom middleware (middleware/ directory)
mod state;       // Application state (state.rs)

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use state::AppState;
use tracing::{error, info};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// ## What this function does:
/// 1. **Loads configuration** from files and environment variables
/// 2. **Sets up logging**
/// 3. **Creates shared application state** (including the outbound client)
/// 4. **Configures the HTTP server** with middleware and routes
/// 5. **Handles graceful shutdown** on SIGINT/SIGTERM
#[actix_web::main]
async fn main() -> Result<()> {
    // .ok() because a missing .env file is normal
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;

    info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    info!(
        host = %config.server.host,
        port = config.server.port,
        downstream = %config.downstream.base_url,
        max_file_size_bytes = config.upload.max_file_size_bytes,
        "Configuration loaded"
    );

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let app_state = AppState::new(config)?;
    let shutdown = app_state.shutdown.clone();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Middleware executes in reverse order of registration for requests
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .wrap(TracingLogger::default())
            .configure(handlers::routes)
    })
    .disable_signals()
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            // Abort outbound calls first; enhancement requests can run for minutes.
            shutdown.cancel();
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Structured logging to the console.
///
/// `RUST_LOG` controls the filter; without it the gateway logs at debug and
/// actix at info.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audio_enhance_gateway=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                }
                return;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received SIGINT");
}
