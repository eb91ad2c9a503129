use anyhow::Context;
use axum::http::{HeaderValue, Method};
use cellar_api::auth::{AuthConfig, AuthService};
use cellar_api::config::{init_tracing, load_config};
use cellar_api::handlers::AppServices;
use cellar_api::services::PaymentGateway;
use cellar_api::{app, AppState};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    init_tracing(&config);

    info!(
        environment = %config.environment,
        "Starting cellar-api v{}",
        env!("CARGO_PKG_VERSION")
    );

    let db = Arc::new(
        cellar_api::db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to the database")?,
    );

    if config.auto_migrate {
        info!("Running database migrations");
        cellar_api::db::run_migrations(&db)
            .await
            .context("database migration failed")?;
    }

    let auth_service = Arc::new(AuthService::new(AuthConfig::new(
        config.jwt_secret.clone(),
        Duration::from_secs(config.jwt_expiration_secs),
    )));

    let gateway = Arc::new(PaymentGateway::from_config(&config));
    let services = AppServices::new(db.clone(), gateway, config.payment_currency.clone());

    let state = AppState {
        db,
        config: config.clone(),
        auth_service,
        services,
    };

    let cors = build_cors(&config);
    let router = app(state).layer(cors).layer(TraceLayer::new_for_http());

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

fn build_cors(config: &cellar_api::config::AppConfig) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if let Some(origins) = &config.cors_allowed_origins {
        let origins: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|origin| origin.trim().parse().ok())
            .collect();
        if !origins.is_empty() {
            return CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(methods)
                .allow_headers(Any);
        }
        warn!("No valid CORS origins configured; falling back");
    }

    if config.cors_allow_any_origin {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
